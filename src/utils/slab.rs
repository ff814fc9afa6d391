/// Index-stable storage. Keys are reused only after `remove`.
pub(crate) struct Slab<T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Slab<T> {
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| None).collect();
        let free = (0..size).rev().collect();

        Self {
            items,
            free,
            len: 0,
        }
    }

    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.items.len();
            let new_len = if len == 0 { 1 } else { 2 * len };

            self.items.extend((len..new_len).map(|_| None));
            self.free.extend(((len + 1)..new_len).rev());

            len
        };

        self.items[index] = Some(item);
        self.len += 1;

        index
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        let item = self.items.get_mut(index)?.take()?;

        self.free.push(index);
        self.len -= 1;

        Some(item)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| item.as_ref().map(|item| (index, item)))
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
