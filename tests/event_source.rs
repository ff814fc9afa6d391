mod common;

use hwreactor::os::{Queue, QueueSet, SetMember};
use hwreactor::{
    EventFold, EventQueueEventSource, EventQueueResource, EventWord, PinEvent, ResourceGroup,
    StateWord, WorkerState,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Device {
    queue: Queue<EventWord>,
    pin: Option<u32>,
    seen: Arc<Mutex<Vec<EventWord>>>,
}

impl Device {
    fn new(queue: Queue<EventWord>) -> (Self, Arc<Mutex<Vec<EventWord>>>) {
        Self::on_pin(queue, None)
    }

    fn on_pin(queue: Queue<EventWord>, pin: Option<u32>) -> (Self, Arc<Mutex<Vec<EventWord>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let device = Self {
            queue,
            pin,
            seen: seen.clone(),
        };
        (device, seen)
    }
}

impl EventQueueResource for Device {
    fn queue(&self) -> &dyn SetMember {
        &self.queue
    }

    fn receive_event(&self) -> Option<EventWord> {
        self.queue.try_recv()
    }

    fn check_pin(&self, pin: u32) -> bool {
        self.pin == Some(pin)
    }
}

/// Records every event and raises bit `data % 32`.
struct Recorder;

impl EventFold for Recorder {
    type Resource = Device;

    fn on_event(&self, device: &Device, data: EventWord, state: StateWord) -> StateWord {
        device.seen.lock().push(data);
        state | (1 << (data % 32))
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_events_delivered_once_in_order() {
    let source = EventQueueEventSource::builder().build().unwrap();
    let group = ResourceGroup::new(&source, Recorder);

    let queue = Queue::new(16);
    let (device, seen) = Device::new(queue.clone());
    let _handle = group.register_resource(device);

    let producer = thread::spawn(move || {
        for data in 0..1000 {
            let mut item = data;
            while let Err(full) = queue.send(item) {
                item = full.0;
                thread::yield_now();
            }
        }
    });
    producer.join().unwrap();

    wait_until(|| seen.lock().len() >= 1000);
    let seen = seen.lock();
    assert_eq!(*seen, (0..1000).collect::<Vec<_>>());
}

#[test]
fn test_register_discards_stale_events() {
    let source = EventQueueEventSource::builder().build().unwrap();
    let group = ResourceGroup::new(&source, Recorder);

    let queue = Queue::new(8);
    queue.send(7).unwrap();
    queue.send(9).unwrap();

    let (device, seen) = Device::new(queue.clone());
    let _handle = group.register_resource(device);
    assert!(queue.is_empty());

    queue.send(8).unwrap();
    wait_until(|| !seen.lock().is_empty());
    assert_eq!(*seen.lock(), vec![8]);
}

#[test]
fn test_unregister_stops_delivery() {
    let source = EventQueueEventSource::builder().build().unwrap();
    let group = ResourceGroup::new(&source, Recorder);

    let queue = Queue::new(8);
    let (device, seen) = Device::new(queue.clone());
    let handle = group.register_resource(device);
    assert_eq!(source.registered(), 1);
    assert_eq!(group.len(), 1);

    group.unregister_resource(handle);
    assert_eq!(source.registered(), 0);
    assert!(group.is_empty());

    queue.send(1).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(seen.lock().is_empty());
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_pin_events_fan_out_by_filter() {
    let pins = Queue::new(8);
    let source = EventQueueEventSource::builder()
        .pin_queue(pins.clone())
        .build()
        .unwrap();
    let group = ResourceGroup::new(&source, Recorder);

    let (a, seen_a) = Device::on_pin(Queue::new(4), Some(4));
    let (b, seen_b) = Device::on_pin(Queue::new(4), Some(4));
    let (c, seen_c) = Device::on_pin(Queue::new(4), Some(5));
    let _a = group.register_resource(a);
    let _b = group.register_resource(b);
    let _c = group.register_resource(c);

    pins.send(PinEvent { pin: 4, data: 1 }).unwrap();

    wait_until(|| seen_a.lock().len() == 1 && seen_b.lock().len() == 1);
    assert_eq!(*seen_a.lock(), vec![1]);
    assert_eq!(*seen_b.lock(), vec![1]);
    assert!(seen_c.lock().is_empty());
}

#[test]
fn test_wait_resumes_task() {
    let source = EventQueueEventSource::builder().build().unwrap();
    let group = ResourceGroup::new(&source, Recorder);

    let queue = Queue::new(4);
    let (device, _seen) = Device::new(queue.clone());
    let handle = group.register_resource(device);

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        queue.send(3).unwrap();
    });

    let bits = futures::executor::block_on(handle.wait(1 << 3));
    assert_eq!(bits, 1 << 3);
    assert_eq!(handle.state().bits(), 0);

    producer.join().unwrap();
}

#[test]
fn test_worker_idles_between_events() {
    let source = EventQueueEventSource::builder().name("idle").build().unwrap();
    wait_until(|| source.worker_state() == WorkerState::Waiting);
}

#[test]
fn test_register_fails_when_queue_belongs_elsewhere() {
    common::assert_fatal(
        "test_register_fails_when_queue_belongs_elsewhere",
        "EVQ: couldn't register resource after 16 attempts",
        || {
            let source = EventQueueEventSource::builder().build().unwrap();
            let group = ResourceGroup::new(&source, Recorder);

            let other = QueueSet::new(4);
            let queue = Queue::new(4);
            other.add(&queue).unwrap();

            let (device, _seen) = Device::new(queue);
            let _handle = group.register_resource(device);
        },
    );
}
