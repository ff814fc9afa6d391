//! Packing of managed samples into the transport's native slots.
//!
//! The transport carries 16-bit slots for word sizes 1 and 2 and 32-bit slots
//! for word sizes 3 and 4. Narrow samples are left-aligned in their slot by
//! shifting left 8 bits; unpacking reverses that with an arithmetic shift.
//! Slots are little endian.

/// Bytes one sample occupies on the wire for the given word size.
pub fn bytes_per_sample(word_size: usize) -> usize {
    if word_size <= 2 { 2 } else { 4 }
}

fn shift(word_size: usize) -> u32 {
    match word_size {
        1 | 3 => 8,
        _ => 0,
    }
}

/// Packs `samples` into `out`, which must hold exactly
/// `samples.len() * bytes_per_sample(word_size)` bytes.
pub fn pack(samples: &[i32], word_size: usize, out: &mut [u8]) {
    let shift = shift(word_size);
    let width = bytes_per_sample(word_size);
    debug_assert_eq!(out.len(), samples.len() * width);

    for (sample, slot) in samples.iter().zip(out.chunks_exact_mut(width)) {
        let value = sample.wrapping_shl(shift);
        if width == 2 {
            slot.copy_from_slice(&(value as i16).to_le_bytes());
        } else {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// Unpacks whole slots from `bytes` into `out`. Returns the number of samples
/// written.
pub fn unpack(bytes: &[u8], word_size: usize, out: &mut [i32]) -> usize {
    let shift = shift(word_size);
    let width = bytes_per_sample(word_size);

    let mut count = 0;
    for (slot, sample) in bytes.chunks_exact(width).zip(out.iter_mut()) {
        *sample = if width == 2 {
            i32::from(i16::from_le_bytes([slot[0], slot[1]])) >> shift
        } else {
            i32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]) >> shift
        };
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_widths() {
        assert_eq!(bytes_per_sample(1), 2);
        assert_eq!(bytes_per_sample(2), 2);
        assert_eq!(bytes_per_sample(3), 4);
        assert_eq!(bytes_per_sample(4), 4);
    }

    #[test]
    fn eight_bit_samples_are_widened() {
        let mut out = [0u8; 4];
        pack(&[0x12, -1], 1, &mut out);
        assert_eq!(out, [0x00, 0x12, 0x00, 0xff]);

        let mut samples = [0; 2];
        assert_eq!(unpack(&out, 1, &mut samples), 2);
        assert_eq!(samples, [0x12, -1]);
    }

    #[test]
    fn twenty_four_bit_samples_are_widened() {
        let mut out = [0u8; 4];
        pack(&[0x123456], 3, &mut out);
        assert_eq!(out, [0x00, 0x56, 0x34, 0x12]);

        let mut samples = [0; 1];
        unpack(&out, 3, &mut samples);
        assert_eq!(samples, [0x123456]);
    }

    #[test]
    fn sixteen_and_thirty_two_bit_samples_are_copied() {
        let mut narrow = [0u8; 2];
        pack(&[-2], 2, &mut narrow);
        assert_eq!(narrow, (-2i16).to_le_bytes());

        let mut wide = [0u8; 4];
        pack(&[i32::MIN], 4, &mut wide);
        assert_eq!(wide, i32::MIN.to_le_bytes());
    }

    #[test]
    fn negative_samples_keep_their_sign() {
        let mut samples = [0; 1];
        unpack(&(-0x100i32).to_le_bytes(), 3, &mut samples);
        assert_eq!(samples, [-1]);
    }
}
