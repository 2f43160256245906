//! Broadcast frame integrity check.
//!
//! The last byte of a broadcast frame is the low byte of the sum of the
//! first four. This catches radio corruption, nothing more.

use crate::domain::codec::BROADCAST_FRAME_LEN;

/// `true` when `frame` is exactly five bytes and its last byte matches the
/// low byte of the sum of the first four.
pub fn is_valid(frame: &[u8]) -> bool {
    if frame.len() != BROADCAST_FRAME_LEN {
        return false;
    }

    let sum = frame[..4]
        .iter()
        .fold(0u8, |acc, &byte| acc.wrapping_add(byte));

    sum as i8 == frame[4] as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_frame() {
        // 0x02 + 0x03 + 0x00 + 0xF0 = 0xF5
        assert!(is_valid(&[0x02, 0x03, 0x00, 0xF0, 0xF5]));
        assert!(is_valid(&[0x00, 0x00, 0x00, 0x00, 0x00]));
    }

    #[test]
    fn test_sum_wraps_to_low_byte() {
        // 0xFF * 4 = 0x3FC -> 0xFC
        assert!(is_valid(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFC]));
        assert!(!is_valid(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFD]));
    }

    #[test]
    fn test_mismatch_rejected() {
        assert!(!is_valid(&[0x02, 0x03, 0x00, 0xF0, 0xF4]));
        assert!(!is_valid(&[0x01, 0x00, 0x01, 0x00, 0x00]));
    }

    #[test]
    fn test_every_checksum_byte_for_a_frame() {
        let body = [0x10, 0x20, 0x30, 0x40];
        for check in 0..=u8::MAX {
            let frame = [body[0], body[1], body[2], body[3], check];
            assert_eq!(is_valid(&frame), check == 0xA0);
        }
    }

    #[test]
    fn test_wrong_length_is_invalid() {
        for len in 0..16usize {
            if len == BROADCAST_FRAME_LEN {
                continue;
            }
            assert!(!is_valid(&vec![0u8; len]), "length {len}");
        }
    }
}
