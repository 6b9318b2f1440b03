//! CRC-16/MODBUS checksum
//!
//! Reflected polynomial `0xA001`, initial value `0xFFFF`, no final XOR.
//! The checksum is sent low byte first.

use crc::{Crc, CRC_16_MODBUS};

use crate::constants::CRC_LEN;

const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Checksum over `data`
#[inline]
pub fn compute(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// Overwrite the last two bytes of `frame` with the checksum of everything
/// before them. Frames shorter than the CRC are left untouched.
pub fn write_trailer(frame: &mut [u8]) {
    if frame.len() < CRC_LEN {
        return;
    }
    let split = frame.len() - CRC_LEN;
    let crc = compute(&frame[..split]);
    frame[split..].copy_from_slice(&crc.to_le_bytes());
}

/// True when the trailing two bytes hold the checksum of the preceding bytes
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < CRC_LEN {
        return false;
    }
    let split = frame.len() - CRC_LEN;
    let expected = compute(&frame[..split]);
    frame[split..] == expected.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Bitwise form of the same algorithm
    fn reference_crc(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in data {
            crc ^= u16::from(byte);
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(compute(b"ABC"), 0x8550);
        assert_eq!(compute(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]), 0x8776);
        assert_eq!(compute(&[]), 0xFFFF);
    }

    #[test]
    fn test_write_trailer_is_little_endian() {
        let mut frame = [0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x00, 0x00];
        write_trailer(&mut frame);
        assert_eq!(&frame[6..], &[0x76, 0x87]);
        assert!(verify(&frame));
    }

    #[test]
    fn test_verify_rejects_swapped_bytes() {
        let frame = [0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x87, 0x76];
        assert!(!verify(&frame));
        assert!(!verify(&[0x01]));
    }

    #[test]
    fn test_write_trailer_short_frame() {
        let mut frame = [0xAB];
        write_trailer(&mut frame);
        assert_eq!(frame, [0xAB]);
    }

    proptest! {
        #[test]
        fn prop_matches_bitwise_reference(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assert_eq!(compute(&data), reference_crc(&data));
        }

        #[test]
        fn prop_trailer_verifies(data in proptest::collection::vec(any::<u8>(), 0..38)) {
            let mut frame = data.clone();
            frame.extend_from_slice(&[0, 0]);
            write_trailer(&mut frame);
            prop_assert!(verify(&frame));
        }
    }
}
