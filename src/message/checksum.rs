//! # Additive Checksum
//!
//! 16-bit sum of every payload byte, modulo 2^16.
//!
//! This is intentionally weak: it detects most single-byte corruption but
//! cannot correct anything, and it is blind to compensating errors (one
//! byte raised by N while another drops by N), byte reordering, and
//! inserted or removed zero bytes. It is part of the wire contract, so any
//! stronger check needs a new format version on both ends.

/// Calculate the additive checksum of `data`
///
/// # Examples
///
/// ```
/// use uav_relay::message::checksum::checksum;
///
/// assert_eq!(checksum(&[0x01, 0x02, 0xFF]), 0x0102);
/// ```
pub fn checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(byte as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_checksum_simple_sum() {
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xFF, 0xFF]), 0x01FE);
    }

    #[test]
    fn test_checksum_wraps_modulo_2_16() {
        // 300 * 0xFF = 76500 = 0x12AD4 -> 0x2AD4
        let data = vec![0xFFu8; 300];
        assert_eq!(checksum(&data), 0x2AD4);
    }

    #[test]
    fn test_checksum_changes_with_single_byte() {
        let data1 = [0x10, 0x20, 0x30, 0x40];
        let mut data2 = data1;
        data2[2] ^= 0x01;
        assert_ne!(checksum(&data1), checksum(&data2));
    }

    #[test]
    fn test_checksum_blind_to_compensating_errors() {
        // Known weakness of an additive sum: +1 on one byte and -1 on
        // another leaves the checksum unchanged.
        let data1 = [0x10, 0x20, 0x30, 0x40];
        let data2 = [0x11, 0x1F, 0x30, 0x40];
        assert_eq!(checksum(&data1), checksum(&data2));

        // Reordering is invisible too
        let data3 = [0x40, 0x30, 0x20, 0x10];
        assert_eq!(checksum(&data1), checksum(&data3));
    }
}
