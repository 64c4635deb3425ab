//! Frame checksum.
//!
//! The keypad firmware protects every frame with a single byte: the low
//! 8 bits of the unsigned sum of all bytes from `STX` through `ETX`
//! inclusive.  It catches dropped and flipped bytes on the CDC link well
//! enough for human-rate key events; it is not meant to be cryptographic.

/// Computes the frame checksum over `bytes`.
///
/// `bytes` must span a frame from its `STX` byte through its `ETX` byte
/// inclusive.  The checksum byte itself is never part of the range.
///
/// # Examples
///
/// ```rust
/// use numpad_core::protocol::checksum;
///
/// // STX, CMD=0x00, LEN=0, ETX
/// assert_eq!(checksum(&[0x02, 0x00, 0x00, 0x03]), 0x05);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_of_empty_range_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_checksum_of_ping_frame() {
        // Arrange – STX, NOP, LEN=0, ETX
        let bytes = [0x02, 0x00, 0x00, 0x03];

        // Act
        let chk = checksum(&bytes);

        // Assert
        assert_eq!(chk, 0x05);
    }

    #[test]
    fn test_checksum_wraps_modulo_256() {
        // Arrange – 0x02 + 0xFE + 0x02 + 0xFF + 0x03 + 0x03 = 0x207
        let bytes = [0x02, 0xFE, 0x02, 0xFF, 0x03, 0x03];

        // Act
        let chk = checksum(&bytes);

        // Assert – only the low byte survives
        assert_eq!(chk, 0x07);
    }

    #[test]
    fn test_checksum_of_sub_range_ignores_surrounding_bytes() {
        // Arrange – noise, then a key-event frame body, then its checksum byte
        let buffer = [0xAA, 0x55, 0x02, 0xFE, 0x02, 0x03, 0x01, 0x03, 0x09];

        // Act
        let chk = checksum(&buffer[2..8]);

        // Assert – 0x02 + 0xFE + 0x02 + 0x03 + 0x01 + 0x03 = 0x109
        assert_eq!(chk, 0x09);
    }
}
