/// Decodes a 2-digit packed BCD byte. Nibbles above 9 are taken at face value.
pub fn decode_bcd(byte: u8) -> u16 {
    10 * u16::from(byte >> 4) + u16::from(byte & 0x0F)
}

/// Encodes a value in 0..=99 as a 2-digit packed BCD byte.
pub fn encode_bcd(value: u16) -> u8 {
    let value = value % 100;
    (((value / 10) << 4) | (value % 10)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcd() {
        assert_eq!(decode_bcd(0x89), 89);
        assert_eq!(decode_bcd(0x00), 0);
        assert_eq!(encode_bcd(88), 0x88);
        assert_eq!(encode_bcd(7), 0x07);
        assert_eq!(encode_bcd(188), 0x88);
    }
}
