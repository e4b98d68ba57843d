//! Hamming codes protecting Teletext packets (ETS 300 706, chapter 8).

// Codewords of the Hamming 8/4 code, indexed by nibble value.
const HAMMING_8_4: [u8; 16] = [
    0x15, 0x02, 0x49, 0x5E, 0x64, 0x73, 0x38, 0x2F, 0xD0, 0xC7, 0x8C, 0x9B, 0xA1, 0xB6, 0xFD, 0xEA,
];

const UNCORRECTABLE: u8 = 0xFF;

// Decodes every byte value: exact codewords and single bit errors give the
// nibble, anything else is uncorrectable.
const fn build_unham_8_4() -> [u8; 256] {
    let mut table = [UNCORRECTABLE; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut nibble = 0;
        while nibble < 16 {
            if (byte as u8 ^ HAMMING_8_4[nibble]).count_ones() <= 1 {
                table[byte] = nibble as u8;
            }
            nibble += 1;
        }
        byte += 1;
    }
    table
}

static UNHAM_8_4: [u8; 256] = build_unham_8_4();

/// Decodes a Hamming 8/4 byte, `None` when the error is uncorrectable.
pub fn try_unham_8_4(a: u8) -> Option<u8> {
    match UNHAM_8_4[usize::from(a)] {
        UNCORRECTABLE => None,
        n => Some(n),
    }
}

/// Decodes a Hamming 8/4 byte, uncorrectable bytes decode as zero.
pub fn unham_8_4(a: u8) -> u8 {
    try_unham_8_4(a).unwrap_or(0)
}

/// Decodes a Hamming 24/18 triplet into its 18 data bits.
///
/// Single bit errors are corrected, `None` is returned on double errors.
pub fn unham_24_18(mut a: u32) -> Option<u32> {
    let mut test: u8 = 0;
    for i in 0..23u8 {
        if (a >> i) & 1 != 0 {
            test ^= i + 33;
        }
    }
    if (a >> 23) & 1 != 0 {
        test ^= 32;
    }

    if test & 0x1F != 0x1F {
        if test & 0x20 != 0 {
            return None;
        }
        a ^= 1 << (30 - test);
    }

    Some((a & 0x00_0004) >> 2 | (a & 0x00_0070) >> 3 | (a & 0x00_7F00) >> 4 | (a & 0x7F_0000) >> 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Places 18 data bits and computes the odd parity bits.
    fn ham_24_18(data: u32) -> u32 {
        let mut a = (data & 0x1) << 2 | (data & 0xE) << 3 | (data & 0x7F0) << 4 | (data & 0x3_F800) << 5;
        for k in 0..5 {
            let group = (0..23)
                .filter(|i| ((i + 1) >> k) & 1 != 0)
                .filter(|i| (a >> i) & 1 != 0)
                .count();
            if group % 2 == 0 {
                a |= 1 << ((1 << k) - 1);
            }
        }
        if a.count_ones() % 2 == 0 {
            a |= 1 << 23;
        }
        a
    }

    #[test]
    fn test_unham_8_4() {
        for (nibble, &code) in HAMMING_8_4.iter().enumerate() {
            assert_eq!(try_unham_8_4(code), Some(nibble as u8));
            for bit in 0..8 {
                assert_eq!(try_unham_8_4(code ^ (1 << bit)), Some(nibble as u8));
            }
        }
        assert_eq!(try_unham_8_4(0x15 ^ 0x03), None);
        assert_eq!(unham_8_4(0x15 ^ 0x03), 0);
    }

    #[test]
    fn test_unham_24_18() {
        for data in [0, 1, 0x2A, 0x3_FFFF, 0x1_2345, 0x2_0F0F] {
            let code = ham_24_18(data);
            assert_eq!(unham_24_18(code), Some(data));
            for bit in 0..24 {
                assert_eq!(unham_24_18(code ^ (1 << bit)), Some(data), "bit {}", bit);
            }
            assert_eq!(unham_24_18(code ^ 0x11), None);
        }
    }
}
