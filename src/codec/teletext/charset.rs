//! Teletext character sets (ETS 300 706, chapter 15).
//!
//! Only the Latin G0 and G2 sets are supported. The G0 set is adjusted by
//! one of the Latin national option subsets, selected from the page header,
//! packet X/28 or packet M/29.

use log::warn;

// G0 Latin, 0x20 to 0x7F, with the English national subset.
const G0_LATIN: [u16; 96] = [
    0x0020, 0x0021, 0x0022, 0x00A3, 0x0024, 0x0025, 0x0026, 0x0027, 0x0028, 0x0029, 0x002A, 0x002B,
    0x002C, 0x002D, 0x002E, 0x002F, 0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037,
    0x0038, 0x0039, 0x003A, 0x003B, 0x003C, 0x003D, 0x003E, 0x003F, 0x0040, 0x0041, 0x0042, 0x0043,
    0x0044, 0x0045, 0x0046, 0x0047, 0x0048, 0x0049, 0x004A, 0x004B, 0x004C, 0x004D, 0x004E, 0x004F,
    0x0050, 0x0051, 0x0052, 0x0053, 0x0054, 0x0055, 0x0056, 0x0057, 0x0058, 0x0059, 0x005A, 0x00AB,
    0x00BD, 0x00BB, 0x005E, 0x0023, 0x002D, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067,
    0x0068, 0x0069, 0x006A, 0x006B, 0x006C, 0x006D, 0x006E, 0x006F, 0x0070, 0x0071, 0x0072, 0x0073,
    0x0074, 0x0075, 0x0076, 0x0077, 0x0078, 0x0079, 0x007A, 0x00BC, 0x00A6, 0x00BE, 0x00F7, 0x007F,
];

// Positions in G0_LATIN replaced by a national subset.
const NATIONAL_POSITIONS: [usize; 13] = [
    0x03, 0x04, 0x20, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F, 0x40, 0x5B, 0x5C, 0x5D, 0x5E,
];

// Latin national option subsets (ETS 300 706, table 36).
const NATIONAL_SUBSETS: [[u16; 13]; 13] = [
    // English
    [0x00A3, 0x0024, 0x0040, 0x00AB, 0x00BD, 0x00BB, 0x005E, 0x0023, 0x002D, 0x00BC, 0x00A6, 0x00BE, 0x00F7],
    // French
    [0x00E9, 0x00EF, 0x00E0, 0x00EB, 0x00EA, 0x00F9, 0x00EE, 0x0023, 0x00E8, 0x00E2, 0x00F4, 0x00FB, 0x00E7],
    // Swedish, Finnish, Hungarian
    [0x0023, 0x00A4, 0x00C9, 0x00C4, 0x00D6, 0x00C5, 0x00DC, 0x005F, 0x00E9, 0x00E4, 0x00F6, 0x00E5, 0x00FC],
    // Czech, Slovak
    [0x0023, 0x016F, 0x010D, 0x0165, 0x017E, 0x00FD, 0x00ED, 0x0159, 0x00E9, 0x00E1, 0x011B, 0x00FA, 0x0161],
    // German
    [0x0023, 0x0024, 0x00A7, 0x00C4, 0x00D6, 0x00DC, 0x005E, 0x005F, 0x00B0, 0x00E4, 0x00F6, 0x00FC, 0x00DF],
    // Portuguese, Spanish
    [0x00E7, 0x0024, 0x00A1, 0x00E1, 0x00E9, 0x00ED, 0x00F3, 0x00FA, 0x00BF, 0x00FC, 0x00F1, 0x00E8, 0x00E0],
    // Italian
    [0x00A3, 0x0024, 0x00E9, 0x00B0, 0x00E7, 0x00BB, 0x005E, 0x0023, 0x00F9, 0x00E0, 0x00F2, 0x00E8, 0x00EC],
    // Rumanian
    [0x0023, 0x00A4, 0x0162, 0x00C2, 0x015E, 0x0102, 0x00CE, 0x0131, 0x0163, 0x00E2, 0x015F, 0x0103, 0x00EE],
    // Polish
    [0x0023, 0x0144, 0x0105, 0x017B, 0x015A, 0x0141, 0x0107, 0x00F3, 0x0119, 0x017C, 0x015B, 0x0142, 0x017A],
    // Turkish
    [0x0054, 0x011F, 0x0130, 0x015E, 0x00D6, 0x00C7, 0x00DC, 0x011E, 0x0131, 0x015F, 0x00F6, 0x00E7, 0x00FC],
    // Serbian, Croatian, Slovenian
    [0x0023, 0x00CB, 0x010C, 0x0106, 0x017D, 0x0110, 0x0160, 0x00EB, 0x010D, 0x0107, 0x017E, 0x0111, 0x0161],
    // Estonian
    [0x0023, 0x00F5, 0x0160, 0x00C4, 0x00D6, 0x017E, 0x00DC, 0x00D5, 0x0161, 0x00E4, 0x00F6, 0x017E, 0x00FC],
    // Lettish, Lithuanian
    [0x0023, 0x0024, 0x0160, 0x0117, 0x0119, 0x017D, 0x010D, 0x016B, 0x0161, 0x0105, 0x0173, 0x017E, 0x012F],
];

const NONE: u8 = 0xFF;

// National subset of each 7-bit charset designation (ETS 300 706, table 32).
const NATIONAL_SUBSETS_MAP: [u8; 56] = [
    0x00, 0x04, 0x02, 0x06, 0x01, 0x05, 0x03, NONE, //
    0x08, 0x04, 0x02, 0x06, 0x01, NONE, 0x03, NONE, //
    0x00, 0x04, 0x02, 0x06, 0x01, 0x05, 0x09, NONE, //
    NONE, NONE, NONE, NONE, NONE, 0x0A, NONE, 0x07, //
    NONE, 0x04, 0x0B, 0x0C, NONE, NONE, 0x03, NONE, //
    NONE, NONE, NONE, NONE, NONE, NONE, 0x09, NONE, //
    NONE, NONE, NONE, NONE, NONE, NONE, NONE, NONE, //
];

// G2 Latin supplementary set, 0x20 to 0x7F.
const G2_LATIN: [u16; 96] = [
    0x0020, 0x00A1, 0x00A2, 0x00A3, 0x0024, 0x00A5, 0x0023, 0x00A7, 0x00A4, 0x2018, 0x201C, 0x00AB,
    0x2190, 0x2191, 0x2192, 0x2193, 0x00B0, 0x00B1, 0x00B2, 0x00B3, 0x00D7, 0x00B5, 0x00B6, 0x00B7,
    0x00F7, 0x2019, 0x201D, 0x00BB, 0x00BC, 0x00BD, 0x00BE, 0x00BF, 0x0020, 0x0300, 0x0301, 0x0302,
    0x0303, 0x0304, 0x0306, 0x0307, 0x0308, 0x0000, 0x030A, 0x0327, 0x005F, 0x030B, 0x0328, 0x030C,
    0x2015, 0x00B9, 0x00AE, 0x00A9, 0x2122, 0x266A, 0x20AC, 0x2030, 0x03B1, 0x0000, 0x0000, 0x0000,
    0x215B, 0x215C, 0x215D, 0x215E, 0x03A9, 0x00C6, 0x0110, 0x00AA, 0x0126, 0x0000, 0x0132, 0x013F,
    0x0141, 0x00D8, 0x0152, 0x00BA, 0x00DE, 0x0166, 0x014A, 0x0149, 0x0138, 0x00E6, 0x0111, 0x00F0,
    0x0127, 0x0131, 0x0133, 0x0140, 0x0142, 0x00F8, 0x0153, 0x00DF, 0x00FE, 0x0167, 0x014B, 0x0020,
];

// Letters with a diacritical mark. One row per mark, in the order of the
// X/26 modes 0x11 to 0x1F. Columns are 'A' to 'Z' then 'a' to 'z', zero
// when the composition does not exist.
static G2_ACCENTS: [[u16; 52]; 15] = build_accents();

// (mark, letter, composed character)
const ACCENTED_LETTERS: &[(usize, u8, u16)] = &[
    // grave
    (0, b'A', 0xC0), (0, b'E', 0xC8), (0, b'I', 0xCC), (0, b'O', 0xD2), (0, b'U', 0xD9),
    (0, b'a', 0xE0), (0, b'e', 0xE8), (0, b'i', 0xEC), (0, b'o', 0xF2), (0, b'u', 0xF9),
    // acute
    (1, b'A', 0xC1), (1, b'C', 0x106), (1, b'E', 0xC9), (1, b'I', 0xCD), (1, b'L', 0x139),
    (1, b'N', 0x143), (1, b'O', 0xD3), (1, b'R', 0x154), (1, b'S', 0x15A), (1, b'U', 0xDA),
    (1, b'Y', 0xDD), (1, b'Z', 0x179),
    (1, b'a', 0xE1), (1, b'c', 0x107), (1, b'e', 0xE9), (1, b'g', 0x123), (1, b'i', 0xED),
    (1, b'l', 0x13A), (1, b'n', 0x144), (1, b'o', 0xF3), (1, b'r', 0x155), (1, b's', 0x15B),
    (1, b'u', 0xFA), (1, b'y', 0xFD), (1, b'z', 0x17A),
    // circumflex
    (2, b'A', 0xC2), (2, b'C', 0x108), (2, b'E', 0xCA), (2, b'G', 0x11C), (2, b'H', 0x124),
    (2, b'I', 0xCE), (2, b'J', 0x134), (2, b'O', 0xD4), (2, b'S', 0x15C), (2, b'U', 0xDB),
    (2, b'W', 0x174), (2, b'Y', 0x176),
    (2, b'a', 0xE2), (2, b'c', 0x109), (2, b'e', 0xEA), (2, b'g', 0x11D), (2, b'h', 0x125),
    (2, b'i', 0xEE), (2, b'j', 0x135), (2, b'o', 0xF4), (2, b's', 0x15D), (2, b'u', 0xFB),
    (2, b'w', 0x175), (2, b'y', 0x177),
    // tilde
    (3, b'A', 0xC3), (3, b'I', 0x128), (3, b'N', 0xD1), (3, b'O', 0xD5), (3, b'U', 0x168),
    (3, b'a', 0xE3), (3, b'i', 0x129), (3, b'n', 0xF1), (3, b'o', 0xF5), (3, b'u', 0x169),
    // macron
    (4, b'A', 0x100), (4, b'E', 0x112), (4, b'I', 0x12A), (4, b'O', 0x14C), (4, b'U', 0x16A),
    (4, b'a', 0x101), (4, b'e', 0x113), (4, b'i', 0x12B), (4, b'o', 0x14D), (4, b'u', 0x16B),
    // breve
    (5, b'A', 0x102), (5, b'G', 0x11E), (5, b'U', 0x16C),
    (5, b'a', 0x103), (5, b'g', 0x11F), (5, b'u', 0x16D),
    // dot
    (6, b'C', 0x10A), (6, b'E', 0x116), (6, b'G', 0x120), (6, b'I', 0x130), (6, b'Z', 0x17B),
    (6, b'c', 0x10B), (6, b'e', 0x117), (6, b'g', 0x121), (6, b'z', 0x17C),
    // umlaut
    (7, b'A', 0xC4), (7, b'E', 0xCB), (7, b'I', 0xCF), (7, b'O', 0xD6), (7, b'U', 0xDC),
    (7, b'Y', 0x178),
    (7, b'a', 0xE4), (7, b'e', 0xEB), (7, b'i', 0xEF), (7, b'o', 0xF6), (7, b'u', 0xFC),
    (7, b'y', 0xFF),
    // ring
    (9, b'A', 0xC5), (9, b'U', 0x16E), (9, b'a', 0xE5), (9, b'u', 0x16F),
    // cedilla
    (10, b'C', 0xC7), (10, b'G', 0x122), (10, b'K', 0x136), (10, b'L', 0x13B), (10, b'N', 0x145),
    (10, b'R', 0x156), (10, b'S', 0x15E), (10, b'T', 0x162),
    (10, b'c', 0xE7), (10, b'k', 0x137), (10, b'l', 0x13C), (10, b'n', 0x146), (10, b'r', 0x157),
    (10, b's', 0x15F), (10, b't', 0x163),
    // double acute
    (12, b'O', 0x150), (12, b'U', 0x170), (12, b'o', 0x151), (12, b'u', 0x171),
    // ogonek
    (13, b'A', 0x104), (13, b'E', 0x118), (13, b'I', 0x12E), (13, b'U', 0x172),
    (13, b'a', 0x105), (13, b'e', 0x119), (13, b'i', 0x12F), (13, b'u', 0x173),
    // caron
    (14, b'C', 0x10C), (14, b'D', 0x10E), (14, b'E', 0x11A), (14, b'L', 0x13D), (14, b'N', 0x147),
    (14, b'R', 0x158), (14, b'S', 0x160), (14, b'T', 0x164), (14, b'Z', 0x17D),
    (14, b'c', 0x10D), (14, b'd', 0x10F), (14, b'e', 0x11B), (14, b'l', 0x13E), (14, b'n', 0x148),
    (14, b'r', 0x159), (14, b's', 0x161), (14, b't', 0x165), (14, b'z', 0x17E),
];

const fn letter_index(letter: u8) -> Option<usize> {
    match letter {
        b'A'..=b'Z' => Some((letter - b'A') as usize),
        b'a'..=b'z' => Some((letter - b'a') as usize + 26),
        _ => None,
    }
}

const fn build_accents() -> [[u16; 52]; 15] {
    let mut table = [[0u16; 52]; 15];
    let mut i = 0;
    while i < ACCENTED_LETTERS.len() {
        let (mark, letter, c) = ACCENTED_LETTERS[i];
        if let Some(col) = letter_index(letter) {
            table[mark][col] = c;
        }
        i += 1;
    }
    table
}

/// Teletext character set of one page.
///
/// Characters are returned as UCS-2 values. Values below 0x20 are control
/// codes and are returned unchanged.
#[derive(Debug, Clone)]
pub struct TeletextCharset {
    g0: [u16; 96],
    current: u8,
    x28: Option<u8>,
    m29: Option<u8>,
    warned: u128,
}

impl Default for TeletextCharset {
    fn default() -> Self {
        Self::new()
    }
}

impl TeletextCharset {
    pub fn new() -> Self {
        Self {
            g0: G0_LATIN,
            current: 0,
            x28: None,
            m29: None,
            warned: 0,
        }
    }

    /// Designation of the national subset in use.
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Converts a G0 character code with its parity bit.
    ///
    /// A parity error gives a space.
    pub fn to_char(&self, c: u8) -> u16 {
        if c.count_ones() % 2 == 0 {
            return 0x20;
        }
        self.g0_char(c & 0x7F)
    }

    /// Converts a 7-bit G0 character code, without parity.
    pub fn g0_char(&self, c: u8) -> u16 {
        let c = c & 0x7F;
        if c >= 0x20 {
            self.g0[usize::from(c - 0x20)]
        } else {
            u16::from(c)
        }
    }

    /// Converts a 7-bit G2 character code.
    pub fn g2_char(&self, c: u8) -> u16 {
        match c & 0x7F {
            c @ 0x20.. => G2_LATIN[usize::from(c - 0x20)],
            c => u16::from(c),
        }
    }

    /// Composes a G0 letter with the diacritical mark of index `accent`.
    ///
    /// Characters without such a composition are converted as plain G0.
    pub fn g2_accent_char(&self, c: u8, accent: u8) -> u16 {
        let composed = letter_index(c)
            .zip(G2_ACCENTS.get(usize::from(accent)))
            .map_or(0, |(col, row)| row[col]);
        if composed != 0 {
            composed
        } else {
            self.g0_char(c)
        }
    }

    /// Applies a charset designation from packet X/28.
    pub fn set_x28(&mut self, designation: u8) {
        self.x28 = Some(designation);
        self.remap(designation);
    }

    /// Applies a charset designation from packet M/29, unless X/28 has set one.
    pub fn set_m29(&mut self, designation: u8) {
        self.m29 = Some(designation);
        if self.x28.is_none() {
            self.remap(designation);
        }
    }

    /// Forgets the X/28 designation, falling back to M/29 or `fallback`.
    pub fn reset_x28(&mut self, fallback: u8) {
        self.x28 = None;
        self.remap(self.m29.unwrap_or(fallback));
    }

    fn remap(&mut self, designation: u8) {
        if designation == self.current {
            return;
        }
        match NATIONAL_SUBSETS_MAP.get(usize::from(designation)) {
            Some(&subset) if subset != NONE => {
                let chars = &NATIONAL_SUBSETS[usize::from(subset)];
                for (&pos, &c) in NATIONAL_POSITIONS.iter().zip(chars.iter()) {
                    self.g0[pos] = c;
                }
                self.current = designation;
            }
            _ => {
                let bit = 1u128 << (designation & 0x7F);
                if self.warned & bit == 0 {
                    self.warned |= bit;
                    warn!(
                        "teletext charset {}.{} is not supported",
                        designation >> 3,
                        designation & 0x07
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Adds an odd parity bit.
    fn parity(c: u8) -> u8 {
        if c.count_ones() % 2 == 0 {
            c | 0x80
        } else {
            c
        }
    }

    #[test]
    fn test_parity() {
        let charset = TeletextCharset::new();
        assert_eq!(charset.to_char(parity(b'A')), u16::from(b'A'));
        assert_eq!(charset.to_char(parity(b'A') ^ 0x80), 0x20);
        assert_eq!(charset.to_char(parity(0x0B)), 0x0B);
    }

    #[test]
    fn test_national_subsets() {
        let mut charset = TeletextCharset::new();
        assert_eq!(charset.g0_char(0x23), 0xA3);

        // Header bits designate French.
        charset.reset_x28(4);
        assert_eq!(charset.current(), 4);
        assert_eq!(charset.g0_char(0x40), 0xE0);
        assert_eq!(charset.g0_char(0x23), 0xE9);

        // M/29 is overridden by X/28.
        charset.set_x28(1);
        charset.set_m29(0);
        assert_eq!(charset.g0_char(0x7E), 0xDF);

        // Without X/28, M/29 wins over the header.
        charset.reset_x28(4);
        assert_eq!(charset.current(), 0);
        assert_eq!(charset.g0_char(0x23), 0xA3);

        // Unsupported designations are ignored.
        charset.set_x28(0x40);
        assert_eq!(charset.current(), 0);
    }

    #[test]
    fn test_g2() {
        let charset = TeletextCharset::new();
        assert_eq!(charset.g2_char(0x56), 0x20AC);
        assert_eq!(charset.g2_accent_char(b'e', 1), 0xE9);
        assert_eq!(charset.g2_accent_char(b'Z', 14), 0x17D);
        assert_eq!(charset.g2_accent_char(b'b', 1), u16::from(b'b'));
        assert_eq!(charset.g2_accent_char(b'1', 0), u16::from(b'1'));
    }
}
