use super::types::*;
use crate::error::{Result, TsError};
use crate::utils::{crc32, CrcValidation};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Extended table id: table id plus table id extension for long sections.
///
/// Short sections always use a zero extension, so that a short and a long
/// section with the same table id never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtTableId {
    is_long: bool,
    tid: u8,
    tid_ext: u16,
}

impl ExtTableId {
    /// Key of a short section table.
    pub fn short(tid: u8) -> Self {
        Self {
            is_long: false,
            tid,
            tid_ext: 0,
        }
    }

    /// Key of a long section table.
    pub fn long(tid: u8, tid_ext: u16) -> Self {
        Self {
            is_long: true,
            tid,
            tid_ext,
        }
    }

    pub fn is_long_section(&self) -> bool {
        self.is_long
    }

    pub fn is_short_section(&self) -> bool {
        !self.is_long
    }

    pub fn tid(&self) -> u8 {
        self.tid
    }

    pub fn tid_ext(&self) -> u16 {
        self.tid_ext
    }
}

impl Default for ExtTableId {
    fn default() -> Self {
        Self::short(TID_NULL)
    }
}

/// Header fields of a long section, used to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongSectionHeader {
    pub table_id: u8,
    pub is_private: bool,
    pub table_id_extension: u16,
    pub version: u8,
    pub is_current: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}

/// A PSI/SI section, short or long.
///
/// A `Section` value is always structurally valid: construction from
/// binary content validates the size, the length field, the section
/// numbers and (on request) the CRC32. The content is shared between
/// clones; the setters make a private copy before modifying it.
#[derive(Clone)]
pub struct Section {
    data: Bytes,
    source_pid: Pid,
    first_packet: PacketCounter,
    last_packet: PacketCounter,
}

impl Section {
    /// Builds a section from its complete binary content.
    ///
    /// # Arguments
    ///
    /// * `content` - Full section, from table id to CRC32 for long sections
    /// * `pid` - The PID from which the section was collected
    /// * `validation` - How to handle the CRC32 of a long section
    pub fn from_bytes(content: impl Into<Bytes>, pid: Pid, validation: CrcValidation) -> Result<Self> {
        let data: Bytes = content.into();
        let size = data.len();
        if !(MIN_SHORT_SECTION_SIZE..=MAX_PRIVATE_SECTION_SIZE).contains(&size) {
            return Err(TsError::InvalidSection(format!("invalid section size {}", size)));
        }
        let length = (u16::from_be_bytes([data[1], data[2]]) & 0x0FFF) as usize;
        if length != size - SHORT_SECTION_HEADER_SIZE {
            return Err(TsError::InvalidSection(format!(
                "section length field {} does not match size {}",
                length, size
            )));
        }
        let mut section = Self {
            data,
            source_pid: pid,
            first_packet: 0,
            last_packet: 0,
        };
        if section.is_long_section() {
            if size < MIN_LONG_SECTION_SIZE {
                return Err(TsError::InvalidSection(format!("long section too short: {} bytes", size)));
            }
            if section.section_number() > section.last_section_number() {
                return Err(TsError::InvalidSection(format!(
                    "section number {} greater than last section number {}",
                    section.section_number(),
                    section.last_section_number()
                )));
            }
            match validation {
                CrcValidation::Check => {
                    let computed = section.compute_crc32();
                    let stored = section.stored_crc32();
                    if computed != stored {
                        return Err(TsError::InvalidSection(format!(
                            "wrong CRC32 {:08X}, expected {:08X}",
                            stored, computed
                        )));
                    }
                }
                CrcValidation::Compute => section.recompute_crc32(),
                CrcValidation::Ignore => {}
            }
        }
        Ok(section)
    }

    /// Builds a short section.
    pub fn short(tid: u8, is_private: bool, payload: &[u8]) -> Result<Self> {
        if SHORT_SECTION_HEADER_SIZE + payload.len() > MAX_PRIVATE_SECTION_SIZE {
            return Err(TsError::InvalidSection(format!(
                "short section payload too large: {} bytes",
                payload.len()
            )));
        }
        let mut buf = BytesMut::with_capacity(SHORT_SECTION_HEADER_SIZE + payload.len());
        buf.put_u8(tid);
        let private_bit: u16 = if is_private { 0x4000 } else { 0 };
        buf.put_u16(private_bit | 0x3000 | (payload.len() as u16 & 0x0FFF));
        buf.put_slice(payload);
        Ok(Self {
            data: buf.freeze(),
            source_pid: PID_NULL,
            first_packet: 0,
            last_packet: 0,
        })
    }

    /// Builds a long section. The CRC32 is computed.
    pub fn long(header: LongSectionHeader, payload: &[u8]) -> Result<Self> {
        if header.section_number > header.last_section_number {
            return Err(TsError::InvalidSection(format!(
                "section number {} greater than last section number {}",
                header.section_number, header.last_section_number
            )));
        }
        if header.version > 31 {
            return Err(TsError::InvalidSection(format!("invalid version {}", header.version)));
        }
        let size = LONG_SECTION_HEADER_SIZE + payload.len() + SECTION_CRC32_SIZE;
        if size > MAX_PRIVATE_SECTION_SIZE {
            return Err(TsError::InvalidSection(format!(
                "long section payload too large: {} bytes",
                payload.len()
            )));
        }
        let mut buf = BytesMut::with_capacity(size);
        buf.put_u8(header.table_id);
        let private_bit: u16 = if header.is_private { 0x4000 } else { 0 };
        buf.put_u16(0x8000 | private_bit | 0x3000 | ((size - SHORT_SECTION_HEADER_SIZE) as u16 & 0x0FFF));
        buf.put_u16(header.table_id_extension);
        buf.put_u8(0xC0 | ((header.version & 0x1F) << 1) | u8::from(header.is_current));
        buf.put_u8(header.section_number);
        buf.put_u8(header.last_section_number);
        buf.put_slice(payload);
        let crc = crc32(&buf);
        buf.put_u32(crc);
        Ok(Self {
            data: buf.freeze(),
            source_pid: PID_NULL,
            first_packet: 0,
            last_packet: 0,
        })
    }

    pub fn table_id(&self) -> u8 {
        self.data[0]
    }

    pub fn is_long_section(&self) -> bool {
        (self.data[1] & 0x80) != 0
    }

    pub fn is_short_section(&self) -> bool {
        !self.is_long_section()
    }

    pub fn is_private_section(&self) -> bool {
        (self.data[1] & 0x40) != 0
    }

    /// Table id extension, zero for short sections.
    pub fn table_id_extension(&self) -> u16 {
        if self.is_long_section() {
            u16::from_be_bytes([self.data[3], self.data[4]])
        } else {
            0
        }
    }

    pub fn version(&self) -> u8 {
        if self.is_long_section() {
            (self.data[5] >> 1) & 0x1F
        } else {
            0
        }
    }

    /// True for short sections and for long sections with the current indicator.
    pub fn is_current(&self) -> bool {
        self.is_short_section() || (self.data[5] & 0x01) != 0
    }

    pub fn is_next(&self) -> bool {
        !self.is_current()
    }

    pub fn section_number(&self) -> u8 {
        if self.is_long_section() {
            self.data[6]
        } else {
            0
        }
    }

    pub fn last_section_number(&self) -> u8 {
        if self.is_long_section() {
            self.data[7]
        } else {
            0
        }
    }

    pub fn etid(&self) -> ExtTableId {
        if self.is_long_section() {
            ExtTableId::long(self.table_id(), self.table_id_extension())
        } else {
            ExtTableId::short(self.table_id())
        }
    }

    pub fn source_pid(&self) -> Pid {
        self.source_pid
    }

    pub fn set_source_pid(&mut self, pid: Pid) {
        self.source_pid = pid;
    }

    /// Index in the demultiplexed stream of the first TS packet of the section.
    pub fn first_ts_packet_index(&self) -> PacketCounter {
        self.first_packet
    }

    /// Index in the demultiplexed stream of the last TS packet of the section.
    pub fn last_ts_packet_index(&self) -> PacketCounter {
        self.last_packet
    }

    pub fn set_first_ts_packet_index(&mut self, index: PacketCounter) {
        self.first_packet = index;
    }

    pub fn set_last_ts_packet_index(&mut self, index: PacketCounter) {
        self.last_packet = index;
    }

    /// Full binary content.
    pub fn content(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn header_size(&self) -> usize {
        if self.is_long_section() {
            LONG_SECTION_HEADER_SIZE
        } else {
            SHORT_SECTION_HEADER_SIZE
        }
    }

    /// Section payload, without header and CRC32.
    pub fn payload(&self) -> &[u8] {
        if self.is_long_section() {
            &self.data[LONG_SECTION_HEADER_SIZE..self.data.len() - SECTION_CRC32_SIZE]
        } else {
            &self.data[SHORT_SECTION_HEADER_SIZE..]
        }
    }

    pub fn payload_size(&self) -> usize {
        self.payload().len()
    }

    /// Minimum number of TS packets needed to carry this section.
    pub fn packet_count(&self) -> u64 {
        section_packet_count(self.size())
    }

    fn compute_crc32(&self) -> u32 {
        crc32(&self.data[..self.data.len() - SECTION_CRC32_SIZE])
    }

    fn stored_crc32(&self) -> u32 {
        let at = self.data.len() - SECTION_CRC32_SIZE;
        u32::from_be_bytes([self.data[at], self.data[at + 1], self.data[at + 2], self.data[at + 3]])
    }

    /// True if the section is short or if its CRC32 matches its content.
    pub fn has_valid_crc32(&self) -> bool {
        self.is_short_section() || self.compute_crc32() == self.stored_crc32()
    }

    /// Recomputes and replaces the CRC32 of a long section.
    pub fn recompute_crc32(&mut self) {
        if self.is_long_section() {
            let crc = self.compute_crc32();
            self.modify(|data| {
                let at = data.len() - SECTION_CRC32_SIZE;
                data[at..].copy_from_slice(&crc.to_be_bytes());
            });
        }
    }

    // Copy on write: other clones keep the previous content.
    fn modify<F: FnOnce(&mut BytesMut)>(&mut self, f: F) {
        let mut data = BytesMut::from(&self.data[..]);
        f(&mut data);
        self.data = data.freeze();
    }

    fn modify_long_header<F: FnOnce(&mut BytesMut)>(&mut self, recompute_crc: bool, f: F) {
        if self.is_long_section() {
            self.modify(f);
            if recompute_crc {
                self.recompute_crc32();
            }
        }
    }

    pub fn set_table_id_extension(&mut self, tid_ext: u16, recompute_crc: bool) {
        self.modify_long_header(recompute_crc, |data| {
            data[3..5].copy_from_slice(&tid_ext.to_be_bytes())
        });
    }

    pub fn set_version(&mut self, version: u8, recompute_crc: bool) {
        self.modify_long_header(recompute_crc, |data| {
            data[5] = (data[5] & 0xC1) | ((version & 0x1F) << 1)
        });
    }

    pub fn set_is_current(&mut self, is_current: bool, recompute_crc: bool) {
        self.modify_long_header(recompute_crc, |data| {
            data[5] = (data[5] & 0xFE) | u8::from(is_current)
        });
    }

    pub fn set_section_number(&mut self, num: u8, recompute_crc: bool) {
        self.modify_long_header(recompute_crc, |data| data[6] = num);
    }

    pub fn set_last_section_number(&mut self, num: u8, recompute_crc: bool) {
        self.modify_long_header(recompute_crc, |data| data[7] = num);
    }
}

/// Sections compare by binary content only.
impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Section {}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("table_id", &self.table_id())
            .field("etid", &self.etid())
            .field("version", &self.version())
            .field("section_number", &self.section_number())
            .field("last_section_number", &self.last_section_number())
            .field("size", &self.size())
            .field("source_pid", &self.source_pid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(section_number: u8, last_section_number: u8) -> LongSectionHeader {
        LongSectionHeader {
            table_id: TID_PAT,
            is_private: false,
            table_id_extension: 0x0001,
            version: 5,
            is_current: true,
            section_number,
            last_section_number,
        }
    }

    #[test]
    fn test_long_section_layout() {
        let section = Section::long(header(0, 0), &[0x00, 0x01, 0xE1, 0x00]).unwrap();
        assert_eq!(section.size(), 16);
        assert_eq!(
            &section.content()[..12],
            &[0x00, 0xB0, 0x0D, 0x00, 0x01, 0xCB, 0x00, 0x00, 0x00, 0x01, 0xE1, 0x00]
        );
        assert!(section.is_long_section());
        assert_eq!(section.version(), 5);
        assert_eq!(section.etid(), ExtTableId::long(TID_PAT, 1));
        assert_eq!(section.payload(), &[0x00, 0x01, 0xE1, 0x00]);
        assert!(section.has_valid_crc32());

        let reloaded = Section::from_bytes(section.content().clone(), 0, CrcValidation::Check).unwrap();
        assert_eq!(reloaded, section);
        assert_eq!(reloaded.source_pid(), 0);
    }

    #[test]
    fn test_short_section() {
        let section = Section::short(TID_TDT, false, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(&section.content()[..3], &[0x70, 0x30, 0x05]);
        assert!(section.is_short_section());
        assert_eq!(section.etid(), ExtTableId::short(TID_TDT));
        assert_eq!(section.table_id_extension(), 0);
        assert!(section.is_current());
        assert_eq!(section.payload(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_content() {
        assert!(Section::from_bytes(vec![0x00, 0xB0], 0, CrcValidation::Ignore).is_err());
        // Length field disagrees with size.
        assert!(Section::from_bytes(vec![0x70, 0x30, 0x05, 0x00], 0, CrcValidation::Ignore).is_err());
        assert!(Section::long(header(2, 1), &[]).is_err());
        let mut bad = header(0, 0);
        bad.version = 32;
        assert!(Section::long(bad, &[]).is_err());
    }

    #[test]
    fn test_crc_validation_modes() {
        let section = Section::long(header(0, 0), &[9, 9]).unwrap();
        let mut corrupted = section.content().to_vec();
        corrupted[8] = 7;
        assert!(Section::from_bytes(corrupted.clone(), 0, CrcValidation::Check).is_err());
        let ignored = Section::from_bytes(corrupted.clone(), 0, CrcValidation::Ignore).unwrap();
        assert!(!ignored.has_valid_crc32());
        let computed = Section::from_bytes(corrupted, 0, CrcValidation::Compute).unwrap();
        assert!(computed.has_valid_crc32());
    }

    #[test]
    fn test_copy_on_write_setters() {
        let original = Section::long(header(0, 0), &[1, 2, 3]).unwrap();
        let mut copy = original.clone();
        copy.set_version(9, false);
        assert_eq!(copy.version(), 9);
        assert!(!copy.has_valid_crc32());
        assert_eq!(original.version(), 5);
        assert!(original.has_valid_crc32());

        copy.recompute_crc32();
        assert!(copy.has_valid_crc32());

        copy.set_table_id_extension(0x1234, true);
        copy.set_is_current(false, true);
        copy.set_last_section_number(3, true);
        copy.set_section_number(2, true);
        assert_eq!(copy.table_id_extension(), 0x1234);
        assert!(copy.is_next());
        assert_eq!(copy.section_number(), 2);
        assert_eq!(copy.last_section_number(), 3);
        assert!(copy.has_valid_crc32());
        assert_ne!(copy, original);
    }

    #[quickcheck_macros::quickcheck]
    fn prop_crc_round_trip(tid_ext: u16, version: u8, payload: Vec<u8>) -> bool {
        let mut hdr = header(0, 0);
        hdr.table_id_extension = tid_ext;
        hdr.version = version % 32;
        let payload = &payload[..payload.len().min(MAX_PSI_LONG_SECTION_PAYLOAD_SIZE)];
        let mut section = Section::long(hdr, payload).unwrap();
        section.set_version((hdr.version + 1) % 32, false);
        section.recompute_crc32();
        Section::from_bytes(section.content().clone(), 0, CrcValidation::Check)
            .map_or(false, |reloaded| reloaded == section && reloaded.payload() == payload)
    }
}
