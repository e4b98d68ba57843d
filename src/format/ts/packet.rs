use super::types::*;
use crate::error::{Result, TsError};
use std::fmt;

/// One 188-byte transport stream packet.
///
/// The packet is a plain byte array, every field is decoded on access.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TsPacket {
    /// Raw packet content.
    pub b: [u8; TS_PACKET_SIZE],
}

/// Null packet: PID 0x1FFF, payload filled with 0xFF.
pub const NULL_PACKET: TsPacket = {
    let mut b = [0xFFu8; TS_PACKET_SIZE];
    b[0] = SYNC_BYTE;
    b[1] = 0x1F;
    b[2] = 0xFF;
    b[3] = 0x10;
    TsPacket { b }
};

/// Empty packet: PID 0x1FFF, adaptation field only, no payload.
pub const EMPTY_PACKET: TsPacket = {
    let mut b = [0xFFu8; TS_PACKET_SIZE];
    b[0] = SYNC_BYTE;
    b[1] = 0x1F;
    b[2] = 0xFF;
    b[3] = 0x20;
    b[4] = 183;
    b[5] = 0x00;
    TsPacket { b }
};

impl TsPacket {
    /// Builds a packet from exactly 188 bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let b: [u8; TS_PACKET_SIZE] = data.try_into().map_err(|_| {
            TsError::InvalidData(format!("TS packet must be {} bytes, got {}", TS_PACKET_SIZE, data.len()))
        })?;
        Ok(Self { b })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.b
    }

    pub fn has_valid_sync(&self) -> bool {
        self.b[0] == SYNC_BYTE
    }

    pub fn pid(&self) -> Pid {
        u16::from_be_bytes([self.b[1], self.b[2]]) & 0x1FFF
    }

    pub fn set_pid(&mut self, pid: Pid) {
        self.b[1] = (self.b[1] & 0xE0) | ((pid >> 8) as u8 & 0x1F);
        self.b[2] = pid as u8;
    }

    pub fn pusi(&self) -> bool {
        (self.b[1] & 0x40) != 0
    }

    pub fn set_pusi(&mut self, pusi: bool) {
        if pusi {
            self.b[1] |= 0x40;
        } else {
            self.b[1] &= !0x40;
        }
    }

    /// Transport error indicator.
    pub fn tei(&self) -> bool {
        (self.b[1] & 0x80) != 0
    }

    pub fn priority(&self) -> bool {
        (self.b[1] & 0x20) != 0
    }

    pub fn scrambling(&self) -> u8 {
        self.b[3] >> 6
    }

    pub fn set_scrambling(&mut self, sc: u8) {
        self.b[3] = (self.b[3] & 0x3F) | (sc << 6);
    }

    pub fn is_clear(&self) -> bool {
        self.scrambling() == 0
    }

    pub fn is_scrambled(&self) -> bool {
        self.scrambling() != 0
    }

    pub fn cc(&self) -> u8 {
        self.b[3] & 0x0F
    }

    pub fn set_cc(&mut self, cc: u8) {
        self.b[3] = (self.b[3] & 0xF0) | (cc & 0x0F);
    }

    pub fn has_adaptation_field(&self) -> bool {
        (self.b[3] & 0x20) != 0
    }

    pub fn adaptation_field_size(&self) -> usize {
        if self.has_adaptation_field() {
            self.b[4] as usize
        } else {
            0
        }
    }

    /// Size of the TS header including the adaptation field, bounded by the packet size.
    pub fn header_size(&self) -> usize {
        let size = if self.has_adaptation_field() {
            TS_HEADER_SIZE + self.b[4] as usize + 1
        } else {
            TS_HEADER_SIZE
        };
        size.min(TS_PACKET_SIZE)
    }

    pub fn has_payload(&self) -> bool {
        (self.b[3] & 0x10) != 0
    }

    /// Payload bytes, empty when the packet has no payload.
    pub fn payload(&self) -> &[u8] {
        if self.has_payload() {
            &self.b[self.header_size()..]
        } else {
            &[]
        }
    }

    pub fn payload_size(&self) -> usize {
        self.payload().len()
    }

    pub fn discontinuity_indicator(&self) -> bool {
        self.adaptation_field_size() > 0 && (self.b[5] & 0x80) != 0
    }

    pub fn random_access_indicator(&self) -> bool {
        self.adaptation_field_size() > 0 && (self.b[5] & 0x40) != 0
    }

    /// Elementary stream priority indicator.
    pub fn espi(&self) -> bool {
        self.adaptation_field_size() > 0 && (self.b[5] & 0x20) != 0
    }

    pub fn has_pcr(&self) -> bool {
        self.adaptation_field_size() > 0 && (self.b[5] & 0x10) != 0
    }

    pub fn has_opcr(&self) -> bool {
        self.adaptation_field_size() > 0 && (self.b[5] & 0x08) != 0
    }

    fn pcr_offset(&self) -> Option<usize> {
        (self.has_pcr() && self.b[4] >= 7).then_some(6)
    }

    fn opcr_offset(&self) -> Option<usize> {
        if !self.has_opcr() {
            None
        } else if self.has_pcr() {
            (self.b[4] >= 13).then_some(12)
        } else {
            (self.b[4] >= 7).then_some(6)
        }
    }

    /// Program clock reference, 42 bits, when present.
    pub fn pcr(&self) -> Option<u64> {
        self.pcr_offset().map(|offset| get_pcr(&self.b[offset..]))
    }

    /// Original program clock reference, 42 bits, when present.
    pub fn opcr(&self) -> Option<u64> {
        self.opcr_offset().map(|offset| get_pcr(&self.b[offset..]))
    }

    /// Replaces the PCR. No effect if the packet has no PCR.
    pub fn set_pcr(&mut self, pcr: u64) {
        if let Some(offset) = self.pcr_offset() {
            put_pcr(&mut self.b[offset..], pcr);
        }
    }

    /// Replaces the OPCR. No effect if the packet has no OPCR.
    pub fn set_opcr(&mut self, opcr: u64) {
        if let Some(offset) = self.opcr_offset() {
            put_pcr(&mut self.b[offset..], opcr);
        }
    }

    /// Returns true if the packet contains the start of a clear PES packet.
    pub fn starts_pes(&self) -> bool {
        let pl = self.payload();
        self.has_valid_sync() && self.pusi() && self.is_clear() && pl.starts_with(&[0x00, 0x00, 0x01])
    }

    fn pts_offset(&self) -> Option<usize> {
        if !self.starts_pes() {
            return None;
        }
        let pl = self.payload();
        if pl.len() < 14 || !is_long_header_pes_stream_id(pl[3]) {
            return None;
        }
        let flags = pl[7] >> 6;
        if (flags & 0x02) == 0
            || (flags == 0x02 && (pl[9] & 0xF1) != 0x21)
            || (flags == 0x03 && (pl[9] & 0xF1) != 0x31)
            || (pl[11] & 0x01) != 0x01
            || (pl[13] & 0x01) != 0x01
        {
            return None;
        }
        Some(self.header_size() + 9)
    }

    fn dts_offset(&self) -> Option<usize> {
        if !self.starts_pes() {
            return None;
        }
        let pl = self.payload();
        if pl.len() < 19
            || (pl[7] & 0xC0) != 0xC0
            || (pl[9] & 0xF1) != 0x31
            || (pl[11] & 0x01) != 0x01
            || (pl[13] & 0x01) != 0x01
            || (pl[14] & 0xF1) != 0x11
            || (pl[16] & 0x01) != 0x01
            || (pl[18] & 0x01) != 0x01
        {
            return None;
        }
        Some(self.header_size() + 14)
    }

    /// PTS of the PES packet starting in this TS packet, if any.
    pub fn pts(&self) -> Option<u64> {
        self.pts_offset().map(|offset| get_pts_dts(&self.b[offset..]))
    }

    /// DTS of the PES packet starting in this TS packet, if any.
    pub fn dts(&self) -> Option<u64> {
        self.dts_offset().map(|offset| get_pts_dts(&self.b[offset..]))
    }
}

impl Default for TsPacket {
    fn default() -> Self {
        NULL_PACKET
    }
}

impl fmt::Debug for TsPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsPacket")
            .field("pid", &self.pid())
            .field("pusi", &self.pusi())
            .field("cc", &self.cc())
            .field("scrambling", &self.scrambling())
            .field("payload_size", &self.payload_size())
            .finish()
    }
}
