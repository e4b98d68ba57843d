use super::types::*;
use crate::error::{Result, TsError};
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Size of the fixed part of every PES header.
pub const PES_SHORT_HEADER_SIZE: usize = 6;

/// Size of the fixed part of the extended PES header.
pub const PES_LONG_HEADER_SIZE: usize = 9;

/// A complete Packetized Elementary Stream packet.
///
/// A `PesPacket` value always starts with the `00 00 01` prefix and holds
/// its complete header. The binary content is shared between clones.
#[derive(Clone)]
pub struct PesPacket {
    data: Bytes,
    header_size: usize,
    source_pid: Pid,
    first_packet: PacketCounter,
    last_packet: PacketCounter,
}

impl PesPacket {
    /// Builds a PES packet from its binary content.
    ///
    /// # Arguments
    ///
    /// * `content` - The PES packet, starting with the start code prefix
    /// * `pid` - The PID from which the packet was collected
    pub fn from_bytes(content: impl Into<Bytes>, pid: Pid) -> Result<Self> {
        let data: Bytes = content.into();
        if data.len() < PES_SHORT_HEADER_SIZE {
            return Err(TsError::InvalidData(format!("PES packet too short: {} bytes", data.len())));
        }
        if !data.starts_with(&[0x00, 0x00, 0x01]) {
            return Err(TsError::InvalidData("missing PES start code prefix".into()));
        }
        let header_size = if is_long_header_pes_stream_id(data[3]) {
            if data.len() < PES_LONG_HEADER_SIZE {
                return Err(TsError::InvalidData(format!(
                    "PES packet too short for extended header: {} bytes",
                    data.len()
                )));
            }
            let size = PES_LONG_HEADER_SIZE + data[8] as usize;
            if data.len() < size {
                return Err(TsError::InvalidData(format!(
                    "PES header of {} bytes exceeds packet size {}",
                    size,
                    data.len()
                )));
            }
            size
        } else {
            PES_SHORT_HEADER_SIZE
        };
        Ok(Self {
            data,
            header_size,
            source_pid: pid,
            first_packet: 0,
            last_packet: 0,
        })
    }

    pub fn source_pid(&self) -> Pid {
        self.source_pid
    }

    pub fn set_source_pid(&mut self, pid: Pid) {
        self.source_pid = pid;
    }

    pub fn first_ts_packet_index(&self) -> PacketCounter {
        self.first_packet
    }

    pub fn last_ts_packet_index(&self) -> PacketCounter {
        self.last_packet
    }

    pub fn set_first_ts_packet_index(&mut self, index: PacketCounter) {
        self.first_packet = index;
    }

    pub fn set_last_ts_packet_index(&mut self, index: PacketCounter) {
        self.last_packet = index;
    }

    pub fn stream_id(&self) -> u8 {
        self.data[3]
    }

    pub fn set_stream_id(&mut self, sid: u8) {
        self.modify(|data| data[3] = sid);
    }

    /// True if the stream id implies the extended header with optional PTS/DTS.
    pub fn has_long_header(&self) -> bool {
        is_long_header_pes_stream_id(self.stream_id())
    }

    /// Full binary content.
    pub fn content(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn header(&self) -> &[u8] {
        &self.data[..self.header_size]
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.header_size..]
    }

    pub fn payload_size(&self) -> usize {
        self.data.len() - self.header_size
    }

    /// True if the payload starts like MPEG-1/2 video.
    pub fn is_mpeg2_video(&self) -> bool {
        is_video_pes_stream_id(self.stream_id()) && self.payload().starts_with(&[0x00, 0x00, 0x01])
    }

    /// True if the payload starts with an AVC access unit delimiter prefix.
    pub fn is_avc(&self) -> bool {
        if !is_video_pes_stream_id(self.stream_id()) {
            return false;
        }
        let pl = self.payload();
        let zeros = pl.iter().take_while(|&&b| b == 0x00).count();
        zeros > 2 && pl.get(zeros) == Some(&0x01)
    }

    /// True if the payload starts with an AC-3 or Enhanced-AC-3 sync word.
    pub fn is_ac3(&self) -> bool {
        self.payload().len() > 2 && self.payload().starts_with(&[0x0B, 0x77])
    }

    pub fn has_pts(&self) -> bool {
        self.has_long_header()
            && self.header_size >= 14
            && (self.data[7] & 0x80) != 0
            && (self.data[9] & 0x01) != 0
            && (self.data[11] & 0x01) != 0
            && (self.data[13] & 0x01) != 0
    }

    pub fn has_dts(&self) -> bool {
        self.has_long_header()
            && self.header_size >= 19
            && (self.data[7] & 0xC0) == 0xC0
            && (self.data[14] & 0x01) != 0
            && (self.data[16] & 0x01) != 0
            && (self.data[18] & 0x01) != 0
    }

    /// Presentation time stamp, 33 bits, when present.
    pub fn pts(&self) -> Option<u64> {
        self.has_pts().then(|| get_pts_dts(&self.data[9..14]))
    }

    /// Decoding time stamp, 33 bits, when present.
    pub fn dts(&self) -> Option<u64> {
        self.has_dts().then(|| get_pts_dts(&self.data[14..19]))
    }

    /// Replaces the PTS. No effect if the packet has no PTS.
    pub fn set_pts(&mut self, pts: u64) {
        if self.has_pts() {
            self.modify(|data| put_pts_dts(&mut data[9..14], pts));
        }
    }

    /// Replaces the DTS. No effect if the packet has no DTS.
    pub fn set_dts(&mut self, dts: u64) {
        if self.has_dts() {
            self.modify(|data| put_pts_dts(&mut data[14..19], dts));
        }
    }

    fn modify<F: FnOnce(&mut BytesMut)>(&mut self, f: F) {
        let mut data = BytesMut::from(&self.data[..]);
        f(&mut data);
        self.data = data.freeze();
    }
}

/// PES packets compare by binary content, the source PID is ignored.
impl PartialEq for PesPacket {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for PesPacket {}

impl fmt::Debug for PesPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PesPacket")
            .field("stream_id", &format_args!("{:#04x}", self.stream_id()))
            .field("size", &self.size())
            .field("header_size", &self.header_size)
            .field("pts", &self.pts())
            .field("source_pid", &self.source_pid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pes_with_pts(pts: u64, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, SID_PRIV1, 0x00, 0x00, 0x80, 0x80, 0x05, 0x21, 0, 0, 0, 0];
        put_pts_dts(&mut data[9..14], pts);
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_long_header() {
        let pes = PesPacket::from_bytes(pes_with_pts(3600, &[1, 2, 3]), 0x100).unwrap();
        assert_eq!(pes.stream_id(), SID_PRIV1);
        assert!(pes.has_long_header());
        assert_eq!(pes.header_size(), 14);
        assert_eq!(pes.payload(), &[1, 2, 3]);
        assert_eq!(pes.pts(), Some(3600));
        assert_eq!(pes.dts(), None);
        assert_eq!(pes.source_pid(), 0x100);
    }

    #[test]
    fn test_set_pts_copies_content() {
        let original = PesPacket::from_bytes(pes_with_pts(3600, &[]), 0x100).unwrap();
        let mut copy = original.clone();
        copy.set_pts(7200);
        assert_eq!(copy.pts(), Some(7200));
        assert_eq!(original.pts(), Some(3600));
        assert_ne!(copy, original);
    }

    #[test]
    fn test_short_header() {
        let pes = PesPacket::from_bytes(vec![0x00, 0x00, 0x01, SID_PAD, 0x00, 0x02, 0xFF, 0xFF], 0).unwrap();
        assert!(!pes.has_long_header());
        assert_eq!(pes.header_size(), 6);
        assert_eq!(pes.payload_size(), 2);
        assert_eq!(pes.pts(), None);
    }

    #[test]
    fn test_invalid_packets() {
        assert!(PesPacket::from_bytes(vec![0x00, 0x00, 0x01, 0xE0], 0).is_err());
        assert!(PesPacket::from_bytes(vec![0x00, 0x01, 0x01, 0xBE, 0, 0], 0).is_err());
        // Header data length points past the end.
        assert!(PesPacket::from_bytes(vec![0x00, 0x00, 0x01, 0xE0, 0, 0, 0x80, 0x80, 0x05], 0).is_err());
    }

    #[test]
    fn test_content_sniffing() {
        let video = |payload: &[u8]| {
            let mut data = vec![0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x80, 0x00, 0x00];
            data.extend_from_slice(payload);
            PesPacket::from_bytes(data, 0).unwrap()
        };
        assert!(video(&[0x00, 0x00, 0x01, 0xB3]).is_mpeg2_video());
        assert!(video(&[0x00, 0x00, 0x00, 0x01, 0x09]).is_avc());
        assert!(!video(&[0x00, 0x00, 0x01, 0x09]).is_avc());

        let audio = PesPacket::from_bytes(vec![0x00, 0x00, 0x01, 0xBD, 0, 0, 0x80, 0x00, 0x00, 0x0B, 0x77, 0x00], 0).unwrap();
        assert!(audio.is_ac3());
    }
}
