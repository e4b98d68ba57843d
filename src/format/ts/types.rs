//! Transport stream constants and classification helpers.

/// Packet identifier, 13 significant bits.
pub type Pid = u16;

/// Counter of TS packets in a demultiplexed stream.
pub type PacketCounter = u64;

// Constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const M2TS_PACKET_SIZE: usize = 192;
pub const SYNC_BYTE: u8 = 0x47;
pub const CC_MAX: u8 = 16;
pub const PID_BITS: u32 = 13;
pub const PID_MAX: usize = 1 << PID_BITS;
pub const PTS_HZ: u64 = 90_000;
pub const PCR_HZ: u64 = 27_000_000;
pub const SYSTEM_CLOCK_SUBFACTOR: u64 = 300;
pub const PTS_DTS_MASK: u64 = 0x0000_0001_FFFF_FFFF;
pub const PTS_DTS_SCALE: u64 = 0x0000_0002_0000_0000;
pub const PCR_SCALE: u64 = PTS_DTS_SCALE * SYSTEM_CLOCK_SUBFACTOR;
pub const PCR_SIZE: usize = 6;

// Section sizes
pub const SHORT_SECTION_HEADER_SIZE: usize = 3;
pub const LONG_SECTION_HEADER_SIZE: usize = 8;
pub const SECTION_CRC32_SIZE: usize = 4;
pub const MAX_PSI_SECTION_SIZE: usize = 1024;
pub const MAX_PRIVATE_SECTION_SIZE: usize = 4096;
pub const MIN_SHORT_SECTION_SIZE: usize = SHORT_SECTION_HEADER_SIZE;
pub const MIN_LONG_SECTION_SIZE: usize = LONG_SECTION_HEADER_SIZE + SECTION_CRC32_SIZE;
pub const MAX_PSI_SHORT_SECTION_PAYLOAD_SIZE: usize =
    MAX_PSI_SECTION_SIZE - SHORT_SECTION_HEADER_SIZE;
pub const MAX_PSI_LONG_SECTION_PAYLOAD_SIZE: usize =
    MAX_PSI_SECTION_SIZE - LONG_SECTION_HEADER_SIZE - SECTION_CRC32_SIZE;
pub const MAX_PRIVATE_SHORT_SECTION_PAYLOAD_SIZE: usize =
    MAX_PRIVATE_SECTION_SIZE - SHORT_SECTION_HEADER_SIZE;
pub const MAX_PRIVATE_LONG_SECTION_PAYLOAD_SIZE: usize =
    MAX_PRIVATE_SECTION_SIZE - LONG_SECTION_HEADER_SIZE - SECTION_CRC32_SIZE;
pub const MAX_DESCRIPTOR_SIZE: usize = 257;

// PIDs
pub const PID_PAT: Pid = 0x0000;
pub const PID_CAT: Pid = 0x0001;
pub const PID_TSDT: Pid = 0x0002;
pub const PID_NIT: Pid = 0x0010;
pub const PID_SDT: Pid = 0x0011;
pub const PID_BAT: Pid = 0x0011;
pub const PID_EIT: Pid = 0x0012;
pub const PID_RST: Pid = 0x0013;
pub const PID_TDT: Pid = 0x0014;
pub const PID_TOT: Pid = 0x0014;
pub const PID_NULL: Pid = 0x1FFF;

// Table IDs
pub const TID_PAT: u8 = 0x00;
pub const TID_CAT: u8 = 0x01;
pub const TID_PMT: u8 = 0x02;
pub const TID_TSDT: u8 = 0x03;
pub const TID_NIT_ACT: u8 = 0x40;
pub const TID_NIT_OTH: u8 = 0x41;
pub const TID_SDT_ACT: u8 = 0x42;
pub const TID_SDT_OTH: u8 = 0x46;
pub const TID_BAT: u8 = 0x4A;
pub const TID_TDT: u8 = 0x70;
pub const TID_TOT: u8 = 0x73;
pub const TID_NULL: u8 = 0xFF;

// Descriptor tags
pub const DID_CA: u8 = 0x09;
pub const DID_LANGUAGE: u8 = 0x0A;
pub const DID_AVC_VIDEO: u8 = 0x28;
pub const DID_STREAM_ID: u8 = 0x52;
pub const DID_TELETEXT: u8 = 0x56;
pub const DID_SUBTITLING: u8 = 0x59;
pub const DID_PRIV_DATA_SPECIF: u8 = 0x5F;
pub const DID_AC3: u8 = 0x6A;
pub const DID_ENHANCED_AC3: u8 = 0x7A;
pub const DID_DTS: u8 = 0x7B;
pub const DID_AAC: u8 = 0x7C;

/// Descriptor tags from this value are private, their meaning depends on the
/// private data specifier in effect.
pub const DID_PRIVATE_FIRST: u8 = 0x80;

// PES stream IDs
pub const SID_PSMAP: u8 = 0xBC;
pub const SID_PRIV1: u8 = 0xBD;
pub const SID_PAD: u8 = 0xBE;
pub const SID_PRIV2: u8 = 0xBF;
pub const SID_AUDIO: u8 = 0xC0;
pub const SID_AUDIO_MASK: u8 = 0x1F;
pub const SID_VIDEO: u8 = 0xE0;
pub const SID_VIDEO_MASK: u8 = 0x0F;
pub const SID_ECM: u8 = 0xF0;
pub const SID_EMM: u8 = 0xF1;
pub const SID_DSMCC: u8 = 0xF2;
pub const SID_H222_1_E: u8 = 0xF8;
pub const SID_PSDIR: u8 = 0xFF;

// Elementary Stream Types
pub const ST_MPEG1_VIDEO: u8 = 0x01;
pub const ST_MPEG2_VIDEO: u8 = 0x02;
pub const ST_MPEG1_AUDIO: u8 = 0x03;
pub const ST_MPEG2_AUDIO: u8 = 0x04;
pub const ST_PRIV_SECT: u8 = 0x05;
pub const ST_PES_PRIV: u8 = 0x06;
pub const ST_MPEG2_ATM: u8 = 0x09;
pub const ST_DSMCC_UN: u8 = 0x0B;
pub const ST_DSMCC_SECT: u8 = 0x0D;
pub const ST_AAC_AUDIO: u8 = 0x0F;
pub const ST_MPEG4_VIDEO: u8 = 0x10;
pub const ST_MPEG4_AUDIO: u8 = 0x11;
pub const ST_MPEG4_PES: u8 = 0x12;
pub const ST_MPEG4_SECT: u8 = 0x13;
pub const ST_MDATA_PES: u8 = 0x15;
pub const ST_MDATA_SECT: u8 = 0x16;
pub const ST_AVC_VIDEO: u8 = 0x1B;
pub const ST_AC3_AUDIO: u8 = 0x81;
pub const ST_EAC3_AUDIO: u8 = 0x87;

/// Returns true if PES packets with this stream id carry the extended
/// header with PTS/DTS fields.
pub fn is_long_header_pes_stream_id(sid: u8) -> bool {
    !matches!(
        sid,
        SID_PSMAP | SID_PAD | SID_PRIV2 | SID_ECM | SID_EMM | SID_PSDIR | SID_DSMCC | SID_H222_1_E
    )
}

/// Returns true if the stream id designates a video stream.
pub fn is_video_pes_stream_id(sid: u8) -> bool {
    (sid & !SID_VIDEO_MASK) == SID_VIDEO
}

/// Returns true if the stream id designates an audio stream.
pub fn is_audio_pes_stream_id(sid: u8) -> bool {
    (sid & !SID_AUDIO_MASK) == SID_AUDIO
}

/// Returns true if the stream type is carried in PES packets.
pub fn is_pes_stream_type(st: u8) -> bool {
    matches!(
        st,
        ST_MPEG1_VIDEO
            | ST_MPEG2_VIDEO
            | ST_MPEG1_AUDIO
            | ST_MPEG2_AUDIO
            | ST_PES_PRIV
            | ST_MPEG2_ATM
            | ST_MPEG4_VIDEO
            | ST_MPEG4_AUDIO
            | ST_MPEG4_PES
            | ST_MDATA_PES
            | ST_AVC_VIDEO
            | ST_AAC_AUDIO
            | ST_AC3_AUDIO
            | ST_EAC3_AUDIO
    )
}

/// Returns true if the stream type is a video stream.
pub fn is_video_stream_type(st: u8) -> bool {
    matches!(
        st,
        ST_MPEG1_VIDEO | ST_MPEG2_VIDEO | ST_MPEG4_VIDEO | ST_AVC_VIDEO
    )
}

/// Returns true if the stream type is an audio stream.
pub fn is_audio_stream_type(st: u8) -> bool {
    matches!(
        st,
        ST_MPEG1_AUDIO | ST_MPEG2_AUDIO | ST_MPEG4_AUDIO | ST_AAC_AUDIO | ST_AC3_AUDIO | ST_EAC3_AUDIO
    )
}

/// Returns true if the stream type carries sections.
pub fn is_section_stream_type(st: u8) -> bool {
    matches!(
        st,
        ST_PRIV_SECT | ST_DSMCC_UN | ST_DSMCC_SECT | ST_MPEG4_SECT | ST_MDATA_SECT
    )
}

/// Minimum number of TS packets required to carry a section of `section_size` bytes.
///
/// One byte is needed for the pointer field of the first packet, each
/// packet carries 184 bytes.
pub fn section_packet_count(section_size: usize) -> u64 {
    ((section_size + 184) / 184) as u64
}

/// Interval in milliseconds between two packets `distance` packets apart at `bitrate` b/s.
pub fn packet_interval(bitrate: u32, distance: u64) -> u64 {
    if bitrate == 0 {
        0
    } else {
        (distance * 8 * TS_PACKET_SIZE as u64 * 1000) / bitrate as u64
    }
}

/// Number of packets transmitted during `duration_ms` at `bitrate` b/s.
pub fn packet_distance(bitrate: u32, duration_ms: u64) -> u64 {
    (bitrate as u64 * duration_ms) / (1000 * 8 * TS_PACKET_SIZE as u64)
}

/// Extracts a 42-bit PCR from a 6-byte area.
pub fn get_pcr(b: &[u8]) -> u64 {
    let v32 = u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64;
    let v16 = u16::from_be_bytes([b[4], b[5]]) as u64;
    let pcr_base = (v32 << 1) | (v16 >> 15);
    let pcr_ext = v16 & 0x01FF;
    pcr_base * SYSTEM_CLOCK_SUBFACTOR + pcr_ext
}

/// Writes a 42-bit PCR into a 6-byte area.
pub fn put_pcr(b: &mut [u8], pcr: u64) {
    let pcr_base = pcr / SYSTEM_CLOCK_SUBFACTOR;
    let pcr_ext = pcr % SYSTEM_CLOCK_SUBFACTOR;
    b[..4].copy_from_slice(&((pcr_base >> 1) as u32).to_be_bytes());
    b[4..6].copy_from_slice(&(((pcr_base << 15) | 0x7E00 | pcr_ext) as u16).to_be_bytes());
}

/// Extracts a 33-bit PTS or DTS from a 5-byte area.
pub fn get_pts_dts(b: &[u8]) -> u64 {
    ((b[0] as u64 & 0x0E) << 29)
        | ((u16::from_be_bytes([b[1], b[2]]) as u64 & 0xFFFE) << 14)
        | (u16::from_be_bytes([b[3], b[4]]) as u64 >> 1)
}

/// Writes a 33-bit PTS or DTS into a 5-byte area, keeping the 4-bit prefix of the first byte.
pub fn put_pts_dts(b: &mut [u8], xts: u64) {
    b[0] = (b[0] & 0xF0) | (((xts >> 29) as u8) & 0x0E) | 0x01;
    b[1..3].copy_from_slice(&((((xts >> 14) & 0xFFFE) | 0x0001) as u16).to_be_bytes());
    b[3..5].copy_from_slice(&((((xts << 1) & 0xFFFE) | 0x0001) as u16).to_be_bytes());
}

/// Returns true if `pts2` follows `pts1` after wrapping up at 2^33.
pub fn wrap_up_pts(pts1: u64, pts2: u64) -> bool {
    pts2 < pts1 && (pts1 - pts2) > 0x0000_0001_F000_0000
}

/// Returns true if `pts2` follows `pts1`, with or without wrapping up.
pub fn sequenced_pts(pts1: u64, pts2: u64) -> bool {
    pts1 <= pts2 || wrap_up_pts(pts1, pts2)
}
