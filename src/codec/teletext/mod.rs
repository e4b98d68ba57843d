//! # EBU Teletext Subtitles
//!
//! Decoding of Teletext pages carried in PES packets (ETSI EN 300 472),
//! following the page format of ETS 300 706:
//!
//! - Hamming 8/4 and 24/18 error correction
//! - Latin G0/G2 character sets with national option subsets
//! - Page buffers, enhancement packets X/26 and charset packets X/28, M/29
//! - Subtitle frames with show and hide times, ready for SubRip output
//!
//! ## Example: Extracting Subtitles
//!
//! ```rust
//! use tsdemux::codec::teletext::{TeletextDemux, TeletextFrame};
//! use tsdemux::format::ts::{Demux, PidSet, NULL_PACKET};
//!
//! let mut demux = TeletextDemux::new(PidSet::from_pids([1068]))
//!     .with_handler(|_: &mut TeletextDemux, frame: &TeletextFrame| {
//!         println!("page {}: {:?}", frame.page, frame.lines);
//!     });
//!
//! demux.feed_packet(&NULL_PACKET);
//! demux.flush_teletext();
//! assert_eq!(demux.packet_count(), 1);
//! ```

/// Teletext character sets
pub mod charset;
/// Teletext demultiplexer
pub mod demux;
/// Subtitle frames
pub mod frame;
/// Hamming decoding
pub mod hamming;
/// Timestamps of PES packets
pub mod timestamper;

pub use charset::TeletextCharset;
pub use demux::{page_bcd_to_binary, page_binary_to_bcd, TeletextDemux, TeletextHandler};
pub use frame::{to_srt_time, TeletextFrame};
pub use timestamper::TimeStamper;
