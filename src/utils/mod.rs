//! # Utility Functions and Types
//!
//! Common helpers shared by the demux layers:
//!
//! - MPEG-2 CRC32 calculation and section validation modes
//! - ISO-639 language code conversion used by descriptors
//! - Packed BCD conversion for Teletext page numbers
//!
//! ## CRC Calculation
//!
//! ```rust
//! use tsdemux::utils::crc32;
//!
//! let crc = crc32(b"Hello, world!");
//! println!("CRC32: {:08x}", crc);
//! ```

/// Packed BCD values
pub mod bcd;

/// CRC calculation implementations
pub mod crc;

/// ISO-639 language codes
pub mod language;

pub use bcd::{decode_bcd, encode_bcd};
pub use crc::{crc32, Crc32Mpeg2, CrcValidation};
pub use language::{append_iso639_language, iso639_language};
