#![doc(html_root_url = "https://docs.rs/tsdemux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsdemux - MPEG Transport Stream Demultiplexing
//!
//! `tsdemux` is a layered demultiplexer for MPEG-2 transport streams.
//! Packets are fed one at a time and results are delivered synchronously
//! to application handlers:
//!
//! - the section layer rebuilds PSI/SI sections, validates their CRC32 and
//!   groups them into complete tables;
//! - the PES layer reassembles PES packets per PID;
//! - the Teletext layer decodes EBU Teletext pages from PES packets and
//!   produces subtitle frames, which can be written as SubRip files.
//!
//! Handlers receive a mutable reference to the demux that called them and
//! may reset it from there. A reset requested during a handler call is
//! applied once the handler returns.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tsdemux = "0.1.0"
//! ```
//!
//! ### Teletext to SRT
//!
//! ```rust,no_run
//! use tsdemux::codec::teletext::TeletextDemux;
//! use tsdemux::format::srt::SrtTeletextWriter;
//! use tsdemux::format::ts::{feed_all, PidSet, TsFileReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let writer = SrtTeletextWriter::new(888, std::fs::File::create("page888.srt")?);
//!     let mut teletext = TeletextDemux::new(PidSet::from_pids([1068])).with_handler(writer);
//!
//!     let mut reader = TsFileReader::open("capture.ts").await?;
//!     feed_all(&mut reader, &mut [&mut teletext]).await?;
//!     teletext.flush_teletext();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `format::ts`: TS packets, sections, tables, PES packets and the
//!   section and PES demuxes
//! - `codec::teletext`: Teletext decoding into subtitle frames
//! - `format::srt`: SubRip output
//! - `config`: process-wide settings from the environment and a file
//! - `error`: error type and result alias
//! - `utils`: CRC32, BCD and ISO-639 helpers

/// Subtitle codecs
pub mod codec;

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// Container formats (TS, SRT)
pub mod format;

/// Common utilities and helper functions
pub mod utils;

pub use error::{Result, TsError};
