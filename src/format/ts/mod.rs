//! # MPEG Transport Stream (TS) Demultiplexing
//!
//! This module turns a stream of 188-byte TS packets into PSI/SI tables
//! and PES packets:
//!
//! - TS packet model and PID sets
//! - Sections and tables, with CRC32 validation
//! - Section demux with per-PID assembly and error counters
//! - PES demux with per-PID reassembly
//! - PAT, PMT and descriptor codecs
//! - Asynchronous TS and M2TS file reader
//!
//! All demuxes implement [`Demux`] and are driven by
//! [`feed_packet`](Demux::feed_packet). Results are delivered to handlers
//! synchronously, from within that call.
//!
//! ## Example Usage
//!
//! ### Collecting the PAT
//!
//! ```rust
//! use tsdemux::format::ts::{
//!     Demux, Pat, PatService, PidSet, SectionDemux, Table, TableCodec, PID_PAT, TS_PACKET_SIZE,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pat = Pat::new(0, true, 1);
//! pat.services.push(PatService { service_id: 4006, pmt_pid: 160 });
//! let table = pat.serialize()?;
//! let section = table.section_at(0).unwrap();
//!
//! // One packet carrying the section.
//! let mut packet = [0xFFu8; TS_PACKET_SIZE];
//! packet[..5].copy_from_slice(&[0x47, 0x40, 0x00, 0x10, 0x00]);
//! packet[5..5 + section.size()].copy_from_slice(section.content());
//!
//! let mut demux = SectionDemux::new(PidSet::from_pids([PID_PAT])).with_table_handler(
//!     |_: &mut SectionDemux, table: &Table| {
//!         let pat = Pat::deserialize(table).unwrap();
//!         assert_eq!(pat.pmt_pid(4006), Some(160));
//!     },
//! );
//! demux.feed_packet(&tsdemux::format::ts::TsPacket::from_slice(&packet)?);
//! assert_eq!(demux.packet_count(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a file
//!
//! ```rust,no_run
//! use tsdemux::format::ts::{feed_all, Demux, PesDemux, TsFileReader};
//!
//! # async fn run() -> tsdemux::Result<()> {
//! let mut reader = TsFileReader::open("capture.ts").await?;
//! let mut pes = PesDemux::default();
//! let count = feed_all(&mut reader, &mut [&mut pes]).await?;
//! println!("{} packets, {} PES packets", count, pes.pes_count());
//! # Ok(())
//! # }
//! ```

/// Demux trait and common demux state
pub mod demux;

/// Raw descriptors
pub mod descriptor;

/// Descriptor lists with private data specifiers
pub mod descriptor_list;

/// Typed descriptors
pub mod descriptors;

/// Packet sources
pub mod file;

/// Fixed-size TS packets
pub mod packet;

/// Program Association Table
pub mod pat;

/// PES packets
pub mod pes;

/// PES reassembly
pub mod pes_demux;

/// PID sets
pub mod pid;

/// Program Map Table
pub mod pmt;

/// Typed table codecs
pub mod psi;

/// PSI/SI sections
pub mod section;

/// Section and table extraction
pub mod section_demux;

/// Table collection without handler
pub mod standalone;

/// Complete tables
pub mod table;

/// Core TS types and constants
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types and constants
pub use demux::{Demux, DemuxCore};
pub use descriptor::{Descriptor, DescriptorCodec};
pub use descriptor_list::DescriptorList;
pub use descriptors::{PrivateDataSpecifierDescriptor, TeletextDescriptor, TeletextEntry};
pub use file::{feed_all, write_packets, PacketSource, TsFileReader};
pub use packet::{TsPacket, EMPTY_PACKET, NULL_PACKET};
pub use pat::{Pat, PatService};
pub use pes::PesPacket;
pub use pes_demux::{PesAssembler, PesDemux, PesHandler};
pub use pid::{PidSet, ALL_PIDS, NO_PID};
pub use pmt::{Pmt, PmtStream};
pub use psi::{LongTableHeader, TableCodec};
pub use section::{ExtTableId, LongSectionHeader, Section};
pub use section_demux::{SectionDemux, SectionDemuxStatus, SectionHandler, TableHandler};
pub use standalone::StandaloneTableDemux;
pub use table::Table;
pub use types::{PacketCounter, Pid, PID_NULL, PID_PAT, SYNC_BYTE, TS_PACKET_SIZE};
