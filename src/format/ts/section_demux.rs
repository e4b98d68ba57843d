use super::demux::{Demux, DemuxCore};
use super::packet::TsPacket;
use super::pid::PidSet;
use super::section::{ExtTableId, Section};
use super::table::Table;
use super::types::*;
use crate::utils::CrcValidation;
use bytes::{Buf, BytesMut};
use log::{debug, trace};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Receives every completed table from a [`SectionDemux`].
pub trait TableHandler {
    /// Called once per new table (or new version of a table).
    ///
    /// The handler may call `reset` or `reset_pid` on the demux, the
    /// reset is applied when the handler returns.
    fn handle_table(&mut self, demux: &mut SectionDemux, table: &Table);
}

/// Receives every accepted section from a [`SectionDemux`].
pub trait SectionHandler {
    fn handle_section(&mut self, demux: &mut SectionDemux, section: &Section);
}

impl<F> TableHandler for F
where
    F: FnMut(&mut SectionDemux, &Table),
{
    fn handle_table(&mut self, demux: &mut SectionDemux, table: &Table) {
        self(demux, table)
    }
}

impl<F> SectionHandler for F
where
    F: FnMut(&mut SectionDemux, &Section),
{
    fn handle_section(&mut self, demux: &mut SectionDemux, section: &Section) {
        self(demux, section)
    }
}

/// Error counters of a [`SectionDemux`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionDemuxStatus {
    /// Packets without a valid sync byte.
    pub invalid_ts: u64,
    /// Continuity counter errors.
    pub discontinuities: u64,
    /// Scrambled packets, sections cannot be extracted from them.
    pub scrambled: u64,
    /// Sections with an invalid length field.
    pub inv_sect_length: u64,
    /// Sections with inconsistent section numbers.
    pub inv_sect_index: u64,
    /// Sections with a wrong CRC32.
    pub wrong_crc: u64,
}

impl SectionDemuxStatus {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True if any counter is non zero.
    pub fn has_errors(&self) -> bool {
        self.invalid_ts != 0
            || self.discontinuities != 0
            || self.scrambled != 0
            || self.inv_sect_length != 0
            || self.inv_sect_index != 0
            || self.wrong_crc != 0
    }
}

// Assembly state of one table on one PID.
#[derive(Debug, Default)]
struct EtidContext {
    version: u8,
    sect_expected: usize,
    sect_received: usize,
    sects: Vec<Option<Section>>,
}

// Demux state of one PID.
#[derive(Debug, Default)]
struct PidContext {
    continuity: u8,
    sync: bool,
    ts: BytesMut,
    tids: HashMap<ExtTableId, EtidContext>,
    reset_pending: bool,
    pusi_pkt_index: PacketCounter,
}

impl PidContext {
    fn sync_lost(&mut self) {
        self.sync = false;
        self.ts.clear();
    }
}

/// Extracts sections and tables from TS packets.
///
/// Each PID is demultiplexed independently. Completed tables go to the
/// table handler, accepted sections to the section handler. Transport and
/// section errors are counted in [`SectionDemuxStatus`].
pub struct SectionDemux {
    core: DemuxCore,
    table_handler: Option<Box<dyn TableHandler>>,
    section_handler: Option<Box<dyn SectionHandler>>,
    table_handler_replaced: bool,
    section_handler_replaced: bool,
    pids: HashMap<Pid, PidContext>,
    status: SectionDemuxStatus,
    in_handler: bool,
    pid_in_handler: Pid,
    reset_pending: bool,
}

impl SectionDemux {
    /// Creates a section demux. No PID is filtered by default.
    pub fn new(pid_filter: PidSet) -> Self {
        Self {
            core: DemuxCore::new(pid_filter),
            table_handler: None,
            section_handler: None,
            table_handler_replaced: false,
            section_handler_replaced: false,
            pids: HashMap::new(),
            status: SectionDemuxStatus::default(),
            in_handler: false,
            pid_in_handler: PID_NULL,
            reset_pending: false,
        }
    }

    /// Creates a section demux with the PID filter of a configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.pid_filter.to_pid_set())
    }

    pub fn with_table_handler(mut self, handler: impl TableHandler + 'static) -> Self {
        self.set_table_handler(Some(Box::new(handler)));
        self
    }

    pub fn with_section_handler(mut self, handler: impl SectionHandler + 'static) -> Self {
        self.set_section_handler(Some(Box::new(handler)));
        self
    }

    pub fn set_table_handler(&mut self, handler: Option<Box<dyn TableHandler>>) {
        self.table_handler = handler;
        self.table_handler_replaced = true;
    }

    pub fn set_section_handler(&mut self, handler: Option<Box<dyn SectionHandler>>) {
        self.section_handler = handler;
        self.section_handler_replaced = true;
    }

    /// Snapshot of the error counters.
    pub fn status(&self) -> SectionDemuxStatus {
        self.status
    }

    fn has_section_handler(&self) -> bool {
        self.section_handler.is_some()
    }

    fn call_section_handler(&mut self, section: &Section) {
        if let Some(mut handler) = self.section_handler.take() {
            self.section_handler_replaced = false;
            handler.handle_section(self, section);
            if !self.section_handler_replaced {
                self.section_handler = Some(handler);
            }
        }
    }

    fn call_table_handler(&mut self, table: &Table) {
        if let Some(mut handler) = self.table_handler.take() {
            self.table_handler_replaced = false;
            handler.handle_table(self, table);
            if !self.table_handler_replaced {
                self.table_handler = Some(handler);
            }
        }
    }

    // Stores the section if its slot is empty and returns the completed
    // table when this was the last missing section.
    fn store_section(&mut self, pid: Pid, etid: ExtTableId, section: Section) -> Option<Table> {
        let tc = self.pids.get_mut(&pid)?.tids.get_mut(&etid)?;
        let index = section.section_number() as usize;
        if tc.sects[index].is_some() {
            return None;
        }
        tc.sects[index] = Some(section);
        tc.sect_received += 1;
        if tc.sect_received != tc.sect_expected || self.table_handler.is_none() {
            return None;
        }
        let mut table = Table::new();
        for section in tc.sects.iter().flatten() {
            if table.add_section(section.clone(), true, true).is_err() {
                return None;
            }
        }
        Some(table)
    }

    // Runs the handlers for one accepted section. Returns false when a
    // deferred reset was applied and the packet must not be processed further.
    fn dispatch(&mut self, pid: Pid, etid: ExtTableId, section: Option<Section>) -> bool {
        self.in_handler = true;
        self.pid_in_handler = pid;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(section) = section {
                if self.has_section_handler() {
                    self.call_section_handler(&section);
                }
                if let Some(table) = self.store_section(pid, etid, section) {
                    trace!("table {:?} complete on PID {:#06x}", etid, pid);
                    self.call_table_handler(&table);
                }
            }
        }));

        self.in_handler = false;
        self.pid_in_handler = PID_NULL;
        let full_reset = std::mem::take(&mut self.reset_pending);
        let pid_reset = self.pids.get(&pid).is_some_and(|pc| pc.reset_pending);

        if full_reset {
            self.reset();
        } else if pid_reset {
            self.reset_pid(pid);
        }

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
        !(full_reset || pid_reset) && self.pids.contains_key(&pid)
    }
}

impl Demux for SectionDemux {
    fn core(&self) -> &DemuxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DemuxCore {
        &mut self.core
    }

    fn process_packet(&mut self, pkt: &TsPacket) {
        if !pkt.has_valid_sync() {
            self.status.invalid_ts += 1;
            return;
        }

        let pid = pkt.pid();
        let packet_index = self.core.packet_count();
        let pc = self.pids.entry(pid).or_default();

        if pkt.is_scrambled() {
            self.status.scrambled += 1;
            pc.sync_lost();
            return;
        }

        if pc.sync {
            if pkt.cc() == pc.continuity {
                // Duplicate packet.
                return;
            }
            if pkt.cc() != (pc.continuity + 1) % CC_MAX {
                debug!("discontinuity on PID {:#06x}: CC {} after {}", pid, pkt.cc(), pc.continuity);
                self.status.discontinuities += 1;
                pc.sync_lost();
            }
        }
        pc.continuity = pkt.cc();

        let header_size = pkt.header_size();
        if !pkt.has_payload() || header_size >= TS_PACKET_SIZE {
            return;
        }

        let raw = &pkt.b[header_size..];
        let mut pusi_pkt_index = pc.pusi_pkt_index;
        let mut pointer_field;
        let mut payload;

        if pkt.pusi() {
            pc.pusi_pkt_index = packet_index;
            // A PES start code cannot start a section payload.
            if raw.starts_with(&[0x00, 0x00, 0x01]) {
                pc.sync_lost();
                return;
            }
            pointer_field = raw[0] as usize;
            payload = &raw[1..];
            if pointer_field >= payload.len() {
                debug!("invalid pointer field {} on PID {:#06x}", pointer_field, pid);
                pc.sync_lost();
                return;
            }
            if pointer_field == 0 {
                pusi_pkt_index = packet_index;
            }
        } else {
            pointer_field = 0xFF;
            payload = raw;
        }

        if payload.is_empty() {
            return;
        }

        if !pc.sync {
            if !pkt.pusi() {
                return;
            }
            payload = &payload[pointer_field..];
            pointer_field = 0;
            pc.sync = true;
        }

        pc.ts.extend_from_slice(payload);

        // Offset in the buffer of the section starting in this packet.
        let pusi_section = pkt
            .pusi()
            .then(|| pc.ts.len() - payload.len() + pointer_field);

        let mut buffer = std::mem::take(&mut pc.ts);
        let mut consumed = 0usize;

        while buffer.len() >= 3 {
            let mut section_ok = true;
            let mut etid = ExtTableId::short(buffer[0]);
            let length_field = u16::from_be_bytes([buffer[1], buffer[2]]);
            let long_header = (length_field & 0x8000) != 0;
            let mut section_length = (length_field & 0x0FFF) as usize + SHORT_SECTION_HEADER_SIZE;

            if section_length > MAX_PRIVATE_SECTION_SIZE
                || section_length < MIN_SHORT_SECTION_SIZE
                || (long_header && section_length < MIN_LONG_SECTION_SIZE)
            {
                debug!("invalid section length {} on PID {:#06x}", section_length, pid);
                self.status.inv_sect_length += 1;
                if let Some(pc) = self.pids.get_mut(&pid) {
                    pc.sync_lost();
                }
                return;
            }

            if buffer.len() < section_length {
                break;
            }

            // A section overlapping the start of the next one was truncated.
            if let Some(boundary) = pusi_section {
                if consumed < boundary && consumed + section_length > boundary {
                    debug!("truncated section on PID {:#06x}", pid);
                    section_ok = false;
                    section_length = boundary - consumed;
                }
            }

            let mut version = 0;
            let mut is_next = false;
            let mut section_number = 0u8;
            let mut last_section_number = 0u8;

            if section_ok && long_header {
                etid = ExtTableId::long(etid.tid(), u16::from_be_bytes([buffer[3], buffer[4]]));
                version = (buffer[5] >> 1) & 0x1F;
                is_next = (buffer[5] & 0x01) == 0;
                section_number = buffer[6];
                last_section_number = buffer[7];
                if section_number > last_section_number {
                    self.status.inv_sect_index += 1;
                    section_ok = false;
                }
            }

            if is_next {
                section_ok = false;
            }

            if section_ok {
                let has_section_handler = self.has_section_handler();
                let Some(pc) = self.pids.get_mut(&pid) else {
                    return;
                };
                let tc = pc.tids.entry(etid).or_default();

                // Short sections carry no version, each one is a new table.
                if !long_header || tc.sect_expected == 0 || tc.version != version {
                    tc.version = version;
                    tc.sect_expected = last_section_number as usize + 1;
                    tc.sect_received = 0;
                    tc.sects = vec![None; tc.sect_expected];
                }

                if last_section_number as usize != tc.sect_expected - 1 {
                    self.status.inv_sect_index += 1;
                    section_ok = false;
                }

                let mut section = None;
                if section_ok && (has_section_handler || tc.sects[section_number as usize].is_none()) {
                    let content = buffer[..section_length].to_vec();
                    match Section::from_bytes(content, pid, CrcValidation::Check) {
                        Ok(mut s) => {
                            s.set_first_ts_packet_index(pusi_pkt_index);
                            s.set_last_ts_packet_index(packet_index);
                            section = Some(s);
                        }
                        Err(e) => {
                            debug!("PID {:#06x}: {}", pid, e);
                            self.status.wrong_crc += 1;
                            section_ok = false;
                        }
                    }
                }

                if section_ok {
                    trace!("section {:?} #{} on PID {:#06x}", etid, section_number, pid);
                    if !self.dispatch(pid, etid, section) {
                        return;
                    }
                }
            }

            buffer.advance(section_length);
            consumed += section_length;

            // The next section necessarily starts in the current packet.
            pusi_pkt_index = packet_index;

            // An 0xFF table id means the rest of the packet is stuffing.
            if buffer.first() == Some(&TID_NULL) {
                buffer.clear();
            }
        }

        if let Some(pc) = self.pids.get_mut(&pid) {
            pc.ts = buffer;
        }
    }

    /// Forgets all partially built sections and tables, and clears the status.
    ///
    /// Inside a handler, the reset is delayed until the handler returns.
    fn reset(&mut self) {
        if self.in_handler {
            self.reset_pending = true;
        } else {
            self.pids.clear();
            self.status.reset();
        }
    }

    /// Forgets all partially built sections and tables on one PID.
    fn reset_pid(&mut self, pid: Pid) {
        if self.in_handler && self.pid_in_handler == pid {
            self.pids.entry(pid).or_default().reset_pending = true;
        } else {
            self.pids.remove(&pid);
        }
    }
}
