use super::demux::{Demux, DemuxCore};
use super::packet::TsPacket;
use super::pid::PidSet;
use super::section_demux::{SectionDemux, SectionDemuxStatus};
use super::table::Table;
use super::types::Pid;
use parking_lot::Mutex;
use std::sync::Arc;

/// A section demux which keeps every completed table.
///
/// Useful to extract a few tables from a short stream without writing a
/// table handler.
pub struct StandaloneTableDemux {
    inner: SectionDemux,
    tables: Arc<Mutex<Vec<Table>>>,
}

impl StandaloneTableDemux {
    pub fn new(pid_filter: PidSet) -> Self {
        let tables = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&tables);
        let inner = SectionDemux::new(pid_filter).with_table_handler(
            move |_demux: &mut SectionDemux, table: &Table| sink.lock().push(table.clone()),
        );
        Self { inner, tables }
    }

    /// Number of tables collected so far.
    pub fn table_count(&self) -> usize {
        self.tables.lock().len()
    }

    /// Copy of the table at `index`, in order of completion.
    pub fn table_at(&self, index: usize) -> Option<Table> {
        self.tables.lock().get(index).cloned()
    }

    /// Copy of all collected tables.
    pub fn tables(&self) -> Vec<Table> {
        self.tables.lock().clone()
    }

    pub fn status(&self) -> SectionDemuxStatus {
        self.inner.status()
    }
}

impl Demux for StandaloneTableDemux {
    fn core(&self) -> &DemuxCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut DemuxCore {
        self.inner.core_mut()
    }

    fn process_packet(&mut self, packet: &TsPacket) {
        self.inner.process_packet(packet);
    }

    /// Forgets all collected tables.
    fn reset(&mut self) {
        self.inner.reset();
        self.tables.lock().clear();
    }

    /// Forgets the tables collected on `pid`.
    fn reset_pid(&mut self, pid: Pid) {
        self.inner.reset_pid(pid);
        self.tables.lock().retain(|table| table.source_pid() != pid);
    }
}
