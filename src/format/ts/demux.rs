use super::packet::TsPacket;
use super::pid::PidSet;
use super::types::{PacketCounter, Pid};

/// State shared by every demultiplexer: the PID filter and global counters.
#[derive(Debug, Clone, Default)]
pub struct DemuxCore {
    pid_filter: PidSet,
    packet_count: PacketCounter,
    last_pcr: Option<u64>,
}

impl DemuxCore {
    /// Creates the common state with an initial PID filter.
    pub fn new(pid_filter: PidSet) -> Self {
        Self {
            pid_filter,
            packet_count: 0,
            last_pcr: None,
        }
    }

    pub fn pid_filter(&self) -> &PidSet {
        &self.pid_filter
    }

    pub fn packet_count(&self) -> PacketCounter {
        self.packet_count
    }

    pub fn last_pcr(&self) -> Option<u64> {
        self.last_pcr
    }
}

/// A packet-driven demultiplexer.
///
/// Implementors provide the per-packet hook and the reset hooks, the
/// provided methods route packets through the PID filter and keep the
/// global counters.
///
/// # Examples
///
/// ```
/// use tsdemux::format::ts::{Demux, DemuxCore, PidSet, TsPacket, Pid, NULL_PACKET};
///
/// struct Counter {
///     core: DemuxCore,
///     seen: usize,
/// }
///
/// impl Demux for Counter {
///     fn core(&self) -> &DemuxCore { &self.core }
///     fn core_mut(&mut self) -> &mut DemuxCore { &mut self.core }
///     fn process_packet(&mut self, _packet: &TsPacket) { self.seen += 1; }
///     fn reset(&mut self) { self.seen = 0; }
///     fn reset_pid(&mut self, _pid: Pid) {}
/// }
///
/// let mut demux = Counter { core: DemuxCore::new(PidSet::from_pids([0x1FFF])), seen: 0 };
/// demux.feed_packet(&NULL_PACKET);
/// assert_eq!(demux.seen, 1);
/// assert_eq!(demux.packet_count(), 1);
/// ```
pub trait Demux {
    fn core(&self) -> &DemuxCore;

    fn core_mut(&mut self) -> &mut DemuxCore;

    /// Processes one packet whose PID passed the filter.
    fn process_packet(&mut self, packet: &TsPacket);

    /// Forgets all partially demultiplexed data. The PID filter is kept.
    fn reset(&mut self);

    /// Forgets all partially demultiplexed data on one PID.
    fn reset_pid(&mut self, pid: Pid);

    /// Feeds the demux with one packet.
    ///
    /// The packet counter is incremented after processing, so that during
    /// `process_packet` it is the index of the current packet.
    fn feed_packet(&mut self, packet: &TsPacket) {
        if let Some(pcr) = packet.pcr() {
            self.core_mut().last_pcr = Some(pcr);
        }
        if self.core().pid_filter.contains(packet.pid()) {
            self.process_packet(packet);
        }
        self.core_mut().packet_count += 1;
    }

    /// Feeds the demux with a contiguous run of packets.
    fn feed_packets(&mut self, packets: &[TsPacket]) {
        for packet in packets {
            self.feed_packet(packet);
        }
    }

    fn pid_filter(&self) -> &PidSet {
        &self.core().pid_filter
    }

    /// Replaces the PID filter. PIDs which are no longer filtered are reset.
    fn set_pid_filter(&mut self, pid_filter: PidSet) {
        let removed = self.core().pid_filter.difference(&pid_filter);
        for pid in removed.iter() {
            self.reset_pid(pid);
        }
        self.core_mut().pid_filter = pid_filter;
    }

    fn add_pid(&mut self, pid: Pid) {
        self.core_mut().pid_filter.insert(pid);
    }

    fn add_pids(&mut self, pids: &PidSet) {
        for pid in pids.iter() {
            self.core_mut().pid_filter.insert(pid);
        }
    }

    /// Removes a PID from the filter, resetting it if it was filtered.
    fn remove_pid(&mut self, pid: Pid) {
        if self.core_mut().pid_filter.remove(pid) {
            self.reset_pid(pid);
        }
    }

    fn filtered_pid_count(&self) -> usize {
        self.core().pid_filter.len()
    }

    /// Number of packets fed so far, filtered or not.
    fn packet_count(&self) -> PacketCounter {
        self.core().packet_count
    }

    fn reset_packet_count(&mut self) {
        self.core_mut().packet_count = 0;
    }

    /// Last PCR seen in any packet, filtered or not.
    fn last_pcr(&self) -> Option<u64> {
        self.core().last_pcr
    }
}
