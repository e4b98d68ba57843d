use super::demux::{Demux, DemuxCore};
use super::packet::TsPacket;
use super::pes::PesPacket;
use super::pid::PidSet;
use super::types::*;
use bytes::BytesMut;
use log::{debug, trace};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Receives every reassembled PES packet from a [`PesDemux`].
pub trait PesHandler {
    /// Called once per complete PES packet.
    ///
    /// The handler may call `reset` or `reset_pid` on the demux, the
    /// reset is applied when the handler returns.
    fn handle_pes_packet(&mut self, demux: &mut PesDemux, packet: &PesPacket);
}

impl<F> PesHandler for F
where
    F: FnMut(&mut PesDemux, &PesPacket),
{
    fn handle_pes_packet(&mut self, demux: &mut PesDemux, packet: &PesPacket) {
        self(demux, packet)
    }
}

const FIRST_CAPACITY: usize = 64 * 1024;
const SECOND_CAPACITY: usize = 512 * 1024;

// Reassembly state of one PID.
#[derive(Debug)]
struct PesContext {
    continuity: u8,
    sync: bool,
    first_pkt: PacketCounter,
    last_pkt: PacketCounter,
    ts: BytesMut,
    reset_pending: bool,
}

impl PesContext {
    fn new(payload: &[u8], packet_index: PacketCounter, continuity: u8) -> Self {
        let mut ts = BytesMut::with_capacity(payload.len().max(TS_PACKET_SIZE));
        ts.extend_from_slice(payload);
        Self {
            continuity,
            sync: true,
            first_pkt: packet_index,
            last_pkt: packet_index,
            ts,
            reset_pending: false,
        }
    }

    // Same CC as the last stored packet, the transmitter sent it twice.
    fn is_duplicate(&self, pkt: &TsPacket) -> bool {
        self.sync && pkt.cc() == self.continuity
    }

    // Small buffers jump to 64K then 512K, larger ones double.
    fn reserve_for(&mut self, additional: usize) {
        let needed = self.ts.len() + additional;
        if needed <= self.ts.capacity() {
            return;
        }
        let target = if needed <= FIRST_CAPACITY {
            FIRST_CAPACITY
        } else if needed <= SECOND_CAPACITY {
            SECOND_CAPACITY
        } else {
            needed.max(self.ts.capacity() * 2)
        };
        self.ts.reserve(target - self.ts.len());
    }
}

/// Per-PID PES reassembly, shared by the demultiplexers built on PES packets.
///
/// Each packet goes through two steps: [`complete`](Self::complete) returns
/// the PES packet terminated by a new unit start, then
/// [`accumulate`](Self::accumulate) stores the packet payload. The owning
/// demux dispatches the completed packet in between, so that a reset
/// requested by a handler can stop processing of the current packet.
#[derive(Debug, Default)]
pub struct PesAssembler {
    pids: HashMap<Pid, PesContext>,
}

impl PesAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the PES packet in progress on the PID of `pkt` when `pkt`
    /// starts a new one.
    pub fn complete(&mut self, pkt: &TsPacket) -> Option<PesPacket> {
        if !pkt.pusi() {
            return None;
        }
        let pid = pkt.pid();
        let pc = self.pids.get_mut(&pid).filter(|pc| pc.sync)?;
        if pc.is_duplicate(pkt) {
            return None;
        }
        let content = std::mem::take(&mut pc.ts).freeze();
        match PesPacket::from_bytes(content, pid) {
            Ok(mut packet) => {
                packet.set_first_ts_packet_index(pc.first_pkt);
                packet.set_last_ts_packet_index(pc.last_pkt);
                Some(packet)
            }
            Err(e) => {
                debug!("PID {:#06x}: {}", pid, e);
                None
            }
        }
    }

    /// Stores the payload of `pkt`, the packet at `packet_index` in the stream.
    pub fn accumulate(&mut self, pkt: &TsPacket, packet_index: PacketCounter) {
        let pid = pkt.pid();

        if !pkt.has_valid_sync() || pkt.is_scrambled() {
            if self.pids.remove(&pid).is_some() {
                debug!("PID {:#06x}: dropping PES context on invalid or scrambled packet", pid);
            }
            return;
        }

        let payload = pkt.payload();

        if pkt.pusi() {
            if self.pids.get(&pid).is_some_and(|pc| pc.is_duplicate(pkt)) {
                trace!("PID {:#06x}: duplicate unit start, CC {}", pid, pkt.cc());
                return;
            }
            if payload.starts_with(&[0x00, 0x00, 0x01]) {
                self.pids
                    .insert(pid, PesContext::new(payload, packet_index, pkt.cc()));
            } else {
                // Not a PES stream, at least for now.
                self.pids.remove(&pid);
            }
            return;
        }

        let Some(pc) = self.pids.get_mut(&pid) else {
            return;
        };
        if !pc.sync {
            return;
        }
        if pc.is_duplicate(pkt) {
            return;
        }
        if pkt.cc() != (pc.continuity + 1) % CC_MAX {
            debug!("PES discontinuity on PID {:#06x}: CC {} after {}", pid, pkt.cc(), pc.continuity);
            pc.sync = false;
            pc.ts.clear();
            return;
        }
        pc.continuity = pkt.cc();
        pc.reserve_for(payload.len());
        pc.ts.extend_from_slice(payload);
        pc.last_pkt = packet_index;
    }

    /// True if a PES packet is in progress or expected on `pid`.
    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains_key(&pid)
    }

    /// Flags the context of `pid` for a deferred reset.
    pub fn mark_reset(&mut self, pid: Pid) {
        if let Some(pc) = self.pids.get_mut(&pid) {
            pc.reset_pending = true;
        }
    }

    pub fn reset_pending(&self, pid: Pid) -> bool {
        self.pids.get(&pid).is_some_and(|pc| pc.reset_pending)
    }

    pub fn remove(&mut self, pid: Pid) {
        self.pids.remove(&pid);
    }

    pub fn clear(&mut self) {
        self.pids.clear();
    }
}

/// Reassembles PES packets from TS packets.
///
/// Every filtered PID is treated as a potential PES stream. A PID whose
/// unit start does not begin with a PES start code is ignored until the
/// next unit start. All PIDs are filtered by default.
pub struct PesDemux {
    core: DemuxCore,
    handler: Option<Box<dyn PesHandler>>,
    handler_replaced: bool,
    assembler: PesAssembler,
    pes_count: u64,
    in_handler: bool,
    pid_in_handler: Pid,
    reset_pending: bool,
}

impl Default for PesDemux {
    fn default() -> Self {
        Self::new(PidSet::all())
    }
}

impl PesDemux {
    pub fn new(pid_filter: PidSet) -> Self {
        Self {
            core: DemuxCore::new(pid_filter),
            handler: None,
            handler_replaced: false,
            assembler: PesAssembler::new(),
            pes_count: 0,
            in_handler: false,
            pid_in_handler: PID_NULL,
            reset_pending: false,
        }
    }

    pub fn with_handler(mut self, handler: impl PesHandler + 'static) -> Self {
        self.set_handler(Some(Box::new(handler)));
        self
    }

    pub fn set_handler(&mut self, handler: Option<Box<dyn PesHandler>>) {
        self.handler = handler;
        self.handler_replaced = true;
    }

    /// Number of PES packets dispatched since creation or the last reset.
    pub fn pes_count(&self) -> u64 {
        self.pes_count
    }

    // Passes a complete packet to the handler. Returns false when a
    // deferred reset was applied.
    fn dispatch(&mut self, packet: PesPacket) -> bool {
        let pid = packet.source_pid();
        self.pes_count += 1;
        trace!(
            "PES packet on PID {:#06x}: stream id {:#04x}, {} bytes",
            pid,
            packet.stream_id(),
            packet.size()
        );

        self.in_handler = true;
        self.pid_in_handler = pid;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(mut handler) = self.handler.take() {
                self.handler_replaced = false;
                handler.handle_pes_packet(self, &packet);
                if !self.handler_replaced {
                    self.handler = Some(handler);
                }
            }
        }));
        self.in_handler = false;
        self.pid_in_handler = PID_NULL;

        let full_reset = std::mem::take(&mut self.reset_pending);
        let pid_reset = self.assembler.reset_pending(pid);
        if full_reset {
            self.reset();
        } else if pid_reset {
            self.reset_pid(pid);
        }

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
        !(full_reset || pid_reset)
    }
}

impl Demux for PesDemux {
    fn core(&self) -> &DemuxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DemuxCore {
        &mut self.core
    }

    fn process_packet(&mut self, pkt: &TsPacket) {
        if !self.assembler.contains(pkt.pid()) && !pkt.pusi() {
            return;
        }
        if let Some(packet) = self.assembler.complete(pkt) {
            if !self.dispatch(packet) {
                return;
            }
        }
        self.assembler.accumulate(pkt, self.core.packet_count());
    }

    /// Forgets all partial PES packets and the PES counter.
    ///
    /// Inside a handler, the reset is delayed until the handler returns.
    fn reset(&mut self) {
        if self.in_handler {
            self.reset_pending = true;
        } else {
            self.assembler.clear();
            self.pes_count = 0;
        }
    }

    fn reset_pid(&mut self, pid: Pid) {
        if self.in_handler && self.pid_in_handler == pid {
            self.assembler.mark_reset(pid);
        } else {
            self.assembler.remove(pid);
        }
    }
}
