use super::charset::TeletextCharset;
use super::frame::TeletextFrame;
use super::hamming::{try_unham_8_4, unham_24_18, unham_8_4};
use super::timestamper::TimeStamper;
use crate::config::Config;
use crate::format::ts::demux::{Demux, DemuxCore};
use crate::format::ts::packet::TsPacket;
use crate::format::ts::pes::PesPacket;
use crate::format::ts::pes_demux::PesAssembler;
use crate::format::ts::pid::PidSet;
use crate::format::ts::types::*;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// Receives every subtitle frame from a [`TeletextDemux`].
pub trait TeletextHandler {
    /// Called once per completed, non-empty frame.
    ///
    /// The handler may call `reset` or `reset_pid` on the demux, the
    /// reset is applied when the handler returns.
    fn handle_teletext_message(&mut self, demux: &mut TeletextDemux, frame: &TeletextFrame);
}

impl<F> TeletextHandler for F
where
    F: FnMut(&mut TeletextDemux, &TeletextFrame),
{
    fn handle_teletext_message(&mut self, demux: &mut TeletextDemux, frame: &TeletextFrame) {
        self(demux, frame)
    }
}

/// Size of a Teletext packet in a data unit.
pub const TELETEXT_PACKET_SIZE: usize = 44;
/// Range of EBU data_identifier values in Teletext PES packets.
pub const TELETEXT_PES_FIRST_EBU_DATA_ID: u8 = 0x10;
pub const TELETEXT_PES_LAST_EBU_DATA_ID: u8 = 0x1F;
/// Data unit ids of Teletext packets.
pub const TELETEXT_DATA_UNIT_ID_NON_SUBTITLE: u8 = 0x02;
pub const TELETEXT_DATA_UNIT_ID_SUBTITLE: u8 = 0x03;

const ROWS: usize = 25;
const COLUMNS: usize = 40;
const START_BOX: u16 = 0x0B;
const END_BOX: u16 = 0x0A;
const WHITE: u16 = 0x07;

// One frame at 25 fps, subtracted from the hide time of a page replaced
// by a new one.
const FRAME_DURATION_MS: u64 = 40;

const COLORS: [&str; 8] = [
    "#000000", "#ff0000", "#00ff00", "#ffff00", "#0000ff", "#ff00ff", "#00ffff", "#ffffff",
];

/// Converts a BCD page number such as 0x889 to its decimal value 889.
pub fn page_bcd_to_binary(bcd: u16) -> u16 {
    100 * ((bcd >> 8) & 0x0F) + 10 * ((bcd >> 4) & 0x0F) + (bcd & 0x0F)
}

/// Converts a decimal page number such as 889 to BCD 0x889.
pub fn page_binary_to_bcd(bin: u16) -> u16 {
    ((bin / 100) % 10) << 8 | ((bin / 10) % 10) << 4 | (bin % 10)
}

fn magazine_of(page: u16) -> u16 {
    (page >> 8) & 0x0F
}

fn page_of(page: u16) -> u16 {
    page & 0xFF
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransMode {
    Parallel,
    Serial,
}

// Page buffer, 25 rows of 40 UCS-2 cells. Zero is an empty cell.
#[derive(Debug, Clone)]
struct TeletextPage {
    frame_count: u32,
    show_timestamp: u64,
    hide_timestamp: u64,
    tainted: bool,
    charset: TeletextCharset,
    text: [[u16; COLUMNS]; ROWS],
}

impl Default for TeletextPage {
    fn default() -> Self {
        Self {
            frame_count: 0,
            show_timestamp: 0,
            hide_timestamp: 0,
            tainted: false,
            charset: TeletextCharset::new(),
            text: [[0; COLUMNS]; ROWS],
        }
    }
}

impl TeletextPage {
    fn reset(&mut self, timestamp: u64) {
        self.show_timestamp = timestamp;
        self.hide_timestamp = 0;
        self.tainted = false;
        self.text = [[0; COLUMNS]; ROWS];
    }

    // Builds the next frame of the page, None when no row is boxed.
    fn build_frame(&mut self, pid: Pid, page_number: u16, add_colors: bool) -> Option<TeletextFrame> {
        if !self.text[1..].iter().any(|row| row.contains(&START_BOX)) {
            return None;
        }

        self.frame_count += 1;
        if self.show_timestamp > self.hide_timestamp {
            self.hide_timestamp = self.show_timestamp;
        }

        let mut frame = TeletextFrame::new(
            pid,
            page_bcd_to_binary(page_number),
            self.frame_count,
            self.show_timestamp,
            self.hide_timestamp,
        );
        for row in &self.text[1..] {
            if let Some(line) = render_row(row, add_colors) {
                frame.add_line(line);
            }
        }
        Some(frame)
    }
}

fn open_font(line: &mut String, color: u16) {
    line.push_str("<font color=\"");
    line.push_str(COLORS[usize::from(color)]);
    line.push_str("\">");
}

// Text of the boxed area of a row, trimmed. Spacing attributes before the
// box apply to its start (ETS 300 706, chapter 12.2).
fn render_row(row: &[u16; COLUMNS], add_colors: bool) -> Option<String> {
    let mut col_start = row.iter().rposition(|&c| c == START_BOX)?;
    let mut col_stop = None;
    for (col, &c) in row.iter().enumerate().skip(col_start + 1) {
        if c > 0x20 {
            if col_stop.is_none() {
                col_start = col;
            }
            col_stop = Some(col);
        }
        if c == END_BOX {
            break;
        }
    }
    let col_stop = col_stop?;

    let mut line = String::new();
    let mut foreground = WHITE;
    let mut font_open = false;

    for (col, &cell) in row.iter().enumerate().take(col_stop + 1) {
        let mut v = cell;
        if col < col_start {
            if v <= WHITE {
                foreground = v;
            }
            continue;
        }

        if col == col_start && foreground != WHITE && add_colors {
            open_font(&mut line, foreground);
            font_open = true;
        }

        if v <= WHITE {
            // Spacing attributes are displayed as spaces.
            if add_colors {
                if font_open {
                    line.push_str("</font> ");
                    font_open = false;
                }
                // Black is rendered as white.
                if v > 0 && v < WHITE {
                    open_font(&mut line, v);
                    font_open = true;
                }
            } else {
                v = 0x20;
            }
        }

        if v >= 0x20 && add_colors {
            let entity = match v {
                0x3C => Some("&lt;"),
                0x3E => Some("&gt;"),
                0x26 => Some("&amp;"),
                _ => None,
            };
            if let Some(entity) = entity {
                line.push_str(entity);
                continue;
            }
        }

        if v >= 0x20 {
            if let Some(c) = char::from_u32(u32::from(v)) {
                line.push(c);
            }
        }
    }

    if add_colors && font_open {
        line.push_str("</font>");
    }
    Some(line)
}

// Teletext state of one PID.
#[derive(Debug, Clone)]
struct PidContext {
    time_stamper: TimeStamper,
    reset_pending: bool,
    receiving_data: bool,
    trans_mode: TransMode,
    current_page: u16,
    // Indexed by BCD page number.
    pages: BTreeMap<u16, TeletextPage>,
}

impl Default for PidContext {
    fn default() -> Self {
        Self {
            time_stamper: TimeStamper::new(),
            reset_pending: false,
            receiving_data: false,
            trans_mode: TransMode::Serial,
            current_page: 0,
            pages: BTreeMap::new(),
        }
    }
}

/// Extracts Teletext subtitles from TS packets.
///
/// PES packets are reassembled on all filtered PIDs, those carrying EBU
/// Teletext data produce [`TeletextFrame`]s through the handler. Call
/// [`flush_teletext`](Self::flush_teletext) after the last packet to get
/// the pages still in progress.
///
/// # Examples
///
/// ```
/// use tsdemux::codec::teletext::{TeletextDemux, TeletextFrame};
/// use tsdemux::format::ts::PidSet;
///
/// let mut demux = TeletextDemux::new(PidSet::from_pids([1068]))
///     .with_handler(|_: &mut TeletextDemux, frame: &TeletextFrame| print!("{}", frame.srt_frame()));
/// demux.set_add_colors(true);
/// demux.flush_teletext();
/// assert_eq!(demux.frame_count(889, 1068), 0);
/// ```
pub struct TeletextDemux {
    core: DemuxCore,
    handler: Option<Box<dyn TeletextHandler>>,
    handler_replaced: bool,
    assembler: PesAssembler,
    pids: BTreeMap<Pid, PidContext>,
    add_colors: bool,
    charset_group: u8,
    in_handler: bool,
    pid_in_handler: Pid,
    reset_pending: bool,
}

impl Default for TeletextDemux {
    fn default() -> Self {
        Self::new(PidSet::all())
    }
}

impl TeletextDemux {
    pub fn new(pid_filter: PidSet) -> Self {
        Self {
            core: DemuxCore::new(pid_filter),
            handler: None,
            handler_replaced: false,
            assembler: PesAssembler::new(),
            pids: BTreeMap::new(),
            add_colors: false,
            charset_group: 0,
            in_handler: false,
            pid_in_handler: PID_NULL,
            reset_pending: false,
        }
    }

    /// Creates a Teletext demux with the PID filter, color and charset
    /// settings of a configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut demux = Self::new(config.pid_filter.to_pid_set());
        demux.add_colors = config.teletext_colors;
        demux.set_default_charset_group(config.teletext_default_charset);
        demux
    }

    pub fn with_handler(mut self, handler: impl TeletextHandler + 'static) -> Self {
        self.set_handler(Some(Box::new(handler)));
        self
    }

    pub fn set_handler(&mut self, handler: Option<Box<dyn TeletextHandler>>) {
        self.handler = handler;
        self.handler_replaced = true;
    }

    /// Enables `<font color>` tags in frame lines.
    pub fn set_add_colors(&mut self, add_colors: bool) {
        self.add_colors = add_colors;
    }

    pub fn add_colors(&self) -> bool {
        self.add_colors
    }

    /// Sets the default G0 character set group. Page headers only carry
    /// the national option bits, the group completes the designation.
    pub fn set_default_charset_group(&mut self, group: u8) {
        self.charset_group = group & 0x0F;
    }

    /// Number of frames produced on a page.
    ///
    /// `page` is a decimal page number. With `PID_NULL`, the first PID
    /// having frames on this page is used.
    pub fn frame_count(&self, page: u16, pid: Pid) -> u32 {
        let bcd = page_binary_to_bcd(page);
        if pid != PID_NULL {
            self.pids
                .get(&pid)
                .and_then(|pc| pc.pages.get(&bcd))
                .map_or(0, |p| p.frame_count)
        } else {
            self.pids
                .values()
                .filter_map(|pc| pc.pages.get(&bcd))
                .map(|p| p.frame_count)
                .find(|&count| count > 0)
                .unwrap_or(0)
        }
    }

    /// Emits the frames of all pages in progress. To be called once after
    /// the last packet.
    pub fn flush_teletext(&mut self) {
        let tainted: Vec<(Pid, u16)> = self
            .pids
            .iter()
            .flat_map(|(&pid, pc)| {
                pc.pages
                    .iter()
                    .filter(|(_, page)| page.tainted)
                    .map(move |(&number, _)| (pid, number))
            })
            .collect();

        for (pid, number) in tainted {
            let last_pcr = self.core.last_pcr();
            let Some(pc) = self.pids.get_mut(&pid) else {
                continue;
            };
            let timestamp = pc.time_stamper.last_timestamp(last_pcr);
            match pc.pages.get_mut(&number) {
                Some(page) if page.tainted => page.hide_timestamp = timestamp,
                _ => continue,
            }
            // No more frames follow, the hide time is not shortened.
            self.process_teletext_page(pid, number);
            if let Some(page) = self.pids.get_mut(&pid).and_then(|pc| pc.pages.get_mut(&number)) {
                page.reset(timestamp);
            }
        }
    }

    // Returns false when a deferred reset was applied.
    fn handle_pes_packet(&mut self, packet: PesPacket) -> bool {
        let pid = packet.source_pid();
        let last_pcr = self.core.last_pcr();
        self.pids
            .entry(pid)
            .or_default()
            .time_stamper
            .process_pes_packet(&packet, last_pcr);

        let payload = packet.payload();
        match payload.first() {
            Some(id) if (TELETEXT_PES_FIRST_EBU_DATA_ID..=TELETEXT_PES_LAST_EBU_DATA_ID).contains(id) => {}
            _ => return true,
        }

        let mut data = &payload[1..];
        while data.len() >= 2 {
            let unit_id = data[0];
            let unit_size = usize::from(data[1]);
            data = &data[2..];

            if unit_size <= data.len()
                && unit_size == TELETEXT_PACKET_SIZE
                && (unit_id == TELETEXT_DATA_UNIT_ID_NON_SUBTITLE || unit_id == TELETEXT_DATA_UNIT_ID_SUBTITLE)
            {
                // Bytes are transmitted LSB first (ETS 300 706, chapter 7.1).
                let mut pkt = [0u8; TELETEXT_PACKET_SIZE];
                for (dst, src) in pkt.iter_mut().zip(data) {
                    *dst = src.reverse_bits();
                }
                if !self.process_teletext_packet(pid, unit_id, &pkt) {
                    return false;
                }
            }

            data = &data[unit_size.min(data.len())..];
        }
        true
    }

    // Decodes one Teletext packet: clock run-in, framing code, two address
    // bytes and 40 data bytes. Returns false when a deferred reset was applied.
    fn process_teletext_packet(&mut self, pid: Pid, unit_id: u8, pkt: &[u8; TELETEXT_PACKET_SIZE]) -> bool {
        let (Some(low), Some(high)) = (try_unham_8_4(pkt[2]), try_unham_8_4(pkt[3])) else {
            trace!("PID {:#06x}: uncorrectable Teletext packet address", pid);
            return true;
        };
        let address = (high << 4) | low;
        let m = match address & 0x07 {
            0 => 8,
            m => u16::from(m),
        };
        let y = usize::from((address >> 3) & 0x1F);
        let data = &pkt[4..];
        let designation = if y > 25 { unham_8_4(data[0]) } else { 0 };

        if y == 0 {
            return self.process_page_header(pid, unit_id, m, data);
        }

        let Some(pc) = self.pids.get_mut(&pid) else {
            return true;
        };
        if m != magazine_of(pc.current_page) {
            return true;
        }
        let current = pc.current_page;

        match y {
            1..=23 if pc.receiving_data => {
                // Characters from X/26 enhancements are received first and
                // are not overwritten.
                let page = pc.pages.entry(current).or_default();
                for (cell, &byte) in page.text[y].iter_mut().zip(data) {
                    if *cell == 0 {
                        *cell = page.charset.to_char(byte);
                    }
                }
                page.tainted = true;
            }
            26 if pc.receiving_data => {
                let page = pc.pages.entry(current).or_default();
                process_enhancements(page, data);
            }
            28 if pc.receiving_data => {
                if designation == 0 || designation == 4 {
                    // X/28/0 format 1 and X/28/4.
                    if let Some(triplet) = unham_24_18(triplet_at(data, 1)) {
                        if triplet & 0x0F == 0 {
                            let page = pc.pages.entry(current).or_default();
                            page.charset.set_x28(((triplet & 0x3F80) >> 7) as u8);
                        }
                    }
                }
            }
            29 => {
                if designation == 0 || designation == 4 {
                    // M/29/0 and M/29/4.
                    if let Some(triplet) = unham_24_18(triplet_at(data, 1)) {
                        if triplet & 0xFF == 0 {
                            let page = pc.pages.entry(current).or_default();
                            page.charset.set_m29(((triplet & 0x3F80) >> 7) as u8);
                        }
                    }
                }
            }
            _ => {}
        }
        true
    }

    // Page header, packet X/0.
    fn process_page_header(&mut self, pid: Pid, unit_id: u8, m: u16, data: &[u8]) -> bool {
        let page_number = (m << 8) | u16::from(unham_8_4(data[1])) << 4 | u16::from(unham_8_4(data[0]));
        let control = unham_8_4(data[7]);
        let designation = (self.charset_group << 3) | ((control & 0x0E) >> 1);
        let last_pcr = self.core.last_pcr();

        let pc = self.pids.entry(pid).or_default();

        // In serial mode a page ends with the next header, in parallel mode
        // with the next header of the same magazine (ETS 300 706, 7.2.1).
        pc.trans_mode = if control & 0x01 != 0 {
            TransMode::Serial
        } else {
            TransMode::Parallel
        };
        if pc.trans_mode == TransMode::Parallel && unit_id != TELETEXT_DATA_UNIT_ID_SUBTITLE {
            return true;
        }

        if pc.receiving_data && page_of(page_number) != page_of(pc.current_page) {
            let ends = match pc.trans_mode {
                TransMode::Serial => true,
                TransMode::Parallel => m == magazine_of(pc.current_page),
            };
            if ends {
                debug!(
                    "PID {:#06x}: teletext page {:03x} ends, page {:03x} starts",
                    pid, pc.current_page, page_number
                );
                pc.receiving_data = false;
            }
        }

        // A new frame starts on this page, the previous one is complete.
        let timestamp = pc.time_stamper.last_timestamp(last_pcr);
        let page = pc.pages.entry(page_number).or_default();
        if page.tainted {
            page.hide_timestamp = timestamp.saturating_sub(FRAME_DURATION_MS);
            if !self.process_teletext_page(pid, page_number) {
                return false;
            }
        }

        let pc = self.pids.entry(pid).or_default();
        pc.current_page = page_number;
        pc.receiving_data = true;
        let page = pc.pages.entry(page_number).or_default();
        page.reset(timestamp);
        page.charset.reset_x28(designation);
        true
    }

    // Returns false when a deferred reset was applied.
    fn process_teletext_page(&mut self, pid: Pid, page_number: u16) -> bool {
        let add_colors = self.add_colors;
        let frame = self
            .pids
            .get_mut(&pid)
            .and_then(|pc| pc.pages.get_mut(&page_number))
            .and_then(|page| page.build_frame(pid, page_number, add_colors));
        match frame {
            Some(frame) => self.dispatch(frame),
            None => true,
        }
    }

    fn dispatch(&mut self, frame: TeletextFrame) -> bool {
        let pid = frame.pid;
        trace!(
            "teletext frame {} of page {} on PID {:#06x}, {} lines",
            frame.frame_count,
            frame.page,
            pid,
            frame.lines.len()
        );

        self.in_handler = true;
        self.pid_in_handler = pid;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(mut handler) = self.handler.take() {
                self.handler_replaced = false;
                handler.handle_teletext_message(self, &frame);
                if !self.handler_replaced {
                    self.handler = Some(handler);
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
        !(full_reset || pid_reset)
    }
}

// Three bytes of a Hamming 24/18 triplet, least significant first.
fn triplet_at(data: &[u8], index: usize) -> u32 {
    u32::from(data[index + 2]) << 16 | u32::from(data[index + 1]) << 8 | u32::from(data[index])
}

// Packet X/26, 13 triplets of enhancement data (ETS 300 706, 12.3).
fn process_enhancements(page: &mut TeletextPage, data: &[u8]) {
    let mut row = 0usize;

    for index in (1..COLUMNS).step_by(3) {
        let Some(triplet) = unham_24_18(triplet_at(data, index)) else {
            continue;
        };
        let tdata = ((triplet & 0x3_F800) >> 11) as u8;
        let mode = ((triplet & 0x7C0) >> 6) as u8;
        let address = (triplet & 0x3F) as u8;
        let row_address_group = (40..=63).contains(&address);
        let diacritical = (0x11..=0x1F).contains(&mode);

        if row_address_group {
            match mode {
                // Set active position.
                0x04 => {
                    row = match address - 40 {
                        0 => 24,
                        r => usize::from(r),
                    };
                }
                // Termination marker.
                _ if diacritical => break,
                _ => {}
            }
        } else if tdata > 31 {
            // Column addresses are below 40 here.
            let cell = &mut page.text[row][usize::from(address)];
            if mode == 0x0F {
                // Character from the G2 set.
                *cell = page.charset.g2_char(tdata);
            } else if diacritical {
                // G0 character with a diacritical mark.
                *cell = page.charset.g2_accent_char(tdata, mode - 0x11);
            }
        }
    }
}

impl Demux for TeletextDemux {
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
            if !self.handle_pes_packet(packet) {
                return;
            }
        }
        self.assembler.accumulate(pkt, self.core.packet_count());
    }

    /// Forgets all pages and partial PES packets.
    ///
    /// Inside a handler, the reset is delayed until the handler returns.
    fn reset(&mut self) {
        if self.in_handler {
            self.reset_pending = true;
        } else {
            self.pids.clear();
            self.assembler.clear();
        }
    }

    fn reset_pid(&mut self, pid: Pid) {
        if self.in_handler && self.pid_in_handler == pid {
            self.pids.entry(pid).or_default().reset_pending = true;
        } else {
            self.pids.remove(&pid);
            self.assembler.remove(pid);
        }
    }
}
