use crate::format::ts::types::Pid;
use std::fmt::Write;

/// One subtitle frame extracted from a Teletext page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeletextFrame {
    pub pid: Pid,
    /// Decimal page number, magazine times 100 plus page.
    pub page: u16,
    /// Frame counter in the page, starting at 1.
    pub frame_count: u32,
    /// Show time in milliseconds from the start of the stream.
    pub show_timestamp: u64,
    /// Hide time in milliseconds from the start of the stream.
    pub hide_timestamp: u64,
    /// Text lines, with optional `<font>` tags.
    pub lines: Vec<String>,
}

impl TeletextFrame {
    pub fn new(pid: Pid, page: u16, frame_count: u32, show_timestamp: u64, hide_timestamp: u64) -> Self {
        Self {
            pid,
            page,
            frame_count,
            show_timestamp,
            hide_timestamp,
            lines: Vec::new(),
        }
    }

    pub fn add_line(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn srt_show_timestamp(&self) -> String {
        to_srt_time(self.show_timestamp)
    }

    pub fn srt_hide_timestamp(&self) -> String {
        to_srt_time(self.hide_timestamp)
    }

    /// Show and hide times, as on the second line of an SRT frame.
    pub fn srt_duration(&self) -> String {
        format!("{} --> {}", self.srt_show_timestamp(), self.srt_hide_timestamp())
    }

    /// The complete frame in SRT format, including the trailing empty line.
    pub fn srt_frame(&self) -> String {
        let mut out = format!("{}\n{}\n", self.frame_count, self.srt_duration());
        for line in &self.lines {
            let _ = writeln!(out, "{}", line);
        }
        out.push('\n');
        out
    }
}

/// Formats milliseconds as `HH:MM:SS,mmm`.
pub fn to_srt_time(timestamp: u64) -> String {
    let h = timestamp / 3_600_000;
    let m = (timestamp / 60_000) % 60;
    let s = (timestamp / 1000) % 60;
    let ms = timestamp % 1000;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_srt_time() {
        assert_eq!(to_srt_time(0), "00:00:00,000");
        assert_eq!(to_srt_time(3_723_004), "01:02:03,004");
        assert_eq!(to_srt_time(100 * 3_600_000), "100:00:00,000");
    }

    #[test]
    fn test_srt_frame() {
        let mut frame = TeletextFrame::new(1068, 889, 3, 1500, 4460);
        frame.add_line("Bonjour".into());
        frame.add_line("<font color=\"#ffff00\">Salut</font>".into());
        assert_eq!(frame.srt_duration(), "00:00:01,500 --> 00:00:04,460");
        assert_eq!(
            frame.srt_frame(),
            "3\n00:00:01,500 --> 00:00:04,460\nBonjour\n<font color=\"#ffff00\">Salut</font>\n\n"
        );
    }
}
