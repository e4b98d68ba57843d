//! SubRip (SRT) subtitle output.

use crate::codec::teletext::{to_srt_time, TeletextDemux, TeletextFrame, TeletextHandler};
use crate::error::Result;
use log::warn;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Writes subtitle frames in SRT format.
///
/// Frames are numbered from 1. Empty lines are illegal in SRT, they are
/// skipped and frames without any text are not written.
pub struct SubRipGenerator<W: Write> {
    writer: W,
    frame_count: u32,
}

impl<W: Write> SubRipGenerator<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frame_count: 0,
        }
    }

    /// Writes one frame, timestamps in milliseconds.
    pub fn add_frame<S: AsRef<str>>(&mut self, show_timestamp: u64, hide_timestamp: u64, lines: &[S]) -> Result<()> {
        if lines.iter().all(|line| line.as_ref().is_empty()) {
            return Ok(());
        }
        self.frame_count += 1;
        writeln!(self.writer, "{}", self.frame_count)?;
        writeln!(
            self.writer,
            "{} --> {}",
            to_srt_time(show_timestamp),
            to_srt_time(hide_timestamp)
        )?;
        for line in lines.iter().map(|line| line.as_ref()).filter(|line| !line.is_empty()) {
            writeln!(self.writer, "{}", line)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Teletext handler writing the frames of one page as SRT.
///
/// The generator is shared, so that the output can be collected after the
/// handler has been given to the demux.
///
/// # Examples
///
/// ```
/// use tsdemux::codec::teletext::TeletextDemux;
/// use tsdemux::format::srt::SrtTeletextWriter;
///
/// let writer = SrtTeletextWriter::new(889, Vec::new());
/// let output = writer.output();
/// let mut demux = TeletextDemux::default().with_handler(writer);
/// demux.flush_teletext();
/// assert!(output.lock().get_ref().is_empty());
/// ```
pub struct SrtTeletextWriter<W: Write> {
    page: u16,
    output: Arc<Mutex<SubRipGenerator<W>>>,
}

impl<W: Write> SrtTeletextWriter<W> {
    /// Writes the frames of the decimal `page` into `writer`.
    pub fn new(page: u16, writer: W) -> Self {
        Self {
            page,
            output: Arc::new(Mutex::new(SubRipGenerator::new(writer))),
        }
    }

    pub fn page(&self) -> u16 {
        self.page
    }

    pub fn output(&self) -> Arc<Mutex<SubRipGenerator<W>>> {
        Arc::clone(&self.output)
    }
}

impl<W: Write> TeletextHandler for SrtTeletextWriter<W> {
    fn handle_teletext_message(&mut self, _demux: &mut TeletextDemux, frame: &TeletextFrame) {
        if frame.page != self.page {
            return;
        }
        let mut output = self.output.lock();
        if let Err(e) = output.add_frame(frame.show_timestamp, frame.hide_timestamp, frame.lines.as_slice()) {
            warn!("cannot write SRT frame {} of page {}: {}", frame.frame_count, frame.page, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generator() {
        let mut srt = SubRipGenerator::new(Vec::new());
        srt.add_frame(1000, 2500, &["Hello", "", "World"]).unwrap();
        srt.add_frame(3000, 4000, &["", ""]).unwrap();
        srt.add_frame(61_000, 62_040, &["Bye"]).unwrap();
        assert_eq!(srt.frame_count(), 2);
        let text = String::from_utf8(srt.into_inner()).unwrap();
        assert_eq!(
            text,
            "1\n00:00:01,000 --> 00:00:02,500\nHello\nWorld\n\n2\n00:01:01,000 --> 00:01:02,040\nBye\n\n"
        );
    }

    #[test]
    fn test_writer_filters_page() {
        let mut writer = SrtTeletextWriter::new(889, Vec::new());
        let output = writer.output();
        let mut demux = TeletextDemux::default();

        let mut frame = TeletextFrame::new(1068, 888, 1, 0, 1000);
        frame.add_line("other page".into());
        writer.handle_teletext_message(&mut demux, &frame);

        frame.page = 889;
        frame.lines = vec!["Salut".into()];
        writer.handle_teletext_message(&mut demux, &frame);

        let output = output.lock();
        assert_eq!(output.frame_count(), 1);
        assert_eq!(output.get_ref().as_slice(), b"1\n00:00:00,000 --> 00:00:01,000\nSalut\n\n");
    }
}
