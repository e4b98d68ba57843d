/// SubRip subtitle output
pub mod srt;

/// MPEG transport stream demultiplexing
pub mod ts;
