/// EBU Teletext subtitles
pub mod teletext;

// Re-export common types and functions
pub use teletext::{TeletextDemux, TeletextFrame, TeletextHandler};
