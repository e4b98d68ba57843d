use std::num::ParseIntError;
use thiserror::Error;

/// Errors reported by the value types, codecs and packet sources of this crate.
///
/// Malformed transport streams never produce an error inside the demuxers,
/// they are accounted for in the demux status counters instead.
#[derive(Error, Debug)]
pub enum TsError {
    /// Underlying I/O failure of a packet source or sink.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary content which does not follow the expected layout.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Section which cannot be built or does not pass the CRC check.
    #[error("invalid section: {0}")]
    InvalidSection(String),

    /// Section which cannot be added to a table.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// A typed table or descriptor cannot be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A binary table or descriptor cannot be interpreted.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// Integer parsing failure in configuration values.
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TsError>;
