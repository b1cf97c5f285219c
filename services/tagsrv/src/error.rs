//! Error handling for the tag gateway service

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, TagSrvError>;

/// Gateway service errors
#[derive(Debug, Error, Clone)]
pub enum TagSrvError {
    /// Bad or missing configuration, rejected synchronously
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration file problems
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport unreachable or refused
    #[error("Connection error: {0}")]
    Connection(String),

    /// Protocol-level failure on an established link
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation exceeded its deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Register data could not be decoded or encoded
    #[error("Codec error: {0}")]
    Codec(#[from] tagcodec::CodecError),

    /// Tag lookup failure
    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// Unknown slave name
    #[error("Slave not found: {0}")]
    SlaveNotFound(String),

    /// Filesystem or serialization failure on the tag table
    #[error("IO error: {0}")]
    Io(String),
}

impl TagSrvError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TagSrvError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        TagSrvError::Config(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        TagSrvError::Connection(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        TagSrvError::Protocol(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        TagSrvError::Timeout(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        TagSrvError::Io(msg.into())
    }
}

impl From<std::io::Error> for TagSrvError {
    fn from(err: std::io::Error) -> Self {
        TagSrvError::Io(err.to_string())
    }
}

impl From<csv::Error> for TagSrvError {
    fn from(err: csv::Error) -> Self {
        TagSrvError::Io(format!("CSV: {err}"))
    }
}

impl From<serde_yaml::Error> for TagSrvError {
    fn from(err: serde_yaml::Error) -> Self {
        TagSrvError::Config(format!("YAML: {err}"))
    }
}

/// Failures of a single on-demand tag write
#[derive(Debug, Error, Clone)]
pub enum WriteError {
    #[error("unknown tag: {0}")]
    UnknownTag(String),

    #[error("tag {0} is not writable")]
    NotWritable(String),

    #[error("connection failure: {0}")]
    Connection(String),

    #[error("encode failure: {0}")]
    Encode(String),
}

impl From<tagcodec::CodecError> for WriteError {
    fn from(err: tagcodec::CodecError) -> Self {
        WriteError::Encode(err.to_string())
    }
}
