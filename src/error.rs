//! Error types for the chime appliance

use thiserror::Error;

/// Result type alias for chime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the chime appliance
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Allocation failure for a capture or decode buffer
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Backing-store open/write/seek failure
    #[error("storage error: {0}")]
    Storage(String),

    /// No configured network became reachable in time
    #[error("network join timed out")]
    JoinTimeout,

    /// Audio peripheral error
    #[error("audio error: {0}")]
    Audio(String),

    /// Non-success status from a cloud stage
    #[error("cloud stage returned HTTP {0}")]
    HttpStatus(u16),

    /// Recognize response was well-formed but had no results
    #[error("no transcription in recognize response")]
    NoTranscription,

    /// Infer response was well-formed but had no candidates
    #[error("no candidate in infer response")]
    NoCandidate,

    /// Synthesize response was well-formed but had no audio content
    #[error("no audio content in synthesize response")]
    NoAudioContent,

    /// Zero-length clip presented to a stage
    #[error("empty audio clip")]
    EmptyAudio,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from a cloud stage
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Tag identifying the class of a fault, carried in a
/// [`FaultRecord`](crate::pipeline::FaultRecord) for the display collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    OutOfMemory,
    Storage,
    JoinTimeout,
    Http,
    Parse,
    NoTranscription,
    NoCandidate,
    NoAudioContent,
    EmptyAudio,
    Other,
}

impl Error {
    /// Classify this error for fault reporting
    #[must_use]
    pub const fn fault_kind(&self) -> FaultKind {
        match self {
            Self::OutOfMemory(_) => FaultKind::OutOfMemory,
            Self::Storage(_) | Self::Io(_) => FaultKind::Storage,
            Self::JoinTimeout => FaultKind::JoinTimeout,
            Self::HttpStatus(_) | Self::Http(_) => FaultKind::Http,
            Self::Parse(_) => FaultKind::Parse,
            Self::NoTranscription => FaultKind::NoTranscription,
            Self::NoCandidate => FaultKind::NoCandidate,
            Self::NoAudioContent => FaultKind::NoAudioContent,
            Self::EmptyAudio => FaultKind::EmptyAudio,
            Self::Config(_) | Self::Audio(_) | Self::Toml(_) => FaultKind::Other,
        }
    }
}
