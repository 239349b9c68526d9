//! Error types for mastering

use std::path::PathBuf;
use thiserror::Error;

/// Result type for mastering operations
pub type Result<T> = std::result::Result<T, MasteringError>;

/// Broad classification of a mastering failure
///
/// Callers map these to user-facing responses: input problems are the
/// caller's fault, processing problems point at the audio or the pipeline,
/// I/O problems at the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Processing,
    Io,
}

/// Errors that can occur while loading, mastering or encoding a track
#[derive(Error, Debug)]
pub enum MasteringError {
    /// Source file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Source could not be opened, probed or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Source decoded successfully but held no audio
    #[error("No audio samples decoded from {}", .0.display())]
    EmptyInput(PathBuf),

    /// Mastering request outside its accepted ranges
    #[error("Invalid mastering request: {0}")]
    InvalidRequest(String),

    /// A processing stage received a buffer without samples
    #[error("Empty audio buffer passed to {0}")]
    EmptyBuffer(&'static str),

    /// Buffer shape is inconsistent
    #[error("Invalid audio buffer: {0}")]
    InvalidBuffer(String),

    /// NaN or infinity found in the buffer
    #[error("Non-finite sample after {stage} (channel {channel}, frame {frame})")]
    NonFinite {
        stage: &'static str,
        channel: usize,
        frame: usize,
    },

    /// Sample rate of zero or otherwise unusable
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// Filter design failed
    #[error("Filter design failed: {0}")]
    Filter(String),

    /// Resampling failed
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// Encoding the final buffer failed
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MasteringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound(_)
            | Self::Decode(_)
            | Self::EmptyInput(_)
            | Self::InvalidRequest(_) => ErrorKind::Input,
            Self::EmptyBuffer(_)
            | Self::InvalidBuffer(_)
            | Self::NonFinite { .. }
            | Self::InvalidSampleRate(_)
            | Self::Filter(_)
            | Self::Resample(_)
            | Self::Encode(_) => ErrorKind::Processing,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<hound::Error> for MasteringError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Self::Io(e),
            other => Self::Encode(other.to_string()),
        }
    }
}

impl From<biquad::Errors> for MasteringError {
    fn from(err: biquad::Errors) -> Self {
        Self::Filter(format!("{:?}", err))
    }
}
