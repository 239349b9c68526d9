//! Error types for batch export

use forge_mastering::{ErrorKind, MasteringError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export request contains no tracks")]
    EmptyRequest,

    #[error("Export request has {requested} tracks, at most {max} allowed")]
    TooManyTracks { requested: usize, max: usize },

    #[error("Invalid export request: {0}")]
    InvalidRequest(String),

    #[error("Tracks not found: {}", .0.join(", "))]
    UnresolvedTracks(Vec<String>),

    #[error("Audio file missing for: {}", .0.join(", "))]
    MissingAudio(Vec<String>),

    #[error(
        "Tracks not found: {}; audio file missing for: {}",
        .unresolved.join(", "),
        .missing.join(", ")
    )]
    UnresolvedAndMissing {
        unresolved: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Track library error: {0}")]
    Library(String),

    #[error("Mastering failed for '{track}': {source}")]
    TrackFailed {
        track: String,
        #[source]
        source: MasteringError,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyRequest
            | Self::TooManyTracks { .. }
            | Self::InvalidRequest(_)
            | Self::UnresolvedTracks(_)
            | Self::MissingAudio(_)
            | Self::UnresolvedAndMissing { .. }
            | Self::Library(_) => ErrorKind::Input,
            Self::TrackFailed { .. } => ErrorKind::Processing,
            Self::Archive(_) | Self::Io(_) => ErrorKind::Io,
        }
    }
}
