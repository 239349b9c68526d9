//! Batch export for Forge
//!
//! Resolves a list of library tracks, masters each one with a shared
//! [`MasteringRequest`](forge_mastering::MasteringRequest) and packages the
//! results into one ZIP archive.
//!
//! # Example
//!
//! ```ignore
//! use forge_export::{BatchExportRequest, BatchExporter, ManifestLibrary};
//!
//! let library = ManifestLibrary::load(Path::new("tracks.json"))?;
//! let exporter = BatchExporter::new(library);
//! let archive = exporter.export(&BatchExportRequest::new(ids, Default::default()))?;
//! archive.write_to(Path::new("./exports"))?;
//! ```

#![deny(unsafe_code)]

mod error;
pub mod exporter;
pub mod filename;
pub mod library;

pub use error::{ExportError, Result};
pub use exporter::{
    archive_filename, BatchExportRequest, BatchExporter, ExportArchive, ExportEntry,
    ARCHIVE_CONTENT_TYPE, MAX_TRACKS_PER_EXPORT,
};
pub use filename::{sanitize_filename, UniqueNames};
pub use library::{InMemoryLibrary, ManifestLibrary, TrackLibrary, TrackSource};
