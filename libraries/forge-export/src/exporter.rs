//! Batch mastering into a single ZIP archive
//!
//! All-or-nothing: every track is resolved and its source checked before
//! any audio is processed, and the first mastering failure aborts the
//! batch without producing an archive.

use crate::error::{ExportError, Result};
use crate::filename::{sanitize_filename, UniqueNames};
use crate::library::{TrackLibrary, TrackSource};
use forge_mastering::{CompressedEncoder, MasteringPipeline, MasteringRequest, OutputCodec};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Most tracks a single export may contain
pub const MAX_TRACKS_PER_EXPORT: usize = 50;

/// MIME type of every archive
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Tracks to export and how to master them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExportRequest {
    pub track_ids: Vec<String>,
    #[serde(default)]
    pub mastering: MasteringRequest,
}

impl BatchExportRequest {
    pub fn new(track_ids: Vec<String>, mastering: MasteringRequest) -> Self {
        Self {
            track_ids,
            mastering,
        }
    }

    /// Check track count and mastering ranges
    pub fn validate(&self) -> Result<()> {
        if self.track_ids.is_empty() {
            return Err(ExportError::EmptyRequest);
        }
        if self.track_ids.len() > MAX_TRACKS_PER_EXPORT {
            return Err(ExportError::TooManyTracks {
                requested: self.track_ids.len(),
                max: MAX_TRACKS_PER_EXPORT,
            });
        }
        self.mastering
            .validate()
            .map_err(|e| ExportError::InvalidRequest(e.to_string()))
    }
}

/// One file inside the archive
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportEntry {
    pub track_id: String,
    pub file_name: String,
    pub loudness_after_db: f64,
    pub true_peak_after_db: f64,
}

/// Finished archive, ready to hand to a client or write to disk
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub entries: Vec<ExportEntry>,
}

impl ExportArchive {
    pub fn content_type(&self) -> &'static str {
        ARCHIVE_CONTENT_TYPE
    }

    /// Write the archive into `directory` under its own filename
    pub fn write_to(&self, directory: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Archive name for a codec
pub fn archive_filename(codec: OutputCodec) -> &'static str {
    match codec {
        OutputCodec::Mp3 { .. } => "mp3_export.zip",
        OutputCodec::Pcm16 => "mastered_export.zip",
    }
}

/// Masters a list of library tracks into one archive
pub struct BatchExporter<L> {
    library: L,
    compressed: Option<Arc<dyn CompressedEncoder>>,
}

impl<L: TrackLibrary> BatchExporter<L> {
    pub fn new(library: L) -> Self {
        Self {
            library,
            compressed: None,
        }
    }

    /// Encoder used when the request asks for a compressed codec
    pub fn with_compressed_encoder(mut self, encoder: Arc<dyn CompressedEncoder>) -> Self {
        self.compressed = Some(encoder);
        self
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    /// Resolve every id, failing with the full list of problems
    fn resolve_all(&self, ids: &[String]) -> Result<Vec<TrackSource>> {
        let mut tracks = Vec::with_capacity(ids.len());
        let mut unresolved = Vec::new();
        let mut missing = Vec::new();

        for id in ids {
            match self.library.resolve(id)? {
                None => unresolved.push(id.clone()),
                Some(track) if !track.source_path.is_file() => {
                    missing.push(track.display_name().to_string());
                }
                Some(track) => tracks.push(track),
            }
        }

        match (unresolved.is_empty(), missing.is_empty()) {
            (true, true) => Ok(tracks),
            (false, true) => Err(ExportError::UnresolvedTracks(unresolved)),
            (true, false) => Err(ExportError::MissingAudio(missing)),
            (false, false) => Err(ExportError::UnresolvedAndMissing {
                unresolved,
                missing,
            }),
        }
    }

    /// Master every requested track and package the results
    ///
    /// # Errors
    /// Input errors for bad requests and unresolvable or missing tracks,
    /// a processing error naming the first track that failed to master,
    /// IO errors if the archive cannot be written
    pub fn export(&self, request: &BatchExportRequest) -> Result<ExportArchive> {
        request.validate()?;

        let mut pipeline = MasteringPipeline::new(request.mastering)
            .map_err(|e| ExportError::InvalidRequest(e.to_string()))?;
        if let Some(encoder) = &self.compressed {
            pipeline = pipeline.with_compressed_encoder(Arc::clone(encoder));
        }

        let tracks = self.resolve_all(&request.track_ids)?;
        let codec = request.mastering.codec;
        let started = Instant::now();
        info!("Exporting {} tracks as {}", tracks.len(), codec);

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut names = UniqueNames::new();
        let mut entries = Vec::with_capacity(tracks.len());

        for (index, track) in tracks.iter().enumerate() {
            let name = track.display_name();
            info!("[{}/{}] Mastering '{}'", index + 1, tracks.len(), name);

            let result = pipeline.master_file(&track.source_path).map_err(|source| {
                error!("Mastering failed for '{}': {}", name, source);
                ExportError::TrackFailed {
                    track: name.to_string(),
                    source,
                }
            })?;

            let file_name = names.claim(&sanitize_filename(name), codec.extension());
            zip.start_file(file_name.clone(), options)?;
            zip.write_all(&result.bytes)?;

            entries.push(ExportEntry {
                track_id: track.id.clone(),
                file_name,
                loudness_after_db: result.report.loudness_after_db,
                true_peak_after_db: result.report.true_peak_after_db,
            });
        }

        let bytes = zip.finish()?.into_inner();
        info!(
            "Export finished: {} tracks, {} bytes in {:.1}s",
            entries.len(),
            bytes.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(ExportArchive {
            bytes,
            filename: archive_filename(codec).to_string(),
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::InMemoryLibrary;
    use forge_mastering::ErrorKind;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[test]
    fn test_request_bounds() {
        let empty = BatchExportRequest::new(Vec::new(), MasteringRequest::default());
        assert!(matches!(empty.validate(), Err(ExportError::EmptyRequest)));

        let full = BatchExportRequest::new(ids(50), MasteringRequest::default());
        assert!(full.validate().is_ok());

        let over = BatchExportRequest::new(ids(51), MasteringRequest::default());
        let err = over.validate().unwrap_err();
        assert!(matches!(err, ExportError::TooManyTracks { requested: 51, max: 50 }));
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_invalid_mastering_settings_are_input_errors() {
        let mastering = MasteringRequest {
            true_peak_ceiling_db: 2.0,
            ..Default::default()
        };
        let err = BatchExportRequest::new(ids(1), mastering).validate().unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
    }

    #[test]
    fn test_archive_filename_by_codec() {
        assert_eq!(archive_filename(OutputCodec::Pcm16), "mastered_export.zip");
        assert_eq!(archive_filename(OutputCodec::mp3()), "mp3_export.zip");
    }

    #[test]
    fn test_unresolved_ids_are_all_reported() {
        let library: InMemoryLibrary = vec![TrackSource::new("known", "/nowhere.wav")]
            .into_iter()
            .collect();
        let exporter = BatchExporter::new(library);
        let request = BatchExportRequest::new(
            vec!["a".into(), "known".into(), "b".into()],
            MasteringRequest::default(),
        );

        match exporter.export(&request) {
            Err(ExportError::UnresolvedTracks(missing)) => assert_eq!(missing, vec!["a", "b"]),
            other => panic!("expected unresolved tracks, got {:?}", other.map(|a| a.filename)),
        }
    }

    #[test]
    fn test_unresolved_and_missing_are_reported_together() {
        let library: InMemoryLibrary = vec![TrackSource::new("gone", "/nowhere.wav").with_title("Gone")]
            .into_iter()
            .collect();
        let exporter = BatchExporter::new(library);
        let request = BatchExportRequest::new(
            vec!["gone".into(), "ghost".into()],
            MasteringRequest::default(),
        );

        let err = exporter.export(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        match err {
            ExportError::UnresolvedAndMissing { unresolved, missing } => {
                assert_eq!(unresolved, vec!["ghost"]);
                assert_eq!(missing, vec!["Gone"]);
            }
            other => panic!("expected both lists, got {}", other),
        }
    }

    #[test]
    fn test_request_deserializes_with_default_mastering() {
        let request: BatchExportRequest = serde_json::from_str(r#"{ "track_ids": ["x", "y"] }"#).unwrap();
        assert_eq!(request.track_ids.len(), 2);
        assert_eq!(request.mastering, MasteringRequest::default());
    }
}
