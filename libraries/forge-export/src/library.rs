//! Track lookup collaborators
//!
//! The exporter only needs to turn an identifier into a source file and a
//! display title. Where those come from (a database, a manifest, a test
//! fixture) is behind [`TrackLibrary`].

use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A track as the exporter sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSource {
    pub id: String,
    #[serde(rename = "audio_path")]
    pub source_path: PathBuf,
    #[serde(default)]
    pub title: Option<String>,
}

impl TrackSource {
    pub fn new(id: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source_path: source_path.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title if it has any visible text, otherwise the id
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// Resolves track identifiers to source audio
pub trait TrackLibrary {
    /// Look up one track; `Ok(None)` when the id is unknown
    fn resolve(&self, id: &str) -> Result<Option<TrackSource>>;
}

impl<L: TrackLibrary + ?Sized> TrackLibrary for &L {
    fn resolve(&self, id: &str) -> Result<Option<TrackSource>> {
        (**self).resolve(id)
    }
}

/// Library held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary {
    tracks: HashMap<String, TrackSource>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a track
    pub fn insert(&mut self, track: TrackSource) -> Option<TrackSource> {
        self.tracks.insert(track.id.clone(), track)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl FromIterator<TrackSource> for InMemoryLibrary {
    fn from_iter<I: IntoIterator<Item = TrackSource>>(iter: I) -> Self {
        let mut library = Self::new();
        for track in iter {
            library.insert(track);
        }
        library
    }
}

impl TrackLibrary for InMemoryLibrary {
    fn resolve(&self, id: &str) -> Result<Option<TrackSource>> {
        Ok(self.tracks.get(id).cloned())
    }
}

/// Library read from a JSON manifest
///
/// ```json
/// [
///   { "id": "a1", "audio_path": "renders/a1.wav", "title": "Opening" }
/// ]
/// ```
///
/// Relative `audio_path`s are resolved against the manifest's directory.
#[derive(Debug, Clone)]
pub struct ManifestLibrary {
    path: Option<PathBuf>,
    inner: InMemoryLibrary,
}

impl ManifestLibrary {
    /// Read and parse a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Library(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let library = Self::from_json(&contents, base)?;
        debug!("Loaded {} tracks from {}", library.len(), path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..library
        })
    }

    /// Parse manifest JSON, resolving relative paths against `base`
    pub fn from_json(json: &str, base: &Path) -> Result<Self> {
        let entries: Vec<TrackSource> = serde_json::from_str(json)
            .map_err(|e| ExportError::Library(format!("Invalid manifest: {}", e)))?;

        let mut inner = InMemoryLibrary::new();
        for mut track in entries {
            if track.source_path.is_relative() {
                track.source_path = base.join(&track.source_path);
            }
            let id = track.id.clone();
            if inner.insert(track).is_some() {
                warn!("Duplicate track id '{}' in manifest, keeping the last entry", id);
            }
        }

        Ok(Self { path: None, inner })
    }

    /// Manifest file this library was loaded from, `None` when parsed
    /// from a string
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl TrackLibrary for ManifestLibrary {
    fn resolve(&self, id: &str) -> Result<Option<TrackSource>> {
        self.inner.resolve(id)
    }
}
