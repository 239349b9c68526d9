//! Batch export scenarios, from request to archive contents


use forge_export::{
    BatchExportRequest, BatchExporter, ExportError, InMemoryLibrary, ManifestLibrary,
    TrackLibrary, TrackSource,
};
use forge_mastering::{CompressedEncoder, ErrorKind, MasteringRequest, OutputCodec};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::{init_logging, tone_library, write_tone};
use zip::ZipArchive;

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Counts calls and returns a fixed payload
struct CountingEncoder {
    calls: AtomicUsize,
}

impl CompressedEncoder for CountingEncoder {
    fn encode(&self, _pcm: &[i16], _channels: u16, _sample_rate: u32, bitrate_kbps: u32) -> forge_mastering::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mp3@{}", bitrate_kbps).into_bytes())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Library whose lookups always fail
struct BrokenLibrary;

impl TrackLibrary for BrokenLibrary {
    fn resolve(&self, _id: &str) -> forge_export::Result<Option<TrackSource>> {
        Err(ExportError::Library("connection refused".to_string()))
    }
}

#[test]
fn test_duplicate_titles_get_unique_entries() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let library = tone_library(
        dir.path(),
        &[("a", Some("Same")), ("b", Some("Same")), ("c", Some("Other / Mix"))],
    );

    let exporter = BatchExporter::new(library);
    let request = BatchExportRequest::new(ids(&["a", "b", "c"]), MasteringRequest::default());
    let archive = exporter.export(&request).unwrap();

    assert_eq!(archive.filename, "mastered_export.zip");
    assert_eq!(archive.content_type(), "application/zip");
    assert_eq!(entry_names(&archive.bytes), vec!["Same.wav", "Same_1.wav", "Other_Mix.wav"]);

    let track_ids: Vec<&str> = archive.entries.iter().map(|e| e.track_id.as_str()).collect();
    assert_eq!(track_ids, vec!["a", "b", "c"]);
    for entry in &archive.entries {
        assert!((entry.loudness_after_db + 14.0).abs() < 0.5, "{:?}", entry);
        assert!(entry.true_peak_after_db <= -0.95, "{:?}", entry);
    }
}

#[test]
fn test_entries_are_valid_wav_files() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let library = tone_library(dir.path(), &[("solo", None)]);

    let request = BatchExportRequest::new(
        ids(&["solo"]),
        MasteringRequest {
            target_sample_rate: 48000,
            ..Default::default()
        },
    );
    let archive = BatchExporter::new(library).export(&request).unwrap();

    let mut zip = ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
    let mut file = zip.by_name("solo.wav").unwrap();
    assert_eq!(file.compression(), zip::CompressionMethod::Deflated);
    let mut wav = Vec::new();
    file.read_to_end(&mut wav).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    assert_eq!(reader.spec().sample_rate, 48000);
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().bits_per_sample, 16);
    assert_eq!(reader.duration(), 24000);
}

#[test]
fn test_missing_source_fails_before_processing() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let good = write_tone(dir.path(), "good.wav", 440.0, 0.2);

    let library: InMemoryLibrary = vec![
        TrackSource::new("good", good).with_title("Good"),
        TrackSource::new("gone", dir.path().join("deleted.wav")).with_title("Gone"),
    ]
    .into_iter()
    .collect();

    let encoder = Arc::new(CountingEncoder {
        calls: AtomicUsize::new(0),
    });
    let exporter = BatchExporter::new(library).with_compressed_encoder(encoder.clone());
    let request = BatchExportRequest::new(
        ids(&["good", "gone"]),
        MasteringRequest::default().with_codec(OutputCodec::mp3()),
    );

    let err = exporter.export(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    match err {
        ExportError::MissingAudio(names) => assert_eq!(names, vec!["Gone"]),
        other => panic!("expected missing audio, got {}", other),
    }
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_corrupt_track_aborts_batch() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let good = write_tone(dir.path(), "good.wav", 440.0, 0.2);
    let corrupt = dir.path().join("corrupt.wav");
    std::fs::write(&corrupt, b"RIFF....WAVEjunk").unwrap();

    let library: InMemoryLibrary = vec![
        TrackSource::new("good", good),
        TrackSource::new("bad", corrupt).with_title("Broken Render"),
    ]
    .into_iter()
    .collect();

    let request = BatchExportRequest::new(ids(&["good", "bad"]), MasteringRequest::default());
    let err = BatchExporter::new(library).export(&request).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Processing);
    match err {
        ExportError::TrackFailed { track, .. } => assert_eq!(track, "Broken Render"),
        other => panic!("expected track failure, got {}", other),
    }
}

#[test]
fn test_mp3_export_uses_compressed_encoder() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let library = tone_library(dir.path(), &[("x", Some("Intro")), ("y", None)]);

    let encoder = Arc::new(CountingEncoder {
        calls: AtomicUsize::new(0),
    });
    let exporter = BatchExporter::new(library).with_compressed_encoder(encoder.clone());
    let request = BatchExportRequest::new(
        ids(&["x", "y"]),
        MasteringRequest::default().with_codec(OutputCodec::Mp3 { bitrate_kbps: 192 }),
    );
    let archive = exporter.export(&request).unwrap();

    assert_eq!(archive.filename, "mp3_export.zip");
    assert_eq!(entry_names(&archive.bytes), vec!["Intro.mp3", "y.mp3"]);
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);

    let mut zip = ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
    let mut payload = String::new();
    zip.by_name("Intro.mp3").unwrap().read_to_string(&mut payload).unwrap();
    assert_eq!(payload, "mp3@192");
}

#[test]
fn test_library_failure_is_input_error() {
    let request = BatchExportRequest::new(ids(&["any"]), MasteringRequest::default());
    let err = BatchExporter::new(BrokenLibrary).export(&request).unwrap_err();
    assert!(matches!(err, ExportError::Library(_)));
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn test_manifest_library_drives_export() {
    init_logging();
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("renders")).unwrap();
    write_tone(&dir.path().join("renders"), "one.wav", 330.0, 0.3);

    let manifest = dir.path().join("tracks.json");
    std::fs::write(
        &manifest,
        r#"[{ "id": "one", "audio_path": "renders/one.wav", "title": "Night Drive" }]"#,
    )
    .unwrap();

    let exporter = BatchExporter::new(ManifestLibrary::load(&manifest).unwrap());
    let archive = exporter
        .export(&BatchExportRequest::new(ids(&["one"]), MasteringRequest::default()))
        .unwrap();

    let out_dir = dir.path().join("exports");
    let written = archive.write_to(&out_dir).unwrap();
    assert_eq!(written, out_dir.join("mastered_export.zip"));
    assert_eq!(entry_names(&std::fs::read(written).unwrap()), vec!["Night_Drive.wav"]);
}
