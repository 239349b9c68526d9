//! Per-track mastering pipeline
//!
//! ```text
//! load -> resample -> loudness gain -> true-peak limit -> clip -> encode
//! ```
//!
//! Every stage is followed by a finiteness check so a NaN is reported at
//! the stage that produced it.

use crate::buffer::AudioBuffer;
use crate::encoder::{self, CompressedEncoder};
use crate::error::Result;
use crate::limiter::{limit_true_peak, normalize_loudness};
use crate::loader::load_audio;
use crate::loudness::measure_loudness;
use crate::request::{MasteringRequest, OutputCodec};
use crate::resampler::resample;
use crate::true_peak::measure_true_peak;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Measurements taken while mastering one buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MasteringReport {
    pub loudness_before_db: f64,
    pub loudness_after_db: f64,
    pub true_peak_before_db: f64,
    pub true_peak_after_db: f64,
    /// Normalization gain (dB)
    pub gain_db: f64,
    /// Limiter gain reduction (positive dB)
    pub limiter_reduction_db: f64,
    /// Samples the final clip guard had to clamp
    pub clipped_samples: usize,
}

/// Encoded output of one mastered track
#[derive(Debug, Clone)]
pub struct MasteringResult {
    pub bytes: Vec<u8>,
    /// Suggested filename, `<stem>_mastered.<ext>`
    pub filename: String,
    pub codec: OutputCodec,
    pub report: MasteringReport,
    pub sample_rate: u32,
    pub channels: usize,
    pub duration_secs: f64,
}

impl MasteringResult {
    /// MIME type of `bytes`
    pub fn content_type(&self) -> &'static str {
        self.codec.mime_type()
    }
}

/// Applies one [`MasteringRequest`] to any number of tracks
#[derive(Clone)]
pub struct MasteringPipeline {
    request: MasteringRequest,
    compressed: Option<Arc<dyn CompressedEncoder>>,
}

impl fmt::Debug for MasteringPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasteringPipeline")
            .field("request", &self.request)
            .field("compressed", &self.compressed.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

impl MasteringPipeline {
    /// Create a pipeline for a validated request
    ///
    /// # Errors
    /// Returns an input error if the request is out of range
    pub fn new(request: MasteringRequest) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            request,
            compressed: None,
        })
    }

    /// Attach the encoder used for compressed codecs
    pub fn with_compressed_encoder(mut self, encoder: Arc<dyn CompressedEncoder>) -> Self {
        self.compressed = Some(encoder);
        self
    }

    pub fn request(&self) -> &MasteringRequest {
        &self.request
    }

    /// Run the in-memory stages on a decoded buffer
    pub fn master_buffer(&self, buffer: AudioBuffer) -> Result<(AudioBuffer, MasteringReport)> {
        buffer.ensure_finite("load")?;

        let mut buffer = resample(buffer, self.request.target_sample_rate)?;
        buffer.ensure_finite("resample")?;

        let gain = normalize_loudness(&mut buffer, self.request.target_loudness_db)?;
        let limit = limit_true_peak(&mut buffer, self.request.true_peak_ceiling_db)?;

        let clipped_samples = buffer.hard_clip();
        if clipped_samples > 0 {
            warn!("Clip guard clamped {} samples", clipped_samples);
        }
        buffer.ensure_finite("clip")?;

        let report = MasteringReport {
            loudness_before_db: gain.measured_db,
            loudness_after_db: measure_loudness(&buffer)?,
            true_peak_before_db: limit.peak_before_db,
            true_peak_after_db: measure_true_peak(&buffer)?,
            gain_db: gain.gain_db,
            limiter_reduction_db: limit.reduction_db,
            clipped_samples,
        };
        debug!("Mastering report: {:?}", report);
        Ok((buffer, report))
    }

    /// Encode a mastered buffer with the request's codec
    pub fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>> {
        encoder::encode(buffer, self.request.codec, self.compressed.as_deref())
    }

    /// Load, master and encode one file
    ///
    /// # Errors
    /// Input errors for unreadable sources, processing errors for anything
    /// that goes wrong afterwards
    pub fn master_file(&self, path: &Path) -> Result<MasteringResult> {
        let source = load_audio(path)?;
        let source_rate = source.sample_rate();

        let (mastered, report) = self.master_buffer(source)?;
        let bytes = self.encode(&mastered)?;

        info!(
            "Mastered {}: {:.1} -> {:.1} LUFS, {:.2} -> {:.2} dBTP, {} Hz -> {} Hz, {}",
            path.display(),
            report.loudness_before_db,
            report.loudness_after_db,
            report.true_peak_before_db,
            report.true_peak_after_db,
            source_rate,
            mastered.sample_rate(),
            self.request.codec
        );

        Ok(MasteringResult {
            bytes,
            filename: mastered_filename(path, self.request.codec),
            codec: self.request.codec,
            report,
            sample_rate: mastered.sample_rate(),
            channels: mastered.channel_count(),
            duration_secs: mastered.duration_secs(),
        })
    }

    /// Master `input` and write the payload to `output`
    pub fn master_to_path(&self, input: &Path, output: &Path) -> Result<MasteringResult> {
        let result = self.master_file(input)?;
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(output, &result.bytes)?;
        debug!("Wrote {} bytes to {}", result.bytes.len(), output.display());
        Ok(result)
    }
}

/// `<stem>_mastered.<ext>` for a source path
pub fn mastered_filename(source: &Path, codec: OutputCodec) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("track");
    format!("{}_mastered.{}", stem, codec.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MasteringError;
    use std::f64::consts::PI;

    fn stereo_sine(sample_rate: u32, seconds: f64, amplitude: f64) -> AudioBuffer {
        let frames = (f64::from(sample_rate) * seconds) as usize;
        let channel: Vec<f64> = (0..frames)
            .map(|i| amplitude * (2.0 * PI * 440.0 * i as f64 / f64::from(sample_rate)).sin())
            .collect();
        AudioBuffer::new(vec![channel.clone(), channel], sample_rate).unwrap()
    }

    #[test]
    fn rejects_invalid_request() {
        let request = MasteringRequest {
            target_sample_rate: 1000,
            ..Default::default()
        };
        assert!(matches!(
            MasteringPipeline::new(request),
            Err(MasteringError::InvalidRequest(_))
        ));
    }

    #[test]
    fn master_buffer_converts_rate_and_level() {
        let pipeline = MasteringPipeline::new(MasteringRequest::default()).unwrap();
        let (out, report) = pipeline.master_buffer(stereo_sine(48000, 2.0, 0.1)).unwrap();

        assert_eq!(out.sample_rate(), 44100);
        assert_eq!(out.channel_count(), 2);
        assert!((report.loudness_after_db + 14.0).abs() < 0.5);
        assert!(report.true_peak_after_db <= -0.95);
    }

    #[test]
    fn nan_input_is_processing_error() {
        let mut buffer = stereo_sine(44100, 0.5, 0.2);
        buffer.channels_mut()[1][100] = f64::NAN;

        let pipeline = MasteringPipeline::new(MasteringRequest::default()).unwrap();
        let err = pipeline.master_buffer(buffer).unwrap_err();
        assert!(matches!(
            err,
            MasteringError::NonFinite {
                channel: 1,
                frame: 100,
                ..
            }
        ));
        assert_eq!(err.kind(), crate::ErrorKind::Processing);
    }

    #[test]
    fn filename_uses_stem_and_codec() {
        assert_eq!(
            mastered_filename(Path::new("/audio/song.flac"), OutputCodec::Pcm16),
            "song_mastered.wav"
        );
        assert_eq!(
            mastered_filename(Path::new("take two.wav"), OutputCodec::mp3()),
            "take two_mastered.mp3"
        );
    }

    #[test]
    fn debug_names_compressed_encoder() {
        let pipeline = MasteringPipeline::new(MasteringRequest::default())
            .unwrap()
            .with_compressed_encoder(Arc::new(crate::encoder::FfmpegMp3Encoder::default()));
        assert!(format!("{:?}", pipeline).contains("ffmpeg"));
    }
}
