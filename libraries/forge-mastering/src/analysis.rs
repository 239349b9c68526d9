//! Read-only measurements of a source file

use crate::buffer::AudioBuffer;
use crate::error::Result;
use crate::loader::load_audio;
use crate::loudness::measure_loudness;
use crate::true_peak::{measure_true_peak, sample_peak_db};
use serde::Serialize;
use std::path::Path;

/// Loudness and peak figures for audio that has not been mastered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioAnalysis {
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub duration_secs: f64,
    /// Simplified integrated loudness (LUFS)
    pub loudness_db: f64,
    pub true_peak_db: f64,
    pub sample_peak_db: f64,
}

impl AudioAnalysis {
    /// Gain that would bring this audio to `target_db`, or `None` for silence
    pub fn gain_to(&self, target_db: f64) -> Option<f64> {
        (self.loudness_db > crate::loudness::SILENCE_FLOOR_DB).then(|| target_db - self.loudness_db)
    }
}

/// Measure a decoded buffer
pub fn analyze_buffer(buffer: &AudioBuffer) -> Result<AudioAnalysis> {
    Ok(AudioAnalysis {
        sample_rate: buffer.sample_rate(),
        channels: buffer.channel_count(),
        frames: buffer.frames(),
        duration_secs: buffer.duration_secs(),
        loudness_db: measure_loudness(buffer)?,
        true_peak_db: measure_true_peak(buffer)?,
        sample_peak_db: sample_peak_db(buffer),
    })
}

/// Decode and measure a file without modifying it
pub fn analyze_file(path: &Path) -> Result<AudioAnalysis> {
    let buffer = load_audio(path)?;
    analyze_buffer(&buffer)
}
