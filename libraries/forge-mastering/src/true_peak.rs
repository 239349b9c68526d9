//! True peak estimation (4x oversampling)
//!
//! Reconstructs the waveform between samples with the same polyphase
//! interpolator the resampler uses, so inter-sample overs that a plain
//! sample-peak check misses are caught.

use crate::buffer::AudioBuffer;
use crate::error::{MasteringError, Result};
use crate::resampler::PolyphaseFilter;

/// Oversampling factor
pub const OVERSAMPLING: usize = 4;

/// Level reported when the buffer contains no signal (dBTP)
pub const PEAK_FLOOR_DB: f64 = -100.0;

/// Convert a linear amplitude to dB, flooring non-positive values
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        PEAK_FLOOR_DB
    } else {
        20.0 * linear.log10()
    }
}

/// Convert dB to a linear amplitude
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Largest absolute value of the 4x oversampled signal across all channels
///
/// # Errors
/// Returns error if the buffer is empty
pub fn true_peak_linear(buffer: &AudioBuffer) -> Result<f64> {
    if buffer.is_empty() {
        return Err(MasteringError::EmptyBuffer("true peak measurement"));
    }

    let interpolator = PolyphaseFilter::new(OVERSAMPLING, 1)?;
    let peak = buffer
        .channels()
        .iter()
        .map(|channel| {
            interpolator
                .samples(channel)
                .fold(0.0_f64, |acc, s| acc.max(s.abs()))
        })
        .fold(0.0_f64, f64::max);

    if !peak.is_finite() {
        return Err(MasteringError::NonFinite {
            stage: "true peak measurement",
            channel: 0,
            frame: 0,
        });
    }
    Ok(peak)
}

/// True peak of `buffer` in dBTP, floored at [`PEAK_FLOOR_DB`]
pub fn measure_true_peak(buffer: &AudioBuffer) -> Result<f64> {
    Ok(linear_to_db(true_peak_linear(buffer)?))
}

/// Sample peak (no oversampling) in dBFS
pub fn sample_peak_db(buffer: &AudioBuffer) -> f64 {
    linear_to_db(buffer.sample_peak())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn db_conversions() {
        assert_eq!(linear_to_db(0.0), PEAK_FLOOR_DB);
        assert_eq!(linear_to_db(-1.0), PEAK_FLOOR_DB);
        assert!((linear_to_db(1.0)).abs() < 1e-12);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn silence_hits_floor() {
        let buffer = AudioBuffer::new(vec![vec![0.0; 1000]; 2], 44100).unwrap();
        assert_eq!(measure_true_peak(&buffer).unwrap(), PEAK_FLOOR_DB);
    }

    #[test]
    fn full_scale_sine_reads_zero_dbtp() {
        let frames = 48000;
        let channel: Vec<f64> = (0..frames)
            .map(|i| (2.0 * PI * 1000.0 * i as f64 / 48000.0).sin())
            .collect();
        let buffer = AudioBuffer::new(vec![channel.clone(), channel], 48000).unwrap();

        let tp = measure_true_peak(&buffer).unwrap();
        assert!(tp.abs() <= 0.1, "full-scale sine measured {:.3} dBTP", tp);
    }

    #[test]
    fn catches_inter_sample_peak() {
        // fs/4 sine sampled at 45 degrees: every sample sits at 0.707 of the
        // true amplitude
        let frames = 4096;
        let channel: Vec<f64> = (0..frames)
            .map(|i| (PI / 2.0 * i as f64 + PI / 4.0).sin())
            .collect();
        let buffer = AudioBuffer::new(vec![channel], 44100).unwrap();

        let sample_peak = sample_peak_db(&buffer);
        let tp = measure_true_peak(&buffer).unwrap();
        assert!((sample_peak + 3.01).abs() < 0.05, "sample peak {}", sample_peak);
        assert!(tp > -0.2, "true peak {} missed the inter-sample over", tp);
    }

    #[test]
    fn streamed_peak_matches_collected_oversampling() {
        let channel: Vec<f64> = (0..3000)
            .map(|i| 0.8 * (i as f64 * 0.37).sin() * (i as f64 * 0.011).cos())
            .collect();
        let buffer = AudioBuffer::new(vec![channel.clone()], 44100).unwrap();

        let filter = PolyphaseFilter::new(OVERSAMPLING, 1).unwrap();
        let collected = filter.process(&channel);
        assert_eq!(collected.len(), channel.len() * OVERSAMPLING);
        let expected = collected.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));

        assert_eq!(true_peak_linear(&buffer).unwrap(), expected);
    }

    #[test]
    fn loudest_channel_wins() {
        let quiet = vec![0.25; 512];
        let loud = vec![0.5; 512];
        let buffer = AudioBuffer::new(vec![quiet, loud], 44100).unwrap();
        let tp = true_peak_linear(&buffer).unwrap();
        assert!((0.49..0.6).contains(&tp), "true peak {}", tp);
    }
}
