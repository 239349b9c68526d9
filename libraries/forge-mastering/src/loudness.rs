//! Integrated loudness estimate
//!
//! This is a simplified, non-gated approximation of ITU-R BS.1770:
//!
//! - The head-related high shelf is approximated by a 2nd-order Butterworth
//!   high-pass near 1.7 kHz whose output is mixed back into the signal at
//!   0.6 (about +4 dB well above the corner).
//! - The RLB high-pass is a 2nd-order Butterworth near 38 Hz.
//! - There are no absolute or relative gating blocks; every sample counts.
//!
//! Good enough to normalize to distributor targets, not for certification.

use crate::buffer::AudioBuffer;
use crate::error::{MasteringError, Result};
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F64};

/// Loudness reported for digital silence (dB / LUFS)
pub const SILENCE_FLOOR_DB: f64 = -70.0;

/// Corner of the high-shelf approximation (Hz)
const SHELF_CORNER_HZ: f64 = 1681.0;

/// Mix level of the high-passed branch added back to the input
const SHELF_MIX: f64 = 0.6;

/// Corner of the low-frequency high-pass (Hz)
const HIGH_PASS_CORNER_HZ: f64 = 38.0;

/// BS.1770 offset between mean-square energy and LUFS
const LOUDNESS_OFFSET_DB: f64 = -0.691;

/// Per-channel weight; only mono and stereo layouts are supported
const CHANNEL_WEIGHT: f64 = 1.0;

/// Two-stage weighting filter for one sample rate
#[derive(Debug, Clone, Copy)]
pub struct KWeighting {
    shelf: Coefficients<f64>,
    high_pass: Coefficients<f64>,
}

impl KWeighting {
    /// Design both stages for `sample_rate`
    ///
    /// Corner frequencies are clamped below Nyquist so low sample rates
    /// still produce stable filters.
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(MasteringError::InvalidSampleRate(sample_rate));
        }
        let fs = f64::from(sample_rate);
        let nyquist = fs / 2.0;

        let shelf_corner = SHELF_CORNER_HZ.min(nyquist * 0.95);
        let high_pass_corner = HIGH_PASS_CORNER_HZ.min(nyquist * 0.5);

        let shelf = Coefficients::<f64>::from_params(
            Type::HighPass,
            fs.hz(),
            shelf_corner.hz(),
            Q_BUTTERWORTH_F64,
        )?;
        let high_pass = Coefficients::<f64>::from_params(
            Type::HighPass,
            fs.hz(),
            high_pass_corner.hz(),
            Q_BUTTERWORTH_F64,
        )?;

        Ok(Self { shelf, high_pass })
    }

    /// Run one channel through both stages
    pub fn apply(&self, channel: &[f64]) -> Vec<f64> {
        let mut shelf = DirectForm2Transposed::<f64>::new(self.shelf);
        let mut high_pass = DirectForm2Transposed::<f64>::new(self.high_pass);

        channel
            .iter()
            .map(|&x| {
                let emphasized = x + SHELF_MIX * shelf.run(x);
                high_pass.run(emphasized)
            })
            .collect()
    }
}

/// Mean of squared samples
fn mean_square(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64
}

/// Estimate integrated loudness of `buffer` in LUFS
///
/// Returns [`SILENCE_FLOOR_DB`] when the weighted energy is zero.
///
/// # Errors
/// Returns error if the buffer is empty
pub fn measure_loudness(buffer: &AudioBuffer) -> Result<f64> {
    if buffer.is_empty() {
        return Err(MasteringError::EmptyBuffer("loudness measurement"));
    }

    let weighting = KWeighting::new(buffer.sample_rate())?;
    let weighted_sum: f64 = buffer
        .channels()
        .iter()
        .map(|channel| CHANNEL_WEIGHT * mean_square(&weighting.apply(channel)))
        .sum();

    if weighted_sum <= 0.0 {
        return Ok(SILENCE_FLOOR_DB);
    }

    let loudness = LOUDNESS_OFFSET_DB + 10.0 * weighted_sum.log10();
    if !loudness.is_finite() {
        return Err(MasteringError::NonFinite {
            stage: "loudness measurement",
            channel: 0,
            frame: 0,
        });
    }
    Ok(loudness)
}
