//! Loudness gain and static true-peak limiting
//!
//! The limiter is a single gain reduction applied to the whole buffer, not
//! a lookahead/release design. Quiet passages are turned down as much as
//! the loudest peak.

use crate::buffer::AudioBuffer;
use crate::error::Result;
use crate::loudness::{measure_loudness, SILENCE_FLOOR_DB};
use crate::true_peak::{db_to_linear, linear_to_db, true_peak_linear};
use tracing::{debug, warn};

/// Extra headroom below the ceiling when limiting
pub const LIMITER_MARGIN: f64 = 0.998;

/// Outcome of loudness normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainOutcome {
    /// Loudness before any gain (LUFS)
    pub measured_db: f64,
    /// Gain applied (dB); zero when the input was silent
    pub gain_db: f64,
    pub applied: bool,
}

/// Outcome of true-peak limiting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitOutcome {
    /// True peak before limiting (dBTP)
    pub peak_before_db: f64,
    /// Gain reduction applied (positive dB); zero when under the ceiling
    pub reduction_db: f64,
}

impl LimitOutcome {
    pub fn engaged(&self) -> bool {
        self.reduction_db > 0.0
    }
}

/// Bring `buffer` to `target_db` LUFS with a single linear gain
///
/// Buffers at or below the silence floor are left untouched.
pub fn normalize_loudness(buffer: &mut AudioBuffer, target_db: f64) -> Result<GainOutcome> {
    let measured_db = measure_loudness(buffer)?;

    if measured_db <= SILENCE_FLOOR_DB {
        warn!(
            "Input is silent ({:.1} LUFS), skipping loudness gain",
            measured_db
        );
        return Ok(GainOutcome {
            measured_db,
            gain_db: 0.0,
            applied: false,
        });
    }

    let gain_db = target_db - measured_db;
    buffer.apply_gain(db_to_linear(gain_db));
    buffer.ensure_finite("gain")?;

    debug!(
        "Loudness {:.2} LUFS -> target {:.2} LUFS ({:+.2} dB)",
        measured_db, target_db, gain_db
    );
    Ok(GainOutcome {
        measured_db,
        gain_db,
        applied: true,
    })
}

/// Pull the whole buffer down so its true peak sits just under `ceiling_db`
pub fn limit_true_peak(buffer: &mut AudioBuffer, ceiling_db: f64) -> Result<LimitOutcome> {
    let peak = true_peak_linear(buffer)?;
    let peak_before_db = linear_to_db(peak);
    let ceiling = db_to_linear(ceiling_db);

    if peak <= ceiling {
        return Ok(LimitOutcome {
            peak_before_db,
            reduction_db: 0.0,
        });
    }

    let factor = ceiling / peak * LIMITER_MARGIN;
    buffer.apply_gain(factor);
    buffer.ensure_finite("limiter")?;

    let reduction_db = -linear_to_db(factor);
    debug!(
        "True peak {:.2} dBTP over {:.2} dBTP ceiling, reducing by {:.2} dB",
        peak_before_db, ceiling_db, reduction_db
    );
    Ok(LimitOutcome {
        peak_before_db,
        reduction_db,
    })
}
