//! Rational sample-rate conversion
//!
//! The rate ratio is reduced to `up / down` and each channel runs through a
//! polyphase FIR: conceptually zero-stuff by `up`, low-pass, keep every
//! `down`-th sample, but only the taps that land on real input samples are
//! ever evaluated.
//!
//! The anti-aliasing filter is a Kaiser-windowed sinc (beta 5.0) with
//! `10 * max(up, down)` taps either side of centre, cutoff at
//! `1 / max(up, down)` of the upsampled Nyquist and a DC gain of `up`.
//! Its group delay is compensated so output sample `m` is aligned with
//! input time `m * down / up`.

use crate::buffer::AudioBuffer;
use crate::error::{MasteringError, Result};
use std::f64::consts::PI;
use tracing::debug;

/// Kaiser window shape parameter
const KAISER_BETA: f64 = 5.0;

/// Filter half length in zero crossings of the slower rate
const HALF_LEN_FACTOR: usize = 10;

/// Greatest common divisor
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Zeroth-order modified Bessel function of the first kind (power series)
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
        k += 1.0;
    }
    sum
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Polyphase interpolate-filter-decimate kernel for one `up / down` ratio
///
/// Reusable across channels and calls; also drives 4x oversampling for
/// true-peak estimation.
#[derive(Debug, Clone)]
pub struct PolyphaseFilter {
    up: usize,
    down: usize,
    half_len: usize,
    taps: Vec<f64>,
}

impl PolyphaseFilter {
    /// Design a filter for the ratio `up / down` (reduced to lowest terms)
    ///
    /// # Errors
    /// Returns error if either factor is zero
    pub fn new(up: usize, down: usize) -> Result<Self> {
        if up == 0 || down == 0 {
            return Err(MasteringError::Resample(format!(
                "invalid ratio {}/{}",
                up, down
            )));
        }
        let g = gcd(up as u64, down as u64) as usize;
        let (up, down) = (up / g, down / g);

        let max_rate = up.max(down);
        let half_len = HALF_LEN_FACTOR * max_rate;
        let num_taps = 2 * half_len + 1;
        let cutoff = 1.0 / max_rate as f64;
        let i0_beta = bessel_i0(KAISER_BETA);

        let mut taps: Vec<f64> = (0..num_taps)
            .map(|k| {
                let x = k as f64 - half_len as f64;
                let ratio = 2.0 * k as f64 / (num_taps - 1) as f64 - 1.0;
                let window = bessel_i0(KAISER_BETA * (1.0 - ratio * ratio).max(0.0).sqrt()) / i0_beta;
                cutoff * sinc(cutoff * x) * window
            })
            .collect();

        // Unity DC gain at the upsampled rate, then `up` to make up for zero stuffing
        let sum: f64 = taps.iter().sum();
        let scale = up as f64 / sum;
        for tap in &mut taps {
            *tap *= scale;
        }

        Ok(Self {
            up,
            down,
            half_len,
            taps,
        })
    }

    /// Reduced `(up, down)` factors
    pub fn ratio(&self) -> (usize, usize) {
        (self.up, self.down)
    }

    pub fn num_taps(&self) -> usize {
        self.taps.len()
    }

    /// Output length for a given input length: `ceil(len * up / down)`
    pub fn output_len(&self, input_len: usize) -> usize {
        (input_len * self.up).div_ceil(self.down)
    }

    /// Filter one channel
    ///
    /// Samples outside the input are treated as zero.
    pub fn process(&self, input: &[f64]) -> Vec<f64> {
        self.samples(input).collect()
    }

    /// Lazily filter one channel, one output sample per step
    pub fn samples<'a>(&'a self, input: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        let n_out = if input.is_empty() {
            0
        } else {
            self.output_len(input.len())
        };
        (0..n_out).map(move |m| self.output_sample(input, m))
    }

    /// Output sample `m` of a non-empty `input`
    fn output_sample(&self, input: &[f64], m: usize) -> f64 {
        let last_tap = self.taps.len() - 1;
        let last_input = input.len() - 1;

        // Position in the zero-stuffed, delay-compensated stream
        let t = m * self.down + self.half_len;

        // Input n contributes through tap t - n*up, which must lie in [0, last_tap]
        let n_max = (t / self.up).min(last_input);
        let n_min = if t > last_tap {
            (t - last_tap).div_ceil(self.up)
        } else {
            0
        };

        let mut acc = 0.0;
        if n_min <= n_max {
            for (n, &x) in input.iter().enumerate().take(n_max + 1).skip(n_min) {
                acc += self.taps[t - n * self.up] * x;
            }
        }
        acc
    }
}

/// Sample-rate converter between two fixed rates
#[derive(Debug, Clone)]
pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    filter: PolyphaseFilter,
}

impl Resampler {
    /// Create a converter from `source_rate` to `target_rate`
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        if source_rate == 0 {
            return Err(MasteringError::InvalidSampleRate(source_rate));
        }
        if target_rate == 0 {
            return Err(MasteringError::InvalidSampleRate(target_rate));
        }
        let g = gcd(u64::from(source_rate), u64::from(target_rate));
        let up = (u64::from(target_rate) / g) as usize;
        let down = (u64::from(source_rate) / g) as usize;

        Ok(Self {
            source_rate,
            target_rate,
            filter: PolyphaseFilter::new(up, down)?,
        })
    }

    pub fn ratio(&self) -> (usize, usize) {
        self.filter.ratio()
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Resample every channel of `buffer`
    ///
    /// Every output channel has exactly `ceil(frames * up / down)` samples.
    ///
    /// # Errors
    /// Returns error if the buffer is empty or was recorded at a different rate
    pub fn process(&self, buffer: AudioBuffer) -> Result<AudioBuffer> {
        if buffer.is_empty() {
            return Err(MasteringError::EmptyBuffer("resample"));
        }
        if buffer.sample_rate() != self.source_rate {
            return Err(MasteringError::Resample(format!(
                "buffer is {} Hz, resampler expects {} Hz",
                buffer.sample_rate(),
                self.source_rate
            )));
        }

        let target_len = self.filter.output_len(buffer.frames());
        let channels = buffer
            .channels()
            .iter()
            .map(|channel| {
                let mut out = self.filter.process(channel);
                out.resize(target_len, 0.0);
                out
            })
            .collect();

        AudioBuffer::new(channels, self.target_rate)
    }
}

/// Convert `buffer` to `target_rate`; passes it through untouched when the
/// rates already match
///
/// # Errors
/// Returns error if the buffer is empty or the target rate is zero
pub fn resample(buffer: AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if buffer.is_empty() {
        return Err(MasteringError::EmptyBuffer("resample"));
    }
    if buffer.sample_rate() == target_rate {
        return Ok(buffer);
    }

    let resampler = Resampler::new(buffer.sample_rate(), target_rate)?;
    let (up, down) = resampler.ratio();
    debug!(
        "Resampling {} Hz -> {} Hz (up {}, down {})",
        buffer.sample_rate(),
        target_rate,
        up,
        down
    );
    resampler.process(buffer)
}
