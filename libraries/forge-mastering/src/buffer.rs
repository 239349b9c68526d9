//! Planar audio buffer shared by every pipeline stage

use crate::error::{MasteringError, Result};

/// Multi-channel audio held as one `Vec<f64>` per channel
///
/// Samples are nominally in [-1.0, 1.0]. All channels have the same length
/// and the channel count is fixed once the buffer is built.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f64>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from planar channel data
    ///
    /// # Errors
    /// Returns error if there are no channels, channel lengths differ,
    /// or the sample rate is zero
    pub fn new(channels: Vec<Vec<f64>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(MasteringError::InvalidSampleRate(sample_rate));
        }
        let Some(first) = channels.first() else {
            return Err(MasteringError::EmptyBuffer("buffer construction"));
        };
        let frames = first.len();
        if channels.iter().any(|ch| ch.len() != frames) {
            return Err(MasteringError::InvalidBuffer(
                "channel lengths differ".to_string(),
            ));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Build a buffer from interleaved samples (L R L R ...)
    pub fn from_interleaved(samples: &[f64], channel_count: usize, sample_rate: u32) -> Result<Self> {
        if channel_count == 0 {
            return Err(MasteringError::EmptyBuffer("buffer construction"));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }
        Self::new(channels, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn channel(&self, index: usize) -> &[f64] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.channels
    }

    /// Multiply every sample by a linear gain
    pub fn apply_gain(&mut self, gain: f64) {
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Clamp every sample to [-1.0, 1.0], returning how many were clipped
    pub fn hard_clip(&mut self) -> usize {
        let mut clipped = 0;
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                if sample.abs() > 1.0 {
                    *sample = sample.clamp(-1.0, 1.0);
                    clipped += 1;
                }
            }
        }
        clipped
    }

    /// Largest absolute sample value across all channels
    pub fn sample_peak(&self) -> f64 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0_f64, |acc, s| acc.max(s.abs()))
    }

    /// Interleave channels into a single vector (L R L R ...)
    pub fn interleaved(&self) -> Vec<f64> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    /// Fail with the location of the first NaN or infinite sample
    ///
    /// `stage` names the step that just ran so the error points at the
    /// defect rather than wherever it would surface later.
    pub fn ensure_finite(&self, stage: &'static str) -> Result<()> {
        for (channel, samples) in self.channels.iter().enumerate() {
            if let Some(frame) = samples.iter().position(|s| !s.is_finite()) {
                return Err(MasteringError::NonFinite {
                    stage,
                    channel,
                    frame,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_channels() {
        let result = AudioBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_rate_and_no_channels() {
        assert!(matches!(
            AudioBuffer::new(vec![vec![0.0; 4]], 0),
            Err(MasteringError::InvalidSampleRate(0))
        ));
        assert!(matches!(
            AudioBuffer::new(Vec::new(), 44100),
            Err(MasteringError::EmptyBuffer(_))
        ));
    }

    #[test]
    fn interleave_round_trip() {
        let interleaved = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, 48000).unwrap();
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.interleaved(), interleaved.to_vec());
    }

    #[test]
    fn hard_clip_counts_overs() {
        let mut buffer = AudioBuffer::new(vec![vec![1.5, 0.5, -2.0, -1.0]], 44100).unwrap();
        assert_eq!(buffer.hard_clip(), 2);
        assert_eq!(buffer.channel(0), &[1.0, 0.5, -1.0, -1.0]);
    }

    #[test]
    fn ensure_finite_reports_first_bad_sample() {
        let buffer =
            AudioBuffer::new(vec![vec![0.0, 0.1], vec![0.0, f64::NAN]], 44100).unwrap();
        match buffer.ensure_finite("gain") {
            Err(MasteringError::NonFinite {
                stage,
                channel,
                frame,
            }) => {
                assert_eq!(stage, "gain");
                assert_eq!(channel, 1);
                assert_eq!(frame, 1);
            }
            other => panic!("expected NonFinite, got {:?}", other),
        }
    }

    #[test]
    fn duration_uses_frames_not_samples() {
        let buffer = AudioBuffer::new(vec![vec![0.0; 22050]; 2], 44100).unwrap();
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-12);
    }
}
