//! Per-export mastering configuration

use crate::error::{MasteringError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Streaming-platform loudness target (LUFS)
pub const DEFAULT_TARGET_LOUDNESS_DB: f64 = -14.0;

/// Distributor true-peak ceiling (dBTP)
pub const DEFAULT_TRUE_PEAK_CEILING_DB: f64 = -1.0;

/// CD sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 320;

pub const TARGET_LOUDNESS_RANGE: RangeInclusive<f64> = -30.0..=0.0;
pub const TRUE_PEAK_CEILING_RANGE: RangeInclusive<f64> = -6.0..=0.0;
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 22_050..=96_000;
pub const MP3_BITRATE_RANGE: RangeInclusive<u32> = 128..=320;

/// Output encoding for mastered audio
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum OutputCodec {
    /// 16-bit PCM WAV
    #[default]
    #[serde(rename = "wav")]
    Pcm16,
    /// MP3 through an external compressed encoder
    Mp3 {
        #[serde(default = "default_mp3_bitrate")]
        bitrate_kbps: u32,
    },
}

fn default_mp3_bitrate() -> u32 {
    DEFAULT_MP3_BITRATE_KBPS
}

impl OutputCodec {
    /// MP3 at the default bitrate
    pub fn mp3() -> Self {
        Self::Mp3 {
            bitrate_kbps: DEFAULT_MP3_BITRATE_KBPS,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pcm16 => "wav",
            Self::Mp3 { .. } => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pcm16 => "audio/wav",
            Self::Mp3 { .. } => "audio/mpeg",
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Mp3 { .. })
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm16 => write!(f, "WAV (PCM 16-bit)"),
            Self::Mp3 { bitrate_kbps } => write!(f, "MP3 ({} kbps)", bitrate_kbps),
        }
    }
}

/// Mastering targets applied to every track of an export
///
/// Built once per request and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteringRequest {
    /// Integrated loudness target in LUFS
    #[serde(default = "default_target_loudness")]
    pub target_loudness_db: f64,

    /// True-peak ceiling in dBTP
    #[serde(default = "default_true_peak_ceiling")]
    pub true_peak_ceiling_db: f64,

    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub target_sample_rate: u32,

    #[serde(default)]
    pub codec: OutputCodec,
}

fn default_target_loudness() -> f64 {
    DEFAULT_TARGET_LOUDNESS_DB
}

fn default_true_peak_ceiling() -> f64 {
    DEFAULT_TRUE_PEAK_CEILING_DB
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

impl Default for MasteringRequest {
    fn default() -> Self {
        Self {
            target_loudness_db: DEFAULT_TARGET_LOUDNESS_DB,
            true_peak_ceiling_db: DEFAULT_TRUE_PEAK_CEILING_DB,
            target_sample_rate: DEFAULT_SAMPLE_RATE,
            codec: OutputCodec::Pcm16,
        }
    }
}

impl MasteringRequest {
    pub fn with_codec(mut self, codec: OutputCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<()> {
        if !TARGET_LOUDNESS_RANGE.contains(&self.target_loudness_db) {
            return Err(MasteringError::InvalidRequest(format!(
                "target loudness {} LUFS outside {:?}",
                self.target_loudness_db, TARGET_LOUDNESS_RANGE
            )));
        }
        if !TRUE_PEAK_CEILING_RANGE.contains(&self.true_peak_ceiling_db) {
            return Err(MasteringError::InvalidRequest(format!(
                "true peak ceiling {} dBTP outside {:?}",
                self.true_peak_ceiling_db, TRUE_PEAK_CEILING_RANGE
            )));
        }
        if !SAMPLE_RATE_RANGE.contains(&self.target_sample_rate) {
            return Err(MasteringError::InvalidRequest(format!(
                "sample rate {} Hz outside {:?}",
                self.target_sample_rate, SAMPLE_RATE_RANGE
            )));
        }
        if let OutputCodec::Mp3 { bitrate_kbps } = self.codec {
            if !MP3_BITRATE_RANGE.contains(&bitrate_kbps) {
                return Err(MasteringError::InvalidRequest(format!(
                    "MP3 bitrate {} kbps outside {:?}",
                    bitrate_kbps, MP3_BITRATE_RANGE
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_distributor_targets() {
        let request = MasteringRequest::default();
        assert_eq!(request.target_loudness_db, -14.0);
        assert_eq!(request.true_peak_ceiling_db, -1.0);
        assert_eq!(request.target_sample_rate, 44100);
        assert_eq!(request.codec, OutputCodec::Pcm16);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let loud = MasteringRequest {
            target_loudness_db: 3.0,
            ..Default::default()
        };
        assert!(loud.validate().is_err());

        let ceiling = MasteringRequest {
            true_peak_ceiling_db: -7.0,
            ..Default::default()
        };
        assert!(ceiling.validate().is_err());

        let rate = MasteringRequest {
            target_sample_rate: 8000,
            ..Default::default()
        };
        assert!(rate.validate().is_err());

        let bitrate = MasteringRequest::default().with_codec(OutputCodec::Mp3 { bitrate_kbps: 64 });
        let err = bitrate.validate().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Input);
    }

    #[test]
    fn codec_extensions_and_mime_types() {
        assert_eq!(OutputCodec::Pcm16.extension(), "wav");
        assert_eq!(OutputCodec::Pcm16.mime_type(), "audio/wav");
        assert_eq!(OutputCodec::mp3().mime_type(), "audio/mpeg");
        assert_eq!(OutputCodec::mp3().extension(), "mp3");
        assert!(OutputCodec::mp3().is_compressed());
    }

    #[test]
    fn deserializes_with_defaults() {
        let request: MasteringRequest =
            serde_json::from_str(r#"{ "target_loudness_db": -16.0, "codec": { "format": "mp3" } }"#)
                .unwrap();
        assert_eq!(request.target_loudness_db, -16.0);
        assert_eq!(request.true_peak_ceiling_db, -1.0);
        assert_eq!(request.codec, OutputCodec::Mp3 { bitrate_kbps: 320 });

        let wav: MasteringRequest = serde_json::from_str(r#"{ "codec": { "format": "wav" } }"#).unwrap();
        assert_eq!(wav.codec, OutputCodec::Pcm16);
    }
}
