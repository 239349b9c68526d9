//! Exporter configuration
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use forge_mastering::request::{
    DEFAULT_MP3_BITRATE_KBPS, DEFAULT_SAMPLE_RATE, DEFAULT_TARGET_LOUDNESS_DB,
    DEFAULT_TRUE_PEAK_CEILING_DB,
};
use forge_mastering::{MasteringRequest, OutputCodec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "forge.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_mastering")]
    pub mastering: MasteringSettings,

    #[serde(default = "default_encoder")]
    pub encoder: EncoderSettings,

    #[serde(default = "default_output")]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasteringSettings {
    #[serde(default = "default_target_loudness_db")]
    pub target_loudness_db: f64,

    #[serde(default = "default_true_peak_ceiling_db")]
    pub true_peak_ceiling_db: f64,

    #[serde(default = "default_target_sample_rate")]
    pub target_sample_rate: u32,

    #[serde(default)]
    pub format: ExportFormat,

    #[serde(default = "default_mp3_bitrate_kbps")]
    pub mp3_bitrate_kbps: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncoderSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Where MP3 staging files go; system temp directory when unset
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Wav,
    Mp3,
}

impl MasteringSettings {
    pub fn codec(&self) -> OutputCodec {
        match self.format {
            ExportFormat::Wav => OutputCodec::Pcm16,
            ExportFormat::Mp3 => OutputCodec::Mp3 {
                bitrate_kbps: self.mp3_bitrate_kbps,
            },
        }
    }

    pub fn to_request(&self) -> MasteringRequest {
        MasteringRequest {
            target_loudness_db: self.target_loudness_db,
            true_peak_ceiling_db: self.true_peak_ceiling_db,
            target_sample_rate: self.target_sample_rate,
            codec: self.codec(),
        }
    }
}

impl ExportConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `forge.toml` is read if
    /// present. `FORGE_<SECTION>__<KEY>` variables override both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(env);

        let config = settings.build().context("Failed to read configuration")?;
        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.mastering
            .to_request()
            .validate()
            .context("Invalid [mastering] settings")?;

        if self.encoder.ffmpeg_path.as_os_str().is_empty() {
            bail!("encoder.ffmpeg_path must not be empty");
        }

        Ok(())
    }
}

/// Environment overrides (prefixed with FORGE_)
fn environment() -> config::Environment {
    config::Environment::with_prefix("FORGE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

// Default values
fn default_mastering() -> MasteringSettings {
    MasteringSettings {
        target_loudness_db: default_target_loudness_db(),
        true_peak_ceiling_db: default_true_peak_ceiling_db(),
        target_sample_rate: default_target_sample_rate(),
        format: ExportFormat::default(),
        mp3_bitrate_kbps: default_mp3_bitrate_kbps(),
    }
}

fn default_target_loudness_db() -> f64 {
    DEFAULT_TARGET_LOUDNESS_DB
}

fn default_true_peak_ceiling_db() -> f64 {
    DEFAULT_TRUE_PEAK_CEILING_DB
}

fn default_target_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_mp3_bitrate_kbps() -> u32 {
    DEFAULT_MP3_BITRATE_KBPS
}

fn default_encoder() -> EncoderSettings {
    EncoderSettings {
        ffmpeg_path: default_ffmpeg_path(),
        staging_dir: None,
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_output() -> OutputSettings {
    OutputSettings {
        directory: default_output_directory(),
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./exports")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mastering: default_mastering(),
            encoder: default_encoder(),
            output: default_output(),
        }
    }
}
