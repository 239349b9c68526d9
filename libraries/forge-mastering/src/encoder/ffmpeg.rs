//! MP3 encoding through an external ffmpeg binary

use super::{write_pcm16_wav, CompressedEncoder};
use crate::error::{MasteringError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use tracing::debug;

/// Prefix of every staged temp file
pub const STAGING_PREFIX: &str = "forge-";

/// Shells out to `ffmpeg` to produce MP3
///
/// Input PCM and output MP3 are staged in temp files that are removed when
/// they go out of scope, whether or not ffmpeg succeeded.
#[derive(Debug, Clone)]
pub struct FfmpegMp3Encoder {
    ffmpeg_path: PathBuf,
    staging_dir: Option<PathBuf>,
}

impl FfmpegMp3Encoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            staging_dir: None,
        }
    }

    /// Stage temp files in `dir` instead of the system temp directory
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }

    fn staging_file(&self, suffix: &str) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX).suffix(suffix);
        let file = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }
}

impl Default for FfmpegMp3Encoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl CompressedEncoder for FfmpegMp3Encoder {
    fn encode(
        &self,
        pcm: &[i16],
        channels: u16,
        sample_rate: u32,
        bitrate_kbps: u32,
    ) -> Result<Vec<u8>> {
        let mut staged = self.staging_file(".wav")?;
        staged.write_all(&write_pcm16_wav(pcm, channels, sample_rate)?)?;
        staged.flush()?;

        let output = self.staging_file(".mp3")?;

        debug!(
            "Running {} for {} kbps MP3 ({} ch, {} Hz)",
            self.ffmpeg_path.display(),
            bitrate_kbps,
            channels,
            sample_rate
        );

        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg("wav")
            .arg("-i")
            .arg(staged.path())
            .arg("-b:a")
            .arg(format!("{}k", bitrate_kbps))
            .arg("-f")
            .arg("mp3")
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                MasteringError::Encode(format!(
                    "Failed to run {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MasteringError::Encode(format!(
                "FFmpeg failed: {}",
                stderr.trim()
            )));
        }

        Ok(std::fs::read(output.path())?)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}
