//! Final encoding of mastered buffers
//!
//! PCM16 WAV is written in memory with hound. Compressed formats are
//! delegated to a [`CompressedEncoder`] implementation supplied by the
//! caller.

pub mod ffmpeg;

pub use ffmpeg::FfmpegMp3Encoder;

use crate::buffer::AudioBuffer;
use crate::error::{MasteringError, Result};
use crate::request::OutputCodec;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

/// Full-scale value used when quantizing to 16 bits
const PCM16_SCALE: f64 = 32767.0;

/// External encoder for compressed output formats
///
/// Receives interleaved PCM16 samples and returns the complete encoded
/// payload.
pub trait CompressedEncoder: Send + Sync {
    /// Encode `pcm` (interleaved, `channels` wide) at `bitrate_kbps`
    fn encode(
        &self,
        pcm: &[i16],
        channels: u16,
        sample_rate: u32,
        bitrate_kbps: u32,
    ) -> Result<Vec<u8>>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Quantize one sample to 16-bit by direct scale-and-round
pub fn quantize_sample(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE).round() as i16
}

/// Quantize a buffer to interleaved 16-bit PCM
pub fn quantize_pcm16(buffer: &AudioBuffer) -> Vec<i16> {
    buffer
        .interleaved()
        .into_iter()
        .map(quantize_sample)
        .collect()
}

fn channel_count_u16(buffer: &AudioBuffer) -> Result<u16> {
    u16::try_from(buffer.channel_count()).map_err(|_| {
        MasteringError::Encode(format!("{} channels is too many", buffer.channel_count()))
    })
}

/// Write interleaved PCM16 samples as a RIFF/WAVE payload
pub fn write_pcm16_wav(pcm: &[i16], channels: u16, sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in pcm {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Encode a buffer as 16-bit PCM WAV at its own sample rate
pub fn encode_pcm16_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let channels = channel_count_u16(buffer)?;
    write_pcm16_wav(&quantize_pcm16(buffer), channels, buffer.sample_rate())
}

/// Encode `buffer` with `codec`
///
/// # Errors
/// Returns a processing error if a compressed codec is requested and no
/// compressed encoder is available, or if the encoder fails
pub fn encode(
    buffer: &AudioBuffer,
    codec: OutputCodec,
    compressed: Option<&dyn CompressedEncoder>,
) -> Result<Vec<u8>> {
    let bytes = match codec {
        OutputCodec::Pcm16 => encode_pcm16_wav(buffer)?,
        OutputCodec::Mp3 { bitrate_kbps } => {
            let encoder = compressed.ok_or_else(|| {
                MasteringError::Encode("MP3 output requested but no MP3 encoder is configured".to_string())
            })?;
            let channels = channel_count_u16(buffer)?;
            let pcm = quantize_pcm16(buffer);
            debug!(
                "Handing {} samples to {} at {} kbps",
                pcm.len(),
                encoder.name(),
                bitrate_kbps
            );
            encoder.encode(&pcm, channels, buffer.sample_rate(), bitrate_kbps)?
        }
    };

    if bytes.is_empty() {
        return Err(MasteringError::Encode(format!("{} encoder produced no data", codec)));
    }
    Ok(bytes)
}
