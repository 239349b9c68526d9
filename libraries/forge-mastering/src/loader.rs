//! Source decoding via Symphonia
//!
//! Decodes any container/codec Symphonia understands (WAV, FLAC, MP3,
//! OGG/Vorbis, AAC/M4A) into a planar f64 [`AudioBuffer`].

use crate::buffer::AudioBuffer;
use crate::error::{MasteringError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode an audio file into memory
///
/// # Errors
/// Returns an input error if the file is missing, unreadable, has no audio
/// track, or decodes to zero samples
pub fn load_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.is_file() {
        return Err(MasteringError::FileNotFound(path.to_path_buf()));
    }

    let file = File::open(path)
        .map_err(|e| MasteringError::Decode(format!("{}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Extension hint helps the probe pick a format reader
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MasteringError::Decode(format!("Failed to probe {}: {}", path.display(), e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            MasteringError::Decode(format!("No audio tracks found in {}", path.display()))
        })?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channel_count = track.codec_params.channels.map_or(0, |c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MasteringError::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut planar: Vec<Vec<f64>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f64>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(MasteringError::Decode(format!(
                    "Error reading packet: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!("Skipping corrupt packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(MasteringError::Decode(format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        if planar.is_empty() {
            channel_count = spec.channels.count();
            sample_rate = spec.rate;
            planar = vec![Vec::new(); channel_count];
        }

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f64>::new(decoded.capacity() as u64, spec)
        });
        if buf.capacity() < decoded.capacity() * channel_count {
            *buf = SampleBuffer::<f64>::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }
    }

    if planar.is_empty() || planar[0].is_empty() || channel_count == 0 {
        return Err(MasteringError::EmptyInput(path.to_path_buf()));
    }
    if sample_rate == 0 {
        return Err(MasteringError::Decode(format!(
            "Unknown sample rate in {}",
            path.display()
        )));
    }

    let buffer = AudioBuffer::new(planar, sample_rate)?;
    debug!(
        "Decoded {}: {} ch, {} Hz, {:.1} sec",
        path.display(),
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration_secs()
    );
    Ok(buffer)
}
