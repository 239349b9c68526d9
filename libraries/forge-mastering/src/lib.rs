//! Mastering engine for Forge exports
//!
//! Turns arbitrary generated or library audio into distributor-ready
//! files:
//! - Decoding of WAV, FLAC, MP3, OGG/Vorbis and AAC/M4A sources
//! - Rational polyphase sample-rate conversion
//! - Simplified (non-gated) integrated loudness measurement
//! - True peak estimation by 4x oversampling
//! - Loudness normalization with a static true-peak limiter
//! - 16-bit WAV output, or MP3 through an external encoder
//!
//! # Architecture
//!
//! ```text
//! ┌────────┐   ┌───────────┐   ┌──────────┐   ┌─────────┐   ┌─────────┐
//! │ Loader │──►│ Resampler │──►│ Loudness │──►│ Limiter │──►│ Encoder │
//! └────────┘   └───────────┘   │   gain   │   │ + clip  │   └─────────┘
//!                              └──────────┘   └─────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use forge_mastering::{MasteringPipeline, MasteringRequest};
//!
//! let pipeline = MasteringPipeline::new(MasteringRequest::default())?;
//! let result = pipeline.master_file(Path::new("take.flac"))?;
//!
//! println!("{}: {:.1} LUFS", result.filename, result.report.loudness_after_db);
//! ```

#![deny(unsafe_code)]

pub mod analysis;
pub mod buffer;
pub mod encoder;
mod error;
pub mod limiter;
pub mod loader;
pub mod loudness;
pub mod pipeline;
pub mod request;
pub mod resampler;
pub mod true_peak;

pub use analysis::{analyze_buffer, analyze_file, AudioAnalysis};
pub use buffer::AudioBuffer;
pub use encoder::{encode, CompressedEncoder, FfmpegMp3Encoder};
pub use error::{ErrorKind, MasteringError, Result};
pub use limiter::{limit_true_peak, normalize_loudness, GainOutcome, LimitOutcome};
pub use loader::load_audio;
pub use loudness::{measure_loudness, SILENCE_FLOOR_DB};
pub use pipeline::{mastered_filename, MasteringPipeline, MasteringReport, MasteringResult};
pub use request::{MasteringRequest, OutputCodec};
pub use resampler::{resample, PolyphaseFilter, Resampler};
pub use true_peak::{db_to_linear, linear_to_db, measure_true_peak, sample_peak_db, true_peak_linear};
