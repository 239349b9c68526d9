//! Forge - mastering and batch export from the command line
mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crate::config::{ExportConfig, ExportFormat};
use forge_export::{BatchExportRequest, BatchExporter, ManifestLibrary};
use forge_mastering::{analyze_file, mastered_filename, FfmpegMp3Encoder, MasteringPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Loudness-normalize, limit and package audio for distribution", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Master a single file
    Master {
        /// Source audio file
        input: PathBuf,
        /// Output file (defaults to <output dir>/<stem>_mastered.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        overrides: MasteringOverrides,
    },
    /// Master tracks from a manifest into one ZIP archive
    Batch {
        /// JSON manifest of { id, audio_path, title } entries
        #[arg(short, long)]
        manifest: PathBuf,
        /// Track ids to export, in archive order
        #[arg(required = true)]
        ids: Vec<String>,
        /// Directory the archive is written to
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[command(flatten)]
        overrides: MasteringOverrides,
    },
    /// Report loudness and peak levels without modifying anything
    Analyze {
        /// Audio files to measure
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Per-call overrides of the `[mastering]` config section
#[derive(Args, Debug, Default)]
struct MasteringOverrides {
    /// Loudness target in LUFS
    #[arg(long, allow_hyphen_values = true)]
    target_lufs: Option<f64>,
    /// True-peak ceiling in dBTP
    #[arg(long, allow_hyphen_values = true)]
    ceiling: Option<f64>,
    /// Output sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Output format
    #[arg(long, value_enum)]
    format: Option<ExportFormat>,
    /// MP3 bitrate in kbps
    #[arg(long)]
    bitrate: Option<u32>,
}

impl MasteringOverrides {
    fn apply(&self, config: &mut ExportConfig) {
        let settings = &mut config.mastering;
        if let Some(lufs) = self.target_lufs {
            settings.target_loudness_db = lufs;
        }
        if let Some(ceiling) = self.ceiling {
            settings.true_peak_ceiling_db = ceiling;
        }
        if let Some(rate) = self.sample_rate {
            settings.target_sample_rate = rate;
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        if let Some(bitrate) = self.bitrate {
            settings.mp3_bitrate_kbps = bitrate;
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge=info,forge_export=info,forge_mastering=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = ExportConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Master {
            input,
            output,
            overrides,
        } => {
            overrides.apply(&mut config);
            config.validate()?;
            master(&config, &input, output)?;
        }
        Commands::Batch {
            manifest,
            ids,
            output_dir,
            overrides,
        } => {
            overrides.apply(&mut config);
            if let Some(dir) = output_dir {
                config.output.directory = dir;
            }
            config.validate()?;
            batch(&config, &manifest, ids)?;
        }
        Commands::Analyze { inputs, json } => {
            analyze(&inputs, json)?;
        }
    }

    Ok(())
}

fn ffmpeg_encoder(config: &ExportConfig) -> Arc<FfmpegMp3Encoder> {
    let mut encoder = FfmpegMp3Encoder::new(config.encoder.ffmpeg_path.clone());
    if let Some(dir) = &config.encoder.staging_dir {
        encoder = encoder.with_staging_dir(dir.clone());
    }
    Arc::new(encoder)
}

fn master(config: &ExportConfig, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let request = config.mastering.to_request();
    let pipeline = MasteringPipeline::new(request)?.with_compressed_encoder(ffmpeg_encoder(config));

    let output = output
        .unwrap_or_else(|| config.output.directory.join(mastered_filename(input, request.codec)));
    let result = pipeline
        .master_to_path(input, &output)
        .with_context(|| format!("Failed to master {}", input.display()))?;

    tracing::info!(
        "Wrote {} [{}] ({:.1} LUFS, {:.2} dBTP, gain {:+.2} dB, limiter {:.2} dB)",
        output.display(),
        result.content_type(),
        result.report.loudness_after_db,
        result.report.true_peak_after_db,
        result.report.gain_db,
        result.report.limiter_reduction_db
    );
    println!("{}", output.display());
    Ok(())
}

fn batch(config: &ExportConfig, manifest: &Path, ids: Vec<String>) -> Result<()> {
    let library = ManifestLibrary::load(manifest)?;
    let exporter = BatchExporter::new(library).with_compressed_encoder(ffmpeg_encoder(config));

    let request = BatchExportRequest::new(ids, config.mastering.to_request());
    let archive = exporter.export(&request)?;
    let path = archive
        .write_to(&config.output.directory)
        .with_context(|| format!("Failed to write archive to {}", config.output.directory.display()))?;

    for entry in &archive.entries {
        tracing::info!(
            "{} -> {} ({:.1} LUFS, {:.2} dBTP)",
            entry.track_id,
            entry.file_name,
            entry.loudness_after_db,
            entry.true_peak_after_db
        );
    }
    println!("{}", path.display());
    Ok(())
}

fn analyze(inputs: &[PathBuf], json: bool) -> Result<()> {
    for input in inputs {
        let analysis =
            analyze_file(input).with_context(|| format!("Failed to analyze {}", input.display()))?;

        if json {
            let mut value = serde_json::to_value(&analysis)?;
            value["path"] = serde_json::Value::String(input.display().to_string());
            println!("{}", value);
        } else {
            println!("{}", input.display());
            println!("  Format:     {} Hz, {} ch, {:.2} s", analysis.sample_rate, analysis.channels, analysis.duration_secs);
            println!("  Loudness:   {:.1} LUFS", analysis.loudness_db);
            println!("  True peak:  {:.2} dBTP", analysis.true_peak_db);
            println!("  Sample peak: {:.2} dBFS", analysis.sample_peak_db);
        }
    }
    Ok(())
}
