//! Sonograph CLI
//!
//! Compute spectrograms from WAV files on a pool of worker threads.
//!
//! # Usage
//!
//! ```bash
//! # Analyze a file with the default mel scale
//! sonograph analyze recording.wav
//!
//! # Linear scale, custom resolution, JSON dump
//! sonograph analyze recording.wav --scale linear --scale-size 512 --output spec.json
//!
//! # Show WAV metadata
//! sonograph info recording.wav
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sonograph::scale::bucket_edges;
use sonograph::{FrequencyScale, SpectrogramOptions, SpectrogramResult, WorkerPool};

#[derive(Parser)]
#[command(name = "sonograph")]
#[command(about = "Parallel spectrogram computation for WAV files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a spectrogram, chunk by chunk, across the worker pool
    Analyze {
        /// Input WAV file
        file: PathBuf,

        /// FFT window size in samples
        #[arg(long, default_value = "4096")]
        window_size: usize,

        /// Step between window starts (must evenly divide the window size;
        /// defaults to a quarter window)
        #[arg(long)]
        step_size: Option<usize>,

        /// Output frequency scale
        #[arg(long, default_value = "mel")]
        scale: FrequencyScale,

        /// Output buckets per window (defaults to half the window size)
        #[arg(long)]
        scale_size: Option<usize>,

        /// Lowest frequency to keep, in Hz
        #[arg(long)]
        min_frequency: Option<f64>,

        /// Highest frequency to keep, in Hz
        #[arg(long)]
        max_frequency: Option<f64>,

        /// Seconds of audio dispatched per pool task
        #[arg(long, default_value = "10.0")]
        chunk_seconds: f64,

        /// Worker threads (defaults to hardware parallelism)
        #[arg(long)]
        workers: Option<usize>,

        /// Write the per-chunk results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display metadata about a WAV file
    Info {
        /// Input WAV file
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            file,
            window_size,
            step_size,
            scale,
            scale_size,
            min_frequency,
            max_frequency,
            chunk_seconds,
            workers,
            output,
        } => {
            let (samples, sample_rate) = read_wav_mono(&file)?;
            tracing::info!(
                "Loaded {:?}: {} samples at {} Hz ({:.2} s)",
                file,
                samples.len(),
                sample_rate,
                samples.len() as f64 / sample_rate as f64
            );

            let pool = match workers {
                Some(count) => WorkerPool::with_workers(count),
                None => WorkerPool::new(),
            };
            tracing::info!("Worker pool started with {} workers", pool.worker_count());

            let options = SpectrogramOptions {
                window_size: Some(window_size),
                window_step_size: step_size,
                scale: Some(scale),
                scale_size,
                min_frequency_hz: min_frequency,
                max_frequency_hz: max_frequency,
                ..SpectrogramOptions::new(sample_rate)
            };

            let chunk_len = ((chunk_seconds * sample_rate as f64) as usize).max(window_size);
            let chunk_count = samples.len().div_ceil(chunk_len).max(1);

            let started = Instant::now();
            let mut pending = Vec::with_capacity(chunk_count);
            for i in 0..chunk_count {
                let start = i * chunk_len;
                let length = chunk_len.min(samples.len() - start);
                let chunk_options = SpectrogramOptions {
                    is_start: i == 0,
                    is_end: i == chunk_count - 1,
                    ..options.clone()
                };
                // Each task owns its buffer for the duration of the round
                // trip, so every chunk ships its own copy of the samples.
                pending.push(pool.dispatch(samples.clone(), start, length, chunk_options));
            }

            let mut results: Vec<SpectrogramResult> = Vec::with_capacity(chunk_count);
            for task in pending {
                let response = task.wait()?;
                results.push(response.result);
            }
            let elapsed = started.elapsed();

            let resolved = &results[0].options;
            let total_windows: usize = results.iter().map(|r| r.window_count).sum();
            let (peak, peak_bucket) = results
                .iter()
                .flat_map(|r| r.spectrogram.iter().enumerate())
                .fold((0.0f32, 0usize), |best, (i, &mag)| {
                    if mag > best.0 {
                        (mag, i % resolved.scale_size)
                    } else {
                        best
                    }
                });
            let edges = bucket_edges(
                resolved.scale,
                resolved.scale_size,
                resolved.min_frequency_hz,
                resolved.max_frequency_hz,
            );
            let peak_hz = (edges[peak_bucket] + edges[peak_bucket + 1]) / 2.0;

            println!("Chunks: {} ({} workers)", results.len(), pool.worker_count());
            println!("Windows: {}", total_windows);
            println!(
                "Buckets: {} ({} scale, {:.1}-{:.1} Hz)",
                resolved.scale_size,
                resolved.scale,
                resolved.min_frequency_hz,
                resolved.max_frequency_hz
            );
            println!("Peak: {:.3} around {:.1} Hz", peak, peak_hz);
            println!("Elapsed: {:.2?}", elapsed);

            if let Some(path) = output {
                let writer = BufWriter::new(File::create(&path)?);
                serde_json::to_writer(writer, &results)?;
                tracing::info!("Wrote {} chunk results to {:?}", results.len(), path);
            }
        }

        Commands::Info { file } => {
            let reader = hound::WavReader::open(&file)?;
            let spec = reader.spec();
            let frames = reader.duration();
            println!("WAV file: {:?}", file);
            println!("  Channels: {}", spec.channels);
            println!("  Sample rate: {} Hz", spec.sample_rate);
            println!(
                "  Bits per sample: {} ({:?})",
                spec.bits_per_sample, spec.sample_format
            );
            println!(
                "  Duration: {:.2} s ({} frames)",
                frames as f64 / spec.sample_rate as f64,
                frames
            );
        }
    }

    Ok(())
}

/// Read a WAV file and mix all channels down to mono f32.
fn read_wav_mono(path: &PathBuf) -> anyhow::Result<(Vec<f32>, u32)> {
    use hound::{SampleFormat, WavReader};

    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<hound::Result<_>>()?,
        SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .collect::<hound::Result<Vec<i32>>>()?
                .iter()
                .map(|&s| s as f32 / max_val)
                .collect()
        }
    };

    if channels <= 1 {
        return Ok((samples, spec.sample_rate));
    }
    let mono = samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}
