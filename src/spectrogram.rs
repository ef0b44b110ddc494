//! Sliding-window spectrogram computation.
//!
//! Pre-allocates all FFT buffers once per call and reuses them across
//! windows, so the per-window cost is the FFT itself plus a table lookup
//! per bin.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::SpectrogramError;
use crate::scale::{BucketMap, FrequencyScale};

pub const DEFAULT_WINDOW_SIZE: usize = 4096;

/// Caller-supplied configuration. Unset fields resolve to defaults derived
/// from `sample_rate` and `window_size`; the resolved values are echoed back
/// in [`SpectrogramResult::options`] so the caller sees exactly what was
/// used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrogramOptions {
    pub sample_rate: u32,
    #[serde(default)]
    pub window_size: Option<usize>,
    /// Sample distance between consecutive window starts. Must evenly
    /// divide `window_size`. Defaults to `window_size / 4` (75% overlap).
    #[serde(default)]
    pub window_step_size: Option<usize>,
    #[serde(default)]
    pub scale: Option<FrequencyScale>,
    /// Output buckets per window. Defaults to `window_size / 2`, one bucket
    /// per retained FFT bin.
    #[serde(default)]
    pub scale_size: Option<usize>,
    #[serde(default)]
    pub min_frequency_hz: Option<f64>,
    #[serde(default)]
    pub max_frequency_hz: Option<f64>,
    /// The addressed range is the true beginning of the signal; synthesize
    /// extra windows before it so early content appears centered.
    #[serde(default)]
    pub is_start: bool,
    /// Same as `is_start`, for the end of the signal.
    #[serde(default)]
    pub is_end: bool,
}

impl SpectrogramOptions {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            window_size: None,
            window_step_size: None,
            scale: None,
            scale_size: None,
            min_frequency_hz: None,
            max_frequency_hz: None,
            is_start: false,
            is_end: false,
        }
    }

    /// Apply defaults and validate. Fails before any computation happens.
    pub fn resolve(&self) -> Result<ResolvedOptions, SpectrogramError> {
        let window_size = self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
        let window_step_size = self.window_step_size.unwrap_or(window_size / 4);
        if window_size == 0 || window_step_size == 0 {
            return Err(SpectrogramError::EmptyWindow);
        }
        if window_size % window_step_size != 0 {
            return Err(SpectrogramError::StepNotDivisible);
        }

        let scale = self.scale.unwrap_or_default();
        let scale_size = self.scale_size.unwrap_or(window_size / 2);
        if scale_size == 0 {
            return Err(SpectrogramError::EmptyScale);
        }

        let min_frequency_hz = self.min_frequency_hz.unwrap_or(0.0);
        // Center frequency of the highest retained bin (the Nyquist bin is
        // dropped): k = window_size/2 - 1.
        let max_frequency_hz = self.max_frequency_hz.unwrap_or(
            self.sample_rate as f64 * (window_size as f64 - 2.0) / (2.0 * window_size as f64),
        );
        let nyquist = self.sample_rate as f64 / 2.0;
        if !(0.0 <= min_frequency_hz && min_frequency_hz < max_frequency_hz
            && max_frequency_hz <= nyquist)
        {
            return Err(SpectrogramError::InvalidFrequencyRange {
                min: min_frequency_hz,
                max: max_frequency_hz,
                nyquist,
            });
        }

        Ok(ResolvedOptions {
            sample_rate: self.sample_rate,
            window_size,
            window_step_size,
            scale,
            scale_size,
            min_frequency_hz,
            max_frequency_hz,
            is_start: self.is_start,
            is_end: self.is_end,
        })
    }
}

/// [`SpectrogramOptions`] with every default applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    pub sample_rate: u32,
    pub window_size: usize,
    pub window_step_size: usize,
    pub scale: FrequencyScale,
    pub scale_size: usize,
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
    pub is_start: bool,
    pub is_end: bool,
}

/// One computed spectrogram: `window_count` rows of `scale_size` magnitudes,
/// window-major, bucket-minor. `spectrogram.len() == window_count *
/// options.scale_size` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrogramResult {
    pub window_count: usize,
    pub options: ResolvedOptions,
    pub spectrogram: Vec<f32>,
}

/// Compute the spectrogram of `samples[start..start + length]`.
///
/// Slides a `window_size` window across the range in `window_step_size`
/// steps. Per window: Hann-weight the samples (reads outside the addressed
/// range yield silence), forward FFT, keep the `window_size / 2` bins below
/// Nyquist, take per-bin magnitude, and remap into `scale_size` buckets on
/// the configured frequency scale.
///
/// `is_start`/`is_end` synthesize `window_size / window_step_size - 1`
/// additional windows at that boundary so content near the edge of the
/// signal still appears centered in at least one full window.
///
/// # Panics
///
/// `start`/`length` must address a valid sub-range of `samples`; violating
/// that is a programming error, not a recoverable condition.
pub fn compute_spectrogram(
    samples: &[f32],
    start: usize,
    length: usize,
    options: &SpectrogramOptions,
) -> Result<SpectrogramResult, SpectrogramError> {
    let opts = options.resolve()?;

    let end = start
        .checked_add(length)
        .expect("sample range overflows usize");
    assert!(
        end <= samples.len(),
        "sample range {start}..{end} out of bounds for {} samples",
        samples.len()
    );

    let window_size = opts.window_size;
    let step = opts.window_step_size;
    // Windows overlapping one full window span.
    let span = window_size / step;

    let base_count = (length.div_ceil(step) + 1).saturating_sub(span);
    let lead = if opts.is_start { span - 1 } else { 0 };
    let trail = if opts.is_end { span - 1 } else { 0 };
    let window_count = base_count + lead + trail;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(window_size);
    let mut fft_input = vec![Complex::new(0.0f32, 0.0); window_size];
    let mut fft_scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];

    let window_fn = hann_window(window_size);
    let bin_count = window_size / 2;
    let mut magnitudes = vec![0.0f32; bin_count];
    let buckets = BucketMap::new(
        opts.scale,
        opts.scale_size,
        opts.min_frequency_hz,
        opts.max_frequency_hz,
        bin_count,
        opts.sample_rate,
        window_size,
    );

    let mut spectrogram = vec![0.0f32; window_count * opts.scale_size];
    let signed_length = length as isize;

    for w in 0..window_count {
        // Offset of the window's first sample relative to `start`; negative
        // for the synthesized leading windows.
        let first = (w as isize - lead as isize) * step as isize;

        for (m, slot) in fft_input.iter_mut().enumerate() {
            let g = first + m as isize;
            let sample = if g >= 0 && g < signed_length {
                samples[start + g as usize]
            } else {
                0.0
            };
            *slot = Complex::new(sample * window_fn[m], 0.0);
        }

        fft.process_with_scratch(&mut fft_input, &mut fft_scratch);

        for (mag, bin) in magnitudes.iter_mut().zip(&fft_input[..bin_count]) {
            *mag = (bin.re * bin.re + bin.im * bin.im).sqrt();
        }

        let row = &mut spectrogram[w * opts.scale_size..(w + 1) * opts.scale_size];
        buckets.accumulate(&magnitudes, row);
    }

    tracing::debug!(
        window_count,
        scale_size = opts.scale_size,
        "computed spectrogram"
    );

    Ok(SpectrogramResult {
        window_count,
        options: opts,
        spectrogram,
    })
}

/// Periodic Hann window (divides by N, not N-1): the periodic form avoids
/// the discontinuity at window boundaries when frames overlap.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (2.0 * std::f64::consts::PI * freq * t).sin() as f32
            })
            .collect()
    }

    #[test]
    fn test_defaults_resolve() {
        let opts = SpectrogramOptions::new(44100).resolve().unwrap();
        assert_eq!(opts.window_size, 4096);
        assert_eq!(opts.window_step_size, 1024);
        assert_eq!(opts.scale, FrequencyScale::Mel);
        assert_eq!(opts.scale_size, 2048);
        assert_eq!(opts.min_frequency_hz, 0.0);
        let expected_max = 44100.0 * (4096.0 - 2.0) / (2.0 * 4096.0);
        assert!((opts.max_frequency_hz - expected_max).abs() < 1e-5);
    }

    #[test]
    fn test_step_must_divide_window() {
        let options = SpectrogramOptions {
            window_size: Some(4096),
            window_step_size: Some(1000),
            ..SpectrogramOptions::new(44100)
        };
        let err = options.resolve().unwrap_err();
        assert_eq!(err, SpectrogramError::StepNotDivisible);
        assert_eq!(
            err.to_string(),
            "Window step size must be evenly divisible by the window size"
        );
    }

    #[test]
    fn test_invalid_frequency_range() {
        let options = SpectrogramOptions {
            min_frequency_hz: Some(8000.0),
            max_frequency_hz: Some(4000.0),
            ..SpectrogramOptions::new(44100)
        };
        assert!(matches!(
            options.resolve(),
            Err(SpectrogramError::InvalidFrequencyRange { .. })
        ));

        let options = SpectrogramOptions {
            max_frequency_hz: Some(30000.0), // above Nyquist
            ..SpectrogramOptions::new(44100)
        };
        assert!(options.resolve().is_err());
    }

    #[test]
    fn test_window_count_without_padding() {
        let samples = vec![0.0f32; 44100];
        let result =
            compute_spectrogram(&samples, 0, samples.len(), &SpectrogramOptions::new(44100))
                .unwrap();
        // ceil(44100 / 1024) - 4096/1024 + 1
        assert_eq!(result.window_count, 44 - 4 + 1);
        assert_eq!(
            result.spectrogram.len(),
            result.window_count * result.options.scale_size
        );
    }

    #[test]
    fn test_window_count_with_boundary_padding() {
        let samples = vec![0.0f32; 44100];
        let options = SpectrogramOptions {
            is_start: true,
            is_end: true,
            ..SpectrogramOptions::new(44100)
        };
        let result = compute_spectrogram(&samples, 0, samples.len(), &options).unwrap();
        let span = 4096 / 1024;
        let expected = (44100usize.div_ceil(1024) - span + 1) + 2 * (span - 1);
        assert_eq!(result.window_count, expected);
    }

    #[test]
    fn test_empty_range_produces_no_windows() {
        let samples = vec![0.0f32; 128];
        let result = compute_spectrogram(&samples, 64, 0, &SpectrogramOptions::new(44100)).unwrap();
        assert_eq!(result.window_count, 0);
        assert!(result.spectrogram.is_empty());
    }

    #[test]
    fn test_sine_peak_lands_in_expected_bucket() {
        let sample_rate = 44100u32;
        let freq = 1000.0;
        let samples = sine(freq, sample_rate, 8192);
        let options = SpectrogramOptions {
            window_size: Some(1024),
            window_step_size: Some(512),
            scale: Some(FrequencyScale::Linear),
            scale_size: Some(512),
            min_frequency_hz: Some(0.0),
            max_frequency_hz: Some(sample_rate as f64 / 2.0),
            ..SpectrogramOptions::new(sample_rate)
        };
        let result = compute_spectrogram(&samples, 0, samples.len(), &options).unwrap();

        // One bucket per retained bin over 0..Nyquist, so the peak bucket is
        // the bin nearest 1000 Hz.
        let expected = (freq * 1024.0 / sample_rate as f64).round() as usize;
        let row = &result.spectrogram[512..1024]; // second window, clear of edges
        let peak = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert!(
            peak.abs_diff(expected) <= 1,
            "peak bucket {} should be near {}",
            peak,
            expected
        );
    }

    #[test]
    fn test_silence_is_near_zero() {
        let samples = vec![0.0f32; 8192];
        let options = SpectrogramOptions {
            window_size: Some(1024),
            ..SpectrogramOptions::new(44100)
        };
        let result = compute_spectrogram(&samples, 0, samples.len(), &options).unwrap();
        let max = result.spectrogram.iter().cloned().fold(0.0f32, f32::max);
        assert!(max < 1e-10, "silence should produce near-zero output");
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_range_sub_range_panics() {
        let samples = vec![0.0f32; 100];
        let _ = compute_spectrogram(&samples, 50, 100, &SpectrogramOptions::new(44100));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: SpectrogramOptions =
            serde_json::from_str(r#"{"sample_rate": 48000, "scale": "linear"}"#).unwrap();
        assert_eq!(options.sample_rate, 48000);
        assert_eq!(options.scale, Some(FrequencyScale::Linear));
        assert_eq!(options.window_size, None);
        assert!(!options.is_start);
    }
}
