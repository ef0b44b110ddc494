//! Frequency-scale remapping between linear FFT bins and output buckets.
//!
//! Bucket edges are computed once per spectrogram computation and reused
//! across every window, so remapping is a table lookup per bin.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Spacing of the output buckets between the configured min and max
/// frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyScale {
    /// Buckets uniformly spaced in Hz.
    Linear,
    /// Buckets uniformly spaced in mel, so high frequencies are compressed
    /// the way the ear perceives them.
    #[default]
    Mel,
}

impl FromStr for FrequencyScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(FrequencyScale::Linear),
            "mel" => Ok(FrequencyScale::Mel),
            other => Err(format!("unknown scale `{other}` (expected `linear` or `mel`)")),
        }
    }
}

impl std::fmt::Display for FrequencyScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrequencyScale::Linear => f.write_str("linear"),
            FrequencyScale::Mel => f.write_str("mel"),
        }
    }
}

/// Convert frequency in Hz to mel scale
#[inline]
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mel to Hz
#[inline]
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0f64.powf(mel / 2595.0) - 1.0)
}

/// The `scale_size + 1` bucket edges in Hz between `min_hz` and `max_hz`.
///
/// Linear edges are uniform in Hz; mel edges are uniform in mel and then
/// converted back. Edges are monotonically increasing and the first/last
/// edges are exactly `min_hz`/`max_hz`.
pub fn bucket_edges(scale: FrequencyScale, scale_size: usize, min_hz: f64, max_hz: f64) -> Vec<f64> {
    match scale {
        FrequencyScale::Linear => (0..=scale_size)
            .map(|i| min_hz + (max_hz - min_hz) * i as f64 / scale_size as f64)
            .collect(),
        FrequencyScale::Mel => {
            let mel_min = hz_to_mel(min_hz);
            let mel_max = hz_to_mel(max_hz);
            (0..=scale_size)
                .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / scale_size as f64))
                .collect()
        }
    }
}

/// Per-computation bin→bucket assignment table.
///
/// Bin `k`'s center frequency is `k * sample_rate / window_size`; it maps to
/// the bucket whose `[edge[b], edge[b+1])` range contains it (the final edge
/// is inclusive). Bins outside `[min_hz, max_hz]` are unassigned and never
/// contribute. A bucket takes the max of the magnitudes mapped to it;
/// buckets with no bins stay at 0.
pub(crate) struct BucketMap {
    assignments: Vec<Option<usize>>,
}

impl BucketMap {
    pub(crate) fn new(
        scale: FrequencyScale,
        scale_size: usize,
        min_hz: f64,
        max_hz: f64,
        bin_count: usize,
        sample_rate: u32,
        window_size: usize,
    ) -> Self {
        let edges = bucket_edges(scale, scale_size, min_hz, max_hz);
        let assignments = (0..bin_count)
            .map(|k| {
                let center = k as f64 * sample_rate as f64 / window_size as f64;
                assign_bucket(&edges, center)
            })
            .collect();
        Self { assignments }
    }

    /// Fold one window's bin magnitudes into its output row.
    pub(crate) fn accumulate(&self, magnitudes: &[f32], row: &mut [f32]) {
        for (mag, bucket) in magnitudes.iter().zip(&self.assignments) {
            if let Some(b) = bucket {
                row[*b] = row[*b].max(*mag);
            }
        }
    }
}

fn assign_bucket(edges: &[f64], hz: f64) -> Option<usize> {
    let bucket_count = edges.len() - 1;
    if hz < edges[0] || hz > edges[bucket_count] {
        return None;
    }
    // First edge strictly above hz, minus one; the top edge folds into the
    // last bucket.
    let idx = edges.partition_point(|&e| e <= hz);
    Some(idx.saturating_sub(1).min(bucket_count - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hz_mel_roundtrip() {
        for &hz in &[0.0, 440.0, 1000.0, 8000.0, 22050.0] {
            let mel = hz_to_mel(hz);
            let roundtrip = mel_to_hz(mel);
            assert!(
                (roundtrip - hz).abs() < 0.01,
                "Hz→Mel→Hz roundtrip failed for {}Hz",
                hz
            );
        }
    }

    #[test]
    fn test_linear_edges_uniform() {
        let edges = bucket_edges(FrequencyScale::Linear, 4, 0.0, 400.0);
        assert_eq!(edges, vec![0.0, 100.0, 200.0, 300.0, 400.0]);
    }

    #[test]
    fn test_mel_edges_monotonic_and_widening() {
        let edges = bucket_edges(FrequencyScale::Mel, 64, 0.0, 20000.0);
        assert_eq!(edges.len(), 65);
        assert!((edges[0] - 0.0).abs() < 1e-9);
        assert!((edges[64] - 20000.0).abs() < 1e-6);
        for pair in edges.windows(2) {
            assert!(pair[1] > pair[0], "edges must increase");
        }
        // Mel compresses highs: the top bucket spans more Hz than the bottom.
        let bottom = edges[1] - edges[0];
        let top = edges[64] - edges[63];
        assert!(top > bottom * 10.0);
    }

    #[test]
    fn test_assign_bucket_boundaries() {
        let edges = vec![0.0, 100.0, 200.0, 300.0];
        assert_eq!(assign_bucket(&edges, 0.0), Some(0));
        assert_eq!(assign_bucket(&edges, 99.9), Some(0));
        assert_eq!(assign_bucket(&edges, 100.0), Some(1));
        // Final edge is inclusive.
        assert_eq!(assign_bucket(&edges, 300.0), Some(2));
        assert_eq!(assign_bucket(&edges, 300.1), None);
        assert_eq!(assign_bucket(&edges, -1.0), None);
    }

    #[test]
    fn test_accumulate_takes_max_and_leaves_empty_buckets_zero() {
        // 4 bins at centers 0, 100, 200, 300 Hz into 2 buckets over 0..200.
        let map = BucketMap::new(FrequencyScale::Linear, 2, 0.0, 200.0, 4, 400, 4);
        let mut row = vec![0.0f32; 2];
        map.accumulate(&[0.5, 0.25, 0.75, 9.0], &mut row);
        // Bin 0 lands in bucket 0; bins 1 and 2 land in bucket 1 (200 Hz
        // sits on the inclusive top edge); bin 3 is out of range.
        assert_eq!(row, vec![0.5, 0.75]);

        let empty_map = BucketMap::new(FrequencyScale::Linear, 2, 0.0, 200.0, 1, 400, 4);
        let mut row = vec![0.0f32; 2];
        empty_map.accumulate(&[0.5], &mut row);
        assert_eq!(row[1], 0.0, "bucket with no bins stays zero");
    }

    #[test]
    fn test_scale_parsing() {
        assert_eq!("mel".parse::<FrequencyScale>(), Ok(FrequencyScale::Mel));
        assert_eq!(
            "linear".parse::<FrequencyScale>(),
            Ok(FrequencyScale::Linear)
        );
        assert!("bark".parse::<FrequencyScale>().is_err());
    }
}
