//! Benchmark statistics.
//!
//! Measurements are reduced to a per-batch mean and population standard
//! deviation. The ratio of the two decides how trustworthy the result looks.

use crate::case::BenchmarkUnits;
use serde::{Deserialize, Serialize};
use termcolor::Color;

/// Reliability band of a benchmark result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deviation {
    Default,
    Yellow,
    Red,
}

impl Deviation {
    pub(crate) fn color(self) -> Option<Color> {
        match self {
            Deviation::Default => Some(Color::Green),
            Deviation::Yellow => Some(Color::Yellow),
            Deviation::Red => Some(Color::Red),
        }
    }
}

/// Mean and deviation of one benchmark, per batch item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStats {
    pub mean: f64,
    pub stddev: f64,
    pub deviation: Deviation,
}

/// Number of leading measurements actually discarded.
///
/// At least one measurement always survives.
pub fn discard_count(len: usize, discard: usize) -> usize {
    discard.min(len.saturating_sub(1))
}

/// Reduce `measurements` to mean, deviation and reliability band.
///
/// The first `discard` samples (capped so one survives) are skipped but
/// remain in the buffer. Each sample is divided by `batch_size` first; a
/// zero batch size counts as one.
pub fn reduce(
    measurements: &[u64],
    discard: usize,
    batch_size: usize,
    yellow: f64,
    red: f64,
) -> BenchmarkStats {
    let kept = &measurements[discard_count(measurements.len(), discard)..];
    if kept.is_empty() {
        return BenchmarkStats {
            mean: 0.0,
            stddev: 0.0,
            deviation: Deviation::Default,
        };
    }

    let batch = batch_size.max(1) as f64;
    let n = kept.len() as f64;
    let mean = kept.iter().map(|&v| v as f64 / batch).sum::<f64>() / n;
    let variance = kept
        .iter()
        .map(|&v| {
            let diff = v as f64 / batch - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    let stddev = variance.sqrt();

    BenchmarkStats {
        mean,
        stddev,
        deviation: classify(mean, stddev, yellow, red),
    }
}

fn classify(mean: f64, stddev: f64, yellow: f64, red: f64) -> Deviation {
    if mean <= 0.0 {
        return Deviation::Default;
    }
    let ratio = stddev / mean;
    if ratio > red {
        Deviation::Red
    } else if ratio > yellow {
        Deviation::Yellow
    } else {
        Deviation::Default
    }
}

/// Scale `mean` and `stddev` to a readable magnitude for `units`.
///
/// Returns the scaled pair and the unit suffix, e.g. `(1.5, 0.1, "ms")`.
pub fn scale(mean: f64, stddev: f64, units: BenchmarkUnits) -> (f64, f64, &'static str) {
    let (divisor, suffix) = match units {
        BenchmarkUnits::Nanoseconds => magnitude(mean, 1e3, ["ns", "µs", "ms", "s"]),
        BenchmarkUnits::Bytes => magnitude(mean, 1024.0, ["B", "kB", "MB", "GB"]),
        BenchmarkUnits::Cycles => {
            magnitude(mean, 1e3, ["cycles", "k cycles", "M cycles", "G cycles"])
        }
        BenchmarkUnits::Instructions => magnitude(
            mean,
            1e3,
            ["instructions", "k instructions", "M instructions", "G instructions"],
        ),
        BenchmarkUnits::Count => magnitude(mean, 1e3, ["", "k", "M", "G"]),
    };
    (mean / divisor, stddev / divisor, suffix)
}

fn magnitude(mean: f64, base: f64, suffixes: [&'static str; 4]) -> (f64, &'static str) {
    let mut divisor = 1.0;
    let mut i = 0;
    while i + 1 < suffixes.len() && mean >= divisor * base {
        divisor *= base;
        i += 1;
    }
    (divisor, suffixes[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_discard_leading_samples() {
        let stats = reduce(&[100, 10, 10, 10, 10], 1, 1, 0.05, 0.25);
        assert_eq!(stats.mean, 10.0);
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.deviation, Deviation::Default);
    }

    #[test]
    fn should_keep_one_sample_when_discard_exceeds_length() {
        assert_eq!(discard_count(3, 10), 2);
        assert_eq!(discard_count(1, 1), 0);
        assert_eq!(discard_count(0, 1), 0);
        let stats = reduce(&[5, 7, 42], 10, 1, 0.05, 0.25);
        assert_eq!(stats.mean, 42.0);
    }

    #[test]
    fn should_divide_by_batch_size() {
        let stats = reduce(&[1000, 2000], 0, 100, 0.05, 0.25);
        assert_eq!(stats.mean, 15.0);
        assert_eq!(stats.stddev, 5.0);
    }

    #[test]
    fn should_flag_red_when_ratio_above_red() {
        // mean 10, population stddev 3 -> ratio 0.3
        let stats = reduce(&[7, 13], 0, 1, 0.05, 0.25);
        assert_eq!(stats.mean, 10.0);
        assert!((stats.stddev - 3.0).abs() < 1e-12);
        assert_eq!(stats.deviation, Deviation::Red);
    }

    #[test]
    fn should_flag_yellow_between_thresholds() {
        // mean 10, stddev 1 -> ratio 0.1
        let stats = reduce(&[9, 11], 0, 1, 0.05, 0.25);
        assert_eq!(stats.deviation, Deviation::Yellow);
    }

    #[test]
    fn should_return_zeroes_when_no_samples() {
        let stats = reduce(&[], 1, 1, 0.05, 0.25);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.deviation, Deviation::Default);
    }

    #[test]
    fn should_scale_values_into_readable_units() {
        assert_eq!(scale(1500.0, 15.0, BenchmarkUnits::Nanoseconds), (1.5, 0.015, "µs"));
        assert_eq!(scale(2048.0, 0.0, BenchmarkUnits::Bytes), (2.0, 0.0, "kB"));
        assert_eq!(scale(3e6, 0.0, BenchmarkUnits::Cycles), (3.0, 0.0, "M cycles"));
        assert_eq!(scale(12.0, 1.0, BenchmarkUnits::Count), (12.0, 1.0, ""));
    }
}
