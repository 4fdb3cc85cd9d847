//! Quantiles and histogram summaries for frame-gap latency

use serde::{Deserialize, Serialize};

/// Linear interpolation between the two nearest ranks
///
/// `sorted` must already be ascending; no validation is performed.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = (n - 1) as f64 * q;
            let lo = pos as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Compact latency summary written into `ws_metrics` and the result
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub mean: f64,
}

/// Round to three decimals so logs stay stable across float noise
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Summarize unsorted samples; all zero when there are none
pub fn histogram_summary(values: &[f64]) -> Histogram {
    if values.is_empty() {
        return Histogram::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let total: f64 = sorted.iter().sum();

    Histogram {
        count: n,
        min: round3(sorted[0]),
        max: round3(sorted[n - 1]),
        p50: round3(percentile(&sorted, 0.50)),
        p95: round3(percentile(&sorted, 0.95)),
        p99: round3(percentile(&sorted, 0.99)),
        mean: round3(total / n as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_empty_is_zero() {
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(percentile(&[], 0.99), 0.0);
    }

    #[test]
    fn test_percentile_single_value_ignores_q() {
        for q in [0.0, 0.5, 0.95, 1.0] {
            assert_eq!(percentile(&[5.0], q), 5.0);
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 0.0), 1.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 1.0), 4.0);
        assert!((percentile(&[10.0, 20.0], 0.95) - 19.5).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_empty() {
        let h = histogram_summary(&[]);
        assert_eq!(h.count, 0);
        assert_eq!(h, Histogram::default());
        assert_eq!(h.mean, 0.0);
    }

    #[test]
    fn test_histogram_sorts_and_rounds() {
        let h = histogram_summary(&[3.0, 1.0, 2.0, 4.0004]);
        assert_eq!(h.count, 4);
        assert_eq!(h.min, 1.0);
        assert_eq!(h.max, 4.0);
        assert_eq!(h.p50, 2.5);
        assert_eq!(h.mean, 2.5);
        assert!(h.p95 > h.p50 && h.p99 >= h.p95);
    }
}
