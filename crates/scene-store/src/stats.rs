//! Band statistics over valid (non-zero) samples.

use serde::Serialize;

use tiler_common::{TilerError, TilerResult};

/// Number of histogram bins.
pub const HISTOGRAM_BINS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandStatistics {
    /// `[pmin, pmax]` percentile values.
    pub pc: [f64; 2],
    pub min: f64,
    pub max: f64,
    pub std: f64,
    /// Bin counts and the `HISTOGRAM_BINS + 1` bin edges.
    pub histogram: (Vec<u64>, Vec<f64>),
}

/// Check `0 <= pmin < pmax <= 100`.
pub fn validate_percentiles(pmin: f64, pmax: f64) -> TilerResult<()> {
    if !(0.0..=100.0).contains(&pmin) || !(0.0..=100.0).contains(&pmax) || pmin >= pmax {
        return Err(TilerError::Validation(format!(
            "percentiles must satisfy 0 <= pmin < pmax <= 100, got {} and {}",
            pmin, pmax
        )));
    }
    Ok(())
}

/// Percentile of sorted data, interpolating linearly between closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// Equal-width histogram over `[min, max]`. A flat input widens to
/// `[min - 0.5, max + 0.5]`.
pub fn histogram(values: &[f64], min: f64, max: f64) -> (Vec<u64>, Vec<f64>) {
    let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let width = (hi - lo) / HISTOGRAM_BINS as f64;
    let edges: Vec<f64> = (0..=HISTOGRAM_BINS).map(|i| lo + width * i as f64).collect();

    let mut counts = vec![0u64; HISTOGRAM_BINS];
    for &v in values {
        let bin = (((v - lo) / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    (counts, edges)
}

/// Statistics of the non-zero samples, or `None` if there are none.
pub fn band_statistics(samples: &[u16], pmin: f64, pmax: f64) -> Option<BandStatistics> {
    let mut values: Vec<f64> = samples
        .iter()
        .filter(|&&v| v != 0)
        .map(|&v| v as f64)
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let min = values[0];
    let max = values[values.len() - 1];

    Some(BandStatistics {
        pc: [percentile(&values, pmin), percentile(&values, pmax)],
        min,
        max,
        std: variance.sqrt(),
        histogram: histogram(&values, min, max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert_eq!(percentile(&sorted, 12.5), 1.5);
    }

    #[test]
    fn test_zero_samples_ignored() {
        let stats = band_statistics(&[0, 0, 10, 20, 30], 0.0, 100.0).unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.histogram.0.iter().sum::<u64>(), 3);
        assert!(band_statistics(&[0, 0], 2.0, 98.0).is_none());
    }

    #[test]
    fn test_histogram_edges() {
        let (counts, edges) = histogram(&[0.0, 5.0, 10.0], 0.0, 10.0);
        assert_eq!(edges.len(), HISTOGRAM_BINS + 1);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[HISTOGRAM_BINS], 10.0);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[5], 1);
        assert_eq!(counts[9], 1);
    }

    #[test]
    fn test_flat_band() {
        let stats = band_statistics(&[7, 7, 7], 2.0, 98.0).unwrap();
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.pc, [7.0, 7.0]);
        assert_eq!(stats.histogram.0.iter().sum::<u64>(), 3);
    }

    #[test]
    fn test_validate_percentiles() {
        assert!(validate_percentiles(2.0, 98.0).is_ok());
        assert!(validate_percentiles(50.0, 50.0).is_err());
        assert!(validate_percentiles(-1.0, 98.0).is_err());
        assert!(validate_percentiles(2.0, 101.0).is_err());
    }
}
