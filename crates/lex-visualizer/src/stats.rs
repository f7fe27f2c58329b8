//! Statistical helpers used to derive chart data.
//!
//! All functions take plain `f64` slices with missing values already
//! removed.

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let mean = mean(values).unwrap_or(0.0);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Sort a copy of `values` in ascending order.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Quantile `q` in `[0, 1]` of sorted data, by linear interpolation between
/// the closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Pearson correlation over pairs where both values are present.
///
/// Returns NaN with fewer than two complete pairs or when either side has
/// zero variance.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Upper bound on the number of histogram bins unless Sturges asks for more.
pub const MAX_BINS: usize = 1000;

/// Equal-width bin edges chosen by the "auto" rule: the narrower of the
/// Sturges and Freedman-Diaconis widths (Sturges when the IQR is zero).
///
/// Non-finite values are ignored. The bin count is capped at the larger of
/// [`MAX_BINS`] and the Sturges count. A single distinct value gets one
/// unit-wide bin centred on it.
pub fn auto_bin_edges(values: &[f64]) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Vec::new();
    }
    let data = sorted(&finite);
    let (min, max) = (data[0], data[data.len() - 1]);
    if min == max {
        return vec![min - 0.5, max + 0.5];
    }

    let n = data.len() as f64;
    let range = max - min;
    let sturges = range / (n.log2() + 1.0);
    let iqr = quantile_sorted(&data, 0.75).unwrap_or(max) - quantile_sorted(&data, 0.25).unwrap_or(min);
    let fd = 2.0 * iqr * n.powf(-1.0 / 3.0);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };

    let sturges_bins = (n.log2() + 1.0).ceil() as usize;
    let wanted = (range / width).ceil();
    let cap = MAX_BINS.max(sturges_bins);
    let bins = if wanted.is_finite() && wanted >= 1.0 {
        (wanted as usize).min(cap)
    } else {
        1
    };
    let step = range / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { max } else { min + step * i as f64 })
        .collect()
}

/// Count values per bin. Bins are half-open except the last, which also
/// holds the upper edge.
pub fn histogram_counts(values: &[f64], edges: &[f64]) -> Vec<usize> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let bins = edges.len() - 1;
    let (first, last) = (edges[0], edges[bins]);
    let width = (last - first) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        if !v.is_finite() || v < first || v > last {
            continue;
        }
        let mut idx = ((v - first) / width) as usize;
        idx = idx.min(bins - 1);
        // Guard against rounding at bin boundaries.
        while idx > 0 && v < edges[idx] {
            idx -= 1;
        }
        while idx + 1 < bins && v >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }
    counts
}

/// Gaussian kernel density estimate with Scott's bandwidth.
///
/// Returns `(x, density)` pairs at `points` evenly spaced positions over
/// `[lo, hi]`, or nothing when the data has no spread.
pub fn gaussian_kde(values: &[f64], lo: f64, hi: f64, points: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    let std = sample_std(values);
    if n < 2 || std == 0.0 || points < 2 || hi <= lo {
        return Vec::new();
    }

    let bandwidth = std * (n as f64).powf(-0.2);
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = (hi - lo) / (points - 1) as f64;

    (0..points)
        .map(|i| {
            let x = lo + step * i as f64;
            let density = values
                .iter()
                .map(|v| {
                    let z = (x - v) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

/// Five-number summary with Tukey whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub count: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value within 1.5 IQR below the first quartile.
    pub whisker_low: f64,
    /// Largest value within 1.5 IQR above the third quartile.
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let data = sorted(values);
    let q1 = quantile_sorted(&data, 0.25)?;
    let median = quantile_sorted(&data, 0.5)?;
    let q3 = quantile_sorted(&data, 0.75)?;
    let iqr = q3 - q1;
    let (low_fence, high_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

    let whisker_low = data
        .iter()
        .copied()
        .find(|v| *v >= low_fence)
        .unwrap_or(q1)
        .min(q1);
    let whisker_high = data
        .iter()
        .rev()
        .copied()
        .find(|v| *v <= high_fence)
        .unwrap_or(q3)
        .max(q3);
    let outliers = data
        .iter()
        .copied()
        .filter(|v| *v < whisker_low || *v > whisker_high)
        .collect();

    Some(BoxStats {
        count: data.len(),
        q1,
        median,
        q3,
        whisker_low,
        whisker_high,
        outliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(mean(&values), Some(3.0));
        assert_relative_eq!(sample_std(&values), 2.5f64.sqrt());
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[5.0]), 0.0);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile_sorted(&data, 0.25).unwrap(), 1.75);
        assert_relative_eq!(quantile_sorted(&data, 0.5).unwrap(), 2.5);
        assert_relative_eq!(quantile_sorted(&data, 1.0).unwrap(), 4.0);
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_pearson() {
        let x = [Some(1.0), Some(2.0), Some(3.0), None];
        let y = [Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        assert_relative_eq!(pearson(&x, &y), 1.0);

        let neg = [Some(3.0), Some(2.0), Some(1.0), Some(0.0)];
        assert_relative_eq!(pearson(&x, &neg), -1.0);

        let flat = [Some(1.0), Some(1.0), Some(1.0), Some(1.0)];
        assert!(pearson(&x, &flat).is_nan());
        assert!(pearson(&[Some(1.0)], &[Some(2.0)]).is_nan());
    }

    #[test]
    fn test_auto_bin_edges() {
        let values: Vec<f64> = (0..100).map(|v| v as f64).collect();
        let edges = auto_bin_edges(&values);
        // Sturges gives ~12.9 wide bins, Freedman-Diaconis ~21.3, so 8 bins.
        assert_eq!(edges.len(), 9);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[8], 99.0);

        assert_eq!(auto_bin_edges(&[4.0, 4.0]), vec![3.5, 4.5]);
        assert!(auto_bin_edges(&[]).is_empty());
    }

    #[test]
    fn test_auto_bin_edges_caps_bin_count() {
        let edges = auto_bin_edges(&[0.0, 0.0, 1e-9, 0.0, 1e10]);
        assert_eq!(edges.len(), MAX_BINS + 1);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[MAX_BINS], 1e10);
    }

    #[test]
    fn test_auto_bin_edges_ignores_non_finite() {
        let edges = auto_bin_edges(&[1.0, f64::INFINITY, 2.0, f64::NAN, f64::NEG_INFINITY]);
        assert!(edges.iter().all(|e| e.is_finite()));
        assert_eq!(edges[0], 1.0);
        assert_eq!(edges[edges.len() - 1], 2.0);
        assert!(auto_bin_edges(&[f64::INFINITY]).is_empty());
    }

    #[test]
    fn test_histogram_counts() {
        let edges = [0.0, 1.0, 2.0, 3.0];
        let counts = histogram_counts(&[0.0, 0.5, 1.0, 2.9, 3.0, 7.0], &edges);
        assert_eq!(counts, vec![2, 1, 2]);
    }

    #[test]
    fn test_gaussian_kde_integrates_to_one() {
        let values = [1.0, 2.0, 2.5, 3.0, 7.0];
        let curve = gaussian_kde(&values, -20.0, 30.0, 2001);
        let step = curve[1].0 - curve[0].0;
        let area: f64 = curve.iter().map(|(_, d)| d * step).sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-3);

        assert!(gaussian_kde(&[2.0, 2.0], 0.0, 4.0, 10).is_empty());
    }

    #[test]
    fn test_box_stats_whiskers_and_outliers() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let stats = box_stats(&values).unwrap();
        assert_relative_eq!(stats.q1, 2.25);
        assert_relative_eq!(stats.median, 3.5);
        assert_relative_eq!(stats.q3, 4.75);
        assert_eq!(stats.whisker_low, 1.0);
        assert_eq!(stats.whisker_high, 5.0);
        assert_eq!(stats.outliers, vec![100.0]);
        assert_eq!(stats.count, 6);

        assert!(box_stats(&[]).is_none());
    }
}
