//! Descriptive statistics shared by the feature families.
//!
//! All moments are population (biased) estimates. Empty input yields 0.

use statrs::statistics::Statistics;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// True when every value is bitwise equal to the first. Empty input counts as
/// constant.
pub fn is_constant(values: &[f64]) -> bool {
    match values.split_first() {
        Some((first, rest)) => rest.iter().all(|v| v == first),
        None => true,
    }
}

/// Population variance. Exactly zero for constant input, where the
/// streaming estimate would leave rounding residue.
pub fn variance(values: &[f64]) -> f64 {
    if is_constant(values) {
        return 0.0;
    }
    values.iter().population_variance()
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Root mean square.
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().quadratic_mean()
}

/// Largest absolute value.
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
}

/// Percentile `q` in [0, 100] with linear interpolation between order statistics.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

/// Same as [`percentile`] for input that is already sorted ascending.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Sample skewness `m3 / m2^1.5`. Zero when the variance is zero.
pub fn skewness(values: &[f64]) -> f64 {
    let (m2, m3, _) = central_moments(values);
    if m2 == 0.0 {
        return 0.0;
    }
    m3 / m2.powf(1.5)
}

/// Excess kurtosis `m4 / m2^2 - 3`. Zero when the variance is zero.
pub fn kurtosis(values: &[f64]) -> f64 {
    let (m2, _, m4) = central_moments(values);
    if m2 == 0.0 {
        return 0.0;
    }
    m4 / (m2 * m2) - 3.0
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = values.len() as f64;
    let mu = mean(values);
    let (m2, m3, m4) = values.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), &v| {
        let d = v - mu;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    });
    (m2 / n, m3 / n, m4 / n)
}

/// Z-score normalization with a hard zero check: a signal with zero standard
/// deviation maps to all zeros.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    if is_constant(values) {
        return vec![0.0; values.len()];
    }
    let sd = std_dev(values);
    if sd == 0.0 || !sd.is_finite() {
        return vec![0.0; values.len()];
    }
    let mu = mean(values);
    values.iter().map(|&v| (v - mu) / sd).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_std_dev() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(mean(&values), 5.0));
        assert!(close(std_dev(&values), 2.0));
        assert!(close(variance(&values), 4.0));
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = vec![4.0, 1.0, 3.0, 2.0];
        assert!(close(percentile(&values, 50.0), 2.5));
        assert!(close(percentile(&values, 25.0), 1.75));
        assert!(close(percentile(&values, 75.0), 3.25));
        assert!(close(percentile(&values, 0.0), 1.0));
        assert!(close(percentile(&values, 100.0), 4.0));
    }

    #[test]
    fn test_skewness_and_kurtosis() {
        let symmetric = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(close(skewness(&symmetric), 0.0));
        // Uniform-like spread: m2 = 2, m4 = 6.8 -> 6.8 / 4 - 3
        assert!(close(kurtosis(&symmetric), -1.3));

        let right_tailed = vec![0.0, 0.0, 0.0, 10.0];
        assert!(skewness(&right_tailed) > 1.0);
    }

    #[test]
    fn test_constant_input_is_degenerate_safe() {
        let constant = vec![3.0; 12];
        assert_eq!(std_dev(&constant), 0.0);
        assert_eq!(skewness(&constant), 0.0);
        assert_eq!(kurtosis(&constant), 0.0);
        assert_eq!(zscore(&constant), vec![0.0; 12]);
    }

    #[test]
    fn test_inexact_constant_is_exactly_degenerate() {
        let constant = vec![0.1; 20];
        assert!(is_constant(&constant));
        assert_eq!(variance(&constant), 0.0);
        assert_eq!(std_dev(&constant), 0.0);
        assert_eq!(zscore(&constant), vec![0.0; 20]);

        assert!(!is_constant(&[0.1, 0.1, 0.1000001]));
        assert!(is_constant(&[]));
    }

    #[test]
    fn test_zscore_unit_variance() {
        let values: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin() * 4.0 + 10.0).collect();
        let z = zscore(&values);
        assert!(mean(&z).abs() < 1e-9);
        assert!((std_dev(&z) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(max_abs(&[]), 0.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert!(zscore(&[]).is_empty());
    }
}
