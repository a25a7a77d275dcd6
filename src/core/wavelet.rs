//! Multi-level discrete wavelet decomposition (Daubechies-4).

use super::stats;

/// Decomposition depth.
pub const WAVELET_LEVELS: usize = 4;

/// Statistics emitted per coefficient array.
pub const STATS_PER_LEVEL: usize = 4;

/// Number of values in the wavelet block: (levels + approximation) x stats.
pub const WAVELET_FEATURE_COUNT: usize = (WAVELET_LEVELS + 1) * STATS_PER_LEVEL;

/// Daubechies-4 decomposition low-pass filter.
const DB4_DEC_LO: [f64; 8] = [
    -0.010597401784997278,
    0.032883011666982945,
    0.030841381835986965,
    -0.18703481171888114,
    -0.02798376941698385,
    0.6308807679295904,
    0.7148465705525415,
    0.23037781330885523,
];

/// High-pass decomposition filter: quadrature mirror of the low-pass.
fn db4_dec_hi() -> [f64; 8] {
    let n = DB4_DEC_LO.len();
    let mut hi = [0.0; 8];
    for (k, h) in hi.iter_mut().enumerate() {
        let sign = if k % 2 == 0 { -1.0 } else { 1.0 };
        *h = sign * DB4_DEC_LO[n - 1 - k];
    }
    hi
}

/// Map an out-of-range index onto the signal by half-sample symmetric
/// reflection (`... x1 x0 | x0 x1 ... xn-1 | xn-1 xn-2 ...`).
fn reflect(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = index.rem_euclid(period) as usize;
    if m < len {
        m
    } else {
        2 * len - 1 - m
    }
}

/// Convolve with `filter` and keep every second output, starting at the
/// second full-overlap position. Output length is `(n + taps - 1) / 2`.
fn downsample_convolve(signal: &[f64], filter: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let taps = filter.len();
    let out_len = (n + taps - 1) / 2;
    (0..out_len)
        .map(|o| {
            let i = (2 * o + 1) as isize;
            filter
                .iter()
                .enumerate()
                .map(|(j, &h)| h * signal[reflect(i - j as isize, n)])
                .sum()
        })
        .collect()
}

/// One analysis step: (approximation, detail).
pub fn dwt(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    if signal.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let hi = db4_dec_hi();
    (
        downsample_convolve(signal, &DB4_DEC_LO),
        downsample_convolve(signal, &hi),
    )
}

/// Multi-level decomposition ordered coarsest first:
/// `[a_levels, d_levels, ..., d1]`. Stops early if the approximation empties.
pub fn wavedec(signal: &[f64], levels: usize) -> Vec<Vec<f64>> {
    let mut details = Vec::with_capacity(levels);
    let mut approx = signal.to_vec();
    for _ in 0..levels {
        if approx.is_empty() {
            break;
        }
        let (a, d) = dwt(&approx);
        details.push(d);
        approx = a;
    }
    if approx.is_empty() {
        return Vec::new();
    }

    let mut coeffs = Vec::with_capacity(details.len() + 1);
    coeffs.push(approx);
    coeffs.extend(details.into_iter().rev());
    coeffs
}

/// Wavelet block, or `None` when the window is constant or empty.
///
/// Layout per coefficient array (a4, d4, d3, d2, d1): mean, standard
/// deviation, variance, maximum absolute value. Arrays the decomposition did
/// not produce are left as zeros.
pub fn try_wavelet_features(signal: &[f64]) -> Option<[f64; WAVELET_FEATURE_COUNT]> {
    if signal.is_empty() || stats::is_constant(signal) {
        return None;
    }

    let mut out = [0.0; WAVELET_FEATURE_COUNT];
    let coeffs = wavedec(signal, WAVELET_LEVELS);
    for (level, coeff) in coeffs
        .iter()
        .filter(|c| !c.is_empty())
        .take(WAVELET_LEVELS + 1)
        .enumerate()
    {
        let base = level * STATS_PER_LEVEL;
        out[base] = stats::mean(coeff);
        out[base + 1] = stats::std_dev(coeff);
        out[base + 2] = stats::variance(coeff);
        out[base + 3] = stats::max_abs(coeff);
    }
    Some(out)
}

/// Wavelet block with degenerate windows mapped to zeros.
pub fn wavelet_features(signal: &[f64]) -> [f64; WAVELET_FEATURE_COUNT] {
    try_wavelet_features(signal).unwrap_or([0.0; WAVELET_FEATURE_COUNT])
}
