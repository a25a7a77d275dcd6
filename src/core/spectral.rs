//! Frequency-domain features from a Welch power spectral density estimate.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Number of values in the frequency-domain block.
pub const SPECTRAL_FEATURE_COUNT: usize = 11;

/// Fewest samples a window needs before a spectrum is estimated.
pub const MIN_SPECTRAL_SAMPLES: usize = 8;

/// Longest Welch sub-segment.
const MAX_SEGMENT_LEN: usize = 256;

/// Band edges in normalized frequency (cycles per sample). Every band is
/// half-open except the last, which includes the Nyquist frequency.
pub const BANDS: [(&str, f64, f64); 4] = [
    ("vlow", 0.0, 0.04),
    ("low", 0.04, 0.15),
    ("mid", 0.15, 0.4),
    ("high", 0.4, 0.5),
];

/// One-sided power spectral density.
#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    /// Bin frequencies in Hz
    pub freqs: Vec<f64>,
    /// Power density per bin
    pub psd: Vec<f64>,
    /// Sample rate the spectrum was estimated at (Hz)
    pub sample_rate: f64,
}

impl PowerSpectrum {
    pub fn total_power(&self) -> f64 {
        self.psd.iter().sum()
    }

    /// Summed power of bins whose normalized frequency lies in `[low, high)`,
    /// or `[low, high]` when `inclusive_high` is set.
    pub fn band_power(&self, low: f64, high: f64, inclusive_high: bool) -> f64 {
        self.freqs
            .iter()
            .zip(&self.psd)
            .filter(|(&f, _)| {
                let normalized = f / self.sample_rate;
                normalized >= low && (normalized < high || (inclusive_high && normalized <= high))
            })
            .map(|(_, &p)| p)
            .sum()
    }

    /// Frequency (Hz) of the strongest bin; the first one on ties.
    pub fn peak_frequency(&self) -> f64 {
        let mut best = 0;
        for (i, &p) in self.psd.iter().enumerate() {
            if p > self.psd[best] {
                best = i;
            }
        }
        self.freqs.get(best).copied().unwrap_or(0.0)
    }
}

/// Welch estimate: periodic Hann segments of `segment_len` samples with 50%
/// overlap, per-segment mean removal, one-sided density scaling, averaged.
pub fn welch(signal: &[f64], sample_rate: f64, segment_len: usize) -> Option<PowerSpectrum> {
    let nperseg = segment_len.min(signal.len());
    if nperseg < 2 || sample_rate <= 0.0 {
        return None;
    }
    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let segments = (signal.len() - noverlap) / step;
    if segments == 0 {
        return None;
    }

    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / nperseg as f64).cos())
        .collect();
    let window_energy: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sample_rate * window_energy);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];

    let n_bins = nperseg / 2 + 1;
    let mut psd = vec![0.0; n_bins];

    for s in 0..segments {
        let segment = &signal[s * step..s * step + nperseg];
        let seg_mean = segment.iter().sum::<f64>() / nperseg as f64;
        for ((slot, &x), &w) in buffer.iter_mut().zip(segment).zip(&window) {
            *slot = Complex::new((x - seg_mean) * w, 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        for (acc, c) in psd.iter_mut().zip(&buffer[..n_bins]) {
            *acc += c.norm_sqr() * scale;
        }
    }

    // Fold the negative frequencies in; DC and (for even lengths) Nyquist are unique.
    let last_doubled = if nperseg % 2 == 0 { n_bins - 1 } else { n_bins };
    for (k, p) in psd.iter_mut().enumerate() {
        *p /= segments as f64;
        if k > 0 && k < last_doubled {
            *p *= 2.0;
        }
    }

    let freqs = (0..n_bins)
        .map(|k| k as f64 * sample_rate / nperseg as f64)
        .collect();

    Some(PowerSpectrum {
        freqs,
        psd,
        sample_rate,
    })
}

/// Sub-segment length used for a window of `n` samples.
pub fn segment_len(n: usize) -> usize {
    MAX_SEGMENT_LEN.min(n / 4)
}

/// Frequency-domain block, or `None` when the window is too short or carries
/// no power.
///
/// Layout: absolute and relative power for each of [`BANDS`], then mean and
/// standard deviation of the frequency axis and the peak frequency.
pub fn try_spectral_features(signal: &[f64], sample_rate: f64) -> Option<[f64; SPECTRAL_FEATURE_COUNT]> {
    if signal.len() < MIN_SPECTRAL_SAMPLES || super::stats::is_constant(signal) {
        return None;
    }
    let spectrum = welch(signal, sample_rate, segment_len(signal.len()))?;
    let total = spectrum.total_power();
    if total == 0.0 || !total.is_finite() {
        return None;
    }

    let mut out = [0.0; SPECTRAL_FEATURE_COUNT];
    for (i, &(_, low, high)) in BANDS.iter().enumerate() {
        let power = spectrum.band_power(low, high, i == BANDS.len() - 1);
        out[2 * i] = power;
        out[2 * i + 1] = power / total;
    }
    out[8] = super::stats::mean(&spectrum.freqs);
    out[9] = super::stats::std_dev(&spectrum.freqs);
    out[10] = spectrum.peak_frequency();
    Some(out)
}

/// Frequency-domain block with degenerate windows mapped to zeros.
pub fn spectral_features(signal: &[f64], sample_rate: f64) -> [f64; SPECTRAL_FEATURE_COUNT] {
    try_spectral_features(signal, sample_rate).unwrap_or([0.0; SPECTRAL_FEATURE_COUNT])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_hz: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_welch_bins_and_resolution() {
        let signal = sine(10.0, 100.0, 1000);
        let spectrum = welch(&signal, 100.0, segment_len(1000)).unwrap();

        // nperseg = 250 -> 126 one-sided bins at 0.4 Hz spacing
        assert_eq!(spectrum.freqs.len(), 126);
        assert!((spectrum.freqs[1] - 0.4).abs() < 1e-12);
        assert!((spectrum.freqs[125] - 50.0).abs() < 1e-12);
        assert!((spectrum.peak_frequency() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_windows_cap_segment_length() {
        assert_eq!(segment_len(2000), 256);
        assert_eq!(segment_len(1024), 256);
        assert_eq!(segment_len(1000), 250);

        // 12.5 Hz sits exactly on bin 32 of a 256-point segment at 100 Hz.
        let signal = sine(12.5, 100.0, 2000);
        let spectrum = welch(&signal, 100.0, segment_len(signal.len())).unwrap();
        assert_eq!(spectrum.freqs.len(), 129);
        assert!((spectrum.freqs[1] - 100.0 / 256.0).abs() < 1e-12);
        assert!((spectrum.freqs[128] - 50.0).abs() < 1e-12);
        assert!((spectrum.peak_frequency() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_parseval_density_scaling() {
        // Integrated one-sided density approximates the signal variance (0.5 for a unit sine).
        let signal = sine(12.0, 100.0, 2000);
        let spectrum = welch(&signal, 100.0, 200).unwrap();
        let df = spectrum.freqs[1] - spectrum.freqs[0];
        let integrated = spectrum.total_power() * df;
        assert!((integrated - 0.5).abs() < 0.05, "integrated = {integrated}");
    }

    #[test]
    fn test_band_relative_powers_partition_spectrum() {
        let signal: Vec<f64> = (0..1000)
            .map(|i| (i as f64 * 0.37).sin() + (i as f64 * 2.1).cos() * 0.5)
            .collect();
        let features = spectral_features(&signal, 100.0);

        let relative_sum = features[1] + features[3] + features[5] + features[7];
        assert!((relative_sum - 1.0).abs() < 1e-9);
        assert!(features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_dominant_band() {
        // 30 Hz at 100 Hz is 0.3 cycles/sample: the "mid" band.
        let features = spectral_features(&sine(30.0, 100.0, 1000), 100.0);
        assert!(features[5] > 0.9, "mid relative power = {}", features[5]);
        assert!((features[10] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_axis_statistics() {
        let features = spectral_features(&sine(5.0, 100.0, 1000), 100.0);
        // Bins span 0..50 Hz evenly.
        assert!((features[8] - 25.0).abs() < 1e-9);
        assert!(features[9] > 14.0 && features[9] < 15.0);
    }

    #[test]
    fn test_degenerate_windows_are_zero() {
        assert_eq!(spectral_features(&[1.0, 2.0, 3.0], 100.0), [0.0; 11]);
        assert_eq!(spectral_features(&[5.0; 20], 100.0), [0.0; 11]);
        assert_eq!(spectral_features(&[0.0; 1000], 100.0), [0.0; 11]);
        assert!(try_spectral_features(&[5.0; 20], 100.0).is_none());
        assert!(try_spectral_features(&[0.1; 20], 100.0).is_none());
    }
}
