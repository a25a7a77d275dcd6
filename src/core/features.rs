//! Per-window feature computation.
//!
//! Each channel contributes a fixed-length block: time-domain statistics,
//! frequency-band powers, wavelet statistics, and (for the cardiac channel
//! only) heart-rate variability. A family that cannot be computed for a
//! window is filled with zeros so the vector layout never changes.

use super::cardiac::{self, HRV_FEATURE_COUNT};
use super::spectral::{self, SPECTRAL_FEATURE_COUNT};
use super::stats;
use super::wavelet::{self, WAVELET_FEATURE_COUNT};
use crate::config::ExtractionConfig;
use serde::{Deserialize, Serialize};

/// Number of values in the time-domain block.
pub const TIME_FEATURE_COUNT: usize = 13;

/// Block length for an ordinary channel.
pub const CHANNEL_FEATURE_COUNT: usize =
    TIME_FEATURE_COUNT + SPECTRAL_FEATURE_COUNT + WAVELET_FEATURE_COUNT;

/// Block length for the cardiac channel.
pub const CARDIAC_CHANNEL_FEATURE_COUNT: usize = CHANNEL_FEATURE_COUNT + HRV_FEATURE_COUNT;

const TIME_FEATURE_NAMES: [&str; TIME_FEATURE_COUNT] = [
    "mean",
    "std",
    "var",
    "skew",
    "kurtosis",
    "min",
    "max",
    "ptp",
    "median",
    "q25",
    "q75",
    "mean_abs_diff",
    "rms",
];

const SPECTRAL_FEATURE_NAMES: [&str; SPECTRAL_FEATURE_COUNT] = [
    "vlow_power",
    "vlow_rel",
    "low_power",
    "low_rel",
    "mid_power",
    "mid_rel",
    "high_power",
    "high_rel",
    "freq_mean",
    "freq_std",
    "peak_freq",
];

const WAVELET_LEVEL_NAMES: [&str; 5] = ["a4", "d4", "d3", "d2", "d1"];

const WAVELET_STAT_NAMES: [&str; 4] = ["mean", "std", "var", "max"];

const HRV_FEATURE_NAMES: [&str; HRV_FEATURE_COUNT] = ["mean_rr", "std_rr", "rmssd", "heart_rate"];

/// The feature families that make up a channel block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    Time,
    Spectral,
    Wavelet,
    Hrv,
}

/// Count of blocks that were zero-filled instead of computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegenerateTally {
    /// Constant windows whose skewness and kurtosis were forced to zero
    pub constant_windows: u64,
    pub spectral: u64,
    pub wavelet: u64,
    pub hrv: u64,
    /// Individual non-finite values replaced by zero
    pub non_finite: u64,
    /// Channels zero-filled because the record did not contain them
    pub missing_channels: u64,
}

impl DegenerateTally {
    pub fn record(&mut self, family: FeatureFamily) {
        match family {
            FeatureFamily::Time => self.constant_windows += 1,
            FeatureFamily::Spectral => self.spectral += 1,
            FeatureFamily::Wavelet => self.wavelet += 1,
            FeatureFamily::Hrv => self.hrv += 1,
        }
    }

    pub fn merge(&mut self, other: &DegenerateTally) {
        self.constant_windows += other.constant_windows;
        self.spectral += other.spectral;
        self.wavelet += other.wavelet;
        self.hrv += other.hrv;
        self.non_finite += other.non_finite;
        self.missing_channels += other.missing_channels;
    }

    /// Total number of substituted blocks and values.
    pub fn total(&self) -> u64 {
        self.constant_windows
            + self.spectral
            + self.wavelet
            + self.hrv
            + self.non_finite
            + self.missing_channels
    }
}

/// Time-domain block.
///
/// Layout: mean, std, variance, skewness, excess kurtosis, min, max,
/// peak-to-peak, median, 25th and 75th percentile, mean absolute first
/// difference, RMS. Skewness and kurtosis are zero for a constant window.
pub fn time_features(signal: &[f64]) -> [f64; TIME_FEATURE_COUNT] {
    if signal.is_empty() {
        return [0.0; TIME_FEATURE_COUNT];
    }

    let mean = stats::mean(signal);
    let (std, var, skew, kurt) = if stats::is_constant(signal) {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (
            stats::std_dev(signal),
            stats::variance(signal),
            stats::skewness(signal),
            stats::kurtosis(signal),
        )
    };

    let mut sorted = signal.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    let mean_abs_diff = if signal.len() > 1 {
        signal.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (signal.len() - 1) as f64
    } else {
        0.0
    };

    [
        mean,
        std,
        var,
        skew,
        kurt,
        min,
        max,
        max - min,
        stats::percentile_sorted(&sorted, 50.0),
        stats::percentile_sorted(&sorted, 25.0),
        stats::percentile_sorted(&sorted, 75.0),
        mean_abs_diff,
        stats::rms(signal),
    ]
}

/// Compute one channel's block for one window.
///
/// Degenerate substitutions are counted in `tally`; any non-finite value that
/// slips through is replaced by zero.
pub fn channel_features(
    signal: &[f64],
    sample_rate: f64,
    cardiac: bool,
    tally: &mut DegenerateTally,
) -> Vec<f64> {
    let capacity = if cardiac {
        CARDIAC_CHANNEL_FEATURE_COUNT
    } else {
        CHANNEL_FEATURE_COUNT
    };
    let mut out = Vec::with_capacity(capacity);

    if !signal.is_empty() && stats::is_constant(signal) {
        tally.record(FeatureFamily::Time);
    }
    out.extend_from_slice(&time_features(signal));

    match spectral::try_spectral_features(signal, sample_rate) {
        Some(block) => out.extend_from_slice(&block),
        None => {
            tally.record(FeatureFamily::Spectral);
            out.extend_from_slice(&[0.0; SPECTRAL_FEATURE_COUNT]);
        }
    }

    match wavelet::try_wavelet_features(signal) {
        Some(block) => out.extend_from_slice(&block),
        None => {
            tally.record(FeatureFamily::Wavelet);
            out.extend_from_slice(&[0.0; WAVELET_FEATURE_COUNT]);
        }
    }

    if cardiac {
        match cardiac::try_hrv_features(signal, sample_rate) {
            Some(block) => out.extend_from_slice(&block),
            None => {
                tally.record(FeatureFamily::Hrv);
                out.extend_from_slice(&[0.0; HRV_FEATURE_COUNT]);
            }
        }
    }

    for value in out.iter_mut() {
        if !value.is_finite() {
            *value = 0.0;
            tally.non_finite += 1;
        }
    }

    out
}

/// Block length for a channel.
pub fn channel_feature_count(cardiac: bool) -> usize {
    if cardiac {
        CARDIAC_CHANNEL_FEATURE_COUNT
    } else {
        CHANNEL_FEATURE_COUNT
    }
}

/// Full feature-vector length for the configured channel set.
pub fn feature_vector_len(config: &ExtractionConfig) -> usize {
    config
        .channels
        .iter()
        .map(|c| channel_feature_count(config.is_cardiac(c)))
        .sum()
}

/// Ordered feature names (`{channel}_{feature}`) matching the vector layout.
pub fn feature_names(config: &ExtractionConfig) -> Vec<String> {
    let mut names = Vec::with_capacity(feature_vector_len(config));
    for channel in &config.channels {
        for name in TIME_FEATURE_NAMES.iter().chain(SPECTRAL_FEATURE_NAMES.iter()) {
            names.push(format!("{channel}_{name}"));
        }
        for level in WAVELET_LEVEL_NAMES {
            for stat in WAVELET_STAT_NAMES {
                names.push(format!("{channel}_wav_{level}_{stat}"));
            }
        }
        if config.is_cardiac(channel) {
            for name in HRV_FEATURE_NAMES {
                names.push(format!("{channel}_{name}"));
            }
        }
    }
    names
}
