//! Windowed feature extraction over a multi-channel sensor record.

use super::features::{self, DegenerateTally};
use super::record::{ColumnMatch, SensorRecord};
use super::stats;
use super::windowing::{decimate, SignalWindow, WindowPlan};
use crate::config::{ConfigError, ExtractionConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that reject an extraction request outright.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid extraction configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("none of the configured channels {expected:?} match the record columns {available:?}")]
    NoChannels {
        expected: Vec<String>,
        available: Vec<String>,
    },

    #[error(
        "record has {samples} samples after resampling but one window needs {window_len} \
         ({window_secs} s at {sample_rate} Hz)"
    )]
    InsufficientSamples {
        samples: usize,
        window_len: usize,
        window_secs: f64,
        sample_rate: f64,
    },
}

/// A channel after resolution, decimation and whole-record normalization.
#[derive(Debug, Clone)]
pub struct PreparedChannel {
    /// Configured channel name
    pub channel: String,
    /// Record column it was read from (`None` when zero-filled)
    pub source_column: Option<String>,
    /// How the column was matched
    pub matched: Option<ColumnMatch>,
    /// Normalized samples
    pub samples: Vec<f64>,
    /// Whether this channel receives the HRV block
    pub cardiac: bool,
}

/// All configured channels, aligned and normalized.
#[derive(Debug, Clone)]
pub struct PreparedRecord {
    pub channels: Vec<PreparedChannel>,
    /// Samples per channel
    pub len: usize,
}

/// Feature vectors for every window of a record, in time order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMatrix {
    /// Names of the feature columns
    pub feature_names: Vec<String>,
    /// One row per window
    pub rows: Vec<Vec<f64>>,
    /// Start offset of each window in (resampled) samples
    pub window_starts: Vec<usize>,
    /// Sample rate the features were computed at (Hz)
    pub sample_rate: f64,
    /// Zero substitutions made while extracting
    pub degenerate: DegenerateTally,
}

impl FeatureMatrix {
    pub fn n_windows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Per-feature mean across all windows.
    pub fn column_means(&self) -> Vec<f64> {
        let mut means = vec![0.0; self.n_features()];
        if self.rows.is_empty() {
            return means;
        }
        for row in &self.rows {
            for (acc, v) in means.iter_mut().zip(row) {
                *acc += v;
            }
        }
        let n = self.rows.len() as f64;
        means.iter_mut().for_each(|m| *m /= n);
        means
    }
}

/// Turns sensor records into fixed-length feature vectors.
///
/// The extractor holds only read-only configuration, so it can be shared
/// across threads; every window is computed independently of the others.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: ExtractionConfig,
    plan: WindowPlan,
    names: Vec<String>,
}

impl FeatureExtractor {
    /// Create an extractor after validating the configuration.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        config.validate()?;
        let plan = WindowPlan::from_config(&config);
        let names = features::feature_names(&config);
        Ok(Self {
            config,
            plan,
            names,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn plan(&self) -> WindowPlan {
        self.plan
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Length of every feature vector this extractor produces.
    pub fn feature_len(&self) -> usize {
        self.names.len()
    }

    /// Resolve, decimate and z-score every configured channel.
    ///
    /// Channels the record lacks are zero-filled. Fails only when no channel
    /// can be resolved at all.
    pub fn prepare(&self, record: &SensorRecord) -> Result<PreparedRecord, ExtractError> {
        let factor = self.config.decimation_factor();
        let len = (record.len() + factor - 1) / factor;

        let mut channels = Vec::with_capacity(self.config.channels.len());
        let mut resolved = 0;
        for channel in &self.config.channels {
            let cardiac = self.config.is_cardiac(channel);
            match record.resolve(channel) {
                Some((column, samples, matched)) => {
                    resolved += 1;
                    let samples = decimate(samples, factor);
                    channels.push(PreparedChannel {
                        channel: channel.clone(),
                        source_column: Some(column.to_string()),
                        matched: Some(matched),
                        samples: stats::zscore(&samples),
                        cardiac,
                    });
                }
                None => {
                    tracing::warn!(channel = %channel, "channel missing from record, zero-filling");
                    channels.push(PreparedChannel {
                        channel: channel.clone(),
                        source_column: None,
                        matched: None,
                        samples: vec![0.0; len],
                        cardiac,
                    });
                }
            }
        }

        if resolved == 0 {
            return Err(ExtractError::NoChannels {
                expected: self.config.channels.clone(),
                available: record.column_names().to_vec(),
            });
        }

        Ok(PreparedRecord { channels, len })
    }

    /// Feature vector for the window starting at `start`.
    ///
    /// Returns `None` if the window does not fit in the record.
    pub fn window_features(
        &self,
        prepared: &PreparedRecord,
        start: usize,
    ) -> Option<(Vec<f64>, DegenerateTally)> {
        let mut tally = DegenerateTally::default();
        let mut row = Vec::with_capacity(self.feature_len());
        for channel in &prepared.channels {
            let window = SignalWindow::slice(
                &channel.channel,
                &channel.samples,
                self.config.sample_rate,
                start,
                self.plan.window_len,
            )?;
            row.extend(features::channel_features(
                window.samples,
                window.sample_rate,
                channel.cardiac,
                &mut tally,
            ));
        }
        Some((row, tally))
    }

    /// Extract one feature vector per window.
    pub fn extract(&self, record: &SensorRecord) -> Result<FeatureMatrix, ExtractError> {
        let prepared = self.prepare(record)?;

        if self.plan.window_count(prepared.len) == 0 {
            return Err(ExtractError::InsufficientSamples {
                samples: prepared.len,
                window_len: self.plan.window_len,
                window_secs: self.config.window.as_secs_f64(),
                sample_rate: self.config.sample_rate,
            });
        }

        let mut degenerate = DegenerateTally {
            missing_channels: prepared
                .channels
                .iter()
                .filter(|c| c.source_column.is_none())
                .count() as u64,
            ..DegenerateTally::default()
        };
        let mut rows = Vec::new();
        let mut window_starts = Vec::new();
        for start in self.plan.starts(prepared.len) {
            if let Some((row, tally)) = self.window_features(&prepared, start) {
                degenerate.merge(&tally);
                rows.push(row);
                window_starts.push(start);
            }
        }

        if degenerate.total() > 0 {
            tracing::debug!(?degenerate, "zero-filled degenerate feature blocks");
        }
        tracing::info!(
            windows = rows.len(),
            features = self.feature_len(),
            samples = prepared.len,
            "extracted feature matrix"
        );

        Ok(FeatureMatrix {
            feature_names: self.names.clone(),
            rows,
            window_starts,
            sample_rate: self.config.sample_rate,
            degenerate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_config() -> ExtractionConfig {
        ExtractionConfig {
            original_sample_rate: 100.0,
            sample_rate: 100.0,
            window: Duration::from_secs(2),
            stride: Duration::from_secs(1),
            ..ExtractionConfig::default()
        }
    }

    fn wave(n: usize, freq: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / 100.0).sin() * 3.0 + 1.0)
            .collect()
    }

    fn full_record(n: usize) -> SensorRecord {
        SensorRecord::from_columns(vec![
            ("ECG", wave(n, 1.2)),
            ("EDA", wave(n, 0.1)),
            ("EMG", wave(n, 20.0)),
            ("Temp", wave(n, 0.05)),
        ])
        .unwrap()
    }

    #[test]
    fn test_window_count_and_vector_length() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let matrix = extractor.extract(&full_record(650)).unwrap();

        // (650 - 200) / 100 + 1
        assert_eq!(matrix.n_windows(), 5);
        assert_eq!(matrix.window_starts, vec![0, 100, 200, 300, 400]);
        assert_eq!(matrix.n_features(), 180);
        assert!(matrix.rows.iter().all(|r| r.len() == 180));
        assert!(matrix.rows.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_short_record_is_rejected() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let err = extractor.extract(&full_record(199)).unwrap_err();
        match err {
            ExtractError::InsufficientSamples {
                samples,
                window_len,
                ..
            } => {
                assert_eq!(samples, 199);
                assert_eq!(window_len, 200);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_resolvable_channel_is_rejected() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let record = SensorRecord::from_columns(vec![("accel_x", wave(300, 1.0))]).unwrap();
        let err = extractor.extract(&record).unwrap_err();
        assert!(matches!(err, ExtractError::NoChannels { .. }));
        assert!(err.to_string().contains("accel_x"));
    }

    #[test]
    fn test_missing_channel_zero_filled_keeps_layout() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let record =
            SensorRecord::from_columns(vec![("ECG", wave(400, 1.2)), ("Temp", wave(400, 0.05))])
                .unwrap();
        let matrix = extractor.extract(&record).unwrap();

        assert_eq!(matrix.n_features(), 180);
        assert_eq!(matrix.degenerate.missing_channels, 2);
        // EDA occupies [48, 92) and is all zeros.
        for row in &matrix.rows {
            assert!(row[48..92].iter().all(|&v| v == 0.0));
            assert!(row[..48].iter().any(|&v| v != 0.0));
        }
    }

    #[test]
    fn test_constant_channel_is_zeroed_by_normalization() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let record = SensorRecord::from_columns(vec![
            ("ECG", wave(300, 1.2)),
            ("EDA", vec![5.0; 300]),
            ("EMG", vec![0.0; 300]),
            ("Temp", wave(300, 0.05)),
        ])
        .unwrap();
        let matrix = extractor.extract(&record).unwrap();

        for row in &matrix.rows {
            assert!(row[48..136].iter().all(|&v| v == 0.0));
        }
        assert!(matrix.degenerate.spectral >= 4);
    }

    #[test]
    fn test_decimation_applies_before_windowing() {
        let config = ExtractionConfig {
            original_sample_rate: 700.0,
            ..small_config()
        };
        let extractor = FeatureExtractor::new(config).unwrap();
        // 2100 samples at 700 Hz -> 300 at 100 Hz -> 2 windows of 200 / stride 100
        let matrix = extractor.extract(&full_record(2100)).unwrap();
        assert_eq!(matrix.n_windows(), 2);
    }

    #[test]
    fn test_windows_are_order_independent() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let record = full_record(500);
        let prepared = extractor.prepare(&record).unwrap();

        let forward: Vec<Vec<f64>> = [0, 100, 200, 300]
            .iter()
            .map(|&s| extractor.window_features(&prepared, s).unwrap().0)
            .collect();
        let backward: Vec<Vec<f64>> = [300, 200, 100, 0]
            .iter()
            .map(|&s| extractor.window_features(&prepared, s).unwrap().0)
            .collect();

        for (f, b) in forward.iter().zip(backward.iter().rev()) {
            assert_eq!(f, b);
        }
        assert!(extractor.window_features(&prepared, 301).is_none());
    }

    #[test]
    fn test_normalization_uses_whole_record() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let ramp: Vec<f64> = (0..400).map(|i| i as f64).collect();
        let record = SensorRecord::from_columns(vec![("ECG", ramp)]).unwrap();
        let prepared = extractor.prepare(&record).unwrap();

        let ecg = &prepared.channels[0].samples;
        assert!(stats::mean(ecg).abs() < 1e-9);
        // The first window sits entirely below the record mean.
        assert!(ecg[..200].iter().all(|&v| v < 0.0));
    }

    #[test]
    fn test_column_means() {
        let matrix = FeatureMatrix {
            feature_names: vec!["a".into(), "b".into()],
            rows: vec![vec![1.0, 2.0], vec![3.0, 6.0]],
            window_starts: vec![0, 1],
            sample_rate: 100.0,
            degenerate: DegenerateTally::default(),
        };
        assert_eq!(matrix.column_means(), vec![2.0, 4.0]);
    }
}
