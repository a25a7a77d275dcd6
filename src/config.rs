//! Configuration for the SafeSpace stress inference pipeline.

use crate::core::fusion::ModalityWeights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Windowing and feature extraction settings
    pub extraction: ExtractionConfig,

    /// Late-fusion settings
    pub fusion: FusionConfig,

    /// Path for exporting stress reports
    pub export_path: PathBuf,

    /// Path for storing the audit log
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("safespace-stress");

        Self {
            extraction: ExtractionConfig::default(),
            fusion: FusionConfig::default(),
            export_path: data_dir.join("reports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("safespace-stress")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Check every section for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extraction.validate()?;
        self.fusion.validate()
    }
}

/// Windowing and feature extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Rate the sensor table was recorded at (Hz)
    pub original_sample_rate: f64,

    /// Rate features are computed at (Hz); the record is decimated to it
    pub sample_rate: f64,

    /// Duration of each analysis window
    #[serde(with = "duration_serde")]
    pub window: Duration,

    /// Offset between consecutive window starts
    #[serde(with = "duration_serde")]
    pub stride: Duration,

    /// Channels in feature-vector order
    pub channels: Vec<String>,

    /// Channel that receives the heart-rate-variability block
    pub cardiac_channel: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            original_sample_rate: 100.0,
            sample_rate: 100.0,
            window: Duration::from_secs(10),
            stride: Duration::from_secs(5),
            channels: ["ECG", "EDA", "EMG", "Temp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cardiac_channel: Some("ECG".to_string()),
        }
    }
}

impl ExtractionConfig {
    /// Window length in (post-decimation) samples.
    pub fn window_len(&self) -> usize {
        (self.window.as_secs_f64() * self.sample_rate).round() as usize
    }

    /// Stride length in (post-decimation) samples.
    pub fn stride_len(&self) -> usize {
        (self.stride.as_secs_f64() * self.sample_rate).round() as usize
    }

    /// Integer factor between the recorded and the analysis sample rate.
    pub fn decimation_factor(&self) -> usize {
        (self.original_sample_rate / self.sample_rate).round().max(1.0) as usize
    }

    /// Whether `channel` is the one that carries heart-rate features.
    pub fn is_cardiac(&self, channel: &str) -> bool {
        self.cardiac_channel.as_deref() == Some(channel)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample_rate must be a positive number, got {}",
                self.sample_rate
            )));
        }
        if !(self.original_sample_rate.is_finite()
            && self.original_sample_rate >= self.sample_rate)
        {
            return Err(ConfigError::Invalid(format!(
                "original_sample_rate must be >= sample_rate ({}), got {}",
                self.sample_rate, self.original_sample_rate
            )));
        }
        let ratio = self.original_sample_rate / self.sample_rate;
        if (ratio - ratio.round()).abs() > 1e-9 {
            return Err(ConfigError::Invalid(format!(
                "original_sample_rate ({}) must be an integer multiple of sample_rate ({})",
                self.original_sample_rate, self.sample_rate
            )));
        }
        if self.window_len() == 0 {
            return Err(ConfigError::Invalid(format!(
                "window of {:?} at {} Hz covers no samples",
                self.window, self.sample_rate
            )));
        }
        if self.stride_len() == 0 {
            return Err(ConfigError::Invalid(format!(
                "stride of {:?} at {} Hz covers no samples",
                self.stride, self.sample_rate
            )));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one channel must be configured".to_string(),
            ));
        }
        for (i, channel) in self.channels.iter().enumerate() {
            if self.channels[..i].contains(channel) {
                return Err(ConfigError::Invalid(format!(
                    "channel '{channel}' is listed more than once"
                )));
            }
        }
        if let Some(cardiac) = &self.cardiac_channel {
            if !self.channels.contains(cardiac) {
                return Err(ConfigError::Invalid(format!(
                    "cardiac channel '{cardiac}' is not in the channel list {:?}",
                    self.channels
                )));
            }
        }
        Ok(())
    }
}

/// Late-fusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Prior trust per modality
    pub weights: ModalityWeights,

    /// Post-hoc class multipliers applied before the final arg-max
    pub class_priors: Option<BTreeMap<usize, f64>>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        // Deployment policy: "Medium" is never reported as the final level.
        let class_priors = [(0, 0.7), (1, 0.0), (2, 0.3)].into_iter().collect();

        Self {
            weights: ModalityWeights::default(),
            class_priors: Some(class_priors),
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(priors) = &self.class_priors {
            crate::core::fusion::ClassPriors::from_map(priors)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {secs}"
            )));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
