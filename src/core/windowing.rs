//! Sliding-window segmentation of a prepared sensor record.
//!
//! Windows have a fixed length and advance by a fixed stride; a trailing
//! partial window is never emitted.

use crate::config::ExtractionConfig;
use serde::{Deserialize, Serialize};

/// Window and stride lengths in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlan {
    /// Samples per window
    pub window_len: usize,
    /// Samples between consecutive window starts
    pub stride_len: usize,
}

impl WindowPlan {
    /// Create a plan from explicit lengths. A zero stride is clamped to one.
    pub fn new(window_len: usize, stride_len: usize) -> Self {
        Self {
            window_len,
            stride_len: stride_len.max(1),
        }
    }

    /// Derive the plan from the extraction settings.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.window_len(), config.stride_len())
    }

    /// Number of full windows that fit in a record of `n` samples.
    pub fn window_count(&self, n: usize) -> usize {
        if self.window_len == 0 || n < self.window_len {
            0
        } else {
            (n - self.window_len) / self.stride_len + 1
        }
    }

    /// Start offsets of every full window, in time order.
    pub fn starts(&self, n: usize) -> impl Iterator<Item = usize> {
        let stride = self.stride_len;
        (0..self.window_count(n)).map(move |i| i * stride)
    }

    /// Overlap between consecutive windows in samples.
    pub fn overlap(&self) -> usize {
        self.window_len.saturating_sub(self.stride_len)
    }
}

/// A fixed-length slice of one channel.
#[derive(Debug, Clone, Copy)]
pub struct SignalWindow<'a> {
    /// Channel the samples belong to
    pub channel: &'a str,
    /// Samples in this window
    pub samples: &'a [f64],
    /// Sample rate (Hz)
    pub sample_rate: f64,
    /// Offset of the first sample within the record
    pub start: usize,
}

impl<'a> SignalWindow<'a> {
    /// Slice a window out of a channel's samples.
    ///
    /// Returns `None` if the window would run past the end of the signal.
    pub fn slice(
        channel: &'a str,
        signal: &'a [f64],
        sample_rate: f64,
        start: usize,
        len: usize,
    ) -> Option<Self> {
        let end = start.checked_add(len)?;
        signal.get(start..end).map(|samples| Self {
            channel,
            samples,
            sample_rate,
            start,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Start of the window in seconds from the beginning of the record.
    pub fn start_secs(&self) -> f64 {
        self.start as f64 / self.sample_rate
    }

    /// Duration of the window in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }
}

/// Keep every `factor`-th sample.
pub fn decimate(signal: &[f64], factor: usize) -> Vec<f64> {
    signal.iter().step_by(factor.max(1)).copied().collect()
}
