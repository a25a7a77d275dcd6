//! Core inference pipeline.
//!
//! This module contains:
//! - Signal records, windowing and per-window feature extraction
//! - Confidence-weighted late fusion and its explanation
//! - Report building for export

pub mod cardiac;
pub mod explain;
pub mod extractor;
pub mod features;
pub mod fusion;
pub mod record;
pub mod report;
pub mod spectral;
pub mod stats;
pub mod wavelet;
pub mod windowing;

pub use explain::{explain, FusionExplanation, ModalityContribution};
pub use extractor::{ExtractError, FeatureExtractor, FeatureMatrix};
pub use features::{feature_names, DegenerateTally, FeatureFamily};
pub use fusion::{
    average_probabilities, ClassPriors, ClassProbs, Decision, Evidence, FusionEngine, FusionError,
    Modality, ModalityWeights, StressLevel,
};
pub use record::{ColumnMatch, SensorRecord};
pub use report::{ReportBuilder, StressReport, PRODUCER_NAME, REPORT_VERSION};
pub use windowing::{SignalWindow, WindowPlan};
