//! Stress report builder.
//!
//! A report is a self-describing JSON document holding one fused decision:
//! the per-modality inputs, the fused distribution, the chosen class, the
//! modality-level explanation, and run metadata.

use super::explain::{explain, FusionExplanation};
use super::extractor::FeatureMatrix;
use super::features::DegenerateTally;
use super::fusion::{ClassProbs, Decision, Evidence, FusionEngine, Modality, StressLevel};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "safespace-stress";

/// Producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// Fusion inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predictions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physiological: Option<ClassProbs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questionnaire: Option<ClassProbs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<ClassProbs>,
    /// Normalized fused distribution
    pub fused: ClassProbs,
    /// Fused distribution after class priors
    pub scores: ClassProbs,
    pub predicted_class: usize,
    pub predicted_label: StressLevel,
    pub confidence: f64,
}

/// Run metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Windows behind the physiological vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physio_windows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
    /// Raw DASS-21 responses, when supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questionnaire_values: Option<Vec<f64>>,
    pub voice_provided: bool,
    pub modalities_used: Vec<Modality>,
    pub class_priors_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degenerate: Option<DegenerateTally>,
}

/// A single fused stress decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressReport {
    pub report_version: String,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    pub producer: ReportProducer,
    pub predictions: Predictions,
    pub explanation: FusionExplanation,
    pub meta: ReportMeta,
}

/// Builds reports stamped with a per-process instance id.
pub struct ReportBuilder {
    instance_id: Uuid,
    questionnaire: Option<Vec<f64>>,
    physio_windows: Option<usize>,
    feature_count: Option<usize>,
    degenerate: Option<DegenerateTally>,
}

impl ReportBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            questionnaire: None,
            physio_windows: None,
            feature_count: None,
            degenerate: None,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Attach the raw questionnaire responses.
    pub fn with_questionnaire(mut self, values: Vec<f64>) -> Self {
        self.questionnaire = Some(values);
        self
    }

    /// Record how many windows the physiological vector was averaged from.
    pub fn with_physio_windows(mut self, windows: usize) -> Self {
        self.physio_windows = Some(windows);
        self
    }

    /// Attach extraction metadata.
    pub fn with_feature_matrix(mut self, matrix: &FeatureMatrix) -> Self {
        self.physio_windows = Some(matrix.n_windows());
        self.feature_count = Some(matrix.n_features());
        self.degenerate = Some(matrix.degenerate);
        self
    }

    /// Decide and explain with `engine`, then assemble the report.
    pub fn build(&self, engine: &FusionEngine, evidence: &Evidence) -> StressReport {
        let decision = engine.decide(evidence);
        self.build_from_decision(engine, evidence, &decision)
    }

    /// Assemble a report from a decision already made by `engine`.
    pub fn build_from_decision(
        &self,
        engine: &FusionEngine,
        evidence: &Evidence,
        decision: &Decision,
    ) -> StressReport {
        let explanation = explain(engine, evidence, decision);

        StressReport {
            report_version: REPORT_VERSION.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
            },
            predictions: Predictions {
                physiological: evidence.get(Modality::Phys).copied(),
                questionnaire: evidence.get(Modality::Text).copied(),
                voice: evidence.get(Modality::Voice).copied(),
                fused: decision.fused,
                scores: decision.scores,
                predicted_class: decision.level.index(),
                predicted_label: decision.level,
                confidence: decision.confidence,
            },
            explanation,
            meta: ReportMeta {
                physio_windows: self.physio_windows,
                feature_count: self.feature_count,
                questionnaire_values: self.questionnaire.clone(),
                voice_provided: evidence.contains(Modality::Voice),
                modalities_used: evidence.present().map(|(m, _)| m).collect(),
                class_priors_applied: engine.class_priors().is_some(),
                degenerate: self.degenerate,
            },
        }
    }

    /// Build and serialize a report to pretty JSON.
    pub fn build_json(
        &self,
        engine: &FusionEngine,
        evidence: &Evidence,
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.build(engine, evidence))
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
