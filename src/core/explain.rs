//! Modality-level explanation of a fusion decision.
//!
//! Scores how much each present modality drove the result: a confident,
//! low-entropy modality contributes more than a flat one.

use super::fusion::{argmax, confidence, ClassProbs, Decision, Evidence, FusionEngine, Modality, StressLevel};
use serde::{Deserialize, Serialize};

/// Guard added inside the logarithm so zero probabilities stay finite.
const ENTROPY_EPSILON: f64 = 1e-10;

/// One modality's part in a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityContribution {
    pub modality: Modality,
    /// Human-readable modality name
    pub description: String,
    pub probabilities: ClassProbs,
    /// The class this modality alone would pick
    pub predicted: StressLevel,
    /// Largest probability
    pub confidence: f64,
    /// Shannon entropy in nats
    pub entropy: f64,
    /// `confidence * (1 - entropy / ln 3)`
    pub contribution_score: f64,
    /// Share of the fused mass carried by this modality (confidence times
    /// weight, normalized over present modalities)
    pub effective_share: f64,
}

/// Per-modality breakdown plus a one-line summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionExplanation {
    pub predicted: StressLevel,
    pub confidence: f64,
    /// Present modalities, highest contribution score first
    pub contributions: Vec<ModalityContribution>,
    pub summary: String,
}

impl FusionExplanation {
    /// The modality with the highest contribution score.
    pub fn primary(&self) -> Option<&ModalityContribution> {
        self.contributions.first()
    }
}

/// Shannon entropy (natural log) of a class distribution.
pub fn entropy(probs: &ClassProbs) -> f64 {
    -probs
        .iter()
        .map(|&p| p * (p + ENTROPY_EPSILON).ln())
        .sum::<f64>()
}

/// Explain `decision`, which must have been produced by `engine` from `evidence`.
pub fn explain(engine: &FusionEngine, evidence: &Evidence, decision: &Decision) -> FusionExplanation {
    let max_entropy = (super::fusion::NUM_CLASSES as f64).ln();

    let raw_shares: Vec<f64> = evidence
        .present()
        .map(|(m, p)| confidence(p) * engine.weights().weight(m))
        .collect();
    let share_total: f64 = raw_shares.iter().sum();

    let mut contributions: Vec<ModalityContribution> = evidence
        .present()
        .zip(raw_shares)
        .map(|((modality, probs), raw_share)| {
            let conf = confidence(probs);
            let h = entropy(probs);
            ModalityContribution {
                modality,
                description: modality.description().to_string(),
                probabilities: *probs,
                predicted: StressLevel::from_index(argmax(probs)).unwrap_or(StressLevel::Low),
                confidence: conf,
                entropy: h,
                contribution_score: conf * (1.0 - h / max_entropy),
                effective_share: if share_total > 0.0 {
                    raw_share / share_total
                } else {
                    0.0
                },
            }
        })
        .collect();

    // Stable sort keeps fusion order among equal scores.
    contributions.sort_by(|a, b| b.contribution_score.total_cmp(&a.contribution_score));

    let summary = match contributions.first() {
        Some(primary) => format!(
            "Predicted stress level: {} (confidence: {:.2}). Primary evidence from {} signals.",
            decision.level, decision.confidence, primary.description
        ),
        None => format!(
            "Predicted stress level: {} (confidence: {:.2}). No modality evidence was provided.",
            decision.level, decision.confidence
        ),
    };

    FusionExplanation {
        predicted: decision.level,
        confidence: decision.confidence,
        contributions,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Evidence {
        Evidence::new()
            .with(Modality::Phys, &[0.1, 0.2, 0.7])
            .and_then(|e| e.with(Modality::Text, &[0.0, 0.1, 0.9]))
            .and_then(|e| e.with(Modality::Voice, &[0.33, 0.34, 0.33]))
            .unwrap()
    }

    #[test]
    fn test_entropy_bounds() {
        assert!(entropy(&[1.0, 0.0, 0.0]).abs() < 1e-8);
        let uniform = entropy(&[1.0 / 3.0; 3]);
        assert!((uniform - 3f64.ln()).abs() < 1e-8);
    }

    #[test]
    fn test_contributions_sorted_by_score() {
        let engine = FusionEngine::new();
        let evidence = scenario();
        let decision = engine.decide(&evidence);
        let explanation = explain(&engine, &evidence, &decision);

        assert_eq!(explanation.contributions.len(), 3);
        let scores: Vec<f64> = explanation
            .contributions
            .iter()
            .map(|c| c.contribution_score)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");

        // Text is the most confident and least uncertain source.
        let primary = explanation.primary().unwrap();
        assert_eq!(primary.modality, Modality::Text);
        assert_eq!(primary.predicted, StressLevel::High);

        // Near-uniform voice contributes almost nothing.
        let voice = explanation
            .contributions
            .iter()
            .find(|c| c.modality == Modality::Voice)
            .unwrap();
        assert!(voice.contribution_score < 0.01);
    }

    #[test]
    fn test_effective_shares_sum_to_one() {
        let engine = FusionEngine::new();
        let evidence = scenario();
        let explanation = explain(&engine, &evidence, &engine.decide(&evidence));
        let total: f64 = explanation.contributions.iter().map(|c| c.effective_share).sum();
        assert!((total - 1.0).abs() < 1e-9);

        let phys = explanation
            .contributions
            .iter()
            .find(|c| c.modality == Modality::Phys)
            .unwrap();
        assert!((phys.effective_share - 0.42 / (0.42 + 0.225 + 0.051)).abs() < 1e-9);
    }

    #[test]
    fn test_summary_text() {
        let engine = FusionEngine::new();
        let evidence = Evidence::new().with(Modality::Phys, &[0.1, 0.2, 0.7]).unwrap();
        let decision = engine.decide(&evidence);
        let explanation = explain(&engine, &evidence, &decision);
        assert_eq!(
            explanation.summary,
            "Predicted stress level: High (confidence: 0.70). Primary evidence from physiological signals."
        );
    }

    #[test]
    fn test_empty_evidence_summary() {
        let engine = FusionEngine::new();
        let evidence = Evidence::new();
        let explanation = explain(&engine, &evidence, &engine.decide(&evidence));
        assert!(explanation.contributions.is_empty());
        assert!(explanation.primary().is_none());
        assert!(explanation.summary.contains("No modality evidence"));
        assert_eq!(explanation.predicted, StressLevel::Low);
    }
}
