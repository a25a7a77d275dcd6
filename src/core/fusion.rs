//! Confidence-weighted late fusion of per-modality class probabilities.
//!
//! Each modality (physiological, questionnaire, voice) contributes its own
//! 3-class distribution, scaled by its self-confidence (the distribution's
//! maximum) and a fixed prior trust weight. The sum is L1-normalized. An
//! optional class-prior vector re-ranks the fused distribution before the
//! final arg-max; it encodes deployment policy, not statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Number of stress classes.
pub const NUM_CLASSES: usize = 3;

/// A distribution over `[Low, Medium, High]`, in that order.
pub type ClassProbs = [f64; NUM_CLASSES];

/// Returned when no modality carries usable evidence.
pub const UNIFORM: ClassProbs = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];

/// Width of a batch row: one probability block per modality.
pub const BATCH_ROW_WIDTH: usize = NUM_CLASSES * 3;

/// Stress level classes in probability-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StressLevel {
    Low,
    Medium,
    High,
}

impl StressLevel {
    pub const ALL: [StressLevel; NUM_CLASSES] =
        [StressLevel::Low, StressLevel::Medium, StressLevel::High];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            StressLevel::Low => "Low",
            StressLevel::Medium => "Medium",
            StressLevel::High => "High",
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Independent evidence sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Phys,
    Text,
    Voice,
}

impl Modality {
    /// Fixed fusion order; also the block order of a batch row.
    pub const ALL: [Modality; 3] = [Modality::Phys, Modality::Text, Modality::Voice];

    /// Key used in fusion inputs.
    pub fn key(self) -> &'static str {
        match self {
            Modality::Phys => "phys",
            Modality::Text => "text",
            Modality::Voice => "voice",
        }
    }

    /// Human-readable name.
    pub fn description(self) -> &'static str {
        match self {
            Modality::Phys => "physiological",
            Modality::Text => "questionnaire",
            Modality::Voice => "voice",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fusion errors. All of them are caller contract violations.
#[derive(Debug, Error, PartialEq)]
pub enum FusionError {
    #[error("{modality} probabilities must have exactly {expected} entries [Low, Medium, High], got {got}")]
    WrongLength {
        modality: Modality,
        expected: usize,
        got: usize,
    },

    #[error("{modality} probability at index {index} is not finite ({value})")]
    NonFinite {
        modality: Modality,
        index: usize,
        value: f64,
    },

    #[error("{modality} probability at index {index} is negative ({value})")]
    Negative {
        modality: Modality,
        index: usize,
        value: f64,
    },

    #[error("unknown modality '{0}', expected one of: phys, text, voice")]
    UnknownModality(String),

    #[error("invalid modality weights: {0}")]
    InvalidWeights(String),

    #[error("invalid class prior: {0}")]
    InvalidPrior(String),

    #[error("batch row {row} has {got} columns, expected {expected} (phys, text, voice x Low, Medium, High)")]
    RowWidth {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("window probability row {row} has {got} entries, expected {expected}")]
    WindowWidth {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("no window probabilities to average")]
    NoWindowProbabilities,
}

/// Prior trust placed in each modality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityWeights {
    pub phys: f64,
    pub text: f64,
    pub voice: f64,
}

impl Default for ModalityWeights {
    fn default() -> Self {
        Self {
            phys: 0.60,
            text: 0.25,
            voice: 0.15,
        }
    }
}

impl ModalityWeights {
    pub fn weight(&self, modality: Modality) -> f64 {
        match modality {
            Modality::Phys => self.phys,
            Modality::Text => self.text,
            Modality::Voice => self.voice,
        }
    }

    /// Weights must be finite, non-negative and sum to one.
    pub fn validate(&self) -> Result<(), FusionError> {
        for modality in Modality::ALL {
            let w = self.weight(modality);
            if !w.is_finite() || w < 0.0 {
                return Err(FusionError::InvalidWeights(format!(
                    "{modality} weight must be a non-negative number, got {w}"
                )));
            }
        }
        let sum = self.phys + self.text + self.voice;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(FusionError::InvalidWeights(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Post-hoc class multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassPriors(ClassProbs);

impl ClassPriors {
    /// Build from a `{class index -> multiplier}` map; unlisted classes get 1.0.
    pub fn from_map(map: &BTreeMap<usize, f64>) -> Result<Self, FusionError> {
        let mut multipliers = [1.0; NUM_CLASSES];
        for (&class, &multiplier) in map {
            if class >= NUM_CLASSES {
                return Err(FusionError::InvalidPrior(format!(
                    "class index {class} is out of range 0..{NUM_CLASSES}"
                )));
            }
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(FusionError::InvalidPrior(format!(
                    "multiplier for class {class} must be a non-negative number, got {multiplier}"
                )));
            }
            multipliers[class] = multiplier;
        }
        Ok(Self(multipliers))
    }

    pub fn multipliers(&self) -> &ClassProbs {
        &self.0
    }

    /// Element-wise product, deliberately not renormalized.
    pub fn apply(&self, probs: &ClassProbs) -> ClassProbs {
        let mut out = *probs;
        for (v, m) in out.iter_mut().zip(self.0.iter()) {
            *v *= m;
        }
        out
    }

    /// Arg-max over the classes with a positive multiplier, or over all
    /// classes when none is positive. Ties go to the lowest index.
    fn select(&self, scores: &ClassProbs) -> usize {
        let allowed: Vec<usize> = (0..NUM_CLASSES).filter(|&i| self.0[i] > 0.0).collect();
        if allowed.is_empty() {
            return argmax(scores);
        }
        let mut best = allowed[0];
        for &i in &allowed[1..] {
            if scores[i] > scores[best] {
                best = i;
            }
        }
        best
    }
}

/// Per-modality probability vectors; absent modalities do not contribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    slots: [Option<ClassProbs>; 3],
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Evidence::insert`].
    pub fn with(mut self, modality: Modality, probs: &[f64]) -> Result<Self, FusionError> {
        self.insert(modality, probs)?;
        Ok(self)
    }

    /// Add one modality's probabilities after checking length and values.
    pub fn insert(&mut self, modality: Modality, probs: &[f64]) -> Result<(), FusionError> {
        let vector = validate_probs(modality, probs)?;
        self.slots[modality.slot()] = Some(vector);
        Ok(())
    }

    /// Build from `(key, probabilities)` pairs keyed `phys`, `text`, `voice`.
    pub fn from_map<I, K>(entries: I) -> Result<Self, FusionError>
    where
        I: IntoIterator<Item = (K, Vec<f64>)>,
        K: AsRef<str>,
    {
        let mut evidence = Self::new();
        for (key, probs) in entries {
            let key = key.as_ref();
            let modality =
                Modality::from_key(key).ok_or_else(|| FusionError::UnknownModality(key.to_string()))?;
            evidence.insert(modality, &probs)?;
        }
        Ok(evidence)
    }

    /// Decode a batch row; an all-zero block means the modality is absent.
    pub fn from_row(row: &[f64]) -> Result<Self, FusionError> {
        if row.len() != BATCH_ROW_WIDTH {
            return Err(FusionError::RowWidth {
                row: 0,
                expected: BATCH_ROW_WIDTH,
                got: row.len(),
            });
        }
        let mut evidence = Self::new();
        for (modality, block) in Modality::ALL.into_iter().zip(row.chunks(NUM_CLASSES)) {
            if block.iter().any(|&v| v != 0.0) {
                evidence.insert(modality, block)?;
            }
        }
        Ok(evidence)
    }

    /// Encode as a batch row, zero-filling absent modalities.
    pub fn to_row(&self) -> [f64; BATCH_ROW_WIDTH] {
        let mut row = [0.0; BATCH_ROW_WIDTH];
        for (modality, probs) in self.present() {
            let base = modality.slot() * NUM_CLASSES;
            row[base..base + NUM_CLASSES].copy_from_slice(probs);
        }
        row
    }

    pub fn get(&self, modality: Modality) -> Option<&ClassProbs> {
        self.slots[modality.slot()].as_ref()
    }

    pub fn contains(&self, modality: Modality) -> bool {
        self.get(modality).is_some()
    }

    /// Present modalities in fusion order.
    pub fn present(&self) -> impl Iterator<Item = (Modality, &ClassProbs)> + '_ {
        Modality::ALL
            .into_iter()
            .filter_map(move |m| self.get(m).map(|p| (m, p)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_probs(modality: Modality, probs: &[f64]) -> Result<ClassProbs, FusionError> {
    if probs.len() != NUM_CLASSES {
        return Err(FusionError::WrongLength {
            modality,
            expected: NUM_CLASSES,
            got: probs.len(),
        });
    }
    let mut out = [0.0; NUM_CLASSES];
    for (index, (&value, slot)) in probs.iter().zip(out.iter_mut()).enumerate() {
        if !value.is_finite() {
            return Err(FusionError::NonFinite {
                modality,
                index,
                value,
            });
        }
        if value < 0.0 {
            return Err(FusionError::Negative {
                modality,
                index,
                value,
            });
        }
        *slot = value;
    }
    Ok(out)
}

/// Index of the largest entry; ties go to the lowest index.
pub fn argmax(values: &ClassProbs) -> usize {
    let mut best = 0;
    for i in 1..NUM_CLASSES {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}

/// A modality's self-assessed certainty: its largest probability.
pub fn confidence(probs: &ClassProbs) -> f64 {
    probs.iter().copied().fold(0.0, f64::max)
}

/// Mean of per-window probability rows, producing one modality vector.
pub fn average_probabilities<R: AsRef<[f64]>>(rows: &[R]) -> Result<ClassProbs, FusionError> {
    if rows.is_empty() {
        return Err(FusionError::NoWindowProbabilities);
    }
    let mut sum = [0.0; NUM_CLASSES];
    for (row_index, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != NUM_CLASSES {
            return Err(FusionError::WindowWidth {
                row: row_index,
                expected: NUM_CLASSES,
                got: row.len(),
            });
        }
        for (acc, v) in sum.iter_mut().zip(row) {
            *acc += v;
        }
    }
    let n = rows.len() as f64;
    Ok(sum.map(|s| s / n))
}

/// Outcome of a fusion decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Normalized fused distribution
    pub fused: ClassProbs,
    /// Fused distribution times the class priors, unnormalized
    pub scores: ClassProbs,
    /// Selected class
    pub level: StressLevel,
    /// Largest fused probability
    pub confidence: f64,
}

/// Late-fusion engine with immutable weights and an optional class-prior policy.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    weights: ModalityWeights,
    class_priors: Option<ClassPriors>,
}

impl FusionEngine {
    /// Engine with the default weights and no class priors.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ModalityWeights) -> Result<Self, FusionError> {
        weights.validate()?;
        Ok(Self {
            weights,
            class_priors: None,
        })
    }

    pub fn with_class_priors(mut self, priors: ClassPriors) -> Self {
        self.class_priors = Some(priors);
        self
    }

    pub fn from_config(config: &crate::config::FusionConfig) -> Result<Self, FusionError> {
        let engine = Self::with_weights(config.weights)?;
        Ok(match &config.class_priors {
            Some(map) => engine.with_class_priors(ClassPriors::from_map(map)?),
            None => engine,
        })
    }

    pub fn weights(&self) -> &ModalityWeights {
        &self.weights
    }

    pub fn class_priors(&self) -> Option<&ClassPriors> {
        self.class_priors.as_ref()
    }

    /// Fuse the present modalities into one distribution.
    ///
    /// Uniform when nothing usable is present.
    pub fn fuse(&self, evidence: &Evidence) -> ClassProbs {
        // Every term is quadratic in the inputs, so one shared rescale leaves
        // the normalized result unchanged while keeping large values finite.
        let peak = evidence
            .present()
            .flat_map(|(_, probs)| probs.iter().copied())
            .fold(0.0, f64::max);
        let unit = if peak > 1.0 { 1.0 / peak } else { 1.0 };

        let mut fused = [0.0; NUM_CLASSES];
        for (modality, probs) in evidence.present() {
            let scaled = probs.map(|p| p * unit);
            let scale = confidence(&scaled) * self.weights.weight(modality);
            for (acc, p) in fused.iter_mut().zip(scaled) {
                *acc += p * scale;
            }
        }

        let total: f64 = fused.iter().sum();
        if !total.is_finite() {
            tracing::warn!(?fused, "fused scores are not finite, falling back to uniform");
            return UNIFORM;
        }
        if total <= 0.0 {
            return UNIFORM;
        }
        fused.map(|v| v / total)
    }

    /// Fuse and select a class using the engine's configured priors.
    pub fn decide(&self, evidence: &Evidence) -> Decision {
        self.decide_with(evidence, self.class_priors.as_ref())
    }

    /// Fuse and select a class using explicit priors (or none).
    pub fn decide_with(&self, evidence: &Evidence, priors: Option<&ClassPriors>) -> Decision {
        let fused = self.fuse(evidence);
        let (scores, index) = match priors {
            Some(priors) => {
                let scores = priors.apply(&fused);
                (scores, priors.select(&scores))
            }
            None => (fused, argmax(&fused)),
        };
        let level = StressLevel::from_index(index).unwrap_or(StressLevel::Low);

        tracing::debug!(
            modalities = evidence.len(),
            ?fused,
            ?scores,
            level = %level,
            "fusion decision"
        );

        Decision {
            fused,
            scores,
            level,
            confidence: confidence(&fused),
        }
    }

    /// Fuse every row of a batch matrix (zero block = absent modality).
    pub fn fuse_batch<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<ClassProbs>, FusionError> {
        rows.iter()
            .enumerate()
            .map(|(row_index, row)| Ok(self.fuse(&batch_evidence(row_index, row.as_ref())?)))
            .collect()
    }

    /// Decode, validate and decide every row of a batch matrix in one pass.
    pub fn decide_batch<R: AsRef<[f64]>>(
        &self,
        rows: &[R],
        priors: Option<&ClassPriors>,
    ) -> Result<Vec<Decision>, FusionError> {
        rows.iter()
            .enumerate()
            .map(|(row_index, row)| {
                Ok(self.decide_with(&batch_evidence(row_index, row.as_ref())?, priors))
            })
            .collect()
    }

    /// Plain arg-max class for every row of a batch matrix.
    pub fn predict_batch<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<StressLevel>, FusionError> {
        Ok(self
            .fuse_batch(rows)?
            .iter()
            .map(|fused| StressLevel::from_index(argmax(fused)).unwrap_or(StressLevel::Low))
            .collect())
    }
}

fn batch_evidence(row_index: usize, row: &[f64]) -> Result<Evidence, FusionError> {
    Evidence::from_row(row).map_err(|e| match e {
        FusionError::RowWidth { expected, got, .. } => FusionError::RowWidth {
            row: row_index,
            expected,
            got,
        },
        other => other,
    })
}
