//! SafeSpace Stress - multimodal stress inference core.
//!
//! This library turns synchronized physiological recordings into
//! fixed-length feature vectors, and fuses per-modality class probabilities
//! (physiological, questionnaire, voice) into a single Low / Medium / High
//! stress decision with a modality-level explanation.
//!
//! # Guarantees
//!
//! - **Fixed layout**: every window yields the same feature vector length,
//!   whatever the signal looks like
//! - **No NaN**: undefined features are replaced by zeros, and every
//!   substitution is counted
//! - **Graceful degradation**: absent modalities are skipped; with no
//!   evidence at all the decision falls back to a uniform distribution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SafeSpace Stress                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Sensor    │──▶│  Windowing  │──▶│  Features   │       │
//! │  │   Record    │   │ (10s / 5s)  │   │ (per chan.) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │               (external classifiers)         ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Audit     │◀──│   Fusion    │◀──│ phys / text │       │
//! │  │    Log      │   │ + Explain   │   │   / voice   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                                 │
//! │                           ▼                                 │
//! │                    ┌─────────────┐                          │
//! │                    │   Stress    │                          │
//! │                    │   Report    │                          │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use safespace_stress::{Evidence, FusionEngine, Modality};
//!
//! let evidence = Evidence::new()
//!     .with(Modality::Phys, &[0.1, 0.2, 0.7])?
//!     .with(Modality::Text, &[0.0, 0.1, 0.9])?;
//!
//! let decision = FusionEngine::new().decide(&evidence);
//! println!("{} ({:.2})", decision.level, decision.confidence);
//! # Ok::<(), safespace_stress::FusionError>(())
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod input;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use config::{Config, ConfigError, ExtractionConfig, FusionConfig};
pub use core::{
    explain, ClassPriors, ClassProbs, Decision, Evidence, ExtractError, FeatureExtractor,
    FeatureMatrix, FusionEngine, FusionError, FusionExplanation, Modality, ModalityWeights,
    ReportBuilder, SensorRecord, StressLevel, StressReport,
};
pub use input::InputError;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Class labels in probability-vector order.
pub const CLASS_NAMES: [&str; 3] = ["Low", "Medium", "High"];
