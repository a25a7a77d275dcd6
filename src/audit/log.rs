//! Audit log of inference activity.
//!
//! Counts what the pipeline processed and how often it had to substitute
//! zeros for undefined features. No signal values are stored.

use crate::core::features::DegenerateTally;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Inference counters for the current session.
#[derive(Debug)]
pub struct AuditLog {
    /// Sensor records run through the extractor
    records_processed: AtomicU64,
    /// Feature windows produced
    windows_extracted: AtomicU64,
    /// Zero-filled blocks and values
    degenerate_substitutions: AtomicU64,
    /// Fusion decisions made
    fusions: AtomicU64,
    /// Requests rejected for malformed input
    rejected_requests: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records_processed: AtomicU64::new(0),
            windows_extracted: AtomicU64::new(0),
            degenerate_substitutions: AtomicU64::new(0),
            fusions: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an audit log backed by a JSON file, resuming its counters.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous audit stats");
        }

        log
    }

    /// Record one extracted record and its degenerate tally.
    pub fn record_extraction(&self, windows: u64, degenerate: &DegenerateTally) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
        self.windows_extracted.fetch_add(windows, Ordering::Relaxed);
        self.degenerate_substitutions
            .fetch_add(degenerate.total(), Ordering::Relaxed);
    }

    pub fn record_fusion(&self) {
        self.fusions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fusions(&self, count: u64) {
        self.fusions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            records_processed: self.records_processed.load(Ordering::Relaxed),
            windows_extracted: self.windows_extracted.load(Ordering::Relaxed),
            degenerate_substitutions: self.degenerate_substitutions.load(Ordering::Relaxed),
            fusions: self.fusions.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Audit Statistics:\n\
             - Records processed: {}\n\
             - Windows extracted: {}\n\
             - Degenerate substitutions: {}\n\
             - Fusion decisions: {}\n\
             - Rejected requests: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Only counts are kept; no signal data or predictions are stored.",
            stats.records_processed,
            stats.windows_extracted,
            stats.degenerate_substitutions,
            stats.fusions,
            stats.rejected_requests,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk when persistence is enabled.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                records_processed: stats.records_processed,
                windows_extracted: stats.windows_extracted,
                degenerate_substitutions: stats.degenerate_substitutions,
                fusions: stats.fusions,
                rejected_requests: stats.rejected_requests,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.records_processed
                    .store(persisted.records_processed, Ordering::Relaxed);
                self.windows_extracted
                    .store(persisted.windows_extracted, Ordering::Relaxed);
                self.degenerate_substitutions
                    .store(persisted.degenerate_substitutions, Ordering::Relaxed);
                self.fusions.store(persisted.fusions, Ordering::Relaxed);
                self.rejected_requests
                    .store(persisted.rejected_requests, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.records_processed.store(0, Ordering::Relaxed);
        self.windows_extracted.store(0, Ordering::Relaxed);
        self.degenerate_substitutions.store(0, Ordering::Relaxed);
        self.fusions.store(0, Ordering::Relaxed);
        self.rejected_requests.store(0, Ordering::Relaxed);
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of audit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub records_processed: u64,
    pub windows_extracted: u64,
    pub degenerate_substitutions: u64,
    pub fusions: u64,
    pub rejected_requests: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    records_processed: u64,
    windows_extracted: u64,
    degenerate_substitutions: u64,
    fusions: u64,
    rejected_requests: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_counting() {
        let log = AuditLog::new();
        let tally = DegenerateTally {
            spectral: 2,
            missing_channels: 1,
            ..Default::default()
        };

        log.record_extraction(5, &tally);
        log.record_extraction(3, &DegenerateTally::default());
        log.record_fusion();
        log.record_fusions(4);
        log.record_rejection();

        let stats = log.stats();
        assert_eq!(stats.records_processed, 2);
        assert_eq!(stats.windows_extracted, 8);
        assert_eq!(stats.degenerate_substitutions, 3);
        assert_eq!(stats.fusions, 5);
        assert_eq!(stats.rejected_requests, 1);
    }

    #[test]
    fn test_audit_log_reset() {
        let log = AuditLog::new();
        log.record_fusions(10);
        log.record_rejection();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.fusions, 0);
        assert_eq!(stats.rejected_requests, 0);
    }

    #[test]
    fn test_shared_log_across_threads() {
        let log = create_shared_log();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        log.record_fusion();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.stats().fusions, 400);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = std::env::temp_dir().join(format!("safespace-audit-{}", uuid::Uuid::new_v4()));
        let path = dir.join("audit.json");

        let log = AuditLog::with_persistence(path.clone());
        log.record_extraction(7, &DegenerateTally::default());
        log.record_fusion();
        log.save().unwrap();

        let resumed = AuditLog::with_persistence(path);
        let stats = resumed.stats();
        assert_eq!(stats.records_processed, 1);
        assert_eq!(stats.windows_extracted, 7);
        assert_eq!(stats.fusions, 1);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_summary_format() {
        let summary = AuditLog::new().summary();
        assert!(summary.contains("Records processed"));
        assert!(summary.contains("Degenerate substitutions"));
        assert!(summary.contains("Fusion decisions"));
    }
}
