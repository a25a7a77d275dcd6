//! Audit counters for the inference pipeline.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, AuditLog, AuditStats, SharedAuditLog,
};
