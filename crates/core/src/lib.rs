//! Core ingestion primitives for docintake
//!
//! This crate provides:
//! - SHA-1 content fingerprints for deduplication
//! - Size-polling stability probe for files still being written
//! - Process-lifetime dedup set (optionally bounded)
//! - Unbounded work queue shared by watchers and workers
//! - Cooperative shutdown signal

pub mod dedup;
pub mod error;
pub mod hash;
pub mod job;
pub mod queue;
pub mod shutdown;
pub mod stability;

// Re-exports
pub use dedup::DedupSet;
pub use error::{IntakeError, Result};
pub use hash::{fingerprint_bytes, fingerprint_file, Fingerprint};
pub use job::Job;
pub use queue::WorkQueue;
pub use shutdown::ShutdownSignal;
pub use stability::{is_stable, Stability, StabilityProbe};
