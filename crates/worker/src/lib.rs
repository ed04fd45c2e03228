//! Docintake Worker - job processing
//!
//! This crate turns queued jobs into artifacts:
//! - Processor abstraction over the recognition engine
//! - Result, error report and relocation layout on disk
//! - Worker loop and fixed-size worker pool

pub mod output;
pub mod processor;
pub mod worker;

pub use output::{relocate, unique_destination, write_error, write_result, ERRORS_DIR, PROCESSED_DIR};
pub use processor::{FixedOutDir, OutDirSource, ProcessOutput, Processor};
pub use worker::{IngestionWorker, JobOutcome, WorkerOptions, WorkerPool};
