//! Pipeline orchestration for promptlib.
//!
//! This crate ties together extraction, enrichment, batched loading and the
//! local ledger into the end-to-end runs invoked by the CLI.

pub mod artifacts;
pub mod cache;
pub mod pipeline;

pub use cache::CachedGenerator;
pub use pipeline::{ProgressReporter, RunOptions, RunReport, SilentProgress};
