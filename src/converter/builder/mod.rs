//! Batch conversion.
//!
//! - [`checksum`] - SHA-256 of published artifacts
//! - [`orchestrator`] - the [`Converter`] batch runner
//! - [`output`] - output naming under the collision policy
//! - [`report`] - per-file outcomes, batch status and progress events

mod checksum;
mod orchestrator;
mod output;
mod pipeline;
mod report;

pub use checksum::calculate_sha256;
pub use orchestrator::{Converter, InputEntry};
pub use output::OutputAllocator;
pub use report::{BatchResult, BatchStatus, FileOutcome, FileReport, ProgressEvent};
