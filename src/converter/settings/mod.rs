//! Configuration structures for conversion jobs.
//!
//! - [`Workspace`] - directory handles for inputs, outputs, keystores and tools
//! - [`ToolPaths`] - locations of the external binaries
//! - [`ConversionJob`] - one requested transformation, built with [`ConversionJobBuilder`]

mod builder;
mod job;
mod tools;
mod workspace;

pub use builder::ConversionJobBuilder;
pub use job::{ApksOptions, CollisionPolicy, ConversionJob, SigningPreference};
pub use tools::{Tool, ToolPaths};
pub use workspace::Workspace;

/// Default per-invocation timeout for external tools.
pub const DEFAULT_TOOL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(600);

/// Keystore validity used when none is configured (about 27 years).
pub const DEFAULT_KEY_VALIDITY_DAYS: u32 = 10_000;

/// Google Play requires certificates valid for at least 25 years.
pub const MIN_KEY_VALIDITY_DAYS: u32 = 9_125;
