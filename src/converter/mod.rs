//! Android package conversion core.
//!
//! This module turns APKs into app bundles, app bundles into APK sets and split
//! archives (APKS, XAPK, APKM) back into single installable APKs, driving
//! bundletool and the Android/JDK command line tools.
//!
//! # Overview
//!
//! A conversion:
//! 1. Parses a mode token into a [`ConversionMode`] and its [`Plan`]
//! 2. Builds an immutable [`ConversionJob`] over a [`Workspace`]
//! 3. Runs every input through the plan with [`Converter`]
//! 4. Reports one [`FileReport`] per input in a [`BatchResult`]
//!
//! # Module Organization
//!
//! - [`archive`] - zip-level module assembly and split handling
//! - [`error`] - error types and the per-file [`FailureKind`]
//! - [`mode`] - mode parsing and step plans
//! - [`package`] - package name and version extraction
//! - [`settings`] - workspace, tool locations and job configuration
//! - [`signing`] - keystore matching and generation
//! - [`tools`] - external command execution

pub mod archive;
mod builder;
pub mod error;
pub mod mode;
pub mod package;
pub mod settings;
pub mod signing;
pub mod tools;
pub mod utils;

pub use builder::{
    BatchResult, BatchStatus, Converter, FileOutcome, FileReport, InputEntry, OutputAllocator,
    ProgressEvent, calculate_sha256,
};
pub use error::{Context, Error, ErrorExt, FailureKind, Result};
pub use mode::{ApksMode, ArtifactKind, ConversionMode, Plan, Step};
pub use package::PackageInfo;
pub use settings::{
    ApksOptions, CollisionPolicy, ConversionJob, ConversionJobBuilder, SigningPreference, Tool,
    ToolPaths, Workspace,
};
pub use signing::{SigningMaterial, SigningResolver};
pub use tools::{ExternalTool, Invocation, ProcessTool, ToolOutput};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A published output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedArtifact {
    /// What kind of package this is.
    pub kind: ArtifactKind,
    /// Final location in the output directory.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Hex SHA-256 of the file.
    pub checksum: String,
}
