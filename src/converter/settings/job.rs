//! The conversion job: what to convert, where to, and how to sign.

use super::{ToolPaths, Workspace};
use crate::converter::mode::{ConversionMode, Plan};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Where signing material comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningPreference {
    /// Reuse a matching keystore, generating one when none exists.
    #[default]
    AutoGenerate,
    /// Only reuse a matching keystore; fail the file otherwise.
    UseMatchedKeystore,
    /// Do not sign (bundletool falls back to its debug key for APK sets).
    Skip,
}

/// What to do when an output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Pick the next free name: `app.aab`, `app-1.aab`, `app-2.aab`, ...
    #[default]
    Rename,
    /// Replace the existing file.
    Overwrite,
    /// Fail the file with an output collision error.
    Fail,
}

/// Extra `bundletool build-apks` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApksOptions {
    /// `--device-spec=<file>`.
    pub device_spec: Option<PathBuf>,
    /// `--local-testing`.
    pub local_testing: bool,
    /// `--verbose`.
    pub verbose: bool,
}

/// One requested transformation. Immutable once the batch starts.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub(super) workspace: Workspace,
    pub(super) tools: ToolPaths,
    pub(super) mode: ConversionMode,
    pub(super) input: Option<PathBuf>,
    pub(super) output_dir: Option<PathBuf>,
    pub(super) signing: SigningPreference,
    pub(super) collision: CollisionPolicy,
    pub(super) apks_options: ApksOptions,
    pub(super) jobs: usize,
    pub(super) tool_timeout: Duration,
    pub(super) key_validity_days: u32,
}

impl ConversionJob {
    /// Directory handles.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// External tool locations.
    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Requested mode.
    pub fn mode(&self) -> ConversionMode {
        self.mode
    }

    /// Pipeline for the requested mode.
    pub fn plan(&self) -> Plan {
        self.mode.plan()
    }

    /// Input file or directory; falls back to the workspace input directory.
    pub fn input(&self) -> &Path {
        self.input
            .as_deref()
            .unwrap_or_else(|| self.workspace.input_dir(self.mode))
    }

    /// Explicit output directory, if any.
    pub fn output_dir_override(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Signing preference.
    pub fn signing(&self) -> SigningPreference {
        self.signing
    }

    /// Output collision policy.
    pub fn collision(&self) -> CollisionPolicy {
        self.collision
    }

    /// Extra build-apks flags.
    pub fn apks_options(&self) -> &ApksOptions {
        &self.apks_options
    }

    /// Maximum files converted concurrently.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Timeout applied to every external tool invocation.
    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Validity of generated keystores, in days.
    pub fn key_validity_days(&self) -> u32 {
        self.key_validity_days
    }
}
