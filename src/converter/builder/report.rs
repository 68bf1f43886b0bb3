//! Per-file outcomes, batch status and progress events.

use crate::converter::{
    ConvertedArtifact,
    error::{Error, FailureKind},
    mode::{ConversionMode, Step},
    package::PackageInfo,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Every step finished; artifacts were published.
    Succeeded {
        /// Published artifacts, in the order they were produced.
        outputs: Vec<ConvertedArtifact>,
        /// Package identity, when it could be determined.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<PackageInfo>,
        /// Non-fatal problems (skipped inspection, failed alignment, ...).
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    /// A step failed; the remaining steps were not run.
    Failed {
        /// Error classification.
        kind: FailureKind,
        /// Full error message.
        message: String,
        /// Artifacts published before the failing step.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        outputs: Vec<ConvertedArtifact>,
    },
    /// Not started because the batch was cancelled.
    Skipped,
}

/// One entry of a [`BatchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    /// Input file.
    pub input: PathBuf,
    /// Outcome.
    #[serde(flatten)]
    pub outcome: FileOutcome,
    /// Wall time spent on this file.
    pub elapsed_ms: u64,
}

impl FileReport {
    pub(crate) fn failed(input: PathBuf, error: &Error, elapsed_ms: u64) -> Self {
        Self::failed_after(input, error, Vec::new(), elapsed_ms)
    }

    /// A failure that still left published artifacts behind.
    pub(crate) fn failed_after(
        input: PathBuf,
        error: &Error,
        outputs: Vec<ConvertedArtifact>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            input,
            outcome: FileOutcome::Failed {
                kind: error.kind(),
                message: error.to_string(),
                outputs,
            },
            elapsed_ms,
        }
    }

    pub(crate) fn skipped(input: PathBuf) -> Self {
        Self {
            input,
            outcome: FileOutcome::Skipped,
            elapsed_ms: 0,
        }
    }

    /// Whether the file converted successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FileOutcome::Succeeded { .. })
    }

    /// Whether the file failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, FileOutcome::Failed { .. })
    }

    /// Failure kind, if the file failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            FileOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Published artifacts, including those a failed file left behind.
    pub fn outputs(&self) -> &[ConvertedArtifact] {
        match &self.outcome {
            FileOutcome::Succeeded { outputs, .. } | FileOutcome::Failed { outputs, .. } => outputs,
            FileOutcome::Skipped => &[],
        }
    }
}

/// Overall result of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every file succeeded.
    Succeeded,
    /// There was nothing to convert.
    Empty,
    /// Some files failed.
    PartialFailure,
    /// Every file failed.
    Failed,
    /// The batch was cancelled.
    Cancelled,
}

impl BatchStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            BatchStatus::Succeeded | BatchStatus::Empty => 0,
            BatchStatus::Failed => 1,
            BatchStatus::PartialFailure => 2,
            BatchStatus::Cancelled => 130,
        }
    }
}

/// Ordered outcomes of one job; one entry per input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Mode the batch ran in.
    pub mode: ConversionMode,
    /// Overall status.
    pub status: BatchStatus,
    /// Per-file outcomes in lexical input order.
    pub files: Vec<FileReport>,
    /// RFC 3339 start time.
    pub started_at: String,
    /// Total wall time.
    pub elapsed_ms: u64,
}

impl BatchResult {
    pub(crate) fn finalize(
        mode: ConversionMode,
        files: Vec<FileReport>,
        cancelled: bool,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let failed = files.iter().filter(|f| f.is_failure()).count();
        let succeeded = files.iter().filter(|f| f.is_success()).count();

        let status = if cancelled {
            BatchStatus::Cancelled
        } else if files.is_empty() {
            BatchStatus::Empty
        } else if failed == 0 {
            BatchStatus::Succeeded
        } else if succeeded == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartialFailure
        };

        let elapsed_ms = (chrono::Utc::now() - started_at)
            .num_milliseconds()
            .max(0) as u64;

        Self {
            mode,
            status,
            files,
            started_at: started_at.to_rfc3339(),
            elapsed_ms,
        }
    }

    /// Number of successful files.
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    /// Number of failed files.
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.is_failure()).count()
    }

    /// Number of files skipped by cancellation.
    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Skipped))
            .count()
    }

    /// Every published artifact, in file order.
    pub fn artifacts(&self) -> impl Iterator<Item = &ConvertedArtifact> {
        self.files.iter().flat_map(|f| f.outputs().iter())
    }
}

/// Progress notifications for drivers that render a batch as it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A worker picked up a file.
    FileStarted {
        /// Position in the batch.
        index: usize,
        /// Batch size.
        total: usize,
        /// Input file.
        input: PathBuf,
    },
    /// A pipeline step is about to run.
    StepStarted {
        /// Position in the batch.
        index: usize,
        /// Step about to run.
        step: Step,
        /// One-based step number.
        number: usize,
        /// Steps in the plan.
        steps: usize,
    },
    /// A file reached its final outcome.
    FileFinished {
        /// Position in the batch.
        index: usize,
        /// Batch size.
        total: usize,
        /// The file's report.
        report: FileReport,
    },
}
