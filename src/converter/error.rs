//! Error types for conversion operations.
//!
//! Every failure of a single file's pipeline ends up as an [`Error`]; the batch
//! runner maps it to a [`FailureKind`] for the per-file report.

use serde::{Deserialize, Serialize};
use std::{fmt::Display, io, path::PathBuf};
use thiserror::Error as DeriveError;

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the converter core.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with added context.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// Unrecognized operation token or sub-mode.
    #[error("invalid mode `{token}`: {reason}")]
    InvalidMode {
        /// Token as typed by the user.
        token: String,
        /// Why the token was rejected.
        reason: String,
    },

    /// No keystore matched the artifact and auto-generation is disabled.
    #[error(
        "no signing material for `{artifact}`: expected {keystore} and its .json descriptor"
    )]
    MissingSigningMaterial {
        /// Artifact base name the keystore was looked up for.
        artifact: String,
        /// Keystore path that was expected.
        keystore: PathBuf,
    },

    /// External tool exited non-zero or did not finish in time.
    #[error("{tool} failed ({reason}){}", format_diagnostics(.diagnostics))]
    ExternalToolFailure {
        /// Tool label, e.g. `bundletool build-apks`.
        tool: String,
        /// Exit status or timeout description.
        reason: String,
        /// Captured stderr (falls back to stdout when stderr is empty).
        diagnostics: String,
    },

    /// The external tool could not be started at all.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Program that failed to spawn.
        command: String,
        /// Underlying error.
        error: io::Error,
    },

    /// Missing or unreadable input file.
    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    /// Input extension is not accepted by the selected mode.
    #[error("unsupported input format: {path} (accepted: {accepted})")]
    UnsupportedFormat {
        /// Rejected input.
        path: PathBuf,
        /// Comma-separated accepted extensions.
        accepted: String,
    },

    /// Output exists and the collision policy forbids replacing it.
    #[error("refusing to overwrite existing output: {0}")]
    OutputCollision(PathBuf),

    /// Archive could not be read or holds no usable APK.
    #[error("invalid archive {path}: {reason}")]
    InvalidArchive {
        /// Archive path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The batch was cancelled while this step was running.
    #[error("cancelled")]
    Cancelled,

    /// IO error with the path and operation it happened on.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Operation being performed.
        context: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        error: io::Error,
    },

    /// Plain IO error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Zip read or write error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// JSON error from keystore descriptors or archive manifests.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    /// Anything else.
    #[error("{0}")]
    GenericError(String),
}

fn format_diagnostics(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Coarse classification of a per-file failure, stable for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// See [`Error::InvalidMode`].
    InvalidMode,
    /// See [`Error::MissingSigningMaterial`].
    MissingSigningMaterial,
    /// Tool failed, timed out or could not be spawned.
    ExternalToolFailure,
    /// See [`Error::InputNotFound`].
    InputNotFound,
    /// See [`Error::UnsupportedFormat`].
    UnsupportedFormat,
    /// See [`Error::OutputCollision`].
    OutputCollision,
    /// See [`Error::InvalidArchive`].
    InvalidArchive,
    /// See [`Error::Cancelled`].
    Cancelled,
    /// Filesystem and other IO problems.
    Io,
}

impl Error {
    /// Classifies this error, looking through any context layers.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Context(_, inner) => inner.kind(),
            Error::InvalidMode { .. } => FailureKind::InvalidMode,
            Error::MissingSigningMaterial { .. } => FailureKind::MissingSigningMaterial,
            Error::ExternalToolFailure { .. } | Error::CommandFailed { .. } => {
                FailureKind::ExternalToolFailure
            }
            Error::InputNotFound(_) => FailureKind::InputNotFound,
            Error::UnsupportedFormat { .. } => FailureKind::UnsupportedFormat,
            Error::OutputCollision(_) => FailureKind::OutputCollision,
            Error::InvalidArchive { .. } | Error::ZipError(_) => FailureKind::InvalidArchive,
            Error::Cancelled => FailureKind::Cancelled,
            Error::Fs { .. }
            | Error::IoError(_)
            | Error::JsonError(_)
            | Error::GenericError(_) => FailureKind::Io,
        }
    }
}

/// Convenient way to attach context to errors and options.
pub trait Context<T> {
    /// Adds a static context message.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Adds a lazily built context message.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Attaches the operation and path to raw IO errors.
pub trait ErrorExt<T> {
    /// Wraps an IO error as [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Returns early with a [`Error::GenericError`].
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::converter::Error::GenericError(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::converter::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::converter::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
