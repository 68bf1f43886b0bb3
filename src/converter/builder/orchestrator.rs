//! Batch orchestration.
//!
//! [`Converter`] resolves the job's inputs, runs the per-file pipeline on a
//! bounded number of concurrent tasks and collects one [`FileReport`] per
//! input, in lexical input order.

use super::{
    output::OutputAllocator,
    pipeline::{Aborted, FileRun},
    report::{BatchResult, FileOutcome, FileReport, ProgressEvent},
};
use crate::converter::{
    error::{Error, ErrorExt, Result},
    settings::ConversionJob,
    signing::SigningResolver,
    tools::{ExternalTool, ProcessTool},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tokio::sync::{Semaphore, mpsc::UnboundedSender};
use tokio_util::sync::CancellationToken;

/// An input as resolved from the job: either convertible or already rejected.
#[derive(Debug)]
pub enum InputEntry {
    /// File to run through the pipeline.
    Convert(PathBuf),
    /// File that fails without running (missing, wrong extension).
    Reject(PathBuf, Error),
}

impl InputEntry {
    /// Path of the input.
    pub fn path(&self) -> &Path {
        match self {
            InputEntry::Convert(path) | InputEntry::Reject(path, _) => path,
        }
    }
}

/// State shared by every file of a batch.
pub(super) struct Shared {
    pub(super) job: Arc<ConversionJob>,
    pub(super) runner: Arc<dyn ExternalTool>,
    pub(super) signing: SigningResolver,
    pub(super) outputs: OutputAllocator,
    pub(super) cancel: CancellationToken,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl Shared {
    pub(super) fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.progress {
            // A closed receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }
}

/// Main conversion orchestrator.
///
/// ```no_run
/// use aab_converter::converter::{
///     ConversionJobBuilder, ConversionMode, Converter, ToolPaths, Workspace,
/// };
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> aab_converter::converter::Result<()> {
/// let workspace = Workspace::new("/data/android");
/// let job = ConversionJobBuilder::new()
///     .tools(ToolPaths::discover(workspace.tools_dir()))
///     .workspace(workspace)
///     .mode(ConversionMode::parse("2", Some("universal"))?)
///     .build()?;
///
/// let result = Converter::new(job).run(CancellationToken::new()).await?;
/// println!("{} of {} converted", result.succeeded(), result.files.len());
/// # Ok(())
/// # }
/// ```
pub struct Converter {
    job: Arc<ConversionJob>,
    runner: Arc<dyn ExternalTool>,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("job", &self.job)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Creates a converter that runs real processes.
    pub fn new(job: ConversionJob) -> Self {
        Self::with_tool(job, Arc::new(ProcessTool))
    }

    /// Creates a converter that runs every external command through `runner`.
    pub fn with_tool(job: ConversionJob, runner: Arc<dyn ExternalTool>) -> Self {
        Self {
            job: Arc::new(job),
            runner,
            progress: None,
        }
    }

    /// Sends progress events to `tx` while the batch runs.
    pub fn with_progress(mut self, tx: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// The job being run.
    pub fn job(&self) -> &ConversionJob {
        &self.job
    }

    /// Lists the job's inputs in lexical order.
    ///
    /// A directory contributes every file directly inside it whose extension
    /// the mode accepts. A missing path or a file with another extension
    /// becomes a single rejected entry.
    ///
    /// # Errors
    ///
    /// Fails only if an existing input directory cannot be read.
    pub async fn resolve_inputs(&self) -> Result<Vec<InputEntry>> {
        let input = self.job.input().to_path_buf();
        let accepted = self.job.mode().input_extensions();
        let is_accepted = |path: &Path| {
            path.extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|ext| accepted.contains(&ext.as_str()))
        };

        let metadata = match tokio::fs::metadata(&input).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return Ok(vec![InputEntry::Reject(
                    input.clone(),
                    Error::InputNotFound(input),
                )]);
            }
        };

        if metadata.is_file() {
            return Ok(vec![if is_accepted(&input) {
                InputEntry::Convert(input)
            } else {
                InputEntry::Reject(
                    input.clone(),
                    Error::UnsupportedFormat {
                        path: input,
                        accepted: accepted.join(", "),
                    },
                )
            }]);
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&input)
            .await
            .fs_context("reading input directory", &input)?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .fs_context("reading input directory", &input)?
        {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && is_accepted(&path) {
                files.push(path);
            }
        }
        files.sort();

        Ok(files.into_iter().map(InputEntry::Convert).collect())
    }

    /// Runs the batch to completion or cancellation.
    ///
    /// Every input yields exactly one [`FileReport`]. When `cancel` fires,
    /// running tools are killed; files that were in flight are reported as
    /// failed with kind `cancelled`, files not yet started as skipped.
    pub async fn run(&self, cancel: CancellationToken) -> Result<BatchResult> {
        let started_at = chrono::Utc::now();
        let mode = self.job.mode();
        let inputs = self.resolve_inputs().await?;

        if inputs.is_empty() {
            log::warn!(
                "No {} files found in {}",
                mode.input_extensions().join("/"),
                self.job.input().display()
            );
            return Ok(BatchResult::finalize(mode, Vec::new(), false, started_at));
        }
        log::info!("Converting {} file(s): {}", inputs.len(), mode.title());

        let shared = Arc::new(Shared {
            job: self.job.clone(),
            runner: self.runner.clone(),
            signing: SigningResolver::new(
                self.job.workspace().keystore_dir().to_path_buf(),
                self.job.signing(),
                self.job.key_validity_days(),
                self.job.tools().clone(),
                self.runner.clone(),
                self.job.tool_timeout(),
            ),
            outputs: OutputAllocator::new(self.job.collision()),
            cancel: cancel.clone(),
            progress: self.progress.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(self.job.jobs()));
        let total = inputs.len();

        let mut handles = Vec::with_capacity(total);
        for (index, entry) in inputs.into_iter().enumerate() {
            let path = entry.path().to_path_buf();
            let shared = shared.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let report = match entry {
                    InputEntry::Reject(path, error) => {
                        log::error!("✗ {}: {}", path.display(), error);
                        FileReport::failed(path, &error, 0)
                    }
                    InputEntry::Convert(path) => {
                        let permit = tokio::select! {
                            biased;
                            _ = shared.cancel.cancelled() => None,
                            permit = semaphore.acquire_owned() => permit.ok(),
                        };
                        match permit {
                            Some(_permit) if !shared.cancel.is_cancelled() => {
                                convert_one(&shared, index, total, path).await
                            }
                            _ => FileReport::skipped(path),
                        }
                    }
                };
                shared.emit(ProgressEvent::FileFinished {
                    index,
                    total,
                    report: report.clone(),
                });
                report
            });
            handles.push((path, handle));
        }

        let mut files = Vec::with_capacity(total);
        for (path, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => FileReport::failed(
                    path,
                    &Error::GenericError(format!("conversion task failed: {e}")),
                    0,
                ),
            };
            files.push(report);
        }

        let result = BatchResult::finalize(mode, files, cancel.is_cancelled(), started_at);
        log::info!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            result.succeeded(),
            result.failed(),
            result.skipped()
        );
        Ok(result)
    }
}

async fn convert_one(shared: &Shared, index: usize, total: usize, input: PathBuf) -> FileReport {
    shared.emit(ProgressEvent::FileStarted {
        index,
        total,
        input: input.clone(),
    });
    log::info!("Converting {}", input.display());
    let started = Instant::now();
    let plan = shared.job.plan();

    let outcome = match FileRun::new(shared, index, input.clone()).await {
        Ok(run) => run.execute(&plan.steps).await,
        Err(error) => Err(Aborted {
            error,
            outputs: Vec::new(),
        }),
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(finished) => {
            log::info!("✓ Converted {}", input.display());
            FileReport {
                input,
                outcome: FileOutcome::Succeeded {
                    outputs: finished.outputs,
                    package: finished.package,
                    warnings: finished.warnings,
                },
                elapsed_ms,
            }
        }
        Err(Aborted { error, outputs }) => {
            log::error!("✗ {}: {}", input.display(), error);
            FileReport::failed_after(input, &error, outputs, elapsed_ms)
        }
    }
}
