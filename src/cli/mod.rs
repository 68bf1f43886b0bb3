//! Command line interface for the converter.
//!
//! Parses arguments, merges them with the settings file, checks that the
//! plan's tools exist, then runs the batch while rendering progress events.
//! Ctrl-C cancels the batch.

mod args;
mod output;
mod settings_file;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;
pub use settings_file::{SettingsFile, ToolOverrides};

use crate::converter::{
    ApksMode, ApksOptions, BatchResult, BatchStatus, CollisionPolicy, ConversionJobBuilder,
    ConversionMode, Converter, FileOutcome, ProgressEvent, SigningPreference, ToolPaths,
    Workspace,
};
use crate::error::{CliError, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute(args).await
}

/// Runs a parsed command line and returns the process exit code.
pub async fn execute(args: Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;
    let config = RuntimeConfig::from(&args);
    let out = config.output();

    if args.lists_modes() {
        print_modes(out)?;
        return Ok(0);
    }

    // Reject bad tokens before touching the filesystem or any tool
    let mode = ConversionMode::parse(&args.mode, args.sub_mode.as_deref())?;

    let settings = SettingsFile::load(args.config.as_deref(), &args.base_dir).await?;

    let mut workspace = Workspace::new(&args.base_dir);
    if let Some(dir) = args.keystore_dir.as_ref().or(settings.keystore_dir.as_ref()) {
        workspace = workspace.with_keystore_dir(dir);
    }
    if let Some(dir) = args.tools_dir.as_ref().or(settings.tools_dir.as_ref()) {
        workspace = workspace.with_tools_dir(dir);
    }
    if let Some(dir) = &settings.scratch_dir {
        workspace = workspace.with_scratch_dir(dir);
    }
    workspace.ensure_layout().await?;

    let tools = ToolPaths::discover(workspace.tools_dir()).with_overrides(&settings.tool_paths());

    let collision = if args.overwrite {
        CollisionPolicy::Overwrite
    } else if args.fail_on_collision {
        CollisionPolicy::Fail
    } else {
        settings.collision.unwrap_or_default()
    };
    let signing = if args.no_sign {
        SigningPreference::Skip
    } else if args.matched_keystore_only {
        SigningPreference::UseMatchedKeystore
    } else {
        settings.signing.unwrap_or_default()
    };

    let mut builder = ConversionJobBuilder::new()
        .workspace(workspace)
        .tools(tools)
        .mode(mode)
        .signing(signing)
        .collision(collision)
        .apks_options(ApksOptions {
            device_spec: args.device_spec.clone(),
            local_testing: args.local_testing,
            verbose: args.verbose,
        });
    if let Some(input) = &args.input {
        builder = builder.input(input);
    }
    if let Some(dir) = &args.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(jobs) = args.jobs.or(settings.jobs) {
        builder = builder.jobs(jobs);
    }
    if let Some(secs) = args.timeout.or(settings.timeout_secs) {
        builder = builder.tool_timeout(Duration::from_secs(secs));
    }
    if let Some(days) = args.key_validity_days.or(settings.key_validity_days) {
        builder = builder.key_validity_days(days);
    }
    let job = builder.build()?;

    let missing = job.tools().missing_for(&job.plan(), job.signing());
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|t| t.name()).collect();
        out.error(&format!(
            "Required tools not found: {}. Place them under {} or on PATH.",
            names.join(", "),
            job.workspace().tools_dir().display()
        ))?;
        return Err(CliError::MissingTools {
            tools: names.join(", "),
        }
        .into());
    }

    out.section(&mode.title())?;
    out.verbose(&format!("Input: {}", job.input().display()))?;
    out.verbose(&format!("Signing: {:?}, collisions: {:?}", job.signing(), job.collision()))?;
    out.verbose(&format!("Workers: {}", job.jobs()))?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        let out = out.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = out.warn("Cancelling; running tools will be stopped");
                cancel.cancel();
            }
        })
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render_progress(rx, out.clone()));

    let result = Converter::new(job).with_progress(tx).run(cancel).await;
    ctrl_c.abort();
    // The sender was dropped with the converter, so the renderer drains and ends
    let _ = renderer.await;
    let result = result?;

    print_summary(out, &result)?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&result)?;
        tokio::fs::write(path, json).await?;
        out.verbose(&format!("Report written to {}", path.display()))?;
    }

    Ok(result.status.exit_code())
}

async fn render_progress(mut rx: mpsc::UnboundedReceiver<ProgressEvent>, out: OutputManager) {
    while let Some(event) = rx.recv().await {
        let _ = match event {
            ProgressEvent::FileStarted {
                index,
                total,
                input,
            } => out.progress(&format!("[{}/{}] {}", index + 1, total, input.display())),
            ProgressEvent::StepStarted {
                step,
                number,
                steps,
                ..
            } => out.verbose(&format!("({number}/{steps}) {}", step.label())),
            ProgressEvent::FileFinished { report, .. } => match &report.outcome {
                FileOutcome::Succeeded {
                    outputs, warnings, ..
                } => {
                    for warning in warnings {
                        let _ = out.warn(warning);
                    }
                    for artifact in outputs {
                        let _ = out.success(&artifact.path.display().to_string());
                    }
                    Ok(())
                }
                FileOutcome::Failed { message, outputs, .. } => {
                    for artifact in outputs {
                        let _ = out.indent(&format!("kept {}", artifact.path.display()));
                    }
                    out.error(&format!("{}: {}", report.input.display(), message))
                }
                FileOutcome::Skipped => {
                    out.verbose(&format!("skipped {}", report.input.display()))
                }
            },
        };
    }
}

fn print_summary(out: &OutputManager, result: &BatchResult) -> std::io::Result<()> {
    out.section("Summary")?;
    match result.status {
        BatchStatus::Empty => out.warn("No input files found"),
        _ => {
            out.info(&format!(
                "{} succeeded, {} failed, {} skipped ({:.1}s)",
                result.succeeded(),
                result.failed(),
                result.skipped(),
                result.elapsed_ms as f64 / 1000.0
            ))?;
            for file in result.files.iter().filter(|f| f.is_failure()) {
                if let FileOutcome::Failed { kind, message, .. } = &file.outcome {
                    out.indent(&format!("{} [{:?}]: {}", file.input.display(), kind, message))?;
                }
            }
            match result.status {
                BatchStatus::Succeeded => out.success("All files converted"),
                BatchStatus::Cancelled => out.warn("Cancelled"),
                _ => Ok(()),
            }
        }
    }
}

fn print_modes(out: &OutputManager) -> std::io::Result<()> {
    out.section("Modes")?;
    for (code, mode) in [
        ("1", ConversionMode::ApkToAab),
        ("2 [SUB]", ConversionMode::AabToApks(ApksMode::Default)),
        ("3 [SUB]", ConversionMode::FullPipeline(ApksMode::Default)),
        ("4", ConversionMode::AabToApks(ApksMode::Default)),
        ("5", ConversionMode::AabToApks(ApksMode::Universal)),
        ("6", ConversionMode::AabToApks(ApksMode::System)),
        ("7", ConversionMode::AabToApks(ApksMode::Instant)),
        ("8", ConversionMode::AabToApksAllModes),
        ("9", ConversionMode::SplitToApk),
    ] {
        out.info(&format!("{code:<8} {}", mode.title()))?;
    }

    out.section("build-apks sub-modes")?;
    for mode in ApksMode::ALL {
        out.info(&format!("{:<18} {}", mode.as_str(), mode.description()))?;
    }
    Ok(())
}
