//! Builder for constructing [`ConversionJob`].

use super::{
    ApksOptions, CollisionPolicy, ConversionJob, DEFAULT_KEY_VALIDITY_DAYS,
    DEFAULT_TOOL_TIMEOUT, MIN_KEY_VALIDITY_DAYS, SigningPreference, ToolPaths, Workspace,
};
use crate::{
    bail,
    converter::{
        error::{Context, Result},
        mode::ConversionMode,
    },
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Builder for constructing [`ConversionJob`].
///
/// # Examples
///
/// ```no_run
/// use aab_converter::converter::{
///     ApksMode, ConversionJobBuilder, ConversionMode, SigningPreference, ToolPaths, Workspace,
/// };
///
/// # fn example() -> aab_converter::converter::Result<()> {
/// let workspace = Workspace::new("/data/converter");
/// let tools = ToolPaths::discover(workspace.tools_dir());
/// let job = ConversionJobBuilder::new()
///     .workspace(workspace)
///     .tools(tools)
///     .mode(ConversionMode::AabToApks(ApksMode::Universal))
///     .signing(SigningPreference::UseMatchedKeystore)
///     .jobs(4)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConversionJobBuilder {
    workspace: Option<Workspace>,
    tools: ToolPaths,
    mode: Option<ConversionMode>,
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    signing: SigningPreference,
    collision: CollisionPolicy,
    apks_options: ApksOptions,
    jobs: Option<usize>,
    tool_timeout: Option<Duration>,
    key_validity_days: Option<u32>,
}

impl ConversionJobBuilder {
    /// Creates a new job builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the workspace. Required.
    pub fn workspace(mut self, workspace: Workspace) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Sets the tool locations.
    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the mode. Required.
    pub fn mode(mut self, mode: ConversionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets an input file or directory instead of the workspace default.
    pub fn input<P: AsRef<Path>>(mut self, input: P) -> Self {
        self.input = Some(input.as_ref().to_path_buf());
        self
    }

    /// Sends every artifact to `dir` instead of the per-kind workspace directories.
    pub fn output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sets the signing preference.
    ///
    /// Default: [`SigningPreference::AutoGenerate`]
    pub fn signing(mut self, signing: SigningPreference) -> Self {
        self.signing = signing;
        self
    }

    /// Sets the output collision policy.
    ///
    /// Default: [`CollisionPolicy::Rename`]
    pub fn collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    /// Sets extra build-apks flags.
    pub fn apks_options(mut self, options: ApksOptions) -> Self {
        self.apks_options = options;
        self
    }

    /// Sets the number of files converted concurrently.
    ///
    /// Default: number of CPUs
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Sets the timeout for each external tool invocation.
    ///
    /// Default: [`DEFAULT_TOOL_TIMEOUT`]
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Sets the validity of generated keystores.
    ///
    /// Default: [`DEFAULT_KEY_VALIDITY_DAYS`]
    pub fn key_validity_days(mut self, days: u32) -> Self {
        self.key_validity_days = Some(days);
        self
    }

    /// Builds the job.
    ///
    /// # Errors
    ///
    /// Returns an error if `workspace` or `mode` is missing, if `jobs` or the
    /// timeout is zero, or if the key validity is below the 25-year minimum.
    pub fn build(self) -> Result<ConversionJob> {
        let jobs = self.jobs.unwrap_or_else(num_cpus::get);
        if jobs == 0 {
            bail!("jobs must be at least 1");
        }

        let tool_timeout = self.tool_timeout.unwrap_or(DEFAULT_TOOL_TIMEOUT);
        if tool_timeout.is_zero() {
            bail!("tool timeout must be positive");
        }

        let key_validity_days = self.key_validity_days.unwrap_or(DEFAULT_KEY_VALIDITY_DAYS);
        if key_validity_days < MIN_KEY_VALIDITY_DAYS {
            bail!(
                "key validity of {key_validity_days} days is below the {MIN_KEY_VALIDITY_DAYS}-day (25 year) minimum"
            );
        }

        Ok(ConversionJob {
            workspace: self.workspace.context("workspace is required")?,
            tools: self.tools,
            mode: self.mode.context("mode is required")?,
            input: self.input,
            output_dir: self.output_dir,
            signing: self.signing,
            collision: self.collision,
            apks_options: self.apks_options,
            jobs,
            tool_timeout,
            key_validity_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_workspace_and_mode() {
        assert!(ConversionJobBuilder::new().mode(ConversionMode::ApkToAab).build().is_err());
        assert!(ConversionJobBuilder::new().workspace(Workspace::new("/w")).build().is_err());
    }

    #[test]
    fn defaults_and_input_fallback() {
        let job = ConversionJobBuilder::new()
            .workspace(Workspace::new("/w"))
            .mode(ConversionMode::SplitToApk)
            .build()
            .unwrap();
        assert_eq!(job.input(), Path::new("/w/split_apk"));
        assert_eq!(job.signing(), SigningPreference::AutoGenerate);
        assert_eq!(job.collision(), CollisionPolicy::Rename);
        assert_eq!(job.tool_timeout(), DEFAULT_TOOL_TIMEOUT);
        assert_eq!(job.key_validity_days(), DEFAULT_KEY_VALIDITY_DAYS);
        assert!(job.jobs() >= 1);
    }

    #[test]
    fn rejects_zero_jobs_and_timeout() {
        let base = || {
            ConversionJobBuilder::new()
                .workspace(Workspace::new("/w"))
                .mode(ConversionMode::ApkToAab)
        };
        let err = base().jobs(0).build().unwrap_err();
        assert_eq!(err.to_string(), "jobs must be at least 1");
        assert!(base().tool_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn rejects_short_key_validity() {
        let err = ConversionJobBuilder::new()
            .workspace(Workspace::new("/w"))
            .mode(ConversionMode::ApkToAab)
            .key_validity_days(365)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("25 year"));
    }
}
