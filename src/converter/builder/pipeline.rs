//! Per-file pipeline execution.
//!
//! A [`FileRun`] carries one input through the plan's steps inside its own
//! working directory. The first failing step ends the run, except that a
//! failed mode in all-modes is recorded as a warning; the working
//! directory is removed when the run is dropped.

use super::{checksum::calculate_sha256, orchestrator::Shared, report::ProgressEvent};
use crate::converter::{
    ConvertedArtifact,
    archive::{self, SplitAnalysis, SplitStrategy},
    error::{Context, Error, ErrorExt, FailureKind, Result},
    mode::{ApksMode, ArtifactKind, ConversionMode, Step},
    package::{PackageInfo, parse_badging},
    settings::Tool,
    signing::SigningMaterial,
    tools::{self, Invocation, ToolOutput, commands},
    utils::fs::{blocking, file_size, move_file},
};
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;

/// State of one input's conversion.
pub(super) struct FileRun<'a> {
    shared: &'a Shared,
    index: usize,
    input: PathBuf,
    stem: String,
    work: TempDir,
    /// APK the next inspection looks at.
    apk: Option<PathBuf>,
    /// Bundle the next build-apks reads.
    bundle: Option<PathBuf>,
    proto: Option<PathBuf>,
    modules_zip: Option<PathBuf>,
    /// APK sets built but not yet published.
    pending_apk_sets: Vec<PathBuf>,
    split: Option<(SplitAnalysis, SplitStrategy)>,
    signing: Option<Arc<SigningMaterial>>,
    package: PackageInfo,
    outputs: Vec<ConvertedArtifact>,
    warnings: Vec<String>,
}

/// Failed run: the error plus anything already published.
pub(super) struct Aborted {
    pub error: Error,
    pub outputs: Vec<ConvertedArtifact>,
}

/// Successful run summary.
pub(super) struct Finished {
    pub outputs: Vec<ConvertedArtifact>,
    pub package: Option<PackageInfo>,
    pub warnings: Vec<String>,
}

impl<'a> FileRun<'a> {
    /// Creates the working directory for `input`.
    pub(super) async fn new(shared: &'a Shared, index: usize, input: PathBuf) -> Result<Self> {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("input has no file name")?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("aab-converter-");
        let work = match shared.job.workspace().scratch_dir() {
            Some(scratch) => {
                tokio::fs::create_dir_all(scratch)
                    .await
                    .fs_context("creating scratch directory", scratch)?;
                builder.tempdir_in(scratch)
            }
            None => builder.tempdir(),
        }
        .fs_context("creating working directory", &input)?;

        let apk = match shared.job.mode() {
            ConversionMode::ApkToAab | ConversionMode::FullPipeline(_) => Some(input.clone()),
            _ => None,
        };
        let bundle = match shared.job.mode() {
            ConversionMode::AabToApks(_) | ConversionMode::AabToApksAllModes => {
                Some(input.clone())
            }
            _ => None,
        };

        Ok(Self {
            shared,
            index,
            input,
            stem,
            work,
            apk,
            bundle,
            proto: None,
            modules_zip: None,
            pending_apk_sets: Vec::new(),
            split: None,
            signing: None,
            package: PackageInfo::default(),
            outputs: Vec::new(),
            warnings: Vec::new(),
        })
    }

    /// Runs every step of `steps` in order.
    ///
    /// In all-modes runs a failed `build-apks` only costs that mode: it is
    /// recorded as a warning, its publish step is skipped and the next mode
    /// runs. The file fails only when no mode produced an APK set.
    pub(super) async fn execute(mut self, steps: &[Step]) -> std::result::Result<Finished, Aborted> {
        let isolate_modes = self.shared.job.mode() == ConversionMode::AabToApksAllModes;
        let mut failed_modes: Vec<Error> = Vec::new();
        let mut skip_publish = false;

        for (position, step) in steps.iter().enumerate() {
            if self.shared.cancel.is_cancelled() {
                return Err(self.abort(Error::Cancelled));
            }
            if std::mem::take(&mut skip_publish) && *step == Step::Publish(ArtifactKind::ApkSet) {
                continue;
            }
            self.shared.emit(ProgressEvent::StepStarted {
                index: self.index,
                step: *step,
                number: position + 1,
                steps: steps.len(),
            });
            log::debug!(
                "[{}] step {}/{}: {}",
                self.stem,
                position + 1,
                steps.len(),
                step.label()
            );

            match self.step(*step).await.with_context(|| step.label()) {
                Ok(()) => {}
                Err(e)
                    if isolate_modes
                        && matches!(step, Step::BuildApks(_))
                        && e.kind() != FailureKind::Cancelled =>
                {
                    self.warn(e.to_string());
                    failed_modes.push(e);
                    skip_publish = true;
                }
                Err(e) => return Err(self.abort(e)),
            }
        }

        if self.outputs.is_empty() {
            if let Some(first) = failed_modes.into_iter().next() {
                return Err(self.abort(first));
            }
        } else if !failed_modes.is_empty() {
            log::warn!(
                "[{}] {} of {} mode(s) failed",
                self.stem,
                failed_modes.len(),
                failed_modes.len() + self.outputs.len()
            );
        }

        Ok(Finished {
            outputs: self.outputs,
            package: (!self.package.is_empty()).then_some(self.package),
            warnings: self.warnings,
        })
    }

    fn abort(self, error: Error) -> Aborted {
        Aborted {
            error,
            outputs: self.outputs,
        }
    }

    async fn step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::InspectPackage => self.inspect_package().await,
            Step::ResolveSigning => self.resolve_signing().await,
            Step::ConvertToProto => self.convert_to_proto().await,
            Step::AssembleBaseModule => self.assemble_base_module().await,
            Step::BuildBundle => self.build_bundle().await,
            Step::SignBundle => self.sign_bundle().await,
            Step::BuildApks(mode) => self.build_apks(mode).await,
            Step::AnalyzeSplitArchive => self.analyze_split_archive().await,
            Step::ExtractOrMerge => self.extract_or_merge().await,
            Step::Align => self.align().await,
            Step::SignApk => self.sign_apk().await,
            Step::Publish(kind) => self.publish(kind).await,
        }
    }

    fn work_path(&self, name: &str) -> PathBuf {
        self.work.path().join(name)
    }

    async fn run_tool(&self, invocation: Invocation) -> Result<ToolOutput> {
        tools::run(
            self.shared.runner.as_ref(),
            &invocation,
            self.shared.job.tool_timeout(),
            &self.shared.cancel,
        )
        .await
    }

    fn warn(&mut self, message: String) {
        log::warn!("[{}] {}", self.stem, message);
        self.warnings.push(message);
    }

    fn is_merge(&self) -> bool {
        self.split
            .as_ref()
            .is_some_and(|(_, strategy)| strategy.is_merge())
    }

    async fn inspect_package(&mut self) -> Result<()> {
        let Some(apk) = self.apk.clone() else {
            return Ok(());
        };
        let tools = self.shared.job.tools();
        if tools.get(Tool::Aapt2).is_none() {
            self.warn("aapt2 not available; package details unknown".into());
            return Ok(());
        }

        match self.run_tool(commands::aapt2_dump_badging(tools, &apk)?).await {
            Ok(output) => {
                let mut info = parse_badging(&output.stdout);
                info.merge(std::mem::take(&mut self.package));
                if let Some(name) = &info.package_name {
                    log::info!(
                        "[{}] package {} version {} ({})",
                        self.stem,
                        name,
                        info.version_name.as_deref().unwrap_or("?"),
                        info.version_code.map(|c| c.to_string()).unwrap_or_default()
                    );
                } else {
                    self.warn("package details not found in aapt2 output".into());
                }
                self.package = info;
                Ok(())
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                self.warn(format!("could not read package details: {e}"));
                Ok(())
            }
        }
    }

    async fn resolve_signing(&mut self) -> Result<()> {
        if self.shared.job.mode() == ConversionMode::SplitToApk && !self.is_merge() {
            return Ok(());
        }
        self.signing = self
            .shared
            .signing
            .resolve(&self.stem, &self.shared.cancel)
            .await?;
        if self.signing.is_none() {
            log::info!("[{}] signing skipped", self.stem);
        }
        Ok(())
    }

    async fn convert_to_proto(&mut self) -> Result<()> {
        let apk = self.input.clone();
        let proto = self.work_path("proto.apk");
        self.run_tool(commands::aapt2_convert_proto(
            self.shared.job.tools(),
            &apk,
            &proto,
        )?)
        .await?;
        self.proto = Some(proto);
        Ok(())
    }

    async fn assemble_base_module(&mut self) -> Result<()> {
        let proto = self.proto.clone().context("no proto APK to assemble")?;
        // bundletool names the module after the zip file
        let modules_zip = self.work_path("base.zip");
        let dest = modules_zip.clone();
        let summary = blocking(move || archive::assemble_base_module(&proto, &dest)).await?;
        for (old, new) in summary.renamed {
            self.warnings
                .push(format!("reserved name {old} stored as root/{new}"));
        }
        self.modules_zip = Some(modules_zip);
        Ok(())
    }

    async fn build_bundle(&mut self) -> Result<()> {
        let modules_zip = self.modules_zip.clone().context("no base module to build")?;
        let aab = self.work_path(&format!("{}.aab", self.stem));
        self.run_tool(commands::bundletool_build_bundle(
            self.shared.job.tools(),
            &modules_zip,
            &aab,
        )?)
        .await?;
        self.bundle = Some(aab);
        Ok(())
    }

    async fn sign_bundle(&mut self) -> Result<()> {
        let Some(material) = self.signing.clone() else {
            return Ok(());
        };
        let aab = self.bundle.clone().context("no bundle to sign")?;
        self.run_tool(commands::jarsigner_sign(
            self.shared.job.tools(),
            &aab,
            &material,
        )?)
        .await?;
        log::info!("[{}] bundle signed with {}", self.stem, material.alias);
        Ok(())
    }

    async fn build_apks(&mut self, mode: ApksMode) -> Result<()> {
        let bundle = self.bundle.clone().context("no bundle to build APKs from")?;
        let output = self.work_path(&mode.output_name(&self.stem));
        self.run_tool(commands::bundletool_build_apks(
            self.shared.job.tools(),
            &bundle,
            &output,
            mode,
            self.shared.job.apks_options(),
            self.signing.as_deref(),
        )?)
        .await?;
        self.pending_apk_sets.push(output);
        Ok(())
    }

    async fn analyze_split_archive(&mut self) -> Result<()> {
        let input = self.input.clone();
        let analysis = blocking(move || archive::analyze_split_archive(&input)).await?;
        let strategy = analysis.strategy(&self.input)?;

        log::info!(
            "[{}] {} archive with {} APK(s): {}",
            self.stem,
            analysis.format,
            analysis.apks.len(),
            match &strategy {
                SplitStrategy::Extract { entry } => format!("extracting {entry}"),
                SplitStrategy::Merge { splits, .. } => {
                    format!("merging base with {} split(s)", splits.len())
                }
            }
        );
        if !analysis.obb_files.is_empty() {
            self.warn(format!(
                "{} OBB file(s) ignored",
                analysis.obb_files.len()
            ));
        }
        if let Some(package) = &analysis.package {
            self.package.merge(package.clone());
        }

        self.split = Some((analysis, strategy));
        Ok(())
    }

    async fn extract_or_merge(&mut self) -> Result<()> {
        let (_, strategy) = self.split.clone().context("split archive not analyzed")?;
        let input = self.input.clone();

        let apk = match strategy {
            SplitStrategy::Extract { entry } => {
                let dest = self.work_path(&format!("{}.apk", self.stem));
                let target = dest.clone();
                blocking(move || archive::extract_entry(&input, &entry, &target)).await?;
                dest
            }
            SplitStrategy::Merge { base, splits } => {
                let staging = self.work_path("splits");
                tokio::fs::create_dir_all(&staging)
                    .await
                    .fs_context("creating directory", &staging)?;
                let dest = self.work_path("merged.apk");
                let target = dest.clone();
                let summary = blocking(move || {
                    archive::merge_splits(&input, &base, &splits, &staging, &target)
                })
                .await?;
                for skipped in summary.skipped_apks {
                    self.warn(format!("skipped unreadable split {skipped}"));
                }
                log::info!(
                    "[{}] merged {} APK(s) into {} entries",
                    self.stem,
                    summary.merged_apks,
                    summary.entries
                );
                dest
            }
        };

        self.apk = Some(apk);
        Ok(())
    }

    async fn align(&mut self) -> Result<()> {
        if !self.is_merge() {
            return Ok(());
        }
        let apk = self.apk.clone().context("no APK to align")?;
        let tools = self.shared.job.tools();
        if tools.get(Tool::Zipalign).is_none() {
            self.warn("zipalign not available; APK left unaligned".into());
            return Ok(());
        }

        let aligned = self.work_path("aligned.apk");
        match self.run_tool(commands::zipalign(tools, &apk, &aligned)?).await {
            Ok(_) => {
                self.apk = Some(aligned);
                Ok(())
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                self.warn(format!("zipalign failed, using unaligned APK: {e}"));
                Ok(())
            }
        }
    }

    async fn sign_apk(&mut self) -> Result<()> {
        if !self.is_merge() {
            return Ok(());
        }
        let Some(material) = self.signing.clone() else {
            self.warn("merged APK left unsigned".into());
            return Ok(());
        };
        let apk = self.apk.clone().context("no APK to sign")?;
        let tools = self.shared.job.tools();

        if tools.get(Tool::Apksigner).is_some() {
            let signed = self.work_path("signed.apk");
            self.run_tool(commands::apksigner_sign(tools, &apk, &signed, &material)?)
                .await?;
            self.apk = Some(signed);
        } else {
            self.run_tool(commands::jarsigner_sign(tools, &apk, &material)?)
                .await?;
        }
        log::info!("[{}] APK signed with {}", self.stem, material.alias);
        Ok(())
    }

    async fn publish(&mut self, kind: ArtifactKind) -> Result<()> {
        let (source, file_name) = match kind {
            ArtifactKind::Bundle => (
                self.bundle.clone().context("no bundle to publish")?,
                format!("{}.aab", self.stem),
            ),
            ArtifactKind::Apk => (
                self.apk.clone().context("no APK to publish")?,
                format!("{}.apk", self.stem),
            ),
            ArtifactKind::ApkSet => {
                let source = self
                    .pending_apk_sets
                    .pop()
                    .context("no APK set to publish")?;
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("APK set has no file name")?;
                (source, name)
            }
        };

        let dir = self
            .shared
            .job
            .output_dir_override()
            .unwrap_or_else(|| self.shared.job.workspace().output_dir(kind))
            .to_path_buf();
        let dest = self.shared.outputs.reserve(&dir, &file_name)?;
        move_file(&source, &dest).await?;

        let artifact = ConvertedArtifact {
            kind,
            size: file_size(&dest).await?,
            checksum: calculate_sha256(&dest).await?,
            path: dest.clone(),
        };
        log::info!(
            "✓ Created {} ({} bytes)",
            artifact.path.display(),
            artifact.size
        );
        self.outputs.push(artifact);

        // A published bundle still feeds build-apks in the full pipeline
        if kind == ArtifactKind::Bundle {
            self.bundle = Some(dest);
        }
        Ok(())
    }
}
