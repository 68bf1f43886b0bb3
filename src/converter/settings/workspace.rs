//! Directory handles for a conversion workspace.

use crate::converter::{
    error::{ErrorExt, Result},
    mode::{ArtifactKind, ConversionMode},
};
use std::path::{Path, PathBuf};

/// Directory layout shared by every component of a job.
///
/// Components never reach for ambient paths; they get their directories from
/// the workspace, so tests can point everything at a temporary directory.
///
/// Default layout under the base directory:
///
/// ```text
/// apk/        APK inputs
/// aab/        AAB inputs and APK -> AAB outputs
/// apks/       AAB -> APKS outputs
/// split_apk/  APKS/XAPK/APKM inputs
/// apk2/       split -> APK outputs
/// keystore/   <name>.jks + <name>.json pairs
/// tools/      bundletool.jar, android-sdk/, jdk-*/
/// ```
#[derive(Debug, Clone)]
pub struct Workspace {
    base_dir: PathBuf,
    apk_dir: PathBuf,
    aab_dir: PathBuf,
    apks_dir: PathBuf,
    split_apk_dir: PathBuf,
    apk2_dir: PathBuf,
    keystore_dir: PathBuf,
    tools_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl Workspace {
    /// Creates a workspace with the default layout under `base_dir`.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        Self {
            apk_dir: base_dir.join("apk"),
            aab_dir: base_dir.join("aab"),
            apks_dir: base_dir.join("apks"),
            split_apk_dir: base_dir.join("split_apk"),
            apk2_dir: base_dir.join("apk2"),
            keystore_dir: base_dir.join("keystore"),
            tools_dir: base_dir.join("tools"),
            scratch_dir: None,
            base_dir,
        }
    }

    /// Overrides the keystore directory.
    pub fn with_keystore_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.keystore_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Overrides the tools directory.
    pub fn with_tools_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.tools_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Places per-file working directories under `dir` instead of the system temp dir.
    pub fn with_scratch_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.scratch_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Keystore directory.
    pub fn keystore_dir(&self) -> &Path {
        &self.keystore_dir
    }

    /// Tools directory.
    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    /// Root for per-file working directories, if configured.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Default input directory for a mode.
    pub fn input_dir(&self, mode: ConversionMode) -> &Path {
        match mode {
            ConversionMode::ApkToAab | ConversionMode::FullPipeline(_) => &self.apk_dir,
            ConversionMode::AabToApks(_) | ConversionMode::AabToApksAllModes => &self.aab_dir,
            ConversionMode::SplitToApk => &self.split_apk_dir,
        }
    }

    /// Default output directory for an artifact kind.
    pub fn output_dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Bundle => &self.aab_dir,
            ArtifactKind::ApkSet => &self.apks_dir,
            ArtifactKind::Apk => &self.apk2_dir,
        }
    }

    /// Creates every directory of the layout that does not exist yet.
    pub async fn ensure_layout(&self) -> Result<()> {
        for dir in [
            &self.apk_dir,
            &self.aab_dir,
            &self.apks_dir,
            &self.split_apk_dir,
            &self.apk2_dir,
            &self.keystore_dir,
        ] {
            if !dir.exists() {
                log::info!("Creating directory {}", dir.display());
            }
            tokio::fs::create_dir_all(dir)
                .await
                .fs_context("creating workspace directory", dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::mode::ApksMode;

    #[test]
    fn default_layout() {
        let ws = Workspace::new("/w");
        assert_eq!(ws.input_dir(ConversionMode::ApkToAab), Path::new("/w/apk"));
        assert_eq!(
            ws.input_dir(ConversionMode::AabToApks(ApksMode::Universal)),
            Path::new("/w/aab")
        );
        assert_eq!(ws.input_dir(ConversionMode::SplitToApk), Path::new("/w/split_apk"));
        assert_eq!(ws.output_dir(ArtifactKind::Bundle), Path::new("/w/aab"));
        assert_eq!(ws.output_dir(ArtifactKind::ApkSet), Path::new("/w/apks"));
        assert_eq!(ws.output_dir(ArtifactKind::Apk), Path::new("/w/apk2"));
        assert_eq!(ws.keystore_dir(), Path::new("/w/keystore"));
    }

    #[tokio::test]
    async fn ensure_layout_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::new(tmp.path());
        ws.ensure_layout().await.unwrap();
        ws.ensure_layout().await.unwrap();
        for dir in ["apk", "aab", "apks", "split_apk", "apk2", "keystore"] {
            assert!(tmp.path().join(dir).is_dir(), "{dir}");
        }
    }
}
