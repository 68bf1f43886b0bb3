//! Optional `converter.toml` settings file.
//!
//! ```toml
//! jobs = 4
//! timeout_secs = 900
//! collision = "rename"            # rename | overwrite | fail
//! signing = "auto-generate"       # auto-generate | use-matched-keystore | skip
//! key_validity_days = 10000
//! keystore_dir = "keys"
//! scratch_dir = "/tmp/aab-work"
//!
//! [tools]
//! bundletool = "tools/bundletool-all-1.17.2.jar"
//! java = "/usr/lib/jvm/java-17/bin/java"
//! ```
//!
//! Relative paths are resolved against the base directory. Command line flags
//! take precedence over every value here.

use crate::converter::{CollisionPolicy, SigningPreference, ToolPaths};
use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up in the base directory.
pub const DEFAULT_FILE_NAME: &str = "converter.toml";

/// Explicit tool locations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolOverrides {
    /// `java` executable.
    pub java: Option<PathBuf>,
    /// `bundletool.jar`.
    pub bundletool: Option<PathBuf>,
    /// `aapt2` executable.
    pub aapt2: Option<PathBuf>,
    /// `keytool` executable.
    pub keytool: Option<PathBuf>,
    /// `jarsigner` executable.
    pub jarsigner: Option<PathBuf>,
    /// `apksigner` script.
    pub apksigner: Option<PathBuf>,
    /// `zipalign` executable.
    pub zipalign: Option<PathBuf>,
}

/// Parsed settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    /// Files converted concurrently.
    pub jobs: Option<usize>,
    /// Per-invocation tool timeout.
    pub timeout_secs: Option<u64>,
    /// Output collision policy.
    pub collision: Option<CollisionPolicy>,
    /// Signing preference.
    pub signing: Option<SigningPreference>,
    /// Validity of generated keystores.
    pub key_validity_days: Option<u32>,
    /// Keystore directory.
    pub keystore_dir: Option<PathBuf>,
    /// Tools directory.
    pub tools_dir: Option<PathBuf>,
    /// Root for per-file working directories.
    pub scratch_dir: Option<PathBuf>,
    /// Tool path overrides.
    pub tools: ToolOverrides,
}

impl SettingsFile {
    /// Parses settings from TOML text.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Loads `path`, or `<base_dir>/converter.toml` if present, or defaults.
    pub async fn load(path: Option<&Path>, base_dir: &Path) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = base_dir.join(DEFAULT_FILE_NAME);
                if !tokio::fs::try_exists(&default).await.unwrap_or(false) {
                    return Ok(Self::default());
                }
                default
            }
        };

        log::debug!("Loading settings from {}", path.display());
        let raw = tokio::fs::read_to_string(&path).await?;
        let settings = Self::parse(&raw)?;
        Ok(settings.resolve_paths(base_dir))
    }

    fn resolve_paths(mut self, base_dir: &Path) -> Self {
        let resolve = |p: Option<PathBuf>| p.map(|p| base_dir.join(p));
        self.keystore_dir = resolve(self.keystore_dir);
        self.tools_dir = resolve(self.tools_dir);
        self.scratch_dir = resolve(self.scratch_dir);
        self.tools = ToolOverrides {
            java: resolve(self.tools.java),
            bundletool: resolve(self.tools.bundletool),
            aapt2: resolve(self.tools.aapt2),
            keytool: resolve(self.tools.keytool),
            jarsigner: resolve(self.tools.jarsigner),
            apksigner: resolve(self.tools.apksigner),
            zipalign: resolve(self.tools.zipalign),
        };
        self
    }

    /// Tool overrides as [`ToolPaths`].
    pub fn tool_paths(&self) -> ToolPaths {
        let t = &self.tools;
        ToolPaths {
            java: t.java.clone(),
            bundletool: t.bundletool.clone(),
            aapt2: t.aapt2.clone(),
            keytool: t.keytool.clone(),
            jarsigner: t.jarsigner.clone(),
            apksigner: t.apksigner.clone(),
            zipalign: t.zipalign.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_field() {
        let settings = SettingsFile::parse(
            r#"
            jobs = 2
            timeout_secs = 30
            collision = "fail"
            signing = "use-matched-keystore"
            key_validity_days = 12000

            [tools]
            bundletool = "tools/bundletool.jar"
            "#,
        )
        .unwrap()
        .resolve_paths(Path::new("/base"));

        assert_eq!(settings.jobs, Some(2));
        assert_eq!(settings.collision, Some(CollisionPolicy::Fail));
        assert_eq!(settings.signing, Some(SigningPreference::UseMatchedKeystore));
        assert_eq!(
            settings.tool_paths().bundletool,
            Some(PathBuf::from("/base/tools/bundletool.jar"))
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let settings = SettingsFile::parse("[tools]\njava = \"/opt/jdk/bin/java\"")
            .unwrap()
            .resolve_paths(Path::new("/base"));
        assert_eq!(settings.tools.java, Some(PathBuf::from("/opt/jdk/bin/java")));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(SettingsFile::parse("collision = \"sometimes\"").is_err());
    }

    #[tokio::test]
    async fn missing_default_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = SettingsFile::load(None, tmp.path()).await.unwrap();
        assert!(settings.jobs.is_none());
    }
}
