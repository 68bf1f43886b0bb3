//! External tool discovery.
//!
//! Tools are looked up in this order: explicit overrides, the workspace tools
//! directory (`bundletool.jar`, `android-sdk/build-tools/<version>/`,
//! `jdk-*/bin/`), `JAVA_HOME` / `ANDROID_HOME`, and finally `PATH`.

use super::job::SigningPreference;
use crate::converter::{
    error::{Error, Result},
    mode::{Plan, Step},
};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// External binaries the converter may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `java`, used to run bundletool.
    Java,
    /// `bundletool.jar`.
    Bundletool,
    /// `aapt2` from the build-tools.
    Aapt2,
    /// JDK `keytool`.
    Keytool,
    /// JDK `jarsigner`.
    Jarsigner,
    /// `apksigner` from the build-tools.
    Apksigner,
    /// `zipalign` from the build-tools.
    Zipalign,
}

impl Tool {
    /// File name without platform suffix.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Java => "java",
            Tool::Bundletool => "bundletool.jar",
            Tool::Aapt2 => "aapt2",
            Tool::Keytool => "keytool",
            Tool::Jarsigner => "jarsigner",
            Tool::Apksigner => "apksigner",
            Tool::Zipalign => "zipalign",
        }
    }

    fn file_name(self) -> String {
        match self {
            Tool::Bundletool => self.name().to_string(),
            Tool::Apksigner if cfg!(windows) => "apksigner.bat".to_string(),
            _ => format!("{}{}", self.name(), std::env::consts::EXE_SUFFIX),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved locations of the external tools; `None` means not found.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
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

impl ToolPaths {
    /// Looks every tool up under `tools_dir`, then the environment, then `PATH`.
    pub fn discover(tools_dir: &Path) -> Self {
        let build_tools = latest_build_tools(&tools_dir.join("android-sdk"))
            .or_else(|| android_home().and_then(|home| latest_build_tools(&home)));
        let jdk_bin = bundled_jdk_bin(tools_dir)
            .or_else(|| std::env::var_os("JAVA_HOME").map(|home| PathBuf::from(home).join("bin")));

        let mut paths = Self::default();
        for tool in [
            Tool::Java,
            Tool::Bundletool,
            Tool::Aapt2,
            Tool::Keytool,
            Tool::Jarsigner,
            Tool::Apksigner,
            Tool::Zipalign,
        ] {
            let dir = match tool {
                Tool::Bundletool => Some(tools_dir.to_path_buf()),
                Tool::Java | Tool::Keytool | Tool::Jarsigner => jdk_bin.clone(),
                Tool::Aapt2 | Tool::Apksigner | Tool::Zipalign => build_tools.clone(),
            };
            let found = dir
                .map(|d| d.join(tool.file_name()))
                .filter(|p| p.is_file())
                .or_else(|| match tool {
                    Tool::Bundletool => find_bundletool_jar(tools_dir),
                    _ => which::which(tool.name()).ok(),
                });
            match &found {
                Some(path) => log::debug!("Found {} at: {}", tool, path.display()),
                None => log::debug!("{} not found", tool),
            }
            paths.set(tool, found);
        }
        paths
    }

    /// Replaces entries with the ones set in `overrides`.
    pub fn with_overrides(mut self, overrides: &ToolPaths) -> Self {
        for tool in [
            Tool::Java,
            Tool::Bundletool,
            Tool::Aapt2,
            Tool::Keytool,
            Tool::Jarsigner,
            Tool::Apksigner,
            Tool::Zipalign,
        ] {
            if let Some(path) = overrides.get(tool) {
                self.set(tool, Some(path.to_path_buf()));
            }
        }
        self
    }

    /// Path of `tool`, if known.
    pub fn get(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::Java => self.java.as_deref(),
            Tool::Bundletool => self.bundletool.as_deref(),
            Tool::Aapt2 => self.aapt2.as_deref(),
            Tool::Keytool => self.keytool.as_deref(),
            Tool::Jarsigner => self.jarsigner.as_deref(),
            Tool::Apksigner => self.apksigner.as_deref(),
            Tool::Zipalign => self.zipalign.as_deref(),
        }
    }

    fn set(&mut self, tool: Tool, path: Option<PathBuf>) {
        let slot = match tool {
            Tool::Java => &mut self.java,
            Tool::Bundletool => &mut self.bundletool,
            Tool::Aapt2 => &mut self.aapt2,
            Tool::Keytool => &mut self.keytool,
            Tool::Jarsigner => &mut self.jarsigner,
            Tool::Apksigner => &mut self.apksigner,
            Tool::Zipalign => &mut self.zipalign,
        };
        *slot = path;
    }

    /// Path of `tool`, or an error naming it.
    pub fn require(&self, tool: Tool) -> Result<&Path> {
        self.get(tool).ok_or_else(|| {
            Error::GenericError(format!(
                "{tool} is not available; place it under the tools directory or on PATH"
            ))
        })
    }

    /// Tools a plan cannot run without.
    ///
    /// `aapt2` for package inspection and `zipalign` for merged splits are
    /// optional and never reported here.
    pub fn missing_for(&self, plan: &Plan, signing: SigningPreference) -> Vec<Tool> {
        let mut needed = Vec::new();
        for step in &plan.steps {
            match step {
                Step::ConvertToProto => needed.push(Tool::Aapt2),
                Step::BuildBundle | Step::BuildApks(_) => {
                    needed.extend([Tool::Java, Tool::Bundletool]);
                }
                Step::ResolveSigning if signing == SigningPreference::AutoGenerate => {
                    needed.push(Tool::Keytool);
                }
                Step::SignBundle if signing != SigningPreference::Skip => {
                    needed.push(Tool::Jarsigner);
                }
                Step::SignApk if signing != SigningPreference::Skip => {
                    if self.apksigner.is_none() {
                        needed.push(Tool::Jarsigner);
                    }
                }
                _ => {}
            }
        }

        let mut missing = Vec::new();
        for tool in needed {
            if self.get(tool).is_none() && !missing.contains(&tool) {
                missing.push(tool);
            }
        }
        missing
    }
}

fn android_home() -> Option<PathBuf> {
    ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
        .into_iter()
        .find_map(std::env::var_os)
        .map(PathBuf::from)
}

/// Highest-versioned `build-tools/<version>` directory of an SDK root.
fn latest_build_tools(sdk_root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(sdk_root.join("build-tools")).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .max_by_key(|p| version_key(p))
}

fn version_key(path: &Path) -> Vec<u64> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| {
            n.split(['.', '-'])
                .map(|part| part.parse::<u64>().unwrap_or(0))
                .collect()
        })
        .unwrap_or_default()
}

fn bundled_jdk_bin(tools_dir: &Path) -> Option<PathBuf> {
    let pattern = tools_dir.join("jdk*").join("bin");
    let mut matches: Vec<PathBuf> = glob::glob(pattern.to_str()?)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_dir())
        .collect();
    matches.sort();
    matches.pop()
}

fn find_bundletool_jar(tools_dir: &Path) -> Option<PathBuf> {
    let pattern = tools_dir.join("bundletool*.jar");
    let mut matches: Vec<PathBuf> = glob::glob(pattern.to_str()?)
        .ok()?
        .filter_map(|entry| entry.ok())
        .collect();
    matches.sort();
    matches.pop()
}
