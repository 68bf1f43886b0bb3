//! Scripted stand-in for the Android and JDK tools.
//!
//! Each tool is imitated at the zip level so whole pipelines run without an
//! SDK: aapt2 "converts" by copying, bundletool wraps module entries under
//! `base/`, build-apks emits APKs carrying the bundle's manifest, and
//! `aapt2 dump badging` prints the manifest text, which fixtures write in
//! badging format.

#![allow(dead_code)]

use aab_converter::converter::{
    Error, ExternalTool, Invocation, Result, Tool, ToolOutput, ToolPaths, Workspace,
};
use async_trait::async_trait;
use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// Manifest text for a fixture APK.
pub fn badging(package: &str, version_code: u32) -> String {
    format!("package: name='{package}' versionCode='{version_code}' versionName='1.0'")
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, zip_bytes(entries)).unwrap();
}

/// Reads one entry of a zip file.
pub fn read_entry(path: &Path, name: &str) -> Option<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).ok()?).ok()?;
    let mut entry = archive.by_name(name).ok()?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data).ok()?;
    Some(data)
}

fn read_entry_from_bytes(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).ok()?;
    let mut entry = archive.by_name(name).ok()?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data).ok()?;
    Some(data)
}

fn all_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        if entry.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        out.push((entry.name().to_string(), data));
    }
    out
}

/// Writes an APK fixture for `package`.
pub fn write_apk(path: &Path, package: &str, version_code: u32) {
    let manifest = badging(package, version_code);
    write_zip(
        path,
        &[
            ("AndroidManifest.xml", manifest.as_bytes()),
            ("classes.dex", b"dex".as_slice()),
            ("resources.arsc", b"table".as_slice()),
            ("res/layout/main.xml", b"layout".as_slice()),
            ("META-INF/CERT.RSA", b"sig".as_slice()),
        ],
    );
}

/// Tool paths with every tool "present"; the fake never spawns them.
pub fn all_tools() -> ToolPaths {
    ToolPaths {
        java: Some("java".into()),
        bundletool: Some("bundletool.jar".into()),
        aapt2: Some("aapt2".into()),
        keytool: Some("keytool".into()),
        jarsigner: Some("jarsigner".into()),
        apksigner: Some("apksigner".into()),
        zipalign: Some("zipalign".into()),
    }
}

/// Workspace in a temporary directory with its layout created.
pub async fn workspace(dir: &Path) -> Workspace {
    let ws = Workspace::new(dir).with_scratch_dir(dir.join("scratch"));
    ws.ensure_layout().await.unwrap();
    ws
}

/// Fake tool runner recording every invocation.
#[derive(Default)]
pub struct FakeTools {
    /// Every invocation, in call order.
    pub calls: Mutex<Vec<Invocation>>,
    /// `(tool, needle)`: fail when the tool's arguments mention the needle.
    pub failures: Mutex<Vec<(Tool, String)>>,
    /// Time each invocation takes; cancellation interrupts it.
    pub delay: Mutex<Duration>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(&self, tool: Tool, needle: &str) {
        self.failures.lock().unwrap().push((tool, needle.to_string()));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn count(&self, tool: Tool) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tool == tool)
            .count()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.label.clone())
            .collect()
    }

    fn behave(&self, inv: &Invocation) -> std::result::Result<String, String> {
        match (inv.tool, inv.label.as_str()) {
            (Tool::Aapt2, "aapt2 convert") => copy(&inv.inputs[0], &inv.outputs[0]),
            (Tool::Aapt2, "aapt2 dump badging") => {
                let manifest = read_entry(&inv.inputs[0], "AndroidManifest.xml")
                    .ok_or("ERROR: no AndroidManifest.xml")?;
                Ok(String::from_utf8_lossy(&manifest).into_owned())
            }
            (Tool::Bundletool, "bundletool build-bundle") => {
                let modules = PathBuf::from(inv.flag_value("--modules").ok_or("no --modules")?);
                let output = PathBuf::from(inv.flag_value("--output").ok_or("no --output")?);
                let entries: Vec<(String, Vec<u8>)> = all_entries(&modules)
                    .into_iter()
                    .map(|(name, data)| (format!("base/{name}"), data))
                    .collect();
                let refs: Vec<(&str, &[u8])> = entries
                    .iter()
                    .map(|(n, d)| (n.as_str(), d.as_slice()))
                    .collect();
                write_zip(&output, &refs);
                Ok(String::new())
            }
            (Tool::Bundletool, "bundletool build-apks") => {
                let bundle = PathBuf::from(inv.flag_value("--bundle").ok_or("no --bundle")?);
                let output = PathBuf::from(inv.flag_value("--output").ok_or("no --output")?);
                let manifest = read_entry(&bundle, "base/manifest/AndroidManifest.xml")
                    .ok_or("bundle has no base manifest")?;
                let apk = zip_bytes(&[
                    ("AndroidManifest.xml", manifest.as_slice()),
                    ("classes.dex", b"dex".as_slice()),
                ]);
                let split = zip_bytes(&[("res/values-en/strings.xml", b"en".as_slice())]);
                match inv.flag_value("--mode") {
                    Some("universal") => write_zip(
                        &output,
                        &[("toc.pb", b"toc".as_slice()), ("universal.apk", apk.as_slice())],
                    ),
                    _ => write_zip(
                        &output,
                        &[
                            ("toc.pb", b"toc".as_slice()),
                            ("splits/base-master.apk", apk.as_slice()),
                            ("splits/base-en.apk", split.as_slice()),
                        ],
                    ),
                }
                Ok(String::new())
            }
            (Tool::Keytool, _) => {
                std::fs::write(&inv.outputs[0], b"fake keystore").map_err(|e| e.to_string())?;
                Ok(String::new())
            }
            (Tool::Jarsigner, _) => Ok("jar signed.".into()),
            (Tool::Apksigner | Tool::Zipalign, _) => copy(&inv.inputs[0], &inv.outputs[0]),
            (tool, label) => Err(format!("unexpected {tool} call: {label}")),
        }
    }
}

fn copy(from: &Path, to: &Path) -> std::result::Result<String, String> {
    std::fs::copy(from, to)
        .map(|_| String::new())
        .map_err(|e| format!("{}: {e}", from.display()))
}

/// Manifest text stored in the single-APK output of a bundle built from an APK set.
pub fn manifest_of(apk_or_set: &Path, entry: Option<&str>) -> String {
    let data = match entry {
        Some(inner) => {
            let apk = read_entry(apk_or_set, inner).unwrap();
            read_entry_from_bytes(&apk, "AndroidManifest.xml").unwrap()
        }
        None => read_entry(apk_or_set, "AndroidManifest.xml").unwrap(),
    };
    String::from_utf8(data).unwrap()
}

#[async_trait]
impl ExternalTool for FakeTools {
    async fn invoke(
        &self,
        invocation: &Invocation,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let should_fail = self.failures.lock().unwrap().iter().any(|(tool, needle)| {
            *tool == invocation.tool && invocation.args.iter().any(|a| a.contains(needle.as_str()))
        });
        if should_fail {
            return Err(Error::ExternalToolFailure {
                tool: invocation.label.clone(),
                reason: "exit code 1".into(),
                diagnostics: "scripted failure".into(),
            });
        }

        match self.behave(invocation) {
            Ok(stdout) => Ok(ToolOutput {
                stdout,
                stderr: String::new(),
            }),
            Err(stderr) => Err(Error::ExternalToolFailure {
                tool: invocation.label.clone(),
                reason: "exit code 1".into(),
                diagnostics: stderr,
            }),
        }
    }
}
