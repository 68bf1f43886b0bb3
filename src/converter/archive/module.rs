//! Bundle `base` module assembly from a proto-format APK.
//!
//! Entries are mapped straight from the proto APK into the module zip:
//!
//! ```text
//! AndroidManifest.xml   -> manifest/AndroidManifest.xml
//! classes*.dex          -> dex/
//! res/ lib/ assets/     -> res/ lib/ assets/
//! resources.pb          -> resources.pb
//! META-INF/             -> dropped
//! anything else         -> root/ (reserved top-level names become `_name_`)
//! ```

use super::{deflated, file_names, open};
use crate::converter::error::{Error, ErrorExt, Result};
use std::{
    collections::BTreeMap,
    fs::File,
    io,
    path::Path,
};

/// Top-level names bundletool reserves inside a module; they cannot appear under `root/` as-is.
const RESERVED: [&str; 8] = [
    "resources.arsc",
    "resources.pb",
    "manifest",
    "dex",
    "res",
    "lib",
    "assets",
    "root",
];

/// What went into a base module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSummary {
    /// File entries written.
    pub entries: usize,
    /// Dex files placed under `dex/`.
    pub dex_files: usize,
    /// `(original, renamed)` top-level names moved under `root/` with a new name.
    pub renamed: Vec<(String, String)>,
}

/// Module path for a proto APK entry, or `None` when the entry is dropped.
fn module_path(name: &str, renamed: &mut Vec<(String, String)>) -> Option<String> {
    let (top, rest) = match name.split_once('/') {
        Some((top, rest)) => (top, Some(rest)),
        None => (name, None),
    };

    match (top, rest) {
        ("META-INF", _) => None,
        ("AndroidManifest.xml", None) => Some("manifest/AndroidManifest.xml".into()),
        ("resources.pb", None) => Some("resources.pb".into()),
        (dex, None) if dex.ends_with(".dex") => Some(format!("dex/{dex}")),
        ("res" | "lib" | "assets", Some(_)) => Some(name.to_string()),
        (top, rest) => {
            let lowered = top.to_ascii_lowercase();
            let top = if RESERVED.contains(&lowered.as_str()) {
                let new_name = format!("_{top}_");
                if !renamed.iter().any(|(old, _)| old == top) {
                    renamed.push((top.to_string(), new_name.clone()));
                }
                new_name
            } else {
                top.to_string()
            };
            Some(match rest {
                Some(rest) => format!("root/{top}/{rest}"),
                None => format!("root/{top}"),
            })
        }
    }
}

/// Writes the `base` module zip for `proto_apk` to `modules_zip`.
///
/// # Errors
///
/// [`Error::InvalidArchive`] if the proto APK cannot be read or has no
/// `AndroidManifest.xml`.
pub fn assemble_base_module(proto_apk: &Path, modules_zip: &Path) -> Result<ModuleSummary> {
    let mut archive = open(proto_apk)?;
    let names = file_names(&archive);

    if !names.iter().any(|n| n == "AndroidManifest.xml") {
        return Err(Error::InvalidArchive {
            path: proto_apk.to_path_buf(),
            reason: "no AndroidManifest.xml in converted APK".into(),
        });
    }

    let mut summary = ModuleSummary::default();
    // Sorted by destination so the module zip is reproducible.
    let mut layout = BTreeMap::new();
    for name in &names {
        if let Some(dest) = module_path(name, &mut summary.renamed) {
            layout.entry(dest).or_insert_with(|| name.clone());
        }
    }

    let file = File::create(modules_zip).fs_context("creating module zip", modules_zip)?;
    let mut writer = zip::ZipWriter::new(file);
    for (dest, source) in &layout {
        let mut entry = archive.by_name(source)?;
        writer.start_file(dest.as_str(), deflated())?;
        io::copy(&mut entry, &mut writer).fs_context("writing module entry", modules_zip)?;
        if dest.starts_with("dex/") {
            summary.dex_files += 1;
        }
        summary.entries += 1;
    }
    writer.finish()?;

    for (old, new) in &summary.renamed {
        log::warn!("Renamed reserved name {} -> {} under root/", old, new);
    }
    log::debug!(
        "Base module: {} entries, {} dex files",
        summary.entries,
        summary.dex_files
    );
    Ok(summary)
}
