//! Zip-level work on APK, AAB and split archives.
//!
//! - [`module`] - lays a proto APK out as a bundle `base` module
//! - [`split`] - inspects APKS/XAPK/APKM archives, extracts or merges their APKs
//!
//! Everything here is synchronous; callers run it through
//! [`blocking`](crate::converter::utils::fs::blocking).

pub mod module;
pub mod split;

use crate::converter::error::{Error, ErrorExt, Result};
use std::{fs::File, io::BufReader, path::Path};
use zip::{CompressionMethod, ZipArchive, write::SimpleFileOptions};

pub use module::{ModuleSummary, assemble_base_module};
pub use split::{SplitAnalysis, SplitStrategy, analyze_split_archive, extract_entry, merge_splits};

/// Opens a zip archive, mapping a corrupt file to [`Error::InvalidArchive`].
pub(crate) fn open(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path).fs_context("opening archive", path)?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| Error::InvalidArchive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Options for entries written by the converter.
pub(crate) fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Options for an entry of an installable APK.
///
/// `resources.arsc` and native libraries must be stored uncompressed: the
/// package manager maps them directly and rejects compressed ones for apps
/// targeting API 30+.
pub(crate) fn apk_entry_options(name: &str) -> SimpleFileOptions {
    let mapped = name == "resources.arsc" || (name.starts_with("lib/") && name.ends_with(".so"));
    if mapped {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        deflated()
    }
}

/// Names of every file entry (directories excluded), in archive order.
pub(crate) fn file_names<R: std::io::Read + std::io::Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .filter_map(|i| archive.name_for_index(i))
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect()
}
