//! Split archive (APKS, XAPK, APKM) inspection, extraction and merging.

use super::{apk_entry_options, file_names, open};
use crate::converter::{
    error::{Error, ErrorExt, Result},
    package::{PackageInfo, parse_archive_manifest},
};
use std::{
    collections::HashSet,
    fs::File,
    io::{self, Read},
    path::Path,
};

/// How an archive's APKs are turned into a single APK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Copy one entry out unchanged.
    Extract {
        /// Archive entry holding the APK.
        entry: String,
    },
    /// Merge the base APK with its config splits, then align and sign.
    Merge {
        /// Base APK entry.
        base: String,
        /// Split APK entries, in archive order.
        splits: Vec<String>,
    },
}

impl SplitStrategy {
    /// Whether the result is a freshly built APK that needs aligning and signing.
    pub fn is_merge(&self) -> bool {
        matches!(self, SplitStrategy::Merge { .. })
    }
}

/// What a split archive contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitAnalysis {
    /// Archive format, the lowercase extension (`apks`, `xapk`, `apkm`).
    pub format: String,
    /// Every APK entry, in archive order.
    pub apks: Vec<String>,
    /// Universal, standalone or base APK entry.
    pub base: Option<String>,
    /// Config and feature split entries.
    pub splits: Vec<String>,
    /// Whether `base` is a universal/standalone APK.
    pub has_universal: bool,
    /// Identity from `manifest.json` / `info.json`, if present.
    pub package: Option<PackageInfo>,
    /// OBB expansion files; they are not part of the output.
    pub obb_files: Vec<String>,
    /// Name of the manifest entry, if present.
    pub manifest_entry: Option<String>,
}

impl SplitAnalysis {
    /// Classifies archive entry names.
    pub fn from_entries<S: AsRef<str>>(format: &str, names: &[S]) -> Self {
        let mut analysis = SplitAnalysis {
            format: format.to_string(),
            ..Default::default()
        };

        for name in names.iter().map(AsRef::as_ref) {
            let lower = name.to_ascii_lowercase();

            if lower.ends_with(".apk") {
                analysis.apks.push(name.to_string());

                if lower.contains("universal") || lower.contains("standalone") {
                    analysis.has_universal = true;
                    analysis.base = Some(name.to_string());
                } else if (lower.contains("base") && lower.contains("master"))
                    || lower.ends_with("base.apk")
                {
                    if analysis.base.is_none() {
                        analysis.base = Some(name.to_string());
                    }
                } else if lower.contains("config.")
                    || lower.contains("split_config")
                    || lower.contains("split_")
                {
                    analysis.splits.push(name.to_string());
                }
            }

            if lower == "manifest.json" || lower == "info.json" {
                analysis.manifest_entry = Some(name.to_string());
            }
            if lower.ends_with(".obb") {
                analysis.obb_files.push(name.to_string());
            }
        }

        if analysis.base.is_none() {
            analysis.base = analysis
                .apks
                .iter()
                .find(|apk| {
                    let lower = apk.to_ascii_lowercase();
                    !lower.contains("config") && !lower.contains("split_")
                })
                .or_else(|| analysis.apks.first())
                .cloned();
        }

        analysis
    }

    /// Picks extraction or merging.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArchive`] when the archive holds no APK.
    pub fn strategy(&self, archive: &Path) -> Result<SplitStrategy> {
        if let [only] = self.apks.as_slice() {
            return Ok(SplitStrategy::Extract {
                entry: only.clone(),
            });
        }

        let Some(base) = &self.base else {
            return Err(Error::InvalidArchive {
                path: archive.to_path_buf(),
                reason: "no APK found inside".into(),
            });
        };

        let splits: Vec<String> = self
            .splits
            .iter()
            .filter(|s| *s != base)
            .cloned()
            .collect();

        if self.has_universal || splits.is_empty() {
            Ok(SplitStrategy::Extract {
                entry: base.clone(),
            })
        } else {
            Ok(SplitStrategy::Merge {
                base: base.clone(),
                splits,
            })
        }
    }
}

/// Reads the entry list (and manifest, if any) of a split archive.
pub fn analyze_split_archive(path: &Path) -> Result<SplitAnalysis> {
    let format = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let mut archive = open(path)?;
    let names = file_names(&archive);
    let mut analysis = SplitAnalysis::from_entries(&format, &names);

    if let Some(manifest) = analysis.manifest_entry.clone() {
        let mut raw = String::new();
        let parsed = archive
            .by_name(&manifest)
            .ok()
            .and_then(|mut entry| entry.read_to_string(&mut raw).ok())
            .and_then(|_| parse_archive_manifest(&raw));
        if parsed.is_none() {
            log::warn!("Ignoring unreadable {} in {}", manifest, path.display());
        }
        analysis.package = parsed;
    }

    Ok(analysis)
}

/// Copies archive entry `entry` to `dest`, returning the byte count.
pub fn extract_entry(archive_path: &Path, entry: &str, dest: &Path) -> Result<u64> {
    let mut archive = open(archive_path)?;
    let mut source = archive.by_name(entry).map_err(|e| Error::InvalidArchive {
        path: archive_path.to_path_buf(),
        reason: format!("{entry}: {e}"),
    })?;
    let mut out = File::create(dest).fs_context("creating APK", dest)?;
    io::copy(&mut source, &mut out).fs_context("extracting APK", dest)
}

/// Result of merging split APKs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// APKs that contributed entries.
    pub merged_apks: usize,
    /// APKs that could not be read and were skipped.
    pub skipped_apks: Vec<String>,
    /// Entries in the merged APK.
    pub entries: usize,
    /// `(apk, entry, new name)` for dex files renumbered to avoid clashes.
    pub renumbered_dex: Vec<(String, String, String)>,
}

/// Merges `base` and `splits` from `archive_path` into one unsigned APK at `dest`.
///
/// Signature files under `META-INF/` are dropped. When a later APK carries a
/// dex file whose name is taken, it becomes the next free `classesN.dex`;
/// any other clashing entry keeps the earlier (base) version. Inner APKs are
/// staged in `work_dir`.
///
/// # Errors
///
/// [`Error::InvalidArchive`] if the base APK is unreadable. Unreadable
/// splits are skipped with a warning.
pub fn merge_splits(
    archive_path: &Path,
    base: &str,
    splits: &[String],
    work_dir: &Path,
    dest: &Path,
) -> Result<MergeSummary> {
    let mut outer = open(archive_path)?;
    let mut summary = MergeSummary::default();
    let mut inner = Vec::new();

    for (index, name) in std::iter::once(base).chain(splits.iter().map(String::as_str)).enumerate() {
        let staged = work_dir.join(format!("inner-{index}.apk"));
        {
            let mut entry = outer.by_name(name).map_err(|e| Error::InvalidArchive {
                path: archive_path.to_path_buf(),
                reason: format!("{name}: {e}"),
            })?;
            let mut out = File::create(&staged).fs_context("staging split APK", &staged)?;
            io::copy(&mut entry, &mut out).fs_context("staging split APK", &staged)?;
        }

        match open(&staged) {
            Ok(apk) => inner.push((name.to_string(), apk)),
            Err(e) if index == 0 => {
                return Err(Error::InvalidArchive {
                    path: archive_path.to_path_buf(),
                    reason: format!("base APK {name} is unreadable: {e}"),
                });
            }
            Err(e) => {
                log::warn!("Skipping unreadable split {}: {}", name, e);
                summary.skipped_apks.push(name.to_string());
            }
        }
    }

    // (destination, apk index, source entry), first writer wins
    let mut plan: Vec<(String, usize, String)> = Vec::new();
    let mut taken = HashSet::new();
    for (index, (apk_name, apk)) in inner.iter().enumerate() {
        for entry in file_names(apk) {
            if entry.starts_with("META-INF/") {
                continue;
            }
            let dest_name = if !taken.contains(&entry) {
                entry.clone()
            } else if entry.ends_with(".dex") {
                let free = (2..)
                    .map(|n| format!("classes{n}.dex"))
                    .find(|candidate| !taken.contains(candidate))
                    .unwrap_or_default();
                summary
                    .renumbered_dex
                    .push((apk_name.clone(), entry.clone(), free.clone()));
                free
            } else {
                continue;
            };
            taken.insert(dest_name.clone());
            plan.push((dest_name, index, entry));
        }
    }

    let file = File::create(dest).fs_context("creating merged APK", dest)?;
    let mut writer = zip::ZipWriter::new(file);
    for (dest_name, index, source) in &plan {
        let mut entry = inner[*index].1.by_name(source)?;
        writer.start_file(dest_name.as_str(), apk_entry_options(dest_name))?;
        io::copy(&mut entry, &mut writer).fs_context("writing merged APK", dest)?;
    }
    writer.finish()?;

    summary.merged_apks = inner.len();
    summary.entries = plan.len();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::archive::test_support::{read_zip, write_zip, zip_bytes};

    #[test]
    fn apkm_layout() {
        let a = SplitAnalysis::from_entries(
            "apkm",
            &[
                "info.json",
                "base.apk",
                "split_config.arm64_v8a.apk",
                "split_config.xxhdpi.apk",
                "icon.png",
            ],
        );
        assert_eq!(a.base.as_deref(), Some("base.apk"));
        assert_eq!(a.splits.len(), 2);
        assert_eq!(a.manifest_entry.as_deref(), Some("info.json"));
        assert!(!a.has_universal);
        assert!(a.strategy(Path::new("x.apkm")).unwrap().is_merge());
    }

    #[test]
    fn universal_apk_wins() {
        let a = SplitAnalysis::from_entries(
            "apks",
            &["splits/base-master.apk", "universal.apk", "toc.pb"],
        );
        assert!(a.has_universal);
        assert_eq!(
            a.strategy(Path::new("x.apks")).unwrap(),
            SplitStrategy::Extract {
                entry: "universal.apk".into()
            }
        );
    }

    #[test]
    fn xapk_with_obb_and_package_named_base() {
        let a = SplitAnalysis::from_entries(
            "xapk",
            &[
                "manifest.json",
                "com.example.game.apk",
                "config.en.apk",
                "Android/obb/com.example.game/main.1.com.example.game.obb",
            ],
        );
        assert_eq!(a.base.as_deref(), Some("com.example.game.apk"));
        assert_eq!(a.splits, vec!["config.en.apk".to_string()]);
        assert_eq!(a.obb_files.len(), 1);
    }

    #[test]
    fn single_apk_is_extracted() {
        let a = SplitAnalysis::from_entries("xapk", &["split_config.en.apk"]);
        assert_eq!(
            a.strategy(Path::new("x.xapk")).unwrap(),
            SplitStrategy::Extract {
                entry: "split_config.en.apk".into()
            }
        );
    }

    #[test]
    fn empty_archive_is_invalid() {
        let a = SplitAnalysis::from_entries("apks", &["toc.pb"]);
        let err = a.strategy(Path::new("x.apks")).unwrap_err();
        assert!(matches!(err, Error::InvalidArchive { .. }));
    }

    #[test]
    fn merge_keeps_base_entries_and_renumbers_dex() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bundle.apkm");
        let base = zip_bytes(&[
            ("AndroidManifest.xml", b"base manifest"),
            ("classes.dex", b"base dex"),
            ("resources.arsc", b"base table"),
            ("META-INF/CERT.RSA", b"sig"),
        ]);
        let split = zip_bytes(&[
            ("AndroidManifest.xml", b"split manifest"),
            ("classes.dex", b"split dex"),
            ("lib/arm64-v8a/libx.so", b"so"),
            ("META-INF/CERT.SF", b"sig"),
        ]);
        write_zip(
            &archive,
            &[
                ("info.json", br#"{"pname":"com.example.app"}"#.as_slice()),
                ("base.apk", base.as_slice()),
                ("split_config.arm64_v8a.apk", split.as_slice()),
                ("split_config.broken.apk", b"not a zip".as_slice()),
            ],
        );

        let analysis = analyze_split_archive(&archive).unwrap();
        assert_eq!(
            analysis.package.as_ref().and_then(|p| p.package_name.as_deref()),
            Some("com.example.app")
        );
        let SplitStrategy::Merge { base, splits } = analysis.strategy(&archive).unwrap() else {
            panic!("expected merge");
        };

        let out = tmp.path().join("merged.apk");
        let summary = merge_splits(&archive, &base, &splits, tmp.path(), &out).unwrap();

        assert_eq!(summary.merged_apks, 2);
        assert_eq!(summary.skipped_apks, vec!["split_config.broken.apk".to_string()]);
        assert_eq!(summary.renumbered_dex.len(), 1);

        let entries = read_zip(&out);
        assert_eq!(
            entries,
            vec![
                ("AndroidManifest.xml".to_string(), b"base manifest".to_vec()),
                ("classes.dex".to_string(), b"base dex".to_vec()),
                ("classes2.dex".to_string(), b"split dex".to_vec()),
                ("lib/arm64-v8a/libx.so".to_string(), b"so".to_vec()),
                ("resources.arsc".to_string(), b"base table".to_vec()),
            ]
        );

        let mut merged = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        for (name, method) in [
            ("resources.arsc", zip::CompressionMethod::Stored),
            ("lib/arm64-v8a/libx.so", zip::CompressionMethod::Stored),
            ("classes2.dex", zip::CompressionMethod::Deflated),
        ] {
            assert_eq!(merged.by_name(name).unwrap().compression(), method, "{name}");
        }
    }

    #[test]
    fn extract_copies_entry_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("app.apks");
        write_zip(&archive, &[("universal.apk", b"apk bytes")]);
        let dest = tmp.path().join("app.apk");
        assert_eq!(extract_entry(&archive, "universal.apk", &dest).unwrap(), 9);
        assert_eq!(std::fs::read(dest).unwrap(), b"apk bytes");
    }
}
