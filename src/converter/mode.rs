//! Mode selection: maps an operation token to an ordered pipeline plan.
//!
//! The command surface accepts numeric codes (`1`, `2 universal`, `3`, `9`, ...)
//! as well as named aliases. Parsing happens before any external process starts,
//! so an unknown token never has side effects.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output sub-mode passed to `bundletool build-apks --mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApksMode {
    /// Split APKs for every device configuration.
    #[default]
    Default,
    /// One universal APK holding every configuration.
    Universal,
    /// APKs for system image preinstallation.
    System,
    /// Compressed system APKs.
    SystemCompressed,
    /// Instant app APKs.
    Instant,
    /// Persistent APKs.
    Persistent,
    /// Archived APKs.
    Archive,
}

impl ApksMode {
    /// Every mode bundletool understands, in menu order.
    pub const ALL: [ApksMode; 7] = [
        ApksMode::Default,
        ApksMode::Universal,
        ApksMode::System,
        ApksMode::SystemCompressed,
        ApksMode::Instant,
        ApksMode::Persistent,
        ApksMode::Archive,
    ];

    /// Name as bundletool spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            ApksMode::Default => "default",
            ApksMode::Universal => "universal",
            ApksMode::System => "system",
            ApksMode::SystemCompressed => "system_compressed",
            ApksMode::Instant => "instant",
            ApksMode::Persistent => "persistent",
            ApksMode::Archive => "archive",
        }
    }

    /// One-line description shown by `modes`.
    pub fn description(self) -> &'static str {
        match self {
            ApksMode::Default => "split APKs for all device configurations (base + ABI/density/language)",
            ApksMode::Universal => "a single APK containing every resource and all code; for testing and sideloading",
            ApksMode::System => "APKs for preinstalling on a system partition",
            ApksMode::SystemCompressed => "compressed system APKs",
            ApksMode::Instant => "instant app APKs that run without installation",
            ApksMode::Persistent => "persistent APKs",
            ApksMode::Archive => "archived APKs that keep a launcher entry after the app is offloaded",
        }
    }

    /// Parses a sub-mode string; `-` and `_` are interchangeable.
    pub fn parse(token: &str) -> Result<Self> {
        let normalized = token.trim().to_ascii_lowercase().replace('-', "_");
        ApksMode::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| Error::InvalidMode {
                token: token.to_string(),
                reason: format!(
                    "unknown build-apks mode; expected one of: {}",
                    ApksMode::ALL.map(|m| m.as_str()).join(", ")
                ),
            })
    }

    /// Output file name for an `.apks` built from `stem` in this mode.
    pub fn output_name(self, stem: &str) -> String {
        match self {
            ApksMode::Default => format!("{stem}.apks"),
            other => format!("{stem}_{}.apks", other.as_str()),
        }
    }
}

impl fmt::Display for ApksMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "apks_mode", rename_all = "snake_case")]
pub enum ConversionMode {
    /// APK → AAB.
    ApkToAab,
    /// AAB → APKS in one sub-mode.
    AabToApks(ApksMode),
    /// APK → AAB → APKS.
    FullPipeline(ApksMode),
    /// AAB → APKS once per bundletool mode.
    AabToApksAllModes,
    /// APKS/XAPK/APKM → APK.
    SplitToApk,
}

/// Kind of artifact a publish step moves into the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `.aab`
    Bundle,
    /// `.apks`
    ApkSet,
    /// `.apk`
    Apk,
}

impl ArtifactKind {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Bundle => "aab",
            ArtifactKind::ApkSet => "apks",
            ArtifactKind::Apk => "apk",
        }
    }
}

/// One step of a per-file pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "arg", rename_all = "snake_case")]
pub enum Step {
    /// `aapt2 dump badging` on the current APK.
    InspectPackage,
    /// Look up or generate the keystore for the current artifact name.
    ResolveSigning,
    /// `aapt2 convert --output-format proto`.
    ConvertToProto,
    /// Lay out the proto APK as a bundle `base` module and zip it.
    AssembleBaseModule,
    /// `bundletool build-bundle`.
    BuildBundle,
    /// `jarsigner` on the built bundle.
    SignBundle,
    /// `bundletool build-apks` in the given mode.
    BuildApks(ApksMode),
    /// Read the split archive and decide between extraction and merge.
    AnalyzeSplitArchive,
    /// Extract the universal APK or merge base and config splits.
    ExtractOrMerge,
    /// `zipalign` on a merged APK.
    Align,
    /// `apksigner` (or `jarsigner`) on a merged APK.
    SignApk,
    /// Move the finished artifact into the output directory.
    Publish(ArtifactKind),
}

impl Step {
    /// Short label used in progress output.
    pub fn label(&self) -> String {
        match self {
            Step::InspectPackage => "inspect package".into(),
            Step::ResolveSigning => "resolve signing".into(),
            Step::ConvertToProto => "convert to proto".into(),
            Step::AssembleBaseModule => "assemble base module".into(),
            Step::BuildBundle => "build bundle".into(),
            Step::SignBundle => "sign bundle".into(),
            Step::BuildApks(mode) => format!("build apks ({mode})"),
            Step::AnalyzeSplitArchive => "analyze split archive".into(),
            Step::ExtractOrMerge => "extract/merge".into(),
            Step::Align => "zipalign".into(),
            Step::SignApk => "sign apk".into(),
            Step::Publish(kind) => format!("publish .{}", kind.extension()),
        }
    }
}

/// Ordered pipeline for one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Mode the plan was built for.
    pub mode: ConversionMode,
    /// Steps to run for each input, in order.
    pub steps: Vec<Step>,
    /// Extension of the final artifact.
    pub output_extension: &'static str,
}

impl Plan {
    /// Whether any step needs signing material.
    pub fn signs(&self) -> bool {
        self.steps.contains(&Step::ResolveSigning)
    }
}

const APK_TO_AAB_STEPS: [Step; 7] = [
    Step::InspectPackage,
    Step::ResolveSigning,
    Step::ConvertToProto,
    Step::AssembleBaseModule,
    Step::BuildBundle,
    Step::SignBundle,
    Step::Publish(ArtifactKind::Bundle),
];

impl ConversionMode {
    /// Parses a mode code and optional sub-mode argument.
    ///
    /// ```
    /// use aab_converter::converter::{ApksMode, ConversionMode};
    ///
    /// let mode = ConversionMode::parse("2", Some("universal")).unwrap();
    /// assert_eq!(mode, ConversionMode::AabToApks(ApksMode::Universal));
    /// assert!(ConversionMode::parse("42", None).is_err());
    /// ```
    pub fn parse(token: &str, sub_mode: Option<&str>) -> Result<Self> {
        let sub = sub_mode.map(ApksMode::parse).transpose()?;
        let normalized = token.trim().to_ascii_lowercase();

        let fixed = |mode: ConversionMode| -> Result<ConversionMode> {
            match sub_mode {
                Some(extra) => Err(Error::InvalidMode {
                    token: format!("{token} {extra}"),
                    reason: "this mode takes no sub-mode".into(),
                }),
                None => Ok(mode),
            }
        };

        match normalized.as_str() {
            "1" | "apk2aab" | "apk-to-aab" => fixed(ConversionMode::ApkToAab),
            "2" | "aab2apks" | "aab-to-apks" => {
                Ok(ConversionMode::AabToApks(sub.unwrap_or_default()))
            }
            "3" | "all" | "full" => Ok(ConversionMode::FullPipeline(sub.unwrap_or_default())),
            "4" => fixed(ConversionMode::AabToApks(ApksMode::Default)),
            "5" => fixed(ConversionMode::AabToApks(ApksMode::Universal)),
            "6" => fixed(ConversionMode::AabToApks(ApksMode::System)),
            "7" => fixed(ConversionMode::AabToApks(ApksMode::Instant)),
            "8" | "all-modes" => fixed(ConversionMode::AabToApksAllModes),
            "9" | "split2apk" | "split-to-apk" | "xapk2apk" | "apks2apk" => {
                fixed(ConversionMode::SplitToApk)
            }
            _ => Err(Error::InvalidMode {
                token: token.to_string(),
                reason: "expected 1-9 or one of apk2aab, aab2apks, all, all-modes, split2apk"
                    .into(),
            }),
        }
    }

    /// Builds the ordered step list for this mode.
    pub fn plan(self) -> Plan {
        let (steps, output_extension) = match self {
            ConversionMode::ApkToAab => (APK_TO_AAB_STEPS.to_vec(), "aab"),
            ConversionMode::AabToApks(mode) => (
                vec![
                    Step::ResolveSigning,
                    Step::BuildApks(mode),
                    Step::Publish(ArtifactKind::ApkSet),
                ],
                "apks",
            ),
            ConversionMode::FullPipeline(mode) => {
                let mut steps = APK_TO_AAB_STEPS.to_vec();
                steps.push(Step::BuildApks(mode));
                steps.push(Step::Publish(ArtifactKind::ApkSet));
                (steps, "apks")
            }
            ConversionMode::AabToApksAllModes => {
                let mut steps = vec![Step::ResolveSigning];
                for mode in ApksMode::ALL {
                    steps.push(Step::BuildApks(mode));
                    steps.push(Step::Publish(ArtifactKind::ApkSet));
                }
                (steps, "apks")
            }
            ConversionMode::SplitToApk => (
                vec![
                    Step::AnalyzeSplitArchive,
                    Step::ResolveSigning,
                    Step::ExtractOrMerge,
                    Step::Align,
                    Step::SignApk,
                    Step::InspectPackage,
                    Step::Publish(ArtifactKind::Apk),
                ],
                "apk",
            ),
        };

        Plan {
            mode: self,
            steps,
            output_extension,
        }
    }

    /// Input extensions (lowercase, no dot) this mode accepts.
    pub fn input_extensions(self) -> &'static [&'static str] {
        match self {
            ConversionMode::ApkToAab | ConversionMode::FullPipeline(_) => &["apk"],
            ConversionMode::AabToApks(_) | ConversionMode::AabToApksAllModes => &["aab"],
            ConversionMode::SplitToApk => &["apks", "xapk", "apkm"],
        }
    }

    /// Human-readable name for headers and logs.
    pub fn title(self) -> String {
        match self {
            ConversionMode::ApkToAab => "APK -> AAB".into(),
            ConversionMode::AabToApks(mode) => format!("AAB -> APKS ({mode})"),
            ConversionMode::FullPipeline(mode) => format!("APK -> AAB -> APKS ({mode})"),
            ConversionMode::AabToApksAllModes => "AAB -> APKS (all modes)".into(),
            ConversionMode::SplitToApk => "APKS/XAPK/APKM -> APK".into(),
        }
    }
}
