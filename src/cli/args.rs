//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

/// Batch converter for Android package formats
#[derive(Parser, Debug)]
#[command(
    name = "aab_converter",
    version,
    about = "Batch converter for Android package formats (APK, AAB, APKS, XAPK, APKM)",
    long_about = "Converts Android packages with bundletool and the Android/JDK build tools.

Modes:
  1 | apk2aab              APK -> AAB
  2 [SUB] | aab2apks       AAB -> APKS (sub-mode defaults to `default`)
  3 [SUB] | all | full     APK -> AAB -> APKS
  4 5 6 7                  AAB -> APKS as default, universal, system, instant
  8 | all-modes            AAB -> APKS in every build-apks mode
  9 | split2apk            APKS/XAPK/APKM -> APK
  modes, help-modes        describe every build-apks sub-mode

Inputs default to apk/, aab/ or split_apk/ under the base directory; outputs
go to aab/, apks/ or apk2/. Keystores are matched by file name in keystore/.

Usage:
  aab_converter 1
  aab_converter 2 universal --input app.aab
  aab_converter 9 --input downloads/ --output-dir out/ --jobs 4

Exit codes: 0 success (or nothing to do), 1 every file failed or bad
arguments, 2 some files failed, 130 cancelled."
)]
pub struct Args {
    /// Mode code or alias, or `modes`/`help-modes` to list build-apks sub-modes
    #[arg(value_name = "MODE")]
    pub mode: String,

    /// build-apks sub-mode for modes 2 and 3
    #[arg(value_name = "SUB_MODE")]
    pub sub_mode: Option<String>,

    /// Base directory holding apk/, aab/, apks/, split_apk/, apk2/, keystore/ and tools/
    #[arg(
        short = 'b',
        long,
        value_name = "DIR",
        env = "AAB_CONVERTER_BASE_DIR",
        default_value = "."
    )]
    pub base_dir: PathBuf,

    /// Input file or directory (defaults to the mode's input directory)
    #[arg(short = 'i', long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output directory (defaults to the mode's output directory)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Keystore directory (defaults to <base>/keystore)
    #[arg(long, value_name = "DIR")]
    pub keystore_dir: Option<PathBuf>,

    /// Tools directory (defaults to <base>/tools)
    #[arg(long, value_name = "DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Settings file (defaults to <base>/converter.toml when present)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Files converted concurrently (defaults to the CPU count)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Timeout for each external tool invocation
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Replace existing outputs instead of picking a new name
    #[arg(long, conflicts_with = "fail_on_collision")]
    pub overwrite: bool,

    /// Fail a file whose output already exists
    #[arg(long)]
    pub fail_on_collision: bool,

    /// Do not sign outputs
    #[arg(long, conflicts_with = "matched_keystore_only")]
    pub no_sign: bool,

    /// Only sign with an existing matched keystore; never generate one
    #[arg(long)]
    pub matched_keystore_only: bool,

    /// Validity of generated keystores, in days
    #[arg(long, value_name = "DAYS")]
    pub key_validity_days: Option<u32>,

    /// Device spec JSON passed to build-apks
    #[arg(long, value_name = "FILE")]
    pub device_spec: Option<PathBuf>,

    /// Pass --local-testing to build-apks
    #[arg(long)]
    pub local_testing: bool,

    /// Write the batch result as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Show per-step progress and tool details
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether the mode token asks for the sub-mode listing.
    pub fn lists_modes(&self) -> bool {
        ["modes", "help-modes"]
            .iter()
            .any(|token| self.mode.eq_ignore_ascii_case(token))
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.lists_modes() && self.sub_mode.is_some() {
            return Err("`modes` takes no sub-mode".to_string());
        }
        if self.jobs == Some(0) {
            return Err("--jobs must be at least 1".to_string());
        }
        if self.timeout == Some(0) {
            return Err("--timeout must be at least 1 second".to_string());
        }
        if let Some(spec) = self.device_spec.as_ref().filter(|spec| !spec.is_file()) {
            return Err(format!("device spec not found: {}", spec.display()));
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_and_sub_mode() {
        let args = Args::try_parse_from([
            "aab_converter",
            "2",
            "universal",
            "--input",
            "app.aab",
            "--jobs",
            "3",
            "--overwrite",
        ])
        .unwrap();
        assert_eq!(args.mode, "2");
        assert_eq!(args.sub_mode.as_deref(), Some("universal"));
        assert_eq!(args.jobs, Some(3));
        assert!(args.overwrite);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn conflicting_collision_flags_are_rejected() {
        assert!(
            Args::try_parse_from(["aab_converter", "1", "--overwrite", "--fail-on-collision"])
                .is_err()
        );
    }

    #[test]
    fn zero_jobs_fail_validation() {
        let args = Args::try_parse_from(["aab_converter", "1", "--jobs", "0"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn modes_listing_takes_no_sub_mode() {
        let args = Args::try_parse_from(["aab_converter", "modes", "universal"]).unwrap();
        assert!(args.lists_modes());
        assert!(args.validate().is_err());
    }

    #[test]
    fn help_modes_is_an_alias() {
        let args = Args::try_parse_from(["aab_converter", "HELP-MODES"]).unwrap();
        assert!(args.lists_modes());
        assert!(args.validate().is_ok());
    }
}
