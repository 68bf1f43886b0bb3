//! Android package format converter.
//!
//! Converts between APK, AAB and APK set formats by driving bundletool and the
//! Android/JDK command line tools:
//! - APK to AAB (proto conversion, base module assembly, build-bundle, signing)
//! - AAB to APKS in any bundletool build-apks mode
//! - APKS/XAPK/APKM split archives back to a single APK
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod converter;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, ConverterError, Result};
