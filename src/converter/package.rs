//! Package identity: name, version code and version name.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PACKAGE_NAME: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"package: name='([^']+)'").expect("valid regex"));
static VERSION_CODE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"versionCode='(\d+)'").expect("valid regex"));
static VERSION_NAME: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"versionName='([^']+)'").expect("valid regex"));

/// Identity of an Android package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Application id, e.g. `com.example.app`.
    pub package_name: Option<String>,
    /// Integer version code.
    pub version_code: Option<u64>,
    /// Human-readable version name.
    pub version_name: Option<String>,
}

impl PackageInfo {
    /// Whether nothing at all is known.
    pub fn is_empty(&self) -> bool {
        self.package_name.is_none() && self.version_code.is_none() && self.version_name.is_none()
    }

    /// Fills fields that are unknown here from `other`.
    pub fn merge(&mut self, other: PackageInfo) {
        if self.package_name.is_none() {
            self.package_name = other.package_name;
        }
        if self.version_code.is_none() {
            self.version_code = other.version_code;
        }
        if self.version_name.is_none() {
            self.version_name = other.version_name;
        }
    }
}

/// Parses `aapt2 dump badging` output.
pub fn parse_badging(output: &str) -> PackageInfo {
    let capture = |re: &regex::Regex| {
        re.captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    PackageInfo {
        package_name: capture(&PACKAGE_NAME),
        version_code: capture(&VERSION_CODE).and_then(|v| v.parse().ok()),
        version_name: capture(&VERSION_NAME),
    }
}

/// Parses an XAPK `manifest.json` or APKM `info.json`.
///
/// Both snake_case and camelCase keys are accepted, and version codes may be
/// numbers or strings. Returns `None` if the document is not a JSON object.
pub fn parse_archive_manifest(raw: &str) -> Option<PackageInfo> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;

    let string = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| object.get(*k))
            .and_then(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    };

    Some(PackageInfo {
        package_name: string(&["package_name", "packageName", "pname"]),
        version_code: string(&["version_code", "versionCode", "versioncode"])
            .and_then(|v| v.trim().parse().ok()),
        version_name: string(&["version_name", "versionName", "release_version"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badging_fields() {
        let out = "package: name='com.example.app' versionCode='42' versionName='1.2.3' platformBuildVersionName='14'\n\
                   sdkVersion:'24'\n";
        let info = parse_badging(out);
        assert_eq!(info.package_name.as_deref(), Some("com.example.app"));
        assert_eq!(info.version_code, Some(42));
        assert_eq!(info.version_name.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn badging_without_package_line() {
        assert!(parse_badging("ERROR: dump failed").is_empty());
    }

    #[test]
    fn xapk_and_apkm_manifests() {
        let xapk = parse_archive_manifest(
            r#"{"package_name":"org.demo","version_code":"7","version_name":"0.7","split_apks":[]}"#,
        )
        .unwrap();
        assert_eq!(xapk.package_name.as_deref(), Some("org.demo"));
        assert_eq!(xapk.version_code, Some(7));

        let apkm = parse_archive_manifest(r#"{"pname":"org.mirror","versioncode":1200}"#).unwrap();
        assert_eq!(apkm.package_name.as_deref(), Some("org.mirror"));
        assert_eq!(apkm.version_code, Some(1200));
        assert_eq!(apkm.version_name, None);

        assert!(parse_archive_manifest("[1,2]").is_none());
    }

    #[test]
    fn merge_keeps_known_fields() {
        let mut info = PackageInfo {
            package_name: Some("a.b".into()),
            ..Default::default()
        };
        info.merge(PackageInfo {
            package_name: Some("x.y".into()),
            version_code: Some(3),
            version_name: None,
        });
        assert_eq!(info.package_name.as_deref(), Some("a.b"));
        assert_eq!(info.version_code, Some(3));
    }
}
