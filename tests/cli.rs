mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use support::{badging, write_zip, zip_bytes};

fn converter(base: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("aab_converter").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .arg("-b")
        .arg(base);
    cmd
}

#[test]
fn lists_modes_and_sub_modes() {
    let tmp = tempfile::tempdir().unwrap();
    converter(tmp.path())
        .arg("modes")
        .assert()
        .success()
        .stdout(predicate::str::contains("universal"))
        .stdout(predicate::str::contains("archive"))
        .stdout(predicate::str::contains("APKS/XAPK/APKM -> APK"));
}

#[test]
fn invalid_mode_is_rejected_before_any_work() {
    let tmp = tempfile::tempdir().unwrap();
    converter(tmp.path())
        .arg("42")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid mode"));
    assert!(!tmp.path().join("apk").exists());
}

#[test]
fn zero_jobs_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    converter(tmp.path())
        .args(["1", "--jobs", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--jobs"));
}

#[test]
fn extracts_universal_apk_from_apk_set() {
    let tmp = tempfile::tempdir().unwrap();
    let apk = zip_bytes(&[(
        "AndroidManifest.xml",
        badging("com.example.app", 5).as_bytes(),
    )]);
    write_zip(
        &tmp.path().join("split_apk/app.apks"),
        &[("toc.pb", b"toc".as_slice()), ("universal.apk", apk.as_slice())],
    );
    let report = tmp.path().join("report.json");

    converter(tmp.path())
        .args(["9", "--no-sign", "--jobs", "1"])
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let extracted = tmp.path().join("apk2/app.apk");
    assert_eq!(std::fs::read(&extracted).unwrap(), apk);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["files"][0]["status"], "succeeded");
    assert_eq!(json["files"][0]["outputs"][0]["kind"], "apk");
}

#[test]
fn empty_input_directory_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    converter(tmp.path())
        .args(["9", "--no-sign"])
        .assert()
        .success();
    for dir in ["apk", "aab", "apks", "split_apk", "apk2", "keystore"] {
        assert!(tmp.path().join(dir).is_dir(), "{dir}");
    }
}

#[test]
fn help_modes_lists_modes_too() {
    let tmp = tempfile::tempdir().unwrap();
    converter(tmp.path())
        .arg("help-modes")
        .assert()
        .success()
        .stdout(predicate::str::contains("system_compressed"));
}
