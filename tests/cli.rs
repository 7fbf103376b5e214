//! Integration tests for the apkarch binary.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use apkarch::test_utils::{ZipBuilder, fake_elf};
use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn apkarch_cmd() -> Command {
    cargo_bin_cmd!("apkarch")
}

fn sample_package() -> Vec<u8> {
    ZipBuilder::new()
        .deflated("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n")
        .directory("lib/")
        .deflated("lib/armeabi/libfoo.so", &fake_elf(1, 1, 0x28))
        .deflated("lib/x86_64/libbar.so", &fake_elf(2, 1, 0x03))
        .build()
}

#[test]
fn test_help_flag() {
    apkarch_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("native libraries"));
}

#[test]
fn test_requires_input() {
    apkarch_cmd().assert().failure();
}

#[test]
fn test_report_lines() {
    let temp = TempDir::new().unwrap();
    let apk = temp.path().join("app.apk");
    std::fs::write(&apk, sample_package()).unwrap();

    apkarch_cmd()
        .arg(&apk)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processing "))
        .stdout(predicate::str::contains("lib/armeabi/libfoo.so\t32 bit\tARM\n"))
        .stdout(predicate::str::contains("lib/x86_64/libbar.so\t64 bit\tIntel\n"))
        .stdout(predicate::str::contains("2 Library files\n"))
        .stdout(predicate::str::contains("MANIFEST").not());
}

#[test]
fn test_directory_mode_continues_past_bad_package() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.apk"), b"not a zip at all, just text").unwrap();
    std::fs::write(temp.path().join("b.apk"), sample_package()).unwrap();
    std::fs::create_dir(temp.path().join("nested")).unwrap();

    apkarch_cmd()
        .arg("-d")
        .arg(temp.path())
        .arg("-j")
        .arg("2")
        .assert()
        .failure()
        .stdout(predicate::str::contains("a.apk"))
        .stdout(predicate::str::contains("2 Library files"))
        .stdout(predicate::str::contains("nested").not())
        .stderr(predicate::str::contains("cannot read archive"));
}

#[test]
fn test_missing_file_fails() {
    let temp = TempDir::new().unwrap();

    apkarch_cmd()
        .arg(temp.path().join("missing.apk"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 packages could not be read"));
}

#[cfg(unix)]
#[test]
fn test_directory_mode_skips_symlinked_directories() {
    let temp = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    std::fs::write(temp.path().join("app.apk"), sample_package()).unwrap();
    std::os::unix::fs::symlink(elsewhere.path(), temp.path().join("linked")).unwrap();

    apkarch_cmd()
        .arg("-d")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("linked").not())
        .stdout(predicate::str::contains("2 Library files"));
}
