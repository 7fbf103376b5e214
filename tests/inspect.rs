//! End-to-end inspection of packages written to disk.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use apkarch::test_utils::{ZipBuilder, fake_elf};
use apkarch::{ArchiveError, InspectOptions, MachineKind, PackageInspector, WordSize};
use std::path::PathBuf;
use tempfile::TempDir;

fn write_package(dir: &TempDir, name: &str, data: Vec<u8>) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).expect("failed to write package");
    path
}

#[tokio::test]
async fn multi_abi_package() {
    let dir = TempDir::new().unwrap();
    let path = write_package(
        &dir,
        "app.apk",
        ZipBuilder::new()
            .deflated("AndroidManifest.xml", b"\x03\x00\x08\x00binary xml")
            .deflated("classes.dex", b"dex\n035\0")
            .directory("lib/")
            .deflated("lib/armeabi/libnative.so", &fake_elf(1, 1, 0x28))
            .deflated("lib/armeabi-v7a/libnative.so", &fake_elf(1, 1, 0x28))
            .deflated("lib/x86/libnative.so", &fake_elf(1, 1, 0x03))
            .deflated("lib/mips/libnative.so", &fake_elf(1, 1, 0x08))
            .deflated("lib/arm64-v8a/libnative.so", &fake_elf(2, 1, 0xB7))
            .stored("res/raw/tone.ogg", b"OggS\0\x02")
            .build(),
    );

    let report = PackageInspector::default().inspect_path(&path).await.unwrap();

    let got: Vec<_> = report
        .libraries
        .iter()
        .map(|l| (l.name.as_str(), l.word_size.bits(), l.machine))
        .collect();
    assert_eq!(
        got,
        [
            ("lib/armeabi/libnative.so", 32, MachineKind::Arm),
            ("lib/armeabi-v7a/libnative.so", 32, MachineKind::Arm),
            ("lib/x86/libnative.so", 32, MachineKind::Intel),
            ("lib/mips/libnative.so", 32, MachineKind::Mips),
            ("lib/arm64-v8a/libnative.so", 64, MachineKind::Unknown(0xB7)),
        ]
    );
    assert_eq!(report.count(), 5);
    assert!(report.skipped.is_empty());
    assert_eq!(report.source, path.display().to_string());
}

#[tokio::test]
async fn libraries_outside_lib_directory_are_found() {
    let dir = TempDir::new().unwrap();
    let path = write_package(
        &dir,
        "odd.apk",
        ZipBuilder::new()
            .stored("assets/bin/helper", &fake_elf(2, 1, 0x03))
            .build(),
    );

    let report = PackageInspector::default().inspect_path(&path).await.unwrap();
    assert_eq!(report.count(), 1);
    assert_eq!(report.libraries[0].word_size, WordSize::Bits64);
    assert_eq!(report.libraries[0].machine, MachineKind::Intel);
}

#[tokio::test]
async fn truncated_member_is_skipped() {
    let dir = TempDir::new().unwrap();
    let path = write_package(
        &dir,
        "broken.apk",
        ZipBuilder::new()
            .stored_with_declared_size("corrupt.so", &fake_elf(1, 1, 0x28)[..20], 1 << 20)
            .stored("lib/x86/libok.so", &fake_elf(1, 1, 0x03))
            .build(),
    );

    let report = PackageInspector::default().inspect_path(&path).await.unwrap();
    assert_eq!(report.count(), 1);
    assert_eq!(report.libraries[0].name, "lib/x86/libok.so");
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(
        report.skipped[0].error,
        ArchiveError::Truncated { .. }
    ));
}

#[tokio::test]
async fn truncated_file_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let mut data = ZipBuilder::new()
        .stored("lib/x86/libok.so", &fake_elf(1, 1, 0x03))
        .build();
    data.truncate(data.len() - 10);
    let path = write_package(&dir, "cut.apk", data);

    let err = PackageInspector::default()
        .inspect_path(&path)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn member_size_limit_applies() {
    let dir = TempDir::new().unwrap();
    let path = write_package(
        &dir,
        "big.apk",
        ZipBuilder::new()
            .stored("lib/x86/libbig.so", &[fake_elf(1, 1, 0x03), vec![0; 4096]].concat())
            .stored("lib/x86/libsmall.so", &fake_elf(1, 1, 0x03))
            .build(),
    );

    let inspector = PackageInspector::new(InspectOptions {
        max_member_size: 1024,
    });
    let report = inspector.inspect_path(&path).await.unwrap();
    assert_eq!(report.count(), 1);
    assert_eq!(report.libraries[0].name, "lib/x86/libsmall.so");
    assert_eq!(report.skipped[0].name, "lib/x86/libbig.so");
}
