//! Integration tests for volume provisioning, backup and restore.
//!
//! These tests talk to a real Docker daemon and are skipped if Docker is not
//! available or SKIP_CONTAINER_TESTS=1.

use flate2::Compression;
use flate2::write::GzEncoder;
use sapo::env::labels;
use sapo::runner::HostRunner;
use sapo::volume::{
    RestoreOptions, UsageAnalysis, VolumeCreateOptions, VolumeManager, VolumeManagerConfig,
    VolumeType,
};
use serial_test::serial;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use test_tag::tag;

/// Check if container tests should run.
fn should_run_container_tests() -> bool {
    if let Ok(value) = std::env::var("SKIP_CONTAINER_TESTS")
        && (value == "1" || value.eq_ignore_ascii_case("true"))
    {
        return false;
    }

    std::process::Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn test_manager() -> VolumeManager {
    VolumeManager::with_config(
        Arc::new(HostRunner::new()),
        VolumeManagerConfig {
            volume_prefix: "sapotest".to_string(),
            ..Default::default()
        },
    )
}

fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Cleanup helper - removes volumes if they exist.
async fn cleanup_volumes(manager: &VolumeManager, names: &[&str]) {
    for name in names {
        let _ = manager.delete_volume(name, true).await;
    }
}

const HELLO: &[u8] = b"hello from sapo\n";
const INNER: &[u8] = b"nested payload\n";

fn append_payload<W: Write>(builder: &mut tar::Builder<W>) {
    for (path, data) in [("hello.txt", HELLO), ("nested/inner.txt", INNER)] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, data).unwrap();
    }
}

fn write_plain_tar(path: &Path) {
    let mut builder = tar::Builder::new(File::create(path).unwrap());
    append_payload(&mut builder);
    builder.finish().unwrap();
}

fn write_gzip_tar(path: &Path) {
    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    append_payload(&mut builder);
    builder.into_inner().unwrap().finish().unwrap();
}

/// Read the payload back through a utility container
fn read_payload(volume: &str) -> String {
    let output = std::process::Command::new("docker")
        .args([
            "run",
            "--rm",
            "-v",
            &format!("{}:/v:ro", volume),
            "alpine",
            "cat",
            "/v/hello.txt",
            "/v/nested/inner.txt",
        ])
        .output()
        .expect("Failed to run utility container");
    assert!(output.status.success(), "cat failed: {:?}", output);
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_created_volume_carries_type_label() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests (Docker not available or SKIP_CONTAINER_TESTS=1)");
        return;
    }

    let manager = test_manager();
    let suffix = unique_suffix();

    let name = manager
        .create_volume(
            VolumeType::Database,
            &VolumeCreateOptions::default().suffix(suffix.clone()),
        )
        .await
        .expect("Failed to create volume");
    assert_eq!(name, format!("sapotest_postgresql_{}", suffix));

    let info = manager.inspect_volume(&name).await.expect("Volume not found");
    assert_eq!(info.volume_type(), Some("postgresql"));
    assert_eq!(
        info.labels.get(labels::MANAGED_BY).map(String::as_str),
        Some(labels::MANAGED_BY_VALUE)
    );
    assert!(manager.list_volumes().await.iter().any(|v| v.name == name));

    // a second create with the same name is refused
    let again = manager
        .create_volume(
            VolumeType::Database,
            &VolumeCreateOptions::default().suffix(suffix),
        )
        .await;
    assert!(again.is_err());

    assert!(manager.delete_volume(&name, false).await);
    assert!(manager.inspect_volume(&name).await.is_none());
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_restore_picks_extraction_by_suffix() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let manager = test_manager();
    let temp = TempDir::new().unwrap();
    let plain = temp.path().join("payload_plain.tar");
    let gzip = temp.path().join("payload_gzip.tar.gz");
    write_plain_tar(&plain);
    write_gzip_tar(&gzip);

    let mut names = Vec::new();
    for archive in [&plain, &gzip] {
        let name = manager
            .create_volume(
                VolumeType::Data,
                &VolumeCreateOptions::default().suffix(unique_suffix()),
            )
            .await
            .expect("Failed to create volume");
        let options = RestoreOptions {
            volume_name: Some(name.clone()),
            ..Default::default()
        };
        manager
            .restore_volume(archive, &options)
            .await
            .unwrap_or_else(|e| panic!("Restore of {} failed: {}", archive.display(), e));
        names.push(name);
    }

    let from_plain = read_payload(&names[0]);
    let from_gzip = read_payload(&names[1]);
    assert_eq!(from_plain, from_gzip);
    assert_eq!(from_plain, "hello from sapo\nnested payload\n");

    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    cleanup_volumes(&manager, &refs).await;
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_backup_then_restore_into_new_volume() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let manager = test_manager();
    let temp = TempDir::new().unwrap();
    let seed = temp.path().join("seed.tar.gz");
    write_gzip_tar(&seed);

    let source = manager
        .create_volume(
            VolumeType::Logs,
            &VolumeCreateOptions::default().suffix(unique_suffix()),
        )
        .await
        .expect("Failed to create source volume");
    manager
        .restore_volume(
            &seed,
            &RestoreOptions {
                volume_name: Some(source.clone()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to seed source volume");

    let backups = temp.path().join("backups");
    let archive = manager
        .backup_volume(&source, &backups, true)
        .await
        .expect("Backup failed");
    assert!(archive.is_file());

    let restored = manager
        .restore_volume(
            &archive,
            &RestoreOptions {
                volume_type: Some(VolumeType::Logs),
                ..Default::default()
            },
        )
        .await
        .expect("Restore failed");

    assert_eq!(read_payload(&source), read_payload(&restored));
    let restored_labels = manager.volume_labels(&restored).await;
    assert_eq!(
        restored_labels.get(labels::VOLUME_TYPE).map(String::as_str),
        Some("logs")
    );
    assert!(restored_labels.contains_key(labels::RESTORED_FROM));

    match manager.analyze_usage(&restored).await {
        UsageAnalysis::Report(report) => {
            assert!(report.entries.iter().any(|e| e.name.ends_with("hello.txt")));
        }
        UsageAnalysis::Failed { error, .. } => panic!("Analysis failed: {}", error),
    }

    cleanup_volumes(&manager, &[&source, &restored]).await;
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_migrate_data_copies_and_removes_archive() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let manager = test_manager();
    let temp = TempDir::new().unwrap();
    let seed = temp.path().join("seed.tar");
    write_plain_tar(&seed);

    let mut names = Vec::new();
    for _ in 0..2 {
        names.push(
            manager
                .create_volume(
                    VolumeType::Data,
                    &VolumeCreateOptions::default().suffix(unique_suffix()),
                )
                .await
                .expect("Failed to create volume"),
        );
    }
    let (source, target) = (&names[0], &names[1]);
    manager
        .restore_volume(
            &seed,
            &RestoreOptions {
                volume_name: Some(source.clone()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to seed source volume");

    let scratch = temp.path().join("scratch");
    std::fs::create_dir(&scratch).unwrap();
    assert!(manager.migrate_data(source, target, Some(&scratch)).await);

    assert_eq!(read_payload(target), "hello from sapo\nnested payload\n");
    assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);

    cleanup_volumes(&manager, &[source, target]).await;
}
