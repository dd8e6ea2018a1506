//! End-to-end synchronization scenarios over real temporary directories

use std::path::Path;

use driftsync_sync::{SyncOptions, Synchronizer};
use driftsync_target::{FsTarget, StorageProvider};
use driftsync_tests::test_utils::{
    exists, read_file, write_file, write_file_at, NoMtimeTarget, SyncFixture, FIXED_MTIME,
};
use driftsync_types::SyncReport;

fn fs_target(path: &Path) -> Box<dyn StorageProvider> {
    Box::new(FsTarget::new(path).unwrap())
}

fn execute() -> SyncOptions {
    SyncOptions {
        dry_run: false,
        verbosity: 0,
        ..SyncOptions::default()
    }
}

async fn upload(local: &Path, remote: &Path, options: SyncOptions) -> SyncReport {
    Synchronizer::upload(fs_target(local), fs_target(remote), options)
        .unwrap()
        .run()
        .await
        .unwrap()
}

async fn download(local: &Path, remote: &Path, options: SyncOptions) -> SyncReport {
    Synchronizer::download(fs_target(local), fs_target(remote), options)
        .unwrap()
        .run()
        .await
        .unwrap()
}

async fn bidir(local: &Path, remote: &Path, options: SyncOptions) -> SyncReport {
    Synchronizer::bidirectional(fs_target(local), fs_target(remote), options)
        .unwrap()
        .run()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_upload_to_empty_remote() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());

    let report = upload(local, remote, execute()).await;
    assert!(!report.dry_run);
    assert_eq!(report.stats.dirs_created, 2);
    assert_eq!(report.stats.files_written, 6);
    assert_eq!(report.stats.bytes_written, 16_403);
    assert_eq!(report.stats.upload_files_written, 6);
    assert_eq!(report.stats.download_files_written, 0);
    assert_eq!(report.stats.conflict_files, 0);
    assert_eq!(report.stats.errors, 0);

    assert_eq!(read_file(remote, "file1.txt"), "111");
    assert_eq!(read_file(remote, "folder1/file1_1.txt"), "1.111");
    assert_eq!(read_file(remote, "folder2/file2_1.txt"), "2.111");
    assert_eq!(read_file(remote, "big_file.txt").len(), 16_384);

    // The peer-sync ledger lives on the local side only.
    assert!(exists(local, "_driftsync-meta.json"));
    assert!(!exists(remote, "_driftsync-meta.json"));

    // A second run finds both sides identical.
    let report = upload(local, remote, execute()).await;
    assert_eq!(report.stats.files_written, 0);
    assert_eq!(report.stats.dirs_created, 0);
    assert_eq!(report.stats.bytes_written, 0);
    assert_eq!(report.stats.files_deleted, 0);
}

#[tokio::test]
async fn test_dry_run_is_the_default_and_touches_nothing() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());

    let options = SyncOptions {
        verbosity: 0,
        ..SyncOptions::default()
    };
    let report = upload(local, remote, options).await;
    assert!(report.dry_run);

    // Counters reflect the planned top-level actions; nothing below a
    // not-yet-existing directory is enumerated.
    assert_eq!(report.stats.files_written, 4);
    assert_eq!(report.stats.dirs_created, 2);
    assert_eq!(report.stats.bytes_written, 0);

    assert_eq!(std::fs::read_dir(remote).unwrap().count(), 0);
    assert!(!exists(local, "_driftsync-meta.json"));
}

#[tokio::test]
async fn test_download_mirrors_remote_tree() {
    let fixture = SyncFixture::with_remote_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());

    let report = download(local, remote, execute()).await;
    assert_eq!(report.stats.dirs_created, 2);
    assert_eq!(report.stats.files_written, 6);
    assert_eq!(report.stats.download_files_written, 6);
    assert_eq!(report.stats.upload_files_written, 0);

    assert_eq!(read_file(local, "file2.txt"), "222");
    assert_eq!(read_file(local, "folder1/file1_1.txt"), "1.111");

    // Even for a download the ledger ends up on the physically local side.
    assert!(exists(local, "_driftsync-meta.json"));
    assert!(!exists(remote, "_driftsync-meta.json"));
}

#[tokio::test]
async fn test_download_matches_upload_with_swapped_targets() {
    let downloaded = SyncFixture::with_remote_tree();
    let mirrored = SyncFixture::with_remote_tree();

    let by_download = download(
        downloaded.local.path(),
        downloaded.remote.path(),
        execute(),
    )
    .await;
    let by_upload = upload(
        mirrored.remote.path(),
        mirrored.local.path(),
        execute(),
    )
    .await;

    assert_eq!(
        by_download.stats.files_written,
        by_upload.stats.files_written
    );
    assert_eq!(by_download.stats.dirs_created, by_upload.stats.dirs_created);
    assert_eq!(
        by_download.stats.bytes_written,
        by_upload.stats.bytes_written
    );
    assert_eq!(by_download.stats.files_written, 6);

    // Only the transfer-direction attribution differs.
    assert_eq!(by_download.stats.download_files_written, 6);
    assert_eq!(by_download.stats.upload_files_written, 0);
    assert_eq!(by_upload.stats.upload_files_written, 6);
    assert_eq!(by_upload.stats.download_files_written, 0);

    for name in [
        "file1.txt",
        "file2.txt",
        "file3.txt",
        "folder1/file1_1.txt",
        "folder2/file2_1.txt",
        "big_file.txt",
    ] {
        assert_eq!(
            read_file(downloaded.local.path(), name),
            read_file(mirrored.local.path(), name),
            "{name} differs between the two formulations"
        );
    }
}

#[tokio::test]
async fn test_upload_copies_modified_file() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    upload(local, remote, execute()).await;

    write_file_at(local, "file1.txt", "1111", FIXED_MTIME + 10.0);
    let report = upload(local, remote, execute()).await;
    assert_eq!(report.stats.files_written, 1);
    assert_eq!(report.stats.bytes_written, 4);
    assert_eq!(read_file(remote, "file1.txt"), "1111");
}

#[tokio::test]
async fn test_upload_skips_newer_target_unless_forced() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    upload(local, remote, execute()).await;

    write_file_at(remote, "file1.txt", "999", FIXED_MTIME + 100.0);

    let report = upload(local, remote, execute()).await;
    assert_eq!(report.stats.files_written, 0);
    assert_eq!(read_file(remote, "file1.txt"), "999");

    let options = SyncOptions {
        force: true,
        ..execute()
    };
    let report = upload(local, remote, options).await;
    assert_eq!(report.stats.files_written, 1);
    assert_eq!(read_file(remote, "file1.txt"), "111");
}

#[tokio::test]
async fn test_upload_delete_removes_extra_target_entries() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    upload(local, remote, execute()).await;

    write_file(remote, "extra.txt", "x");
    std::fs::create_dir(remote.join("extra_dir")).unwrap();
    write_file(remote, "extra_dir/inner.txt", "y");

    // Without --delete the extras survive.
    let report = upload(local, remote, execute()).await;
    assert_eq!(report.stats.files_deleted, 0);
    assert!(exists(remote, "extra.txt"));

    let options = SyncOptions {
        delete: true,
        ..execute()
    };
    let report = upload(local, remote, options).await;
    assert_eq!(report.stats.files_deleted, 1);
    assert_eq!(report.stats.dirs_deleted, 1);
    assert!(!exists(remote, "extra.txt"));
    assert!(!exists(remote, "extra_dir"));
}

#[tokio::test]
async fn test_include_and_omit_filters() {
    let fixture = SyncFixture::new();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    write_file(local, "notes.txt", "n");
    write_file(local, "pic.jpg", "j");
    std::fs::create_dir(local.join("cache")).unwrap();
    write_file(local, "cache/data.txt", "d");

    let options = SyncOptions {
        include_files: vec!["*.txt".to_string()],
        omit: vec!["cache".to_string()],
        ..execute()
    };
    let report = upload(local, remote, options).await;
    assert_eq!(report.stats.files_written, 1);
    assert_eq!(report.stats.dirs_created, 0);
    assert!(exists(remote, "notes.txt"));
    assert!(!exists(remote, "pic.jpg"));
    assert!(!exists(remote, "cache"));
}

#[tokio::test]
async fn test_delete_unmatched_prunes_filtered_target_entries() {
    let fixture = SyncFixture::new();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    write_file(local, "notes.txt", "n");
    write_file(local, "pic.jpg", "j");
    upload(local, remote, execute()).await;
    assert!(exists(remote, "pic.jpg"));

    let options = SyncOptions {
        include_files: vec!["*.txt".to_string()],
        delete_unmatched: true,
        ..execute()
    };
    let report = upload(local, remote, options).await;
    assert_eq!(report.stats.files_deleted, 1);
    assert!(!exists(remote, "pic.jpg"));
    // The filtered-out source file itself is never touched.
    assert!(exists(local, "pic.jpg"));
}

#[tokio::test]
async fn test_bidirectional_detects_conflicts() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    upload(local, remote, execute()).await;

    // One side each, plus one genuine conflict.
    write_file_at(local, "file1.txt", "1111", FIXED_MTIME + 10.0);
    write_file_at(remote, "file2.txt", "2222", FIXED_MTIME + 10.0);
    write_file_at(local, "file3.txt", "AAA", FIXED_MTIME + 10.0);
    write_file_at(remote, "file3.txt", "BBB", FIXED_MTIME + 20.0);

    let report = bidir(local, remote, execute()).await;
    assert_eq!(report.stats.conflict_files, 1);
    assert_eq!(report.stats.files_written, 2);

    assert_eq!(read_file(remote, "file1.txt"), "1111");
    assert_eq!(read_file(local, "file2.txt"), "2222");
    // The conflicting file is left untouched on both sides.
    assert_eq!(read_file(local, "file3.txt"), "AAA");
    assert_eq!(read_file(remote, "file3.txt"), "BBB");
}

#[tokio::test]
async fn test_equal_time_different_size_skips_and_counts_error() {
    let fixture = SyncFixture::new();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());

    // Same timestamp but different sizes cannot be ordered; the pair is
    // reported and left alone.
    write_file_at(local, "odd.txt", "11111", FIXED_MTIME);
    write_file_at(remote, "odd.txt", "22", FIXED_MTIME);

    let report = upload(local, remote, execute()).await;
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.stats.files_written, 0);
    assert_eq!(report.stats.bytes_written, 0);
    assert_eq!(read_file(local, "odd.txt"), "11111");
    assert_eq!(read_file(remote, "odd.txt"), "22");
}

#[tokio::test]
async fn test_bidirectional_resolves_conflicts_with_force() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    upload(local, remote, execute()).await;

    write_file_at(local, "file3.txt", "AAA", FIXED_MTIME + 10.0);
    write_file_at(remote, "file3.txt", "BBB", FIXED_MTIME + 20.0);

    let options = SyncOptions {
        force: true,
        ..execute()
    };
    let report = bidir(local, remote, options).await;
    assert_eq!(report.stats.conflict_files, 1);
    // The newer side wins.
    assert_eq!(read_file(local, "file3.txt"), "BBB");
    assert_eq!(read_file(remote, "file3.txt"), "BBB");
}

#[tokio::test]
async fn test_bidirectional_propagates_deletes_and_additions() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());
    upload(local, remote, execute()).await;

    std::fs::remove_file(remote.join("file2.txt")).unwrap();
    write_file_at(remote, "file4.txt", "444", FIXED_MTIME + 5.0);

    let report = bidir(local, remote, execute()).await;
    assert_eq!(report.stats.files_deleted, 1);
    assert_eq!(report.stats.files_written, 1);

    // The peer's delete is honored because a sync record existed.
    assert!(!exists(local, "file2.txt"));
    // The peer's new file is copied because no record existed.
    assert_eq!(read_file(local, "file4.txt"), "444");
    assert_eq!(read_file(remote, "file4.txt"), "444");
}

#[tokio::test]
async fn test_sidecar_compensates_for_lost_mtimes() {
    let fixture = SyncFixture::with_local_tree();
    let (local, remote) = (fixture.local.path(), fixture.remote.path());

    let run = |options: SyncOptions| {
        let local_target = fs_target(local);
        let remote_target: Box<dyn StorageProvider> =
            Box::new(NoMtimeTarget::new(remote).unwrap());
        async move {
            Synchronizer::upload(local_target, remote_target, options)
                .unwrap()
                .run()
                .await
                .unwrap()
        }
    };

    let report = run(execute()).await;
    assert_eq!(report.stats.files_written, 6);

    // With mtimes unavailable, true times are kept in the target's sidecar.
    assert!(exists(remote, "_driftsync-meta.json"));
    assert!(exists(remote, "folder1/_driftsync-meta.json"));

    // The second run compares against the recorded times and stays idle.
    let report = run(execute()).await;
    assert_eq!(report.stats.files_written, 0);
    assert_eq!(report.stats.bytes_written, 0);
}
