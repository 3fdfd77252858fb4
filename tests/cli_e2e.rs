//! Binary-level tests for the archiver CLI.

#![allow(clippy::unwrap_used)]
// `Command::cargo_bin` is deprecated in newer assert_cmd releases.
#![allow(deprecated)]

use std::path::Path;

use archiver_core::{Database, ReservationStore, SqliteReservationStore};
use assert_cmd::Command;
use predicates::prelude::*;

fn archiver() -> Command {
    let mut cmd = Command::cargo_bin("archiver").unwrap();
    cmd.env_remove("BASE_DIR")
        .env_remove("REQUEST_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_descriptor(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, json).unwrap();
    path
}

const CLOVER: &str = r#"{
    "id": 4113,
    "title": "Clover",
    "description": "[b]Four[/b] friends",
    "chapters": [
        {"id": 1, "volume": 1, "chapter": "1", "title": "Start", "groups": ["Alpha"],
         "pages": ["x1.png", "x2.png"], "page_base_url": "http://127.0.0.1:9/data/", "language": "gb"},
        {"id": 2, "volume": 1, "chapter": "1", "groups": ["Beta"],
         "pages": ["y1.png"], "page_base_url": "http://127.0.0.1:9/data/", "language": "fr"}
    ]
}"#;

#[test]
fn test_binary_help_lists_options() {
    archiver()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--base-dir"))
        .stdout(predicate::str::contains("--no-images"))
        .stdout(predicate::str::contains("--rate-interval"));
}

#[test]
fn test_binary_without_work_fails() {
    archiver()
        .assert()
        .failure()
        .stderr(predicate::str::contains("WORK_JSON"));
}

#[test]
fn test_binary_dry_run_writes_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let work = write_descriptor(dir.path(), "clover.json", CLOVER);
    let base = dir.path().join("archive");

    archiver()
        .arg("--no-images")
        .arg("-o")
        .arg(&base)
        .arg(&work)
        .assert()
        .success();

    let work_dir = base.join("Clover");
    let info = std::fs::read_to_string(work_dir.join("info.txt")).unwrap();
    assert!(info.contains(" * Chapter 1 - Start"));
    assert!(info.contains("- Alpha"));
    assert!(!info.contains("Beta"), "other-language chapters are skipped");
    assert!(work_dir.join("description.txt").exists());
    assert!(work_dir.join("Clover - c001 (v01) [Alpha]").is_dir());
    assert!(base.join("archiver.db").exists());
}

#[test]
fn test_binary_skips_already_archived_work() {
    let dir = tempfile::tempdir().unwrap();
    let work = write_descriptor(dir.path(), "clover.json", CLOVER);
    let base = dir.path().join("archive");

    archiver().arg("--no-images").arg("-o").arg(&base).arg(&work).assert().success();
    std::fs::remove_file(base.join("Clover").join("info.txt")).unwrap();

    archiver().arg("--no-images").arg("-o").arg(&base).arg(&work).assert().success();
    assert!(!base.join("Clover").join("info.txt").exists());

    archiver()
        .arg("--no-images")
        .arg("--force")
        .arg("-o")
        .arg(&base)
        .arg(&work)
        .assert()
        .success();
    assert!(base.join("Clover").join("info.txt").exists());
}

#[test]
fn test_binary_count_mismatch_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let work = write_descriptor(
        dir.path(),
        "short.json",
        r#"{"id": 9, "title": "Short", "chapter_count": 3, "chapters": [
            {"id": 1, "chapter": "1", "pages": [], "page_base_url": "u/", "language": "gb"}
        ]}"#,
    );

    archiver()
        .arg("--no-images")
        .arg("-o")
        .arg(dir.path().join("archive"))
        .arg(&work)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to archive"));
    assert!(!dir.path().join("archive/Short/info.txt").exists());
}

#[test]
fn test_binary_invalid_descriptor_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let work = write_descriptor(dir.path(), "broken.json", "{ not json");

    archiver()
        .arg("-o")
        .arg(dir.path())
        .arg(&work)
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.json"));
}

#[test]
fn test_binary_renames_work_when_name_is_taken() {
    let dir = tempfile::tempdir().unwrap();
    let work = write_descriptor(dir.path(), "clover.json", CLOVER);
    let base = dir.path().join("archive");
    std::fs::create_dir_all(&base).unwrap();

    tokio_test::block_on(async {
        let db = Database::open(&base.join("archiver.db")).await.unwrap();
        let store = SqliteReservationStore::new(db.clone());
        store.reserve(5772, "Clover", "Clover").await.unwrap();
        db.close().await;
    });

    archiver()
        .arg("--no-images")
        .arg("-o")
        .arg(&base)
        .arg(&work)
        .assert()
        .success();

    assert!(base.join("Clover (4113)").join("info.txt").exists());
    assert!(!base.join("Clover").exists());
}

fn single_chapter_work(id: u64, title: &str, language: &str) -> String {
    format!(
        r#"{{"id": {id}, "title": "{title}", "chapters": [
            {{"id": {id}, "volume": 1, "chapter": "1", "pages": ["p.png"],
              "page_base_url": "http://127.0.0.1:9/data/", "language": "{language}"}}
        ]}}"#
    )
}

#[test]
fn test_binary_skips_work_without_target_language_chapters() {
    let dir = tempfile::tempdir().unwrap();
    let english = write_descriptor(dir.path(), "en.json", &single_chapter_work(1, "Kept", "gb"));
    let french = write_descriptor(dir.path(), "fr.json", &single_chapter_work(2, "Elsewhere", "fr"));
    let base = dir.path().join("archive");

    archiver()
        .arg("--no-images")
        .arg("-o")
        .arg(&base)
        .arg(&english)
        .arg(&french)
        .assert()
        .success()
        .stdout(predicate::str::contains("no chapters in the target language"));

    assert!(base.join("Kept").join("info.txt").exists());
    assert!(!base.join("Elsewhere").exists());
}

#[test]
fn test_binary_history_failure_still_finishes_every_work() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("archive");
    std::fs::create_dir_all(&base).unwrap();
    let works: Vec<_> = ["One", "Two", "Three"]
        .iter()
        .zip(31u64..)
        .map(|(title, id)| {
            write_descriptor(
                dir.path(),
                &format!("{id}.json"),
                &single_chapter_work(id, title, "gb"),
            )
        })
        .collect();

    tokio_test::block_on(async {
        let db = Database::open(&base.join("archiver.db")).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER refuse_history BEFORE INSERT ON archived_works
             BEGIN SELECT RAISE(ABORT, 'history is read-only'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db.close().await;
    });

    archiver()
        .arg("--no-images")
        .arg("-o")
        .arg(&base)
        .args(&works)
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not be recorded"));

    for title in ["One", "Two", "Three"] {
        assert!(
            base.join(title).join("info.txt").exists(),
            "{title} should be fully archived"
        );
    }
}
