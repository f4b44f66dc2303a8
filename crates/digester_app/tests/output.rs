use std::fs;
use std::io::Write;

use digester_app::output::{ensure_output_dir, OutputFile};
use tempfile::TempDir;

fn entries(dir: &std::path::Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("nested").join("out");
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn rejects_file_as_output_dir() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();
    assert!(ensure_output_dir(&file_path).is_err());
}

#[test]
fn commit_moves_document_into_place() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("out").join("digest.md");

    let mut output = OutputFile::create(&target).unwrap();
    output.writer().write_all(b"# Digest\n").unwrap();
    assert!(!target.exists());

    let written = output.commit().unwrap();
    assert_eq!(written, target);
    assert_eq!(fs::read_to_string(&target).unwrap(), "# Digest\n");
    assert_eq!(entries(&temp.path().join("out")), vec!["digest.md".to_string()]);
}

#[test]
fn commit_replaces_existing_document() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("digest.md");
    fs::write(&target, "old").unwrap();

    let mut output = OutputFile::create(&target).unwrap();
    output.writer().write_all(b"new").unwrap();
    output.commit().unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "new");
}

#[test]
fn dropped_output_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("digest.epub");
    {
        let mut output = OutputFile::create(&target).unwrap();
        output.writer().write_all(b"partial").unwrap();
    }
    assert!(!target.exists());
    assert!(entries(temp.path()).is_empty());
}
