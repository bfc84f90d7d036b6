//! File output with backup rotation

use tempfile::TempDir;
use tulp::output::{OutputTarget, OutputWriter};

#[test]
fn test_rotation_keeps_every_previous_version() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("report.csv");

    for content in ["v1", "v2", "v3", "v4"] {
        OutputWriter::write_to_file(&target, content).unwrap();
    }

    let read = |name: &str| std::fs::read_to_string(temp_dir.path().join(name)).unwrap();
    assert_eq!(read("report.csv"), "v4\n");
    assert_eq!(read("report.backup-1.csv"), "v1\n");
    assert_eq!(read("report.backup-2.csv"), "v2\n");
    assert_eq!(read("report.backup-3.csv"), "v3\n");
}

#[test]
fn test_gap_in_backups_is_filled_first() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("f.ext");
    std::fs::write(&target, "current").unwrap();
    std::fs::write(temp_dir.path().join("f.backup-2.ext"), "older").unwrap();

    let backup = OutputWriter::write_to_file(&target, "new").unwrap();
    assert_eq!(backup, Some(temp_dir.path().join("f.backup-1.ext")));
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("f.backup-2.ext")).unwrap(),
        "older"
    );
}

#[test]
fn test_stdout_target_writes_to_writer() {
    let mut out = Vec::new();
    OutputTarget::from_option(None).emit("line", &mut out).unwrap();
    assert_eq!(out, b"line\n");
}
