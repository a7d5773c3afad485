//! Logger output to rotated files.

use groundwork::log::{LogOptions, Logger};
use serde_json::Value;

fn file_logger(dir: &std::path::Path) -> Logger {
    Logger::new(&LogOptions {
        level: "debug".into(),
        format: "json".into(),
        output_paths: Vec::new(),
        enable_file: true,
        log_dir: dir.display().to_string(),
        ..LogOptions::default()
    })
    .unwrap()
}

fn lines(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn entries_are_split_by_severity() {
    let dir = tempfile::tempdir().unwrap();
    let logger = file_logger(dir.path());
    logger.debug("warming up");
    logger.warn("slow upstream");
    logger.error("upstream failed");
    logger.sync();

    let info = lines(&dir.path().join("info.log"));
    let error = lines(&dir.path().join("error.log"));
    let messages = |v: &[Value]| -> Vec<String> {
        v.iter().map(|l| l["message"].as_str().unwrap().to_string()).collect()
    };
    assert_eq!(messages(&info), ["warming up", "slow upstream"]);
    assert_eq!(messages(&error), ["upstream failed"]);
    logger.close();
}

#[test]
fn child_loggers_share_the_files() {
    let dir = tempfile::tempdir().unwrap();
    let logger = file_logger(dir.path());
    let child = logger.with_fields(&[("component", serde_json::json!("store"))]);
    child.info("from child");
    logger.info("from parent");
    logger.sync();

    let info = lines(&dir.path().join("info.log"));
    assert_eq!(info.len(), 2);
    assert_eq!(info[0]["component"], "store");
    assert!(info[1].get("component").is_none());
}

#[test]
fn unwritable_directory_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"").unwrap();
    let opts = LogOptions {
        enable_file: true,
        output_paths: Vec::new(),
        log_dir: blocker.join("logs").display().to_string(),
        ..LogOptions::default()
    };
    assert!(Logger::new(&opts).is_err());
}
