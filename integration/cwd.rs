use std::fs;

use kommand::error::SpawnError;

use crate::{script, Report};

pub fn run() {
    let tempdir = tempfile::tempdir().unwrap();

    let output = script("report").current_dir(tempdir.path()).output().unwrap();
    assert!(output.status.success());

    let report: Report = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(fs::canonicalize(report.cwd).unwrap(), fs::canonicalize(tempdir.path()).unwrap());

    // Missing directories fail the spawn itself.
    let missing = tempdir.path().join("missing");
    let result = script("report").current_dir(&missing).spawn();
    match result {
        Err(SpawnError::InvalidWorkingDirectory { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected invalid working directory, got {other:?}"),
    }
}
