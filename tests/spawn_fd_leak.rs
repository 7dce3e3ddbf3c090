#![cfg(target_os = "linux")]

use std::fs;

use kommand::error::SpawnError;
use kommand::process::{Command, Stdio};

/// Open descriptors of this process.
fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

/// Only test in this binary, since other threads would open descriptors too.
#[test]
fn failed_spawns_close_pipes() {
    let tempdir = tempfile::tempdir().unwrap();
    let missing_dir = tempdir.path().join("missing");

    let before = open_fds();

    for _ in 0..100 {
        let err = Command::new("true")
            .current_dir(&missing_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap_err();
        assert!(matches!(err, SpawnError::InvalidWorkingDirectory { .. }), "{err:?}");

        let err = Command::new(tempdir.path().join("missing-program"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap_err();
        assert!(matches!(err, SpawnError::NotFound { .. }), "{err:?}");
    }

    assert_eq!(open_fds(), before);
}
