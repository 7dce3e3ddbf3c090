#![cfg(unix)]

use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;

use kommand::error::SpawnError;
use kommand::process::Command;

#[test]
fn missing_program() {
    let err = Command::new("kommand-missing-program").spawn().unwrap_err();
    assert!(matches!(err, SpawnError::NotFound { .. }));
}

#[test]
fn missing_explicit_path() {
    let tempdir = tempfile::tempdir().unwrap();
    let program = tempdir.path().join("missing");

    let err = Command::new(&program).spawn().unwrap_err();
    match err {
        SpawnError::NotFound { program: path } => assert_eq!(path, program),
        err => panic!("expected missing program, got {err:?}"),
    }
}

#[test]
fn missing_on_custom_path() {
    let tempdir = tempfile::tempdir().unwrap();

    // `sh` is not in the configured search path.
    let err = Command::new("sh").env("PATH", tempdir.path()).spawn().unwrap_err();
    assert!(matches!(err, SpawnError::NotFound { .. }));
}

#[test]
fn not_executable() {
    let tempdir = tempfile::tempdir().unwrap();
    let program = tempdir.path().join("script");
    fs::write(&program, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&program, fs::Permissions::from_mode(0o644)).unwrap();

    let err = Command::new(&program).spawn().unwrap_err();
    assert!(matches!(err, SpawnError::PermissionDenied { .. }), "{err:?}");

    // Lookup through `PATH` reports the same failure.
    let err = Command::new("script").env("PATH", tempdir.path()).spawn().unwrap_err();
    assert!(matches!(err, SpawnError::PermissionDenied { .. }), "{err:?}");
}

#[test]
fn working_directory_is_file() {
    let tempdir = tempfile::tempdir().unwrap();
    let file = tempdir.path().join("file");
    File::create(&file).unwrap();

    let err = Command::new("true").current_dir(&file).spawn().unwrap_err();
    assert!(matches!(err, SpawnError::InvalidWorkingDirectory { .. }), "{err:?}");
}

#[test]
fn nul_byte_in_argument() {
    let err = Command::new("true").arg("nul\0byte").spawn().unwrap_err();
    assert!(matches!(err, SpawnError::Backend(_)), "{err:?}");
}
