use kommand::error::SpawnError;
use kommand::process::{Command, Stdio};

pub fn run() {
    let result = Command::new("kommand-missing-program").stdout(Stdio::piped()).spawn();
    match result {
        Err(SpawnError::NotFound { program }) => {
            assert_eq!(program.to_str(), Some("kommand-missing-program"));
        },
        other => panic!("expected missing program, got {other:?}"),
    }

    // Nor does the umbrella helper.
    let err = Command::new("kommand-missing-program").output().unwrap_err();
    assert!(matches!(err, kommand::Error::Spawn(SpawnError::NotFound { .. })));
}
