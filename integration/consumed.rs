use kommand::error::{SignalError, WaitError};
use kommand::process::Stdio;

use crate::script;

pub fn run() {
    let mut child = script("print").arg("done").stdout(Stdio::piped()).spawn().unwrap();
    let pid = child.id();

    let output = child.wait_with_output().unwrap();
    assert_eq!(output.stdout_text(), "done\n");

    // Every further terminal operation is rejected.
    let err = child.wait_with_output().unwrap_err();
    assert!(matches!(err, WaitError::ChildAlreadyConsumed));
    assert_eq!(err.to_string(), "child has been consumed");
    assert!(matches!(child.wait(), Err(WaitError::ChildAlreadyConsumed)));
    assert!(matches!(child.try_wait(), Err(WaitError::ChildAlreadyConsumed)));
    assert!(matches!(child.kill(), Err(SignalError::ProcessExited)));

    // The identifier survives consumption.
    assert_eq!(child.id(), pid);

    // A plain wait consumes too.
    let mut child = script("exit").spawn().unwrap();
    assert!(child.wait().unwrap().success());
    assert!(matches!(child.wait_with_output(), Err(WaitError::ChildAlreadyConsumed)));
}
