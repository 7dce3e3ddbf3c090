use std::time::{Duration, Instant};

use kommand::error::SignalError;
use kommand::process::SignalKind;

use crate::script;

pub fn run() {
    let started = Instant::now();

    let mut child = script("sleep").spawn().unwrap();
    assert!(child.try_wait().unwrap().is_none());

    child.kill().unwrap();
    let status = child.wait().unwrap();
    assert!(!status.success());
    assert!(started.elapsed() < Duration::from_secs(30));

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }

    // Reaped processes can no longer be signaled.
    assert!(matches!(child.kill(), Err(SignalError::ProcessExited)));

    let mut child = script("sleep").spawn().unwrap();
    child.signal(SignalKind::Terminate).unwrap();
    let status = child.wait().unwrap();
    assert!(!status.success());

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }
}
