use kommand::process::Stdio;

use crate::script;

/// Far more than any OS pipe buffer.
const FLOOD_SIZE: usize = 4 << 20;

pub fn run() {
    let mut child = script("flood")
        .arg(FLOOD_SIZE.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout.len(), FLOOD_SIZE);
    assert_eq!(output.stderr.len(), FLOOD_SIZE);
    assert!(output.stdout.iter().chain(&output.stderr).all(|byte| *byte == b'x'));
}
