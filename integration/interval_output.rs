use kommand::process::Stdio;

use crate::script;

pub fn run() {
    let mut child = script("interval").stdout(Stdio::piped()).spawn().unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout_text(), "0\n1\n2\n3\n4\n");
    assert!(output.stderr.is_empty());
}
