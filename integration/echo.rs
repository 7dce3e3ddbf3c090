use kommand::process::Stdio;

use crate::script;

pub fn run() {
    let mut child = script("echo").stdin(Stdio::piped()).stdout(Stdio::piped()).spawn().unwrap();

    // Round-trip a single line.
    let stdin = child.stdin().unwrap();
    stdin.write_line("Hello, Kommand!").unwrap();
    stdin.flush().unwrap();
    let line = child.stdout().unwrap().read_line().unwrap();
    assert_eq!(line.as_deref(), Some("Hello, Kommand!"));

    // Output ends once stdin is closed.
    child.stdin().unwrap().close().unwrap();
    assert!(child.stdin().is_none());
    assert_eq!(child.stdout().unwrap().read_line().unwrap(), None);

    let status = child.wait().unwrap();
    assert!(status.success());
}
