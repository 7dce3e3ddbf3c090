use kommand::process::Stdio;

use crate::script;

pub fn run() {
    let mut child = script("error")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    assert!(child.stdout().is_none());

    let stdin = child.stdin().unwrap();
    stdin.write_line("Hello, Kommand!").unwrap();
    stdin.flush().unwrap();
    let line = child.stderr().unwrap().read_line().unwrap();
    assert_eq!(line.as_deref(), Some("Hello, Kommand!"));

    child.stdin().unwrap().close().unwrap();
    assert!(child.wait().unwrap().success());
}
