use kommand::process::Stdio;

use crate::script;

/// Read `lines` back through a child and check nothing is lost or added.
fn check(lines: &[&str]) {
    let mut child = script("print").args(lines).stdout(Stdio::piped()).spawn().unwrap();

    let mut received = Vec::new();
    let stdout = child.stdout().unwrap();
    while let Some(line) = stdout.read_line().unwrap() {
        received.push(line);
    }
    assert_eq!(received, lines);

    // End-of-stream is sticky.
    assert_eq!(child.stdout().unwrap().read_line().unwrap(), None);

    assert!(child.wait().unwrap().success());
}

pub fn run() {
    check(&[]);
    check(&[""]);
    check(&["single"]);
    check(&["first", "", "third"]);

    let many: Vec<String> = (0..500).map(|i| format!("line {i}")).collect();
    let many: Vec<&str> = many.iter().map(String::as_str).collect();
    check(&many);

    // The iterator sees the same lines.
    let mut child = script("print").args(["a", "b"]).stdout(Stdio::piped()).spawn().unwrap();
    let lines: Vec<String> = child.stdout().unwrap().lines().map(Result::unwrap).collect();
    assert_eq!(lines, ["a", "b"]);
    child.wait().unwrap();
}
