use kommand::process::Stdio;

use crate::script;

pub fn run() {
    let mut child = script("interval").stdout(Stdio::piped()).spawn().unwrap();

    // Lines arrive while the child is still writing.
    let mut received = Vec::new();
    while let Some(line) = child.stdout().unwrap().read_line().unwrap() {
        received.push(line);
    }
    assert_eq!(received, ["0", "1", "2", "3", "4"]);

    assert!(child.wait().unwrap().success());

    // Line iterator over a taken reader.
    let mut child = script("interval").args(["3", "10"]).stdout(Stdio::piped()).spawn().unwrap();
    let lines: Vec<_> = child.take_stdout().unwrap().into_lines().map(Result::unwrap).collect();
    assert_eq!(lines, ["0", "1", "2"]);
    assert!(child.stdout().is_none());

    assert!(child.wait().unwrap().success());
}
