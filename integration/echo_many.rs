use kommand::process::Stdio;

use crate::script;

pub fn run() {
    let mut child = script("echo").stdin(Stdio::piped()).stdout(Stdio::piped()).spawn().unwrap();

    // Every single line comes back in order.
    for i in 1..=1000 {
        let line = format!("line {i}");
        let stdin = child.stdin().unwrap();
        stdin.write_line(&line).unwrap();
        stdin.flush().unwrap();

        let echoed = child.stdout().unwrap().read_line().unwrap();
        assert_eq!(echoed, Some(line));
    }

    child.stdin().unwrap().close().unwrap();
    assert!(child.wait().unwrap().success());
}
