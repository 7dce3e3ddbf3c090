use kommand::process::Stdio;

use crate::script;

pub fn run() {
    // One builder serves every spawn.
    let mut command = script("echo");
    command.stdin(Stdio::piped()).stdout(Stdio::piped());

    for i in 0..1000 {
        let mut child = command.spawn().unwrap();

        let line = format!("spawn {i}");
        let stdin = child.stdin().unwrap();
        stdin.write_line(&line).unwrap();
        stdin.flush().unwrap();
        assert_eq!(child.stdout().unwrap().read_line().unwrap(), Some(line));

        child.stdin().unwrap().close().unwrap();
        assert!(child.wait().unwrap().success());
    }
}
