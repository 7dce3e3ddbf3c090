use crate::script;

pub fn run() {
    let status = script("exit").arg("3").status().unwrap();
    assert!(!status.success());
    assert_eq!(status.code(), Some(3));

    let status = script("exit").status().unwrap();
    assert!(status.success());
    assert_eq!(status.code(), Some(0));

    // Exit codes also reach `try_wait`.
    let mut child = script("exit").arg("7").spawn().unwrap();
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    };
    assert_eq!(status.code(), Some(7));
}
