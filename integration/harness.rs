use std::collections::BTreeMap;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use kommand::process::{Child, Command, Stdio};
use serde::{Deserialize, Serialize};

test_mods! {
    mod close_stream;
    mod consumed;
    mod cwd;
    mod echo;
    mod echo_many;
    mod environment;
    mod error_echo;
    mod exit_code;
    mod flood;
    mod inherit_null;
    mod interval;
    mod interval_output;
    mod kill;
    mod lines_exact;
    mod mixed_rejected;
    mod not_found;
    mod spawn_many;
}

/// Integration test directory.
const TEST_DIR: &str = "integration";

/// Argument switching the harness into scripted child mode.
const CHILD_ARG: &str = "child";

/// Snapshot of the child's process state, printed by the `report` mode.
#[derive(Serialize, Deserialize, Debug)]
pub struct Report {
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

fn main() {
    let mut args = env::args().skip(1);

    // Get test name or spawn all the tests.
    let test_name = match args.next() {
        Some(test_name) => test_name,
        None => {
            spawn_tests();
            return;
        },
    };

    // Act as the program under test.
    if test_name == CHILD_ARG {
        let mode = args.next().expect("missing child mode");
        run_child(&mode, args.collect());
        return;
    }

    // Find test matching the name.
    match TESTS.iter().find(|(cmd, _)| cmd == &test_name) {
        Some((_, test)) => test(),
        None => unreachable!("invalid test module name: {test_name:?}"),
    }
}

/// Reexecute binary to launch tests as separate processes.
fn spawn_tests() {
    eprintln!("\nrunning {} tests", TESTS.len());

    // Spawn child processes for all tests.
    let current_exe = env::current_exe().unwrap();
    let children: Vec<(&str, Child)> = TESTS
        .iter()
        .map(|(cmd, _)| {
            let child =
                Command::new(&current_exe).arg(cmd).stderr(Stdio::piped()).spawn().unwrap();
            (*cmd, child)
        })
        .collect();

    // Check results for each test.
    let mut passed = 0;
    for (name, mut child) in children {
        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(err) => {
                eprintln!("test {TEST_DIR}/{name}.rs ... \x1b[31mHARNESS FAILURE\x1b[0m: {err}");
                continue;
            },
        };

        // Report individual test results.
        if !output.status.success() {
            eprintln!("test {TEST_DIR}/{name}.rs ... \x1b[31mFAILED\x1b[0m");

            // Print stderr on failure if there is some.
            let stderr = output.stderr_text();
            if !stderr.is_empty() {
                eprintln!("\n---- {TEST_DIR}/{name}.rs stderr ----\n{}\n", stderr.trim());
            }
        } else {
            eprintln!("test {TEST_DIR}/{name}.rs ... \x1b[32mok\x1b[0m");
            passed += 1;
        }
    }

    // Print total results.
    let failed = TESTS.len() - passed;
    if failed > 0 {
        eprintln!("\ntest result: \x1b[31mFAILED\x1b[0m. {} passed; {} failed", passed, failed);
        eprintln!();
        process::exit(1);
    }

    eprintln!("\ntest result: \x1b[32mok\x1b[0m. {} passed; {} failed", passed, failed);
    eprintln!();
}

/// Command running this binary as a scripted child in `mode`.
pub fn script(mode: &str) -> Command {
    let mut command = Command::new(env::current_exe().unwrap());
    command.args([CHILD_ARG, mode]);
    command
}

/// Scripted child behaviors.
///
/// | mode       | behavior                                             |
/// |------------|------------------------------------------------------|
/// | `echo`     | copy stdin lines to stdout until end-of-input        |
/// | `error`    | copy stdin lines to stderr until end-of-input        |
/// | `interval` | print `0..n` one line at a time, `ms` apart          |
/// | `flood`    | write `bytes` to both stdout and stderr, interleaved |
/// | `report`   | print a JSON [`Report`]                              |
/// | `print`    | print every argument on its own line                 |
/// | `exit`     | exit with the given code                             |
/// | `sleep`    | sleep for a minute                                   |
fn run_child(mode: &str, args: Vec<String>) {
    let number = |index: usize, default: u64| {
        args.get(index).map_or(default, |arg| arg.parse().expect("invalid number"))
    };

    match mode {
        "echo" => copy_lines(io::stdout()),
        "error" => copy_lines(io::stderr()),
        "interval" => {
            let count = number(0, 5);
            let delay = Duration::from_millis(number(1, 100));

            let mut stdout = io::stdout();
            for i in 0..count {
                writeln!(stdout, "{i}").unwrap();
                stdout.flush().unwrap();
                thread::sleep(delay);
            }
        },
        "flood" => {
            let mut remaining = number(0, 1 << 20) as usize;
            let chunk = [b'x'; 8192];

            let mut stdout = io::stdout();
            let mut stderr = io::stderr();
            while remaining > 0 {
                let len = remaining.min(chunk.len());
                stdout.write_all(&chunk[..len]).unwrap();
                stderr.write_all(&chunk[..len]).unwrap();
                remaining -= len;
            }
            stdout.flush().unwrap();
        },
        "report" => {
            let report = Report {
                args: args.clone(),
                cwd: env::current_dir().unwrap(),
                env: env::vars().collect(),
            };
            println!("{}", serde_json::to_string(&report).unwrap());
        },
        "print" => {
            let mut stdout = io::stdout();
            for arg in &args {
                writeln!(stdout, "{arg}").unwrap();
            }
            stdout.flush().unwrap();
        },
        "exit" => process::exit(number(0, 0) as i32),
        "sleep" => thread::sleep(Duration::from_secs(60)),
        _ => unreachable!("invalid child mode: {mode:?}"),
    }
}

/// Copy stdin to `output` line by line, flushing after every line.
fn copy_lines<W: Write>(mut output: W) {
    for line in io::stdin().lock().lines() {
        writeln!(output, "{}", line.unwrap()).unwrap();
        output.flush().unwrap();
    }
}

#[macro_export]
macro_rules! test_mods {
    ($($(#[$cfg:meta])? mod $mod:ident);*;) => {
        $(
            $( #[$cfg] )?
            mod $mod;
        )*

        const TESTS: &[(&str, fn())] = &[$(
            $( #[$cfg] )?
            (stringify!($mod), $mod :: run),
        )*];
    };
}
