//! Run arbitrary executables through kommand.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueHint};
use kommand::process::{Command, Stdio};

#[derive(Parser)]
#[clap(author, about)]
struct Cli {
    /// Working directory of the command.
    #[clap(short = 'C', long, value_name = "PATH", value_hint = ValueHint::DirPath)]
    cwd: Option<PathBuf>,

    /// Environment overrides.
    #[clap(short = 'e', long = "env", value_name = "KEY=VALUE")]
    envs: Vec<String>,

    /// Start from an empty environment.
    #[clap(long)]
    env_clear: bool,

    /// Collect all output and print a summary once the command exits.
    #[clap(short = 'c', long, conflicts_with = "number")]
    capture: bool,

    /// Prefix every stdout line with its line number.
    #[clap(short = 'n', long)]
    number: bool,

    /// Command to be executed.
    cmd: String,

    /// Arguments for the command.
    #[clap(allow_hyphen_values = true, multiple_values = true)]
    args: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut command = Command::new(&cli.cmd);
    command.args(&cli.args);

    if cli.env_clear {
        command.env_clear();
    }

    for var in &cli.envs {
        match var.split_once('=') {
            Some((key, value)) => command.env(key, value),
            None => command.env_remove(var),
        };
    }

    if let Some(cwd) = &cli.cwd {
        command.current_dir(cwd);
    }

    let status = if cli.capture {
        let output = command.output()?;

        io::stdout().write_all(&output.stdout)?;
        eprintln!("{} bytes of stdout", output.stdout.len());
        eprintln!("{} bytes of stderr", output.stderr.len());

        output.status
    } else if cli.number {
        let mut child = command.stdout(Stdio::piped()).spawn()?;

        let stdout = child.take_stdout().ok_or("missing stdout pipe")?;
        for (i, line) in stdout.into_lines().enumerate() {
            println!("{:>6}  {}", i + 1, line?);
        }

        child.wait()?
    } else {
        command.status()?
    };

    // Wait for the command to exit.
    process::exit(status.code().unwrap_or(111));
}
