//! Process builder.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::error::{Result, SpawnError};
use crate::process::{spawn, Child, Output};

/// Description of a program to run.
///
/// `Command::new(program)` starts with no arguments, the parent's
/// environment and working directory, and inherited standard streams. The
/// builder methods adjust that before [`spawn`](Self::spawn), and one command
/// can be spawned any number of times:
///
/// ```no_run
/// use kommand::process::{Command, Stdio};
///
/// let mut command = Command::new("sh");
/// command.arg("-c").arg("echo hello").stdout(Stdio::piped());
///
/// let first = command.spawn().unwrap();
/// let second = command.spawn().unwrap();
/// ```
///
/// Building a command never touches the OS; missing programs and invalid
/// directories are only reported by [`spawn`](Self::spawn).
#[derive(Clone, Debug)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, Option<OsString>)>,
    env_clear: bool,
    current_dir: Option<PathBuf>,
    pub(crate) stdin: Stdio,
    pub(crate) stdout: Stdio,
    pub(crate) stderr: Stdio,
}

impl Command {
    /// Create a command running `program`.
    ///
    /// A bare name without a path separator is looked up in the `PATH` the
    /// child will see.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: Vec::new(),
            env_clear: false,
            current_dir: None,
            stdin: Stdio::default(),
            stdout: Stdio::default(),
            stderr: Stdio::default(),
        }
    }

    /// Append one argument.
    ///
    /// The argument reaches the program literally. No shell is involved, so
    /// quotes and globs have no special meaning.
    ///
    /// ```
    /// use kommand::process::Command;
    ///
    /// let mut command = Command::new("grep");
    /// command.arg("-n").arg("needle with spaces");
    /// assert_eq!(command.get_args().len(), 2);
    /// ```
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Append every argument of `args`, in order.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Sets an environment variable for the child.
    ///
    /// Setting the same variable again replaces the earlier value.
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.set_env(key.as_ref(), Some(val.as_ref()));
        self
    }

    /// Sets multiple environment variables for the child.
    pub fn envs<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        for (key, val) in vars {
            self.env(key, val);
        }
        self
    }

    /// Hides a variable of the parent environment from the child.
    pub fn env_remove<K: AsRef<OsStr>>(&mut self, key: K) -> &mut Self {
        self.set_env(key.as_ref(), None);
        self
    }

    /// Starts the child from an empty environment.
    ///
    /// Variables set afterwards are still passed on.
    pub fn env_clear(&mut self) -> &mut Self {
        self.env.clear();
        self.env_clear = true;
        self
    }

    /// Run the child in `dir`.
    ///
    /// A relative program path containing a separator is resolved by the OS,
    /// which on Unix happens after changing into `dir`. Use an absolute
    /// program path to avoid ambiguity.
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Alias for [`current_dir`](Self::current_dir).
    pub fn cwd<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir(dir)
    }

    /// Connect the child's stdin, inherited unless set.
    pub fn stdin<T: Into<Stdio>>(&mut self, cfg: T) -> &mut Self {
        self.stdin = cfg.into();
        self
    }

    /// Connect the child's stdout, inherited unless set.
    pub fn stdout<T: Into<Stdio>>(&mut self, cfg: T) -> &mut Self {
        self.stdout = cfg.into();
        self
    }

    /// Connect the child's stderr, inherited unless set.
    pub fn stderr<T: Into<Stdio>>(&mut self, cfg: T) -> &mut Self {
        self.stderr = cfg.into();
        self
    }

    /// Launch the program as a new child process.
    ///
    /// The command itself is left unchanged and can be spawned again.
    pub fn spawn(&self) -> Result<Child, SpawnError> {
        spawn::spawn(self)
    }

    /// Run the program to completion and collect its output.
    ///
    /// Stdout and stderr are always piped for this call. An inherited stdin
    /// is replaced by the null device, a piped stdin is closed right away.
    pub fn output(&self) -> Result<Output> {
        let mut command = self.clone();
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        if command.stdin == Stdio::inherit() {
            command.stdin(Stdio::null());
        }
        let output = command.spawn()?.wait_with_output()?;
        Ok(output)
    }

    /// Run the program to completion and return its exit status.
    pub fn status(&self) -> Result<ExitStatus> {
        let status = self.spawn()?.wait()?;
        Ok(status)
    }

    /// Program as passed to [`Command::new`], before any `PATH` lookup.
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments after the program name.
    pub fn get_args(&self) -> impl ExactSizeIterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    /// Explicit environment changes, with `None` marking a removal.
    pub fn get_envs(&self) -> impl Iterator<Item = (&OsStr, Option<&OsStr>)> {
        self.env.iter().map(|(key, val)| (key.as_os_str(), val.as_deref()))
    }

    /// Working directory of the child, `None` to keep the parent's.
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Complete environment of the child.
    pub(crate) fn capture_env(&self) -> Vec<(OsString, OsString)> {
        let mut vars: Vec<(OsString, OsString)> =
            if self.env_clear { Vec::new() } else { env::vars_os().collect() };

        for (key, val) in &self.env {
            vars.retain(|(existing, _)| !same_key(existing, key));
            if let Some(val) = val {
                vars.push((key.clone(), val.clone()));
            }
        }

        vars
    }

    fn set_env(&mut self, key: &OsStr, val: Option<&OsStr>) {
        let val = val.map(OsStr::to_os_string);
        match self.env.iter_mut().find(|(existing, _)| same_key(existing, key)) {
            Some((_, existing)) => *existing = val,
            None => self.env.push((key.to_os_string(), val)),
        }
    }
}

/// Value of `PATH` in a captured environment.
pub(crate) fn path_var(vars: &[(OsString, OsString)]) -> Option<&OsStr> {
    vars.iter().find(|(key, _)| same_key(key, OsStr::new("PATH"))).map(|(_, val)| val.as_os_str())
}

/// Environment variable names are case-insensitive on Windows.
#[cfg(windows)]
fn same_key(a: &OsStr, b: &OsStr) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(not(windows))]
fn same_key(a: &OsStr, b: &OsStr) -> bool {
    a == b
}

/// What one of the child's standard streams is connected to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stdio {
    pub(crate) ty: StdioType,
}

impl Stdio {
    /// Connect the stream to a fresh pipe.
    ///
    /// The parent end is available through [`Child::stdin`], [`Child::stdout`]
    /// or [`Child::stderr`].
    ///
    /// ```no_run
    /// use kommand::process::{Command, Stdio};
    ///
    /// let mut child = Command::new("rev")
    ///     .stdin(Stdio::piped())
    ///     .stdout(Stdio::piped())
    ///     .spawn()
    ///     .expect("failed to spawn child process");
    ///
    /// child.stdin().unwrap().write_line("Hello, world!").unwrap();
    ///
    /// let output = child.wait_with_output().unwrap();
    /// assert_eq!(output.stdout_text(), "!dlrow ,olleH\n");
    /// ```
    ///
    /// [`Child::wait_with_output`] drains the output pipes before it flushes
    /// and closes stdin, so buffered input of any size is safe there. Writing
    /// large inputs directly through [`Child::stdin`] can still block while
    /// the child waits for its stdout to be read.
    pub fn piped() -> Self {
        Self { ty: StdioType::Piped }
    }

    /// Share the parent's stream.
    pub fn inherit() -> Self {
        Self { ty: StdioType::Inherit }
    }

    /// Connect the stream to the null device.
    pub fn null() -> Self {
        Self { ty: StdioType::Null }
    }
}

impl Default for Stdio {
    fn default() -> Self {
        Self::inherit()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StdioType {
    Piped,
    Inherit,
    Null,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_env_wins() {
        let mut command = Command::new("true");
        command.env_clear().env("KEY", "first").env("OTHER", "x").env("KEY", "second");

        let vars = command.capture_env();
        assert_eq!(vars.len(), 2);
        assert!(vars.contains(&("KEY".into(), "second".into())));
    }

    #[test]
    fn env_remove_masks_parent() {
        let (key, _) = env::vars_os().next().expect("empty test environment");

        let mut command = Command::new("true");
        command.env_remove(&key);

        let vars = command.capture_env();
        assert!(vars.iter().all(|(existing, _)| existing != &key));
    }

    #[test]
    fn clear_drops_earlier_overrides() {
        let mut command = Command::new("true");
        command.env("BEFORE", "1").env_clear().env("AFTER", "2");

        assert_eq!(command.capture_env(), vec![("AFTER".into(), "2".into())]);
        assert_eq!(path_var(&command.capture_env()), None);
    }

    #[test]
    fn builder_is_reusable() {
        let mut command = Command::new("prog");
        command.args(["a", "b"]).cwd("/tmp").stdout(Stdio::piped());
        let copy = command.clone();

        assert_eq!(copy.get_args().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(copy.get_current_dir(), Some(Path::new("/tmp")));
        assert_eq!(copy.stdout, Stdio::piped());
        assert_eq!(copy.stdin, Stdio::inherit());
    }
}
