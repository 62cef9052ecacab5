use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output};

/// Subprocess invocation with an explicit argument vector, working
/// directory, and environment additions. Never goes through a shell.
#[derive(Debug, Clone)]
pub struct Cmd {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        assert!(!argv.is_empty(), "subprocess argv must not be empty");
        Self {
            argv,
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Runs with inherited stdio; errors on a nonzero exit.
    pub fn run(&self) -> Result<()> {
        let status = self
            .command()
            .status()
            .with_context(|| format!("failed to execute `{}`", self.display()))?;
        if !status.success() {
            bail!("`{}` exited with {}", self.display(), describe(status));
        }
        Ok(())
    }

    /// Runs with captured output, discarding it on success. With
    /// `check = false` a nonzero exit is tolerated; otherwise the captured
    /// stderr is folded into the error.
    pub fn run_silent(&self, check: bool) -> Result<()> {
        let output = self.output()?;
        if check && !output.status.success() {
            bail!(
                "`{}` exited with {}: {}",
                self.display(),
                describe(output.status),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// Runs with captured output and returns stdout; errors on a nonzero
    /// exit with the captured stderr included.
    pub fn read(&self) -> Result<String> {
        let output = self.output()?;
        if !output.status.success() {
            bail!(
                "`{}` exited with {}: {}",
                self.display(),
                describe(output.status),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Runs with captured output and returns it verbatim, leaving exit-status
    /// interpretation to the caller.
    pub fn output(&self) -> Result<Output> {
        self.command()
            .output()
            .with_context(|| format!("failed to execute `{}`", self.display()))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.argv[0]);
        command.args(&self.argv[1..]);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }

    fn display(&self) -> String {
        self.argv.join(" ")
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}
