//! Helpers for running the `docintake` binary

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// CLI invocation builder pinned to one config file
pub struct DocintakeCommand {
    working_dir: PathBuf,
    config: PathBuf,
    args: Vec<String>,
}

impl DocintakeCommand {
    pub fn new(working_dir: impl AsRef<Path>, config: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            config: config.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn execute(&self) -> Result<CommandResult> {
        let output = Command::new(env!("CARGO_BIN_EXE_docintake"))
            .arg("--config")
            .arg(&self.config)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env_remove("DOCINTAKE_CONFIG")
            .output()
            .context("Failed to execute docintake")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// `docintake!(dir, config, "config", "get", "worker.threads")`
#[macro_export]
macro_rules! docintake {
    ($dir:expr, $config:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::DocintakeCommand::new($dir, $config);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
