//! Shell command execution for scheduler interactions.

use anyhow::{Context, Result};
use log::trace;
use std::process::Command;

/// Captured result of a finished scheduler command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs scheduler commands. The trait is the seam that lets tests drive the
/// submit and status logic with scripted output instead of a live scheduler.
pub trait CommandRunner {
    /// Run `command` to completion and capture its exit code and streams.
    /// An `Err` means the command could not be run at all; a non-zero exit
    /// code is reported through [`CommandOutput::status`].
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands through `sh -c`, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        trace!("Running command: {}", command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .with_context(|| format!("failed to run: {}", command))?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
