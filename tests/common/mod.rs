//! Shared test helpers: a scripted command runner and config presets.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use uge_profile::config::ProfileConfig;
use uge_profile::uge::{CommandOutput, CommandRunner};

pub enum Response {
    Output(CommandOutput),
    SpawnFailure(String),
}

/// Replays scripted responses in order and records every command it was
/// asked to run.
pub struct ScriptedRunner {
    responses: RefCell<VecDeque<Response>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Handle onto the recorded command list, usable after the runner has
    /// been moved into a checker or submitter.
    pub fn calls(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(command.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnFailure(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left for {:?}", command)),
        }
    }
}

pub fn output(status: i32, stdout: &str, stderr: &str) -> Response {
    Response::Output(CommandOutput {
        status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

pub fn spawn_failure(message: &str) -> Response {
    Response::SpawnFailure(message.to_string())
}

/// Config preset with all waits zeroed so the retry loops run instantly.
pub fn test_config(max_status_checks: u32) -> ProfileConfig {
    ProfileConfig {
        max_status_checks,
        wait_between_tries_secs: 0.0,
        latency_wait_secs: 0,
        ..ProfileConfig::default()
    }
}
