//! Tiered status resolution for submitted jobs.
//!
//! The scheduler offers no single reliable answer to "what happened to job
//! N". `qstat` is fresh but flaky under load and forgets finished jobs;
//! `qacct` is authoritative for finished jobs but lags behind and knows
//! nothing about jobs that never started; the job's own output log depends
//! on neither. [`StatusChecker::get_status`] walks those three tiers in
//! order and always ends with a concrete verdict.

use anyhow::{Result, anyhow};
use log::{info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::{LogStatusPolicy, ProfileConfig};
use crate::uge::command::{CommandRunner, ShellCommandRunner};

/// Coarse job state reported back to the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Success,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Translate a raw scheduler status token. `r`/`x`/`t`/`s`/`R`/`qw` are the
/// live states `qstat` reports for a healthy job; `d` and `E` are deletion
/// and error states; `SUCCESS`/`FAIL` are synthesized from accounting
/// output.
fn map_status(token: &str) -> Option<JobStatus> {
    match token {
        "r" | "x" | "t" | "s" | "R" | "qw" => Some(JobStatus::Running),
        "d" | "E" => Some(JobStatus::Failed),
        "FAIL" => Some(JobStatus::Failed),
        "SUCCESS" => Some(JobStatus::Success),
        _ => None,
    }
}

/// Outcome of one live-query attempt.
enum Probe {
    /// The scheduler reported a state the status table knows.
    Verdict(JobStatus),
    /// The scheduler no longer tracks the job; accounting has the answer.
    Vanished,
    /// Transient failure or unparseable output; worth another attempt.
    Retry(String),
}

/// Resolves the status of a single job. Stateless across invocations: it
/// holds only the job id, the log path the submitter derived, and the
/// config-supplied tunables.
pub struct StatusChecker<R = ShellCommandRunner> {
    job_id: u64,
    outlog: PathBuf,
    config: ProfileConfig,
    runner: R,
}

impl StatusChecker<ShellCommandRunner> {
    pub fn new(job_id: u64, outlog: PathBuf, config: ProfileConfig) -> Self {
        Self::with_runner(job_id, outlog, config, ShellCommandRunner)
    }
}

impl<R: CommandRunner> StatusChecker<R> {
    pub fn with_runner(job_id: u64, outlog: PathBuf, config: ProfileConfig, runner: R) -> Self {
        Self {
            job_id,
            outlog,
            config,
            runner,
        }
    }

    /// Resolve the job to `running`, `success`, or `failed`.
    ///
    /// Tier 1 polls `qstat` up to `max_status_checks` times, sleeping
    /// `wait_between_tries_secs` after each miss. Tier 2 waits out the
    /// accounting latency and asks `qacct` once. Tier 3 reads the tail of
    /// the job's output log and defaults to `running`. Only the
    /// `on_unknown_log_status = "error"` policy can make this return an
    /// error; every other failure mode demotes to the next tier.
    pub fn get_status(&self) -> Result<JobStatus> {
        let mut verdict = None;
        let mut vanished = false;

        for attempt in 1..=self.config.max_status_checks {
            match self.probe_qstat() {
                Probe::Verdict(status) => {
                    verdict = Some(status);
                    break;
                }
                Probe::Vanished => {
                    vanished = true;
                    break;
                }
                Probe::Retry(reason) => {
                    if self.config.log_status_checks {
                        warn!(
                            "qstat attempt {}/{} for job {} failed: {}",
                            attempt, self.config.max_status_checks, self.job_id, reason
                        );
                    }
                    self.sleep_between_tries();
                }
            }
        }

        if verdict.is_none() {
            if self.config.log_status_checks {
                if vanished {
                    info!(
                        "Job {} is gone from the live queue, checking qacct",
                        self.job_id
                    );
                } else {
                    warn!(
                        "qstat failed {} times for job {}, checking qacct",
                        self.config.max_status_checks, self.job_id
                    );
                }
            }
            // Accounting records trail live status; give them time to land.
            thread::sleep(Duration::from_secs(self.config.latency_wait_secs));

            match self.probe_qacct() {
                Ok(status) => verdict = Some(status),
                Err(reason) => {
                    if self.config.log_status_checks {
                        warn!(
                            "qacct gave no verdict for job {}: {}; falling back to the job log",
                            self.job_id, reason
                        );
                    }
                }
            }
        }

        match verdict {
            Some(status) => Ok(status),
            None => self.status_from_log(),
        }
    }

    fn probe_qstat(&self) -> Probe {
        let command = format!("qstat -j {}", self.job_id);
        let output = match self.runner.run(&command) {
            Ok(output) => output,
            Err(err) => return Probe::Retry(format!("qstat did not run: {}", err)),
        };

        if !output.success() {
            if output.stderr.starts_with("Following jobs do not exist") {
                return Probe::Vanished;
            }
            return Probe::Retry(format!(
                "qstat exited with status {}: {}",
                output.status,
                output.stderr.trim_end()
            ));
        }
        if output.stdout.is_empty() {
            return Probe::Retry("qstat produced no output".to_string());
        }

        let token = qstat_job_state(&output.stdout);
        match map_status(&token) {
            Some(status) => Probe::Verdict(status),
            None => Probe::Retry(format!("unknown job state {:?}", token)),
        }
    }

    /// One-shot accounting query. `Err` carries the reason the result was
    /// discarded; the caller logs it and moves on.
    fn probe_qacct(&self) -> Result<JobStatus, String> {
        let command = format!("qacct -j {}", self.job_id);
        let output = self
            .runner
            .run(&command)
            .map_err(|err| format!("qacct did not run: {}", err))?;

        if !output.success() {
            return Err(format!(
                "qacct exited with status {}: {}",
                output.status,
                output.stderr.trim_end()
            ));
        }
        if output.stdout.is_empty() {
            return Err("qacct produced no output".to_string());
        }

        let token = qacct_job_state(&output.stdout)
            .ok_or_else(|| "qacct output carried no failed/exit_status lines".to_string())?;
        map_status(token).ok_or_else(|| format!("unknown accounting state {:?}", token))
    }

    /// Last-resort heuristic over the job's own output log. Total under the
    /// default policy: anything unreadable or unrecognized reads as an
    /// in-flight job.
    fn status_from_log(&self) -> Result<JobStatus> {
        if self.config.log_status_checks {
            info!(
                "Checking {} for the exit status of job {}",
                self.outlog.display(),
                self.job_id
            );
        }

        let Some(last_line) = read_last_line(&self.outlog) else {
            // A job that has not started writing yet has no log.
            return Ok(JobStatus::Running);
        };
        let line = last_line.trim();
        let Some(rest) = line.strip_prefix("EXIT_STATUS") else {
            return Ok(JobStatus::Running);
        };

        match rest.trim_start_matches(':').trim() {
            "0" => Ok(JobStatus::Success),
            "1" => Ok(JobStatus::Failed),
            other => match self.config.on_unknown_log_status {
                LogStatusPolicy::AssumeRunning => Ok(JobStatus::Running),
                LogStatusPolicy::Error => Err(anyhow!(
                    "unrecognized exit status {:?} in {}",
                    other,
                    self.outlog.display()
                )),
            },
        }
    }

    fn sleep_between_tries(&self) {
        let wait = Duration::try_from_secs_f64(self.config.wait_between_tries_secs)
            .unwrap_or_default();
        thread::sleep(wait);
    }
}

/// Extract the raw state token from `qstat -j` output: the last two
/// characters of the trimmed `job_state` line, trimmed again. Two
/// characters cover the widest token (`qw`); the trim drops the padding
/// around single-letter states.
fn qstat_job_state(output: &str) -> String {
    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("job_state") {
            let chars: Vec<char> = line.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(2)..].iter().collect();
            return tail.trim().to_string();
        }
    }
    String::new()
}

/// Synthesize an accounting token from `qacct -j` output: `SUCCESS` when
/// both the `failed` and `exit_status` lines end in `0`, `FAIL` for any
/// other observed pair, `None` when neither line is present.
fn qacct_job_state(output: &str) -> Option<&'static str> {
    let mut failed = None;
    let mut exit_status = None;
    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("failed") {
            failed = line.chars().last();
        } else if line.starts_with("exit_status") {
            exit_status = line.chars().last();
        }
        if failed.is_some() && exit_status.is_some() {
            break;
        }
    }
    if failed.is_none() && exit_status.is_none() {
        return None;
    }
    if failed == Some('0') && exit_status == Some('0') {
        Some("SUCCESS")
    } else {
        Some("FAIL")
    }
}

/// Last line of the log file, or `None` when the file is missing,
/// unreadable, or empty.
fn read_last_line(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    contents.lines().last().map(str::to_string)
}
