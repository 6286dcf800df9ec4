//! `qsub` command synthesis and job submission.
//!
//! The [`Submitter`] derives everything the scheduler needs (resource
//! clauses, log paths, job name, queue) from the job script's embedded
//! properties plus the profile configuration, runs the resulting command,
//! and extracts the scheduler-assigned job id from its output. The derived
//! log paths are pure functions of the metadata, so the status tool can be
//! pointed at the same file later.

use anyhow::{Context, Result, anyhow};
use log::debug;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ProfileConfig;
use crate::uge::command::{CommandRunner, ShellCommandRunner};
use crate::uge::job_properties::{self, JobProperties};
use crate::uge::rule_params::RuleParams;

/// Fatal submission failures, surfaced to the CLI as a non-zero exit.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// `qsub` could not be run, or exited abnormally
    #[error("qsub invocation failed: {source}")]
    Invocation {
        #[source]
        source: anyhow::Error,
    },

    /// `qsub` ran but its output carried no job id
    #[error("no job id found in qsub output: {output:?}")]
    JobIdNotFound { output: String },
}

/// What a successful submission hands back to the workflow engine. The
/// status tool is later invoked with exactly this pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: u64,
    pub outlog: PathBuf,
}

/// Builds and runs the submission command for one job script.
pub struct Submitter<R = ShellCommandRunner> {
    jobscript: PathBuf,
    cluster_cmds: Vec<String>,
    properties: JobProperties,
    config: ProfileConfig,
    rule_params: RuleParams,
    jobid_regex: Regex,
    runner: R,
}

impl Submitter<ShellCommandRunner> {
    /// Read the job script's properties and prepare a submitter that runs
    /// the real `qsub`.
    pub fn from_jobscript(
        jobscript: PathBuf,
        cluster_cmds: Vec<String>,
        config: ProfileConfig,
        rule_params: RuleParams,
    ) -> Result<Self> {
        let properties = JobProperties::from_jobscript(&jobscript)?;
        Self::with_runner(
            jobscript,
            cluster_cmds,
            properties,
            config,
            rule_params,
            ShellCommandRunner,
        )
    }
}

impl<R: CommandRunner> Submitter<R> {
    pub fn with_runner(
        jobscript: PathBuf,
        cluster_cmds: Vec<String>,
        properties: JobProperties,
        config: ProfileConfig,
        rule_params: RuleParams,
        runner: R,
    ) -> Result<Self> {
        let jobid_regex = Regex::new(r"Your job (\d+)")?;
        Ok(Self {
            jobscript,
            cluster_cmds,
            properties,
            config,
            rule_params,
            jobid_regex,
            runner,
        })
    }

    pub fn jobscript(&self) -> &Path {
        &self.jobscript
    }

    /// Flags the workflow engine passed through on the command line, in the
    /// order given.
    pub fn cluster_cmd(&self) -> String {
        self.cluster_cmds.join(" ")
    }

    pub fn is_group_jobtype(&self) -> bool {
        self.properties.is_group_jobtype()
    }

    pub fn threads(&self) -> u32 {
        self.properties
            .threads
            .or_else(|| job_properties::map_u64(&self.properties.cluster, "threads").map(|t| t as u32))
            .unwrap_or(self.config.default_threads)
    }

    pub fn mem_mb(&self) -> u64 {
        job_properties::map_u64(&self.properties.resources, "mem_mb")
            .or_else(|| job_properties::map_u64(&self.properties.cluster, "mem_mb"))
            .unwrap_or(self.config.default_mem_mb)
    }

    /// Requested runtime in minutes; `None` omits the `h_rt` clause.
    pub fn runtime_minutes(&self) -> Option<u64> {
        job_properties::map_u64(&self.properties.resources, "runtime")
            .or_else(|| job_properties::map_u64(&self.properties.cluster, "runtime"))
    }

    pub fn groupid(&self) -> String {
        self.properties
            .groupid
            .clone()
            .unwrap_or_else(|| "group".to_string())
    }

    pub fn rule_name(&self) -> String {
        if self.is_group_jobtype() {
            self.groupid()
        } else {
            self.properties
                .rule
                .clone()
                .unwrap_or_else(|| "rule_name".to_string())
        }
    }

    /// Ordered `key=value` wildcard pairs joined by `.`, or `unique` for a
    /// job without wildcards.
    pub fn wildcards_str(&self) -> String {
        let joined = self
            .properties
            .wildcards
            .iter()
            .map(|(key, value)| format!("{}={}", key, job_properties::value_to_string(value)))
            .collect::<Vec<_>>()
            .join(".");
        if joined.is_empty() {
            "unique".to_string()
        } else {
            joined
        }
    }

    /// Engine-side job id: the first dash-delimited segment of the UUID for
    /// group jobs, the stringified number otherwise.
    pub fn jobid(&self) -> String {
        let raw = self
            .properties
            .jobid
            .as_ref()
            .map(job_properties::value_to_string)
            .unwrap_or_default();
        if self.is_group_jobtype() {
            raw.split('-').next().unwrap_or_default().to_string()
        } else {
            raw
        }
    }

    pub fn jobname(&self) -> String {
        if self.is_group_jobtype() {
            return format!("{}_{}", self.groupid(), self.jobid());
        }
        job_properties::map_string(&self.properties.cluster, "jobname")
            .unwrap_or_else(|| format!("smk.{}.{}", self.rule_name(), self.wildcards_str()))
    }

    pub fn logdir(&self) -> PathBuf {
        let base = job_properties::map_string(&self.properties.cluster, "logdir")
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.log_dir.clone());
        base.join(self.rule_name())
    }

    pub fn outlog(&self) -> PathBuf {
        self.logdir().join(format!("{}.out", self.log_stem()))
    }

    pub fn errlog(&self) -> PathBuf {
        self.logdir().join(format!("{}.err", self.log_stem()))
    }

    fn log_stem(&self) -> String {
        if self.is_group_jobtype() {
            format!("groupid{}_jobid{}", self.groupid(), self.jobid())
        } else {
            self.jobname()
        }
    }

    /// Resource clause: a parallel-environment request with a per-thread
    /// memory share for multi-threaded jobs, the full memory request in MB
    /// otherwise, plus an optional `h_rt` runtime limit.
    pub fn resources_cmd(&self) -> String {
        let threads = self.threads();
        let mem_mb = self.mem_mb();
        let mut parts: Vec<String> = Vec::new();
        if threads > 1 {
            let per_thread = per_thread_gb(mem_mb, threads);
            parts.push(format!("-pe threads {}", threads));
            parts.push(format!("-l h_vmem={}G", per_thread));
            parts.push(format!("-l m_mem_free={}G", per_thread));
        } else {
            parts.push(format!("-l h_vmem={}M", mem_mb));
            parts.push(format!("-l m_mem_free={}M", mem_mb));
        }
        if let Some(runtime) = self.runtime_minutes() {
            parts.push(format!("-l h_rt={:02}:{:02}:00", runtime / 60, runtime % 60));
        }
        parts.join(" ")
    }

    pub fn jobinfo_cmd(&self) -> String {
        format!(
            "-o \"{}\" -e \"{}\" -N \"{}\"",
            self.outlog().display(),
            self.errlog().display(),
            self.jobname()
        )
    }

    pub fn queue(&self) -> String {
        job_properties::map_string(&self.properties.cluster, "queue")
            .unwrap_or_else(|| self.config.default_queue.clone())
    }

    pub fn queue_cmd(&self) -> String {
        let queue = self.queue();
        if queue.is_empty() {
            String::new()
        } else {
            format!("-q {}", queue)
        }
    }

    pub fn rule_specific_params(&self) -> String {
        self.rule_params.params_for_rule(&self.rule_name())
    }

    /// The full submission command line. Deterministic for a given job
    /// script and configuration; empty clauses contribute nothing.
    pub fn submit_cmd(&self) -> String {
        let parts = [
            "qsub -cwd".to_string(),
            self.resources_cmd(),
            self.jobinfo_cmd(),
            self.queue_cmd(),
            self.cluster_cmd(),
            self.rule_specific_params(),
            self.jobscript.display().to_string(),
        ];
        parts
            .iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Prepare the log directory, run the submission command, and extract
    /// the scheduler-assigned job id from its output.
    pub fn submit(&self) -> Result<Submission> {
        self.create_logdir()?;
        self.remove_previous_logs()?;

        let command = self.submit_cmd();
        debug!("Submitting: {}", command);

        let output = match self.runner.run(&command) {
            Ok(output) => output,
            Err(source) => return Err(SubmitError::Invocation { source }.into()),
        };
        if !output.success() {
            let source = anyhow!(
                "qsub exited with status {}: {}",
                output.status,
                output.stderr.trim_end()
            );
            return Err(SubmitError::Invocation { source }.into());
        }

        let combined = format!("{}{}", output.stdout, output.stderr);
        let job_id = match self.jobid_regex.captures(&combined) {
            Some(captures) => captures[1]
                .parse()
                .context("scheduler job id out of range")?,
            None => return Err(SubmitError::JobIdNotFound { output: combined }.into()),
        };

        Ok(Submission {
            job_id,
            outlog: self.outlog(),
        })
    }

    fn create_logdir(&self) -> Result<()> {
        let logdir = self.logdir();
        fs::create_dir_all(&logdir)
            .with_context(|| format!("failed to create log directory {}", logdir.display()))
    }

    /// Stale logs from an earlier attempt would confuse the status tool's
    /// log-tail fallback; remove them if present.
    fn remove_previous_logs(&self) -> Result<()> {
        for log in [self.outlog(), self.errlog()] {
            match fs::remove_file(&log) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to remove stale log {}", log.display()));
                }
            }
        }
        Ok(())
    }
}

/// Per-thread memory share in whole gigabytes: the MB request split across
/// threads, rounded to two decimals, then ceiling-rounded.
fn per_thread_gb(mem_mb: u64, threads: u32) -> u64 {
    let share = mem_mb as f64 / threads as f64 / 1000.0;
    let rounded = (share * 100.0).round() / 100.0;
    rounded.ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_thread_gb_rounds_up() {
        assert_eq!(per_thread_gb(5000, 4), 2);
        assert_eq!(per_thread_gb(8000, 4), 2);
        assert_eq!(per_thread_gb(9000, 4), 3);
        assert_eq!(per_thread_gb(1000, 2), 1);
    }
}
