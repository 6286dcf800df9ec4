//! Univa Grid Engine scheduler interface.
//!
//! This module holds everything that talks to the scheduler: the shell
//! command runner, the job-metadata readers, the `qsub` command synthesizer,
//! and the tiered status resolution engine that turns a job id into a
//! `running`/`success`/`failed` verdict.

pub mod command;
pub mod job_properties;
pub mod rule_params;
pub mod status;
pub mod submit;

pub use command::{CommandOutput, CommandRunner, ShellCommandRunner};
pub use job_properties::JobProperties;
pub use rule_params::RuleParams;
pub use status::{JobStatus, StatusChecker};
pub use submit::{Submission, SubmitError, Submitter};
