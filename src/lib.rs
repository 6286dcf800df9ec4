//! Snakemake cluster profile for Univa Grid Engine.
//!
//! This crate backs two small command-line tools that Snakemake invokes for
//! every cluster job:
//!
//! - `uge-submit` builds the `qsub` command line for a job script (resource
//!   requests, log paths, job naming), runs it, and prints the scheduler's
//!   job id together with the job's output log path.
//! - `uge-status` takes that id and log path and resolves the job's current
//!   state to one of `running`, `success`, or `failed`, falling back from a
//!   retried `qstat` live query to a one-shot `qacct` accounting query to a
//!   tail-of-log heuristic.
//!
//! Both tools are synchronous and handle exactly one job per invocation.

pub mod config;
pub mod uge;
