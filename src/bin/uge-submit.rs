use clap::{Parser, builder::styling};
use env_logger::Builder;
use log::LevelFilter;
use std::path::{Path, PathBuf};

use uge_profile::config::ProfileConfig;
use uge_profile::uge::{RuleParams, Submitter};

const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::Green.on_default().bold())
    .usage(styling::AnsiColor::Green.on_default().bold())
    .literal(styling::AnsiColor::Cyan.on_default().bold())
    .placeholder(styling::AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "uge-submit")]
#[command(about = "Submit a Snakemake job script to a UGE cluster", long_about = None)]
#[command(styles = STYLES)]
struct Args {
    /// Scheduler flags passed through by the workflow engine, followed by
    /// the job script path as the final argument
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let mut args = Args::parse();

    Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let jobscript = PathBuf::from(args.args.pop().expect("clap requires at least one argument"));
    let cluster_cmds = args.args;

    let config = match ProfileConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading profile configuration: {}", e);
            std::process::exit(1);
        }
    };

    let rule_params = match RuleParams::load(Path::new("uge.yaml")) {
        Ok(rule_params) => rule_params,
        Err(e) => {
            eprintln!("Error loading rule parameter overlay: {}", e);
            std::process::exit(1);
        }
    };

    let submitter = match Submitter::from_jobscript(jobscript, cluster_cmds, config, rule_params) {
        Ok(submitter) => submitter,
        Err(e) => {
            eprintln!("Error reading job script: {}", e);
            std::process::exit(1);
        }
    };

    match submitter.submit() {
        Ok(submission) => {
            // The engine parses this pair and feeds it to uge-status later.
            println!("{} {}", submission.job_id, submission.outlog.display());
        }
        Err(e) => {
            eprintln!("Error submitting job: {}", e);
            std::process::exit(1);
        }
    }
}
