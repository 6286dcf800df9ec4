use clap::{Parser, builder::styling};
use env_logger::Builder;
use log::LevelFilter;
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;
use std::path::PathBuf;
use std::thread;

use uge_profile::config::ProfileConfig;
use uge_profile::uge::StatusChecker;

const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::Green.on_default().bold())
    .usage(styling::AnsiColor::Green.on_default().bold())
    .literal(styling::AnsiColor::Cyan.on_default().bold())
    .placeholder(styling::AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "uge-status")]
#[command(about = "Resolve a UGE job id to running/success/failed", long_about = None)]
#[command(styles = STYLES)]
struct Args {
    /// Scheduler-assigned job id
    #[arg()]
    job_id: u64,

    /// Path to the job's output log, as printed by uge-submit
    #[arg()]
    outlog: PathBuf,
}

fn main() {
    let args = Args::parse();
    let job_id = args.job_id;

    Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    // The workflow engine interrupts status scripts freely while shutting
    // down; exit quietly without emitting a verdict.
    let mut signals = match Signals::new([SIGINT]) {
        Ok(signals) => signals,
        Err(e) => {
            eprintln!("Error registering SIGINT handler: {}", e);
            std::process::exit(1);
        }
    };
    thread::spawn(move || {
        if signals.forever().next().is_some() {
            std::process::exit(0);
        }
    });

    let config = match ProfileConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading profile configuration: {}", e);
            std::process::exit(1);
        }
    };

    let checker = StatusChecker::new(job_id, args.outlog, config);
    match checker.get_status() {
        Ok(status) => println!("{}", status),
        Err(e) => {
            eprintln!("Error resolving status for job {}: {}", job_id, e);
            std::process::exit(1);
        }
    }
}
