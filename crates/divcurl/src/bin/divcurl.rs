//! `divcurl` command-line tool.
//!
//! Computes divergence and curl for every step of an input stream and
//! writes them to an output stream. Exits with status 1 on any failure.

use std::process;

use clap::Parser;
use divcurl::cli::{init_logging, CliArgs};

fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };
    if let Err(e) = init_logging(args.log_level.as_deref()) {
        eprintln!("error: {e}");
        process::exit(1);
    }

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            process::exit(1);
        }
    };

    match divcurl::run_files(&config) {
        Ok(report) => {
            let total_us: u64 = report.workers.iter().map(|w| w.total_us()).sum();
            log::info!(
                "processed {} step(s) on {} worker(s) in {:.3} s of worker time, {:?}",
                report.steps_processed(),
                report.workers.len(),
                total_us as f64 / 1e6,
                report.completion(),
            );
        }
        Err(e) => {
            log::error!("run aborted: {e}");
            process::exit(1);
        }
    }
}
