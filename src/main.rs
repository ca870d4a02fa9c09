//! `pkgrecon`: recognize package manifests and archives and report their metadata.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Install logging; `PKGRECON_LOG` overrides the default filter.
//! 3. Load config ([`pkgrecon::config::load_config`]).
//! 4. Recognize every file in parallel ([`pkgrecon::recognize_packages`]).
//! 5. Attach `license_expression` with the configured normalizer.
//! 6. Render the requested report ([`report`]).
//! 7. Exit `0`, or `1` when at least one file failed to parse or read.

mod cli;
mod report;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use pkgrecon::config::load_config;
use pkgrecon::recognize_packages;
use report::FileOutcome;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("PKGRECON_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_handlers {
        report::terminal::render_handlers();
        return Ok(());
    }

    let working_dir = std::env::current_dir()?;
    let config = load_config(&working_dir, cli.config.as_deref())?;
    let normalizer = config.normalizer();
    let report_format = cli
        .report
        .unwrap_or_else(|| ReportFormat::from(config.output.format));

    let pb = if report_format == ReportFormat::Terminal && !cli.quiet && cli.files.len() > 1 {
        let pb = ProgressBar::new(cli.files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let outcomes: Vec<FileOutcome> = cli
        .files
        .par_iter()
        .map(|path| {
            let result = recognize_packages(path).map(|mut packages| {
                for package in &mut packages {
                    package.license_expression = package.compute_normalized_license_with(&normalizer);
                }
                packages
            });
            if let Err(e) = &result {
                if e.is_not_implemented() {
                    tracing::warn!("{e}");
                } else {
                    tracing::error!("{e}");
                }
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            FileOutcome {
                path: path.clone(),
                result,
            }
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match report_format {
        ReportFormat::Terminal => report::terminal::render(&outcomes, cli.verbose, cli.quiet)?,
        ReportFormat::Json => report::json::render(&outcomes)?,
    }

    if outcomes.iter().any(FileOutcome::is_failure) {
        std::process::exit(1);
    }
    Ok(())
}
