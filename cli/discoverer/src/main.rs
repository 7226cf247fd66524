//! ic-discoverer CLI
//!
//! AWS regional catalog discovery from the SSM parameter store.

use clap::Parser;

mod args;
mod output;
mod run;

use args::Cli;

/// Exit code when at least one pipeline failed.
const EXIT_PARTIAL_FAILURE: i32 = 4;

/// Exit code when interrupted by a signal.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr so stdout stays clean
    run::init_logging(args.log_level)?;

    let report = run::execute(args).await?;
    let stats = &report.stats;

    eprintln!();
    eprintln!("Discovery completed:");
    eprintln!(
        "  Regions:          {}",
        count(report.catalog.regions.as_ref(), stats.regions.from_cache)
    );
    eprintln!(
        "  Services:         {}",
        count(report.catalog.services.as_ref(), stats.services.from_cache)
    );
    eprintln!(
        "  Region mappings:  {}",
        count(
            report.catalog.region_services.as_ref(),
            stats.region_services.from_cache
        )
    );
    eprintln!("  Lookups:          {}", stats.items_attempted());
    eprintln!("  Batches:          {}", stats.batches_run());
    eprintln!("  Warnings:         {}", report.warnings.len());
    eprintln!("  Errors:           {}", report.errors.len());

    if let Some(duration) = stats.duration() {
        eprintln!(
            "  Duration:         {:.2}s",
            duration.num_milliseconds() as f64 / 1000.0
        );

        if let Some(rate) = stats.items_per_second().filter(|r| *r > 0.0) {
            eprintln!("  Throughput:       {:.1} lookups/sec", rate);
        }
    }

    for warning in &report.warnings {
        eprintln!("  Warning: {}", warning);
    }

    if report.was_cancelled() {
        eprintln!("  Interrupted before completion");
        std::process::exit(EXIT_INTERRUPTED);
    }

    if !report.is_success() {
        for error in &report.errors {
            eprintln!("  Error: {}", error);
        }
        std::process::exit(EXIT_PARTIAL_FAILURE);
    }

    Ok(())
}

fn count<T>(items: Option<&Vec<T>>, from_cache: bool) -> String {
    match items {
        Some(items) if from_cache => format!("{} (cached)", items.len()),
        Some(items) => items.len().to_string(),
        None => "-".to_string(),
    }
}
