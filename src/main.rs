mod analysis;
mod config;
mod data;
mod error;
mod geography;
mod pipeline;
mod render;

use config::PartialConfig;
use dotenv::dotenv;
use pipeline::RunSummary;
use render::HtmlMapRenderer;
use std::io;
use tracing_subscriber::EnvFilter;

/// Prints what the run read, compared and wrote.
///
/// Skipped rows are listed individually so that problems in the inputs can be
/// traced back to a line of the input file.
fn print_run_summary(summary: &RunSummary) {
    println!("\nRun Summary:");
    println!(
        "Listings: {} read, {} used, {} filtered, {} skipped",
        summary.listings.rows_read,
        summary.listings.rows_used,
        summary.listings.rows_filtered,
        summary.listings.issues.len()
    );
    println!(
        "Rental statistics: {} read, {} used, {} skipped",
        summary.rentals.rows_read,
        summary.rentals.rows_used,
        summary.rentals.issues.len()
    );
    println!(
        "Compared: {} unit/bedroom rows ({} without rental data, {} without listings, {} zero-filled)",
        summary.compared_rows, summary.unmatched_listings, summary.unmatched_rentals, summary.zero_filled
    );
    if summary.outside_boundaries > 0 {
        println!("Outside the boundary file: {}", summary.outside_boundaries);
    }

    for issue in summary.listings.issues.iter().take(10) {
        println!("  listings {issue}");
    }
    for issue in summary.rentals.issues.iter().take(10) {
        println!("  rentals {issue}");
    }

    println!("\nWrote:");
    for path in &summary.outputs {
        println!("  {}", path.display());
    }
}

/// Entry point: resolves configuration, then runs the pipeline once.
///
/// 1. Initialize logging and load `.env`
/// 2. Read `FAVMAP_*` settings, prompting for anything missing
/// 3. Load both datasets (and boundaries), aggregate, join and compute ratios
/// 4. Write the comparison table, the six maps and a run summary
fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    // Load environment variables from .env file
    dotenv().ok();

    let partial = PartialConfig::from_env()?;
    let config = config::prompt::fill_missing(partial, &mut io::stdin().lock(), &mut io::stdout())?;

    let renderer = HtmlMapRenderer::new(config.city.clone());
    let summary = pipeline::run(&config, &renderer, |done, total| {
        if done == total {
            println!("All done!");
        } else {
            println!("{done}/{total} maps done...");
        }
    })?;

    print_run_summary(&summary);

    Ok(())
}
