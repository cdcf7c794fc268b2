//! RfmForge: Customer Segmentation CLI using quintile-based RFM scoring
//!
//! This is the main entrypoint that orchestrates data loading, scoring,
//! filtering and reporting.

use anyhow::{Context, Result};
use clap::Parser;
use rfmforge::{
    channel_product_volume, load_transactions, monthly_trend, report, score_transactions,
    segment_totals, segment_volume, Args, CustomerScore, SalesSummary, VolumeDimension,
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    run_pipeline(&args)
}

/// Log to stderr; RUST_LOG takes precedence over --verbose
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run full scoring pipeline
fn run_pipeline(args: &Args) -> Result<()> {
    println!("=== RFM Segmentation Pipeline ===");

    let config = args.config()?;
    let filter = args.filter()?;
    let period = args.period()?;
    let start_time = Instant::now();

    // Step 1: Load transactions
    let loaded = load_transactions(&args.input)
        .with_context(|| format!("failed to load transactions from '{}'", args.input))?;
    println!(
        "✓ Data loaded: {} transactions ({} cells treated as missing)",
        loaded.transactions.len(),
        loaded.warnings.len()
    );

    // Step 2: Score customers
    let scoring_start = Instant::now();
    let rfm = score_transactions(&loaded.transactions, &config)?;
    println!(
        "✓ Customers scored: {} (reference date {})",
        rfm.table.len(),
        rfm.table.reference_date()
    );
    if args.verbose {
        println!("  Scoring time: {:.2}s", scoring_start.elapsed().as_secs_f64());
        if let Some(ranges) = rfm.table.metric_ranges() {
            println!(
                "  Recency {:?} days, frequency {:?} orders, monetary {:.2}..={:.2}",
                ranges.recency,
                ranges.frequency,
                ranges.monetary.start(),
                ranges.monetary.end()
            );
        }
    }
    if !rfm.warnings.is_empty() {
        println!("  {} warnings raised while scoring", rfm.warnings.len());
    }

    // Step 3: Summaries
    let transactions = &loaded.transactions;
    let summary = match period.clone() {
        Some(period) => SalesSummary::for_period(transactions, period),
        None => SalesSummary::from_transactions(transactions),
    };
    report::print_sales_summary(&summary);
    if let Some(window) = period.or_else(|| Some(summary.first_order?..=summary.last_order?)) {
        report::print_monthly_trend(&monthly_trend(transactions, window)?);
    }
    report::print_channel_product_volume(&channel_product_volume(transactions)?, args.limit);

    let totals = segment_totals(transactions, &rfm.table)?;
    report::print_segment_distribution(&rfm.table, &totals);
    report::print_segment_volume(
        "Product",
        &segment_volume(transactions, &rfm.table, VolumeDimension::Product)?,
    );
    report::print_segment_volume(
        "Channel",
        &segment_volume(transactions, &rfm.table, VolumeDimension::Channel)?,
    );

    // Step 4: Filtered table
    let rows: Vec<&CustomerScore> = rfm.table.filter(&filter);
    report::print_score_table(&rows, Some(args.limit));

    if let Some(ref output) = args.output {
        report::write_scores_csv(&rows, output)
            .with_context(|| format!("failed to write scores to '{output}'"))?;
        println!("\nRFM table saved to: {output}");
    }

    println!("\n=== Pipeline Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
