//! Console reporting and CSV export of scored customers

use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::RfmResult;
use crate::summary::{
    format_large_number, ChannelProductVolume, MonthlyTrend, SalesSummary, SegmentTotals,
    SegmentVolume,
};
use crate::table::{CustomerScore, RfmTable};

/// Print headline sales figures to console
pub fn print_sales_summary(summary: &SalesSummary) {
    println!("\n=== Sales Summary ===");
    println!("Total revenue:   {}", format_large_number(summary.total_revenue));
    println!("Total orders:    {}", summary.total_orders);
    println!("Sales volume:    {}", summary.sales_volume);
    println!("Total profit:    {}", format_large_number(summary.total_profit));
    println!("Total customers: {}", summary.total_customers);
    if let (Some(first), Some(last)) = (summary.first_order, summary.last_order) {
        println!("Order dates:     {first} to {last}");
    }
    if summary.incomplete_rows > 0 {
        println!(
            "  ({} rows with missing amounts excluded from money totals)",
            summary.incomplete_rows
        );
    }
}

/// Print monthly sales and active customers
pub fn print_monthly_trend(trend: &[MonthlyTrend]) {
    println!("\n=== Monthly Trend ===");
    println!("  Month    |        Sales | Customers");
    println!("  ---------|--------------|----------");
    for entry in trend {
        println!(
            "  {} | {:>12} | {:9}",
            entry.month.format("%b %Y"),
            format_large_number(entry.sales),
            entry.customers
        );
    }
}

/// Print units sold per sales channel and product, largest first, at most `limit` rows
pub fn print_channel_product_volume(volumes: &[ChannelProductVolume], limit: usize) {
    let mut ranked: Vec<&ChannelProductVolume> = volumes.iter().collect();
    ranked.sort_by(|a, b| b.volume.cmp(&a.volume));

    println!("\n=== Sales Volume by Channel and Product ===");
    for entry in ranked.iter().take(limit) {
        println!(
            "  {:12} product {:6} {:8} units",
            entry.channel, entry.product_id, entry.volume
        );
    }
}

/// Print units bought per segment and product or channel
pub fn print_segment_volume(title: &str, volumes: &[SegmentVolume]) {
    println!("\n=== Sales Volume by {title} and Segment ===");
    for entry in volumes {
        println!(
            "  {:13} | {:12} | {:8}",
            entry.segment.label(),
            entry.key,
            entry.volume
        );
    }
}

/// Print customer count, sales and profit per segment
pub fn print_segment_distribution(table: &RfmTable, totals: &[SegmentTotals]) {
    let customers = table.len().max(1);

    println!("\n=== Customer Segments ===");
    println!("  Segment       | Customers |  Share |        Sales |       Profit | Incomplete");
    println!("  --------------|-----------|--------|--------------|--------------|-----------");
    for entry in totals {
        let share = entry.customers as f64 / customers as f64 * 100.0;
        println!(
            "  {:13} | {:9} | {:5.1}% | {:>12} | {:>12} | {:10}",
            entry.segment.label(),
            entry.customers,
            share,
            format_large_number(entry.sales),
            format_large_number(entry.profit),
            entry.incomplete_rows
        );
    }
}

/// Print scored customers, at most `limit` rows when given
pub fn print_score_table(rows: &[&CustomerScore], limit: Option<usize>) {
    let shown = limit.unwrap_or(rows.len()).min(rows.len());

    println!("\n=== RFM Table ({} of {} customers) ===", shown, rows.len());
    println!("  Customer     | Last order | Recency | Frequency |     Monetary | RFM | Segment");
    println!("  -------------|------------|---------|-----------|--------------|-----|--------------");
    for row in &rows[..shown] {
        println!(
            "  {:12} | {} | {:7} | {:9} | {:12.2} | {} | {}",
            row.customer_id,
            row.last_transaction,
            row.recency_days,
            row.frequency,
            row.monetary,
            row.rfm_key,
            row.segment
        );
    }
}

/// Build a data frame of scored customers using the dashboard's column names.
pub fn scores_frame(rows: &[&CustomerScore]) -> RfmResult<DataFrame> {
    let customer_ids: Vec<String> = rows.iter().map(|r| r.customer_id.clone()).collect();
    let last_transactions: Vec<String> =
        rows.iter().map(|r| r.last_transaction.to_string()).collect();
    let frequency: Vec<i64> = rows.iter().map(|r| i64::from(r.frequency)).collect();
    let monetary: Vec<f64> = rows.iter().map(|r| r.monetary).collect();
    let recency: Vec<i64> = rows.iter().map(|r| r.recency_days).collect();
    let r_scores: Vec<i64> = rows.iter().map(|r| i64::from(r.scores.recency)).collect();
    let f_scores: Vec<i64> = rows.iter().map(|r| i64::from(r.scores.frequency)).collect();
    let m_scores: Vec<i64> = rows.iter().map(|r| i64::from(r.scores.monetary)).collect();
    let keys: Vec<String> = rows.iter().map(|r| r.rfm_key.clone()).collect();
    let segments: Vec<String> = rows.iter().map(|r| r.segment.to_string()).collect();

    let df = df!(
        "_CustomerID" => customer_ids,
        "Last_Transaction" => last_transactions,
        "Frequency" => frequency,
        "Monetary" => monetary,
        "Recency" => recency,
        "R Score" => r_scores,
        "F Score" => f_scores,
        "M Score" => m_scores,
        "RFM Score" => keys,
        "Customer Segment" => segments
    )?;
    Ok(df)
}

/// Write scored customers to a CSV file
pub fn write_scores_csv(rows: &[&CustomerScore], output_path: impl AsRef<Path>) -> RfmResult<()> {
    let output_path = output_path.as_ref();
    let mut df = scores_frame(rows)?;
    let mut file = File::create(output_path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    info!(path = %output_path.display(), rows = rows.len(), "scores exported");
    Ok(())
}
