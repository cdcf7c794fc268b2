//! End-to-end RFM scoring: aggregate, score each metric, classify

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregate::{aggregate, CustomerAggregate};
use crate::data::Transaction;
use crate::error::{RfmError, RfmResult, RfmWarning};
use crate::quintile::{recency_days, score_metric, Metric, PercentileCuts};
use crate::segment::CompositeScore;
use crate::table::{CustomerScore, RfmTable};

/// Reference date used when none is configured.
pub const DEFAULT_REFERENCE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2021, 1, 1) {
    Some(date) => date,
    None => panic!("invalid default reference date"),
};

/// Parameters of a scoring run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfmConfig {
    /// "Today" for recency; every recency value is measured up to this date
    pub reference_date: NaiveDate,
    /// Percentiles splitting each metric into five buckets
    pub percentile_cuts: PercentileCuts,
}

impl Default for RfmConfig {
    fn default() -> Self {
        Self {
            reference_date: DEFAULT_REFERENCE_DATE,
            percentile_cuts: PercentileCuts::default(),
        }
    }
}

impl RfmConfig {
    pub fn new(reference_date: NaiveDate, percentile_cuts: PercentileCuts) -> Self {
        Self {
            reference_date,
            percentile_cuts,
        }
    }

    pub fn with_reference_date(mut self, reference_date: NaiveDate) -> Self {
        self.reference_date = reference_date;
        self
    }

    pub fn with_percentile_cuts(mut self, percentile_cuts: PercentileCuts) -> Self {
        self.percentile_cuts = percentile_cuts;
        self
    }

    /// Validates `cuts` before accepting them.
    pub fn with_percentiles(self, cuts: [f64; 4]) -> RfmResult<Self> {
        Ok(self.with_percentile_cuts(PercentileCuts::new(cuts)?))
    }
}

/// Output of a scoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct RfmReport {
    pub table: RfmTable,
    /// Non-fatal conditions met while aggregating and scoring
    pub warnings: Vec<RfmWarning>,
}

/// Score a transaction log.
///
/// Each call builds its tables from scratch; nothing is cached between runs.
///
/// # Arguments
/// * `transactions` - Order lines of the whole customer population
/// * `config` - Reference date and percentile cuts
///
/// # Returns
/// The score table sorted by customer id, with the aggregation and scoring
/// warnings in that order. Fails with `EmptyDataset` when `transactions`
/// is empty.
pub fn score_transactions(transactions: &[Transaction], config: &RfmConfig) -> RfmResult<RfmReport> {
    if transactions.is_empty() {
        return Err(RfmError::EmptyDataset);
    }
    info!(
        transactions = transactions.len(),
        reference_date = %config.reference_date,
        "scoring transactions"
    );

    let aggregation = aggregate(transactions)?;
    let mut report = score_aggregates(&aggregation.customers, config)?;

    let mut warnings = aggregation.warnings;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    Ok(report)
}

/// Score customers that have already been aggregated.
pub fn score_aggregates(customers: &[CustomerAggregate], config: &RfmConfig) -> RfmResult<RfmReport> {
    if customers.is_empty() {
        return Err(RfmError::EmptyDataset);
    }

    let recency: Vec<i64> = customers
        .iter()
        .map(|c| recency_days(config.reference_date, c.last_transaction))
        .collect();
    let recency_values: Vec<f64> = recency.iter().map(|days| *days as f64).collect();
    let frequency_values: Vec<f64> = customers.iter().map(|c| f64::from(c.frequency)).collect();
    let monetary_values: Vec<f64> = customers.iter().map(|c| c.monetary).collect();

    let cuts = &config.percentile_cuts;
    let r = score_metric(Metric::Recency, &recency_values, cuts)?;
    let f = score_metric(Metric::Frequency, &frequency_values, cuts)?;
    let m = score_metric(Metric::Monetary, &monetary_values, cuts)?;

    let warnings: Vec<RfmWarning> = [&r, &f, &m]
        .into_iter()
        .filter_map(|scored| scored.warning())
        .collect();
    for warning in &warnings {
        warn!("{warning}");
    }

    let rows: Vec<CustomerScore> = customers
        .iter()
        .enumerate()
        .map(|(i, customer)| {
            let scores = CompositeScore {
                recency: r.scores[i],
                frequency: f.scores[i],
                monetary: m.scores[i],
            };
            CustomerScore {
                customer_id: customer.customer_id.clone(),
                last_transaction: customer.last_transaction,
                recency_days: recency[i],
                frequency: customer.frequency,
                monetary: customer.monetary,
                rfm_key: scores.key(),
                segment: scores.segment(),
                scores,
            }
        })
        .collect();

    info!(customers = rows.len(), "customers scored");
    Ok(RfmReport {
        table: RfmTable::new(config.reference_date, sorted_by_customer(rows)),
        warnings,
    })
}

fn sorted_by_customer(mut rows: Vec<CustomerScore>) -> Vec<CustomerScore> {
    rows.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
    rows
}
