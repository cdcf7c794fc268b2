//! Percentile thresholds and 1-5 scoring for a single RFM metric

use std::fmt;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{RfmError, RfmResult, RfmWarning};

/// Percentiles used when none are configured.
pub const DEFAULT_PERCENTILE_CUTS: [f64; 4] = [20.0, 40.0, 60.0, 80.0];

/// Score given to every customer when a metric's thresholds collapse.
pub const NEUTRAL_SCORE: u8 = 3;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Recency,
    Frequency,
    Monetary,
}

/// Whether a larger raw value earns a higher score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Metric {
    pub fn direction(self) -> Direction {
        match self {
            // Fewer days since the last order is better
            Metric::Recency => Direction::LowerIsBetter,
            Metric::Frequency | Metric::Monetary => Direction::HigherIsBetter,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Recency => write!(f, "Recency"),
            Metric::Frequency => write!(f, "Frequency"),
            Metric::Monetary => write!(f, "Monetary"),
        }
    }
}

/// Four strictly increasing percentiles in the open interval (0, 100).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileCuts([f64; 4]);

impl PercentileCuts {
    pub fn new(cuts: [f64; 4]) -> RfmResult<Self> {
        if cuts.iter().any(|c| !c.is_finite() || *c <= 0.0 || *c >= 100.0) {
            return Err(RfmError::InvalidConfig(format!(
                "percentile cuts must lie strictly between 0 and 100, got {cuts:?}"
            )));
        }
        if cuts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RfmError::InvalidConfig(format!(
                "percentile cuts must be strictly increasing, got {cuts:?}"
            )));
        }
        Ok(Self(cuts))
    }

    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }
}

impl Default for PercentileCuts {
    fn default() -> Self {
        Self(DEFAULT_PERCENTILE_CUTS)
    }
}

/// Percentile of an ascending slice using linear interpolation between
/// the two nearest ranks (numpy's default method).
///
/// `sorted` must be non-empty and sorted ascending.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Bucket boundaries for one metric.
///
/// Bucket `k` covers `[thresholds[k-1], thresholds[k])`, with bucket 0
/// starting at zero and bucket 4 unbounded above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds([f64; 4]);

impl Thresholds {
    /// `values` must be non-empty.
    pub fn from_values(values: &[f64], cuts: &PercentileCuts) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self(cuts.as_array().map(|pct| percentile(&sorted, pct)))
    }

    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }

    /// The shared value when all four thresholds coincide.
    pub fn collapsed(&self) -> Option<f64> {
        let [first, .., last] = self.0;
        (first == last).then_some(first)
    }

    /// Index of the half-open bucket holding `value`.
    ///
    /// Values below zero land in bucket 0. When adjacent thresholds are
    /// equal the bucket between them is empty.
    pub fn bucket(&self, value: f64) -> usize {
        self.0.iter().filter(|t| value >= **t).count()
    }
}

/// Convert a bucket index into a score according to the metric's direction.
pub fn bucket_score(bucket: usize, direction: Direction) -> u8 {
    let bucket = bucket.min(4) as u8;
    match direction {
        Direction::HigherIsBetter => MIN_SCORE + bucket,
        Direction::LowerIsBetter => MAX_SCORE - bucket,
    }
}

/// Scores for one metric across the whole customer population.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricScores {
    pub metric: Metric,
    pub thresholds: Thresholds,
    /// One score per input value, in input order
    pub scores: Vec<u8>,
    /// Set when the thresholds collapsed and the neutral score was used
    pub degenerate_value: Option<f64>,
}

impl MetricScores {
    pub fn warning(&self) -> Option<RfmWarning> {
        self.degenerate_value.map(|value| RfmWarning::DegenerateMetric {
            metric: self.metric,
            value,
        })
    }
}

/// Score every value of `metric` against the population's own quintiles.
///
/// # Arguments
/// * `metric` - Which RFM metric `values` holds; decides the score direction
/// * `values` - One raw value per customer
/// * `cuts` - Percentiles the thresholds are taken at
///
/// # Returns
/// One score per value in input order. When all four thresholds coincide
/// every customer gets [`NEUTRAL_SCORE`] and the result carries a
/// `DegenerateMetric` warning. Fails with `EmptyDataset` on empty input.
pub fn score_metric(
    metric: Metric,
    values: &[f64],
    cuts: &PercentileCuts,
) -> RfmResult<MetricScores> {
    if values.is_empty() {
        return Err(RfmError::EmptyDataset);
    }
    let thresholds = Thresholds::from_values(values, cuts);
    debug!(%metric, thresholds = ?thresholds.as_array(), "percentile thresholds");

    if let Some(value) = thresholds.collapsed() {
        return Ok(MetricScores {
            metric,
            thresholds,
            scores: vec![NEUTRAL_SCORE; values.len()],
            degenerate_value: Some(value),
        });
    }

    let direction = metric.direction();
    let scores = values
        .iter()
        .map(|v| bucket_score(thresholds.bucket(*v), direction))
        .collect();

    Ok(MetricScores {
        metric,
        thresholds,
        scores,
        degenerate_value: None,
    })
}

/// Whole days from `last_transaction` up to `reference_date`.
pub fn recency_days(reference_date: NaiveDate, last_transaction: NaiveDate) -> i64 {
    (reference_date - last_transaction).num_days()
}
