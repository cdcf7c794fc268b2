//! Queryable per-customer score table

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;

use crate::segment::{CompositeScore, Segment};

/// Final RFM result for one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerScore {
    pub customer_id: String,
    pub last_transaction: NaiveDate,
    /// Days between the last transaction and the reference date
    pub recency_days: i64,
    pub frequency: u32,
    pub monetary: f64,
    pub scores: CompositeScore,
    /// Three-digit composite, R then F then M
    pub rfm_key: String,
    pub segment: Segment,
}

/// Inclusive ranges and segment set applied together, as a dashboard
/// applies its sliders and segment picker at once.
///
/// Unset criteria match everything; an empty segment list does too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RfmFilter {
    pub recency: Option<RangeInclusive<i64>>,
    pub frequency: Option<RangeInclusive<u32>>,
    pub monetary: Option<RangeInclusive<f64>>,
    pub segments: Vec<Segment>,
}

impl RfmFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recency(mut self, range: RangeInclusive<i64>) -> Self {
        self.recency = Some(range);
        self
    }

    pub fn frequency(mut self, range: RangeInclusive<u32>) -> Self {
        self.frequency = Some(range);
        self
    }

    pub fn monetary(mut self, range: RangeInclusive<f64>) -> Self {
        self.monetary = Some(range);
        self
    }

    pub fn segments(mut self, segments: impl IntoIterator<Item = Segment>) -> Self {
        self.segments = segments.into_iter().collect();
        self
    }

    pub fn matches(&self, row: &CustomerScore) -> bool {
        self.recency
            .as_ref()
            .map_or(true, |r| r.contains(&row.recency_days))
            && self
                .frequency
                .as_ref()
                .map_or(true, |r| r.contains(&row.frequency))
            && self
                .monetary
                .as_ref()
                .map_or(true, |r| r.contains(&row.monetary))
            && (self.segments.is_empty() || self.segments.contains(&row.segment))
    }
}

/// Observed extent of each raw metric, used to seed range filters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRanges {
    pub recency: RangeInclusive<i64>,
    pub frequency: RangeInclusive<u32>,
    pub monetary: RangeInclusive<f64>,
}

/// Scores for every customer of one run, sorted by customer id.
#[derive(Debug, Clone, PartialEq)]
pub struct RfmTable {
    reference_date: NaiveDate,
    rows: Vec<CustomerScore>,
}

impl RfmTable {
    pub(crate) fn new(reference_date: NaiveDate, rows: Vec<CustomerScore>) -> Self {
        Self {
            reference_date,
            rows,
        }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn rows(&self) -> &[CustomerScore] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, customer_id: &str) -> Option<&CustomerScore> {
        self.rows
            .binary_search_by(|row| row.customer_id.as_str().cmp(customer_id))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    pub fn filter_recency(&self, range: RangeInclusive<i64>) -> Vec<&CustomerScore> {
        self.filter(&RfmFilter::new().recency(range))
    }

    pub fn filter_frequency(&self, range: RangeInclusive<u32>) -> Vec<&CustomerScore> {
        self.filter(&RfmFilter::new().frequency(range))
    }

    pub fn filter_monetary(&self, range: RangeInclusive<f64>) -> Vec<&CustomerScore> {
        self.filter(&RfmFilter::new().monetary(range))
    }

    pub fn filter_segments(&self, segments: &[Segment]) -> Vec<&CustomerScore> {
        self.filter(&RfmFilter::new().segments(segments.iter().copied()))
    }

    pub fn filter(&self, filter: &RfmFilter) -> Vec<&CustomerScore> {
        self.rows.iter().filter(|row| filter.matches(row)).collect()
    }

    /// Customer count per segment; segments without customers report zero.
    pub fn segment_counts(&self) -> BTreeMap<Segment, usize> {
        let mut counts: BTreeMap<Segment, usize> =
            Segment::ALL.into_iter().map(|segment| (segment, 0)).collect();
        for row in &self.rows {
            *counts.entry(row.segment).or_default() += 1;
        }
        counts
    }

    pub fn metric_ranges(&self) -> Option<MetricRanges> {
        let first = self.rows.first()?;
        let mut ranges = MetricRanges {
            recency: first.recency_days..=first.recency_days,
            frequency: first.frequency..=first.frequency,
            monetary: first.monetary..=first.monetary,
        };
        for row in &self.rows[1..] {
            ranges.recency = (*ranges.recency.start()).min(row.recency_days)
                ..=(*ranges.recency.end()).max(row.recency_days);
            ranges.frequency = (*ranges.frequency.start()).min(row.frequency)
                ..=(*ranges.frequency.end()).max(row.frequency);
            ranges.monetary = ranges.monetary.start().min(row.monetary)
                ..=ranges.monetary.end().max(row.monetary);
        }
        Some(ranges)
    }
}
