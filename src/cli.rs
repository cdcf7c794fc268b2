//! Command-line interface definitions and argument parsing

use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::Parser;

use crate::pipeline::RfmConfig;
use crate::segment::Segment;
use crate::table::RfmFilter;

/// Customer segmentation CLI using quintile-based RFM scoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV sales log
    #[arg(short, long, default_value = "US_Regional_Sales_Data.csv")]
    pub input: String,

    /// Date recency is measured up to (YYYY-MM-DD)
    #[arg(short, long, default_value = "2021-01-01")]
    pub reference_date: String,

    /// Four increasing percentiles splitting each metric into quintiles
    #[arg(short, long, default_value = "20,40,60,80")]
    pub percentiles: String,

    /// Keep customers whose recency in days lies in "min..max"
    #[arg(long)]
    pub recency: Option<String>,

    /// Keep customers whose distinct order count lies in "min..max"
    #[arg(long)]
    pub frequency: Option<String>,

    /// Keep customers whose total sales lie in "min..max"
    #[arg(long)]
    pub monetary: Option<String>,

    /// Restrict the sales summary and monthly trend to orders in "YYYY-MM-DD..YYYY-MM-DD"
    #[arg(long)]
    pub period: Option<String>,

    /// Keep only these segments (repeatable), e.g. --segment Champions --segment "At Risk"
    #[arg(short, long = "segment")]
    pub segments: Vec<String>,

    /// Export the filtered RFM table to this CSV path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Maximum number of table rows printed to console
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Scoring configuration from the reference date and percentile flags
    pub fn config(&self) -> crate::Result<RfmConfig> {
        let reference_date = NaiveDate::parse_from_str(self.reference_date.trim(), "%Y-%m-%d")
            .map_err(|_| {
                anyhow::anyhow!(
                    "Invalid reference date '{}', expected YYYY-MM-DD",
                    self.reference_date
                )
            })?;

        let parts: Vec<&str> = self.percentiles.split(',').collect();
        if parts.len() != 4 {
            anyhow::bail!("Percentiles must be four comma-separated values, e.g. '20,40,60,80'");
        }
        let mut cuts = [0.0; 4];
        for (slot, part) in cuts.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid percentile value: {}", part))?;
        }

        Ok(RfmConfig::default()
            .with_reference_date(reference_date)
            .with_percentiles(cuts)?)
    }

    /// Order date window from the period flag, if given
    pub fn period(&self) -> crate::Result<Option<RangeInclusive<NaiveDate>>> {
        self.period
            .as_deref()
            .map(|raw| parse_range(raw, "period"))
            .transpose()
    }

    /// Table filter from the range and segment flags
    pub fn filter(&self) -> crate::Result<RfmFilter> {
        let mut filter = RfmFilter::new();
        if let Some(ref raw) = self.recency {
            filter = filter.recency(parse_range(raw, "recency")?);
        }
        if let Some(ref raw) = self.frequency {
            filter = filter.frequency(parse_range(raw, "frequency")?);
        }
        if let Some(ref raw) = self.monetary {
            filter = filter.monetary(parse_range(raw, "monetary")?);
        }

        let segments = self
            .segments
            .iter()
            .map(|s| s.parse::<Segment>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(filter.segments(segments))
    }
}

/// Parse an inclusive "min..max" range
fn parse_range<T>(raw: &str, name: &str) -> crate::Result<RangeInclusive<T>>
where
    T: FromStr + PartialOrd,
{
    let Some((min, max)) = raw.split_once("..") else {
        anyhow::bail!("{} range must be in format 'min..max', got '{}'", name, raw);
    };
    let min: T = min
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {} minimum: {}", name, min))?;
    let max: T = max
        .trim()
        .trim_start_matches('=')
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {} maximum: {}", name, max))?;
    if min > max {
        anyhow::bail!("{} range minimum exceeds maximum in '{}'", name, raw);
    }
    Ok(min..=max)
}
