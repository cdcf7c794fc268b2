//! RfmForge: a Rust CLI application for customer segmentation using RFM scoring
//!
//! This library turns a sales transaction log into per-customer Recency,
//! Frequency and Monetary scores, combines them into a three-digit RFM key
//! and assigns each customer a named segment.

pub mod aggregate;
pub mod cli;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod quintile;
pub mod report;
pub mod segment;
pub mod summary;
pub mod table;

// Re-export public items for easier access
pub use aggregate::{aggregate, Aggregation, CustomerAggregate};
pub use cli::Args;
pub use data::{
    load_transactions, transactions_frame, transactions_from_frame, LoadedTransactions,
    Transaction,
};
pub use error::{RfmError, RfmResult, RfmWarning};
pub use pipeline::{score_aggregates, score_transactions, RfmConfig, RfmReport};
pub use quintile::{Metric, PercentileCuts};
pub use segment::{CompositeScore, Segment};
pub use summary::{
    channel_product_volume, monthly_trend, segment_totals, segment_volume, ChannelProductVolume,
    MonthlyTrend, SalesSummary, SegmentTotals, SegmentVolume, VolumeDimension,
};
pub use table::{CustomerScore, RfmFilter, RfmTable};

/// Common result type used by the command-line layer
pub type Result<T> = anyhow::Result<T>;
