//! Error and warning types for the RFM pipeline.
//!
//! Fatal conditions are `RfmError` variants. Non-fatal conditions are
//! collected as `RfmWarning`s and returned next to the result they affect.

use std::fmt;

use thiserror::Error;

use crate::quintile::Metric;

#[derive(Debug, Error)]
pub enum RfmError {
    /// A required column is absent or a cell holds an unusable value.
    /// `row` is `None` for table-level problems such as a missing column.
    #[error("{}", describe_validation(.row, .column, .message))]
    DataValidation {
        row: Option<usize>,
        column: String,
        message: String,
    },

    #[error("no transactions supplied; refusing to score an empty dataset")]
    EmptyDataset,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RfmError {
    pub(crate) fn validation(
        row: Option<usize>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RfmError::DataValidation {
            row,
            column: column.into(),
            message: message.into(),
        }
    }
}

fn describe_validation(row: &Option<usize>, column: &str, message: &str) -> String {
    match row {
        Some(row) => format!("invalid value in column '{column}' at row {row}: {message}"),
        None => format!("invalid column '{column}': {message}"),
    }
}

/// Result type alias for library operations.
pub type RfmResult<T> = Result<T, RfmError>;

/// Conditions that do not stop a run but must not go unnoticed.
#[derive(Debug, Clone, PartialEq)]
pub enum RfmWarning {
    /// A numeric cell could not be parsed and was treated as missing.
    UnparseableValue {
        row: usize,
        column: String,
        value: String,
    },
    /// A transaction's sales amount was missing and left out of the
    /// customer's monetary total.
    MissingValue {
        customer_id: String,
        order_id: String,
        field: &'static str,
    },
    /// All four percentile thresholds of this metric coincide at `value`,
    /// so the neutral score was assigned to every customer.
    DegenerateMetric { metric: Metric, value: f64 },
}

impl fmt::Display for RfmWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RfmWarning::UnparseableValue { row, column, value } => write!(
                f,
                "row {row}: could not parse '{value}' in column '{column}', treating as missing"
            ),
            RfmWarning::MissingValue {
                customer_id,
                order_id,
                field,
            } => write!(
                f,
                "customer {customer_id}, order {order_id}: {field} is missing, excluded from monetary total"
            ),
            RfmWarning::DegenerateMetric { metric, value } => write!(
                f,
                "{metric}: all percentile thresholds equal {value}, assigning neutral score to all"
            ),
        }
    }
}
