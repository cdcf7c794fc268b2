//! Per-customer recency, frequency and monetary aggregation using Polars

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::data::{
    date_from_order_day, transactions_frame, Transaction, CUSTOMER_ID_COLUMN, ORDER_DATE_COLUMN,
    ORDER_DAY_COLUMN, ORDER_ID_COLUMN, SALES_COLUMN,
};
use crate::error::{RfmError, RfmResult, RfmWarning};

const LAST_DAY_ALIAS: &str = "LastOrderDay";
const FREQUENCY_ALIAS: &str = "Frequency";
const MONETARY_ALIAS: &str = "Monetary";

/// Raw RFM inputs for one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub last_transaction: NaiveDate,
    /// Distinct orders placed
    pub frequency: u32,
    /// Total sales amount
    pub monetary: f64,
}

/// Aggregates sorted by customer id, plus the rows left out of monetary totals.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Aggregation {
    pub customers: Vec<CustomerAggregate>,
    pub warnings: Vec<RfmWarning>,
}

/// Group transactions by customer.
///
/// Rows without a usable sales amount still count towards frequency and
/// recency but are excluded from the monetary sum with a warning.
pub fn aggregate(transactions: &[Transaction]) -> RfmResult<Aggregation> {
    if transactions.is_empty() {
        return Ok(Aggregation::default());
    }

    let df = transactions_frame(transactions)?;
    let warnings = missing_sales_warnings(&df, transactions)?;

    let rfm_df = df
        .lazy()
        .group_by([col(CUSTOMER_ID_COLUMN)])
        .agg([
            col(ORDER_DAY_COLUMN).max().alias(LAST_DAY_ALIAS),
            col(ORDER_ID_COLUMN).n_unique().alias(FREQUENCY_ALIAS),
            // Nulls are skipped, so rows without an amount drop out here
            col(SALES_COLUMN).sum().alias(MONETARY_ALIAS),
        ])
        .collect()?;

    let customer_ids = rfm_df.column(CUSTOMER_ID_COLUMN)?.str()?;
    let last_days = rfm_df.column(LAST_DAY_ALIAS)?.i32()?;
    let frequency = rfm_df.column(FREQUENCY_ALIAS)?.cast(&DataType::UInt32)?;
    let frequency = frequency.u32()?;
    let monetary = rfm_df.column(MONETARY_ALIAS)?.f64()?;

    let mut customers = Vec::with_capacity(rfm_df.height());
    for idx in 0..rfm_df.height() {
        let (Some(customer_id), Some(last_day)) = (customer_ids.get(idx), last_days.get(idx)) else {
            return Err(RfmError::validation(
                None,
                CUSTOMER_ID_COLUMN,
                "group without customer id or order date",
            ));
        };
        let last_transaction = date_from_order_day(last_day).ok_or_else(|| {
            RfmError::validation(None, ORDER_DATE_COLUMN, "order date out of range")
        })?;
        customers.push(CustomerAggregate {
            customer_id: customer_id.to_owned(),
            last_transaction,
            frequency: frequency.get(idx).unwrap_or_default(),
            monetary: monetary.get(idx).unwrap_or_default(),
        });
    }
    customers.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

    debug!(
        transactions = transactions.len(),
        customers = customers.len(),
        "aggregated transactions"
    );
    Ok(Aggregation {
        customers,
        warnings,
    })
}

/// One `MissingValue` warning per row whose sales amount is null.
fn missing_sales_warnings(df: &DataFrame, transactions: &[Transaction]) -> RfmResult<Vec<RfmWarning>> {
    let missing = df.column(SALES_COLUMN)?.is_null();
    let warnings = missing
        .into_iter()
        .zip(transactions)
        .filter(|(is_null, _)| *is_null == Some(true))
        .map(|(_, txn)| {
            let warning = RfmWarning::MissingValue {
                customer_id: txn.customer_id.clone(),
                order_id: txn.order_id.clone(),
                field: txn.missing_sales_field().unwrap_or(SALES_COLUMN),
            };
            warn!("{warning}");
            warning
        })
        .collect();
    Ok(warnings)
}
