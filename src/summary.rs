//! Sales headline figures, trends and per-segment breakdowns

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use crate::data::{
    round_cents, transactions_frame, Transaction, CUSTOMER_ID_COLUMN, ORDER_DAY_COLUMN,
    ORDER_MONTH_COLUMN, PRODUCT_ID_COLUMN, PROFIT_COLUMN, QUANTITY_COLUMN, SALES_CHANNEL_COLUMN,
    SALES_COLUMN,
};
use crate::error::RfmResult;
use crate::segment::Segment;
use crate::table::RfmTable;

const SEGMENT_COLUMN: &str = "Customer Segment";
const VOLUME_ALIAS: &str = "Volume";
const CUSTOMERS_ALIAS: &str = "Customers";
const INCOMPLETE_ALIAS: &str = "Incomplete";

/// Headline figures of a sales log.
///
/// Rows with missing amounts contribute to order and customer counts only;
/// `incomplete_rows` says how many were left out of the money totals.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummary {
    pub total_revenue: f64,
    pub total_orders: usize,
    /// Sum of ordered quantities
    pub sales_volume: u64,
    pub total_profit: f64,
    pub total_customers: usize,
    pub first_order: Option<NaiveDate>,
    pub last_order: Option<NaiveDate>,
    /// Rows whose sales or profit amount could not be computed
    pub incomplete_rows: usize,
}

impl SalesSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        Self::summarize(transactions.iter())
    }

    /// Summary restricted to orders placed within `period` (inclusive).
    pub fn for_period(transactions: &[Transaction], period: RangeInclusive<NaiveDate>) -> Self {
        Self::summarize(
            transactions
                .iter()
                .filter(|txn| period.contains(&txn.order_date)),
        )
    }

    fn summarize<'a>(transactions: impl Iterator<Item = &'a Transaction>) -> Self {
        let mut orders = HashSet::new();
        let mut customers = HashSet::new();
        let mut summary = SalesSummary {
            total_revenue: 0.0,
            total_orders: 0,
            sales_volume: 0,
            total_profit: 0.0,
            total_customers: 0,
            first_order: None,
            last_order: None,
            incomplete_rows: 0,
        };

        for txn in transactions {
            orders.insert(txn.order_id.as_str());
            customers.insert(txn.customer_id.as_str());
            match (txn.sales_amount(), txn.profit_amount()) {
                (Some(sales), Some(profit)) => {
                    summary.total_revenue += sales;
                    summary.total_profit += profit;
                }
                (sales, _) => {
                    summary.total_revenue += sales.unwrap_or_default();
                    summary.incomplete_rows += 1;
                }
            }
            if let Some(quantity) = txn.quantity {
                summary.sales_volume += u64::from(quantity);
            }
            summary.first_order = Some(
                summary
                    .first_order
                    .map_or(txn.order_date, |d| d.min(txn.order_date)),
            );
            summary.last_order = Some(
                summary
                    .last_order
                    .map_or(txn.order_date, |d| d.max(txn.order_date)),
            );
        }

        summary.total_orders = orders.len();
        summary.total_customers = customers.len();
        summary.total_revenue = round_cents(summary.total_revenue);
        summary.total_profit = round_cents(summary.total_profit);
        summary
    }
}

/// Customers, sales and profit attributed to one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTotals {
    pub segment: Segment,
    pub customers: usize,
    pub sales: f64,
    pub profit: f64,
    /// Rows of this segment left out of `profit` (and of `sales` when the
    /// sales amount itself was missing)
    pub incomplete_rows: usize,
}

/// Join transactions to their customers' segments and total them.
///
/// Every segment is listed, in `Segment::ALL` order, even when empty.
pub fn segment_totals(transactions: &[Transaction], table: &RfmTable) -> RfmResult<Vec<SegmentTotals>> {
    let counts = table.segment_counts();
    let mut totals: Vec<SegmentTotals> = Segment::ALL
        .into_iter()
        .map(|segment| SegmentTotals {
            segment,
            customers: counts.get(&segment).copied().unwrap_or_default(),
            sales: 0.0,
            profit: 0.0,
            incomplete_rows: 0,
        })
        .collect();
    if transactions.is_empty() {
        return Ok(totals);
    }

    let grouped = segment_frame(transactions, table)?
        .lazy()
        .filter(col(SEGMENT_COLUMN).is_not_null())
        .group_by([col(SEGMENT_COLUMN)])
        .agg([
            col(SALES_COLUMN).sum(),
            col(PROFIT_COLUMN).sum(),
            col(PROFIT_COLUMN).null_count().alias(INCOMPLETE_ALIAS),
        ])
        .collect()?;

    let labels = grouped.column(SEGMENT_COLUMN)?.str()?;
    let sales = grouped.column(SALES_COLUMN)?.f64()?;
    let profit = grouped.column(PROFIT_COLUMN)?.f64()?;
    let incomplete = grouped.column(INCOMPLETE_ALIAS)?.cast(&DataType::UInt64)?;
    let incomplete = incomplete.u64()?;

    for idx in 0..grouped.height() {
        let Some(label) = labels.get(idx) else {
            continue;
        };
        let segment: Segment = label.parse()?;
        if let Some(entry) = totals.iter_mut().find(|t| t.segment == segment) {
            entry.sales = round_cents(sales.get(idx).unwrap_or_default());
            entry.profit = round_cents(profit.get(idx).unwrap_or_default());
            entry.incomplete_rows = incomplete.get(idx).unwrap_or_default() as usize;
        }
    }
    Ok(totals)
}

/// Sales and active customers of one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTrend {
    /// First day of the month
    pub month: NaiveDate,
    pub sales: f64,
    /// Distinct customers ordering in the month
    pub customers: usize,
}

/// Monthly sales and distinct-customer counts for orders within `period`,
/// oldest month first. Months without orders are not listed.
pub fn monthly_trend(
    transactions: &[Transaction],
    period: RangeInclusive<NaiveDate>,
) -> RfmResult<Vec<MonthlyTrend>> {
    if transactions.is_empty() {
        return Ok(Vec::new());
    }
    let first_day = period.start().num_days_from_ce();
    let last_day = period.end().num_days_from_ce();

    let grouped = transactions_frame(transactions)?
        .lazy()
        .filter(
            col(ORDER_DAY_COLUMN)
                .gt_eq(lit(first_day))
                .and(col(ORDER_DAY_COLUMN).lt_eq(lit(last_day))),
        )
        .group_by([col(ORDER_MONTH_COLUMN)])
        .agg([
            col(SALES_COLUMN).sum(),
            col(CUSTOMER_ID_COLUMN).n_unique().alias(CUSTOMERS_ALIAS),
        ])
        .collect()?;

    let months = grouped.column(ORDER_MONTH_COLUMN)?.i32()?;
    let sales = grouped.column(SALES_COLUMN)?.f64()?;
    let customers = grouped.column(CUSTOMERS_ALIAS)?.cast(&DataType::UInt64)?;
    let customers = customers.u64()?;

    let mut trend: Vec<MonthlyTrend> = (0..grouped.height())
        .filter_map(|idx| {
            let key = months.get(idx)?;
            Some(MonthlyTrend {
                month: NaiveDate::from_ymd_opt(key / 100, (key % 100) as u32, 1)?,
                sales: round_cents(sales.get(idx).unwrap_or_default()),
                customers: customers.get(idx).unwrap_or_default() as usize,
            })
        })
        .collect();
    trend.sort_by_key(|entry| entry.month);
    Ok(trend)
}

/// Units sold through one channel for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProductVolume {
    pub channel: String,
    pub product_id: String,
    pub volume: u64,
}

/// Ordered quantity per sales channel and product, sorted by channel then
/// product id. Rows without a channel or product are skipped.
pub fn channel_product_volume(transactions: &[Transaction]) -> RfmResult<Vec<ChannelProductVolume>> {
    if transactions.is_empty() {
        return Ok(Vec::new());
    }
    let df = transactions_frame(transactions)?;
    let volumes = grouped_volume(df, SALES_CHANNEL_COLUMN, PRODUCT_ID_COLUMN)?
        .into_iter()
        .map(|(channel, product_id, volume)| ChannelProductVolume {
            channel,
            product_id,
            volume,
        })
        .collect();
    Ok(volumes)
}

/// Breakdown used by [`segment_volume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDimension {
    Product,
    Channel,
}

impl VolumeDimension {
    fn column(self) -> &'static str {
        match self {
            VolumeDimension::Product => PRODUCT_ID_COLUMN,
            VolumeDimension::Channel => SALES_CHANNEL_COLUMN,
        }
    }
}

/// Units bought by one segment for one product or through one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentVolume {
    pub segment: Segment,
    /// Product id or channel name, depending on the dimension
    pub key: String,
    pub volume: u64,
}

/// Ordered quantity per segment and product (or channel), sorted by
/// segment then key.
pub fn segment_volume(
    transactions: &[Transaction],
    table: &RfmTable,
    dimension: VolumeDimension,
) -> RfmResult<Vec<SegmentVolume>> {
    if transactions.is_empty() {
        return Ok(Vec::new());
    }
    let df = segment_frame(transactions, table)?;
    let mut volumes = grouped_volume(df, SEGMENT_COLUMN, dimension.column())?
        .into_iter()
        .map(|(label, key, volume)| {
            Ok(SegmentVolume {
                segment: label.parse()?,
                key,
                volume,
            })
        })
        .collect::<RfmResult<Vec<_>>>()?;
    volumes.sort_by(|a, b| (a.segment, &a.key).cmp(&(b.segment, &b.key)));
    Ok(volumes)
}

/// Transactions frame with each row's customer segment attached.
fn segment_frame(transactions: &[Transaction], table: &RfmTable) -> RfmResult<DataFrame> {
    let mut df = transactions_frame(transactions)?;
    let labels: Vec<Option<&str>> = transactions
        .iter()
        .map(|txn| table.get(&txn.customer_id).map(|row| row.segment.label()))
        .collect();
    df.with_column(Series::new(SEGMENT_COLUMN, labels))?;
    Ok(df)
}

/// Sum of ordered quantity grouped by two text columns, nulls dropped.
fn grouped_volume(df: DataFrame, first: &str, second: &str) -> RfmResult<Vec<(String, String, u64)>> {
    let grouped = df
        .lazy()
        .filter(col(first).is_not_null().and(col(second).is_not_null()))
        .group_by([col(first), col(second)])
        .agg([col(QUANTITY_COLUMN).sum().alias(VOLUME_ALIAS)])
        .collect()?;

    let firsts = grouped.column(first)?.str()?;
    let seconds = grouped.column(second)?.str()?;
    let volumes = grouped.column(VOLUME_ALIAS)?.cast(&DataType::UInt64)?;
    let volumes = volumes.u64()?;

    let mut rows: Vec<(String, String, u64)> = (0..grouped.height())
        .filter_map(|idx| {
            Some((
                firsts.get(idx)?.to_owned(),
                seconds.get(idx)?.to_owned(),
                volumes.get(idx).unwrap_or_default(),
            ))
        })
        .collect();
    rows.sort();
    Ok(rows)
}

/// Dollar amount with a K/M/B suffix, two decimals.
pub fn format_large_number(value: f64) -> String {
    if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("${:.2}K", value / 1e3)
    } else {
        format!("${value:.2}")
    }
}
