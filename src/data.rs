//! Transaction records and CSV loading using Polars

use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{RfmError, RfmResult, RfmWarning};

pub const CUSTOMER_ID_COLUMN: &str = "_CustomerID";
pub const ORDER_ID_COLUMN: &str = "OrderNumber";
pub const ORDER_DATE_COLUMN: &str = "OrderDate";
pub const QUANTITY_COLUMN: &str = "Order Quantity";
pub const UNIT_PRICE_COLUMN: &str = "Unit Price";
pub const UNIT_COST_COLUMN: &str = "Unit Cost";
pub const DISCOUNT_COLUMN: &str = "Discount Applied";
pub const SALES_CHANNEL_COLUMN: &str = "Sales Channel";
pub const PRODUCT_ID_COLUMN: &str = "_ProductID";

/// Derived columns of [`transactions_frame`]
pub const ORDER_DAY_COLUMN: &str = "OrderDay";
pub const ORDER_MONTH_COLUMN: &str = "OrderMonth";
pub const SALES_COLUMN: &str = "Sales per Order";
pub const PROFIT_COLUMN: &str = "Profit per Order";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%y", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// One order line from the sales log.
///
/// Numeric fields are `None` when the source cell could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: String,
    pub order_id: String,
    pub order_date: NaiveDate,
    pub quantity: Option<u32>,
    pub unit_price: Option<f64>,
    pub unit_cost: Option<f64>,
    /// Fraction in `0.0..=1.0`
    pub discount: Option<f64>,
    pub sales_channel: Option<String>,
    pub product_id: Option<String>,
}

impl Transaction {
    /// Build a fully populated transaction.
    pub fn new(
        customer_id: impl Into<String>,
        order_id: impl Into<String>,
        order_date: NaiveDate,
        quantity: u32,
        unit_price: f64,
        unit_cost: f64,
        discount: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_id: order_id.into(),
            order_date,
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            unit_cost: Some(unit_cost),
            discount: Some(discount),
            sales_channel: None,
            product_id: None,
        }
    }

    pub fn with_sales_channel(mut self, channel: impl Into<String>) -> Self {
        self.sales_channel = Some(channel.into());
        self
    }

    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// `quantity * unit_price * (1 - discount)`, rounded to cents.
    pub fn sales_amount(&self) -> Option<f64> {
        let quantity = f64::from(self.quantity?);
        Some(round_cents(
            quantity * self.unit_price? * (1.0 - self.discount?),
        ))
    }

    /// `sales_amount - quantity * unit_cost`, rounded to cents.
    pub fn profit_amount(&self) -> Option<f64> {
        let sales = self.sales_amount()?;
        let quantity = f64::from(self.quantity?);
        Some(round_cents(sales - quantity * self.unit_cost?))
    }

    /// First input of the sales amount that is missing, if any.
    pub fn missing_sales_field(&self) -> Option<&'static str> {
        if self.quantity.is_none() {
            Some(QUANTITY_COLUMN)
        } else if self.unit_price.is_none() {
            Some(UNIT_PRICE_COLUMN)
        } else if self.discount.is_none() {
            Some(DISCOUNT_COLUMN)
        } else {
            None
        }
    }
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Transactions read from a dataset plus the cells that had to be treated as missing.
#[derive(Debug, Default)]
pub struct LoadedTransactions {
    pub transactions: Vec<Transaction>,
    pub warnings: Vec<RfmWarning>,
}

/// Load a CSV sales log and convert it into typed transactions.
///
/// Every column is read as text so that malformed cells can be reported
/// with their row and column instead of being coerced by the CSV reader.
///
/// # Arguments
/// * `path` - Path to a CSV file in the regional sales export layout
///
/// # Returns
/// The parsed transactions plus one `UnparseableValue` warning per numeric
/// cell that had to be treated as missing. A missing required column, an
/// empty identifier, a malformed date or an out-of-domain number fails with
/// `DataValidation`.
pub fn load_transactions(path: impl AsRef<Path>) -> RfmResult<LoadedTransactions> {
    let path = path.as_ref();
    info!(path = %path.display(), "reading transaction log");

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    debug!(rows = df.height(), columns = df.width(), "csv parsed");
    transactions_from_frame(&df)
}

/// Convert a data frame holding the sales log columns into transactions.
pub fn transactions_from_frame(df: &DataFrame) -> RfmResult<LoadedTransactions> {
    let customers = text_cells(df, CUSTOMER_ID_COLUMN)?;
    let orders = text_cells(df, ORDER_ID_COLUMN)?;
    let dates = text_cells(df, ORDER_DATE_COLUMN)?;
    let quantities = text_cells(df, QUANTITY_COLUMN)?;
    let prices = text_cells(df, UNIT_PRICE_COLUMN)?;
    let costs = text_cells(df, UNIT_COST_COLUMN)?;
    let discounts = text_cells(df, DISCOUNT_COLUMN)?;
    let channels = optional_text_cells(df, SALES_CHANNEL_COLUMN)?;
    let products = optional_text_cells(df, PRODUCT_ID_COLUMN)?;

    let mut loaded = LoadedTransactions {
        transactions: Vec::with_capacity(df.height()),
        warnings: Vec::new(),
    };

    for idx in 0..df.height() {
        let row = idx + 1;
        let customer_id = required_text(&customers[idx], row, CUSTOMER_ID_COLUMN)?;
        let order_id = required_text(&orders[idx], row, ORDER_ID_COLUMN)?;

        let raw_date = required_text(&dates[idx], row, ORDER_DATE_COLUMN)?;
        let order_date = parse_order_date(&raw_date).ok_or_else(|| {
            RfmError::validation(
                Some(row),
                ORDER_DATE_COLUMN,
                format!("unrecognised date '{raw_date}'"),
            )
        })?;

        let mut cell = |cells: &[Option<String>], column: &str| {
            numeric_cell(cells[idx].as_deref(), row, column, &mut loaded.warnings)
        };
        let quantity = cell(&quantities, QUANTITY_COLUMN);
        let unit_price = cell(&prices, UNIT_PRICE_COLUMN);
        let unit_cost = cell(&costs, UNIT_COST_COLUMN);
        let discount = cell(&discounts, DISCOUNT_COLUMN);

        let transaction = Transaction {
            customer_id,
            order_id,
            order_date,
            quantity: quantity.map(|q| to_quantity(q, row)).transpose()?,
            unit_price: unit_price
                .map(|p| non_negative(p, row, UNIT_PRICE_COLUMN))
                .transpose()?,
            unit_cost: unit_cost
                .map(|c| non_negative(c, row, UNIT_COST_COLUMN))
                .transpose()?,
            discount: discount.map(|d| to_discount(d, row)).transpose()?,
            sales_channel: non_empty(&channels[idx]),
            product_id: non_empty(&products[idx]),
        };
        loaded.transactions.push(transaction);
    }

    info!(
        transactions = loaded.transactions.len(),
        warnings = loaded.warnings.len(),
        "transaction log loaded"
    );
    Ok(loaded)
}

fn text_cells(df: &DataFrame, name: &str) -> RfmResult<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| RfmError::validation(None, name, "required column is missing"))?;
    let as_text = column.cast(&DataType::String)?;
    let cells = as_text
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::to_owned))
        .collect();
    Ok(cells)
}

/// Like `text_cells`, but an absent column reads as all missing.
fn optional_text_cells(df: &DataFrame, name: &str) -> RfmResult<Vec<Option<String>>> {
    if df.get_column_index(name).is_none() {
        return Ok(vec![None; df.height()]);
    }
    text_cells(df, name)
}

fn non_empty(cell: &Option<String>) -> Option<String> {
    cell.as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

fn required_text(cell: &Option<String>, row: usize, column: &str) -> RfmResult<String> {
    match cell.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_owned()),
        _ => Err(RfmError::validation(Some(row), column, "value is required")),
    }
}

/// Parse a numeric cell, recording a warning instead of failing when the
/// text is not a number.
fn numeric_cell(
    raw: Option<&str>,
    row: usize,
    column: &str,
    warnings: &mut Vec<RfmWarning>,
) -> Option<f64> {
    let raw = raw.unwrap_or_default();
    let parsed = parse_number(raw);
    if parsed.is_none() {
        let warning = RfmWarning::UnparseableValue {
            row,
            column: column.to_owned(),
            value: raw.to_owned(),
        };
        warn!("{warning}");
        warnings.push(warning);
    }
    parsed
}

/// Lay transactions out as a polars frame for group-by aggregation.
///
/// Identifier, channel and product columns keep their source names. Order
/// dates become `OrderDay` (days since 0001-01-01) and `OrderMonth`
/// (`yyyymm`). Sales and profit amounts are null where an input is missing.
pub fn transactions_frame(transactions: &[Transaction]) -> RfmResult<DataFrame> {
    let customers: Vec<&str> = transactions.iter().map(|t| t.customer_id.as_str()).collect();
    let orders: Vec<&str> = transactions.iter().map(|t| t.order_id.as_str()).collect();
    let days: Vec<i32> = transactions
        .iter()
        .map(|t| t.order_date.num_days_from_ce())
        .collect();
    let months: Vec<i32> = transactions
        .iter()
        .map(|t| t.order_date.year() * 100 + t.order_date.month() as i32)
        .collect();
    let channels: Vec<Option<&str>> = transactions
        .iter()
        .map(|t| t.sales_channel.as_deref())
        .collect();
    let products: Vec<Option<&str>> = transactions
        .iter()
        .map(|t| t.product_id.as_deref())
        .collect();
    let quantities: Vec<Option<u64>> = transactions
        .iter()
        .map(|t| t.quantity.map(u64::from))
        .collect();
    let sales: Vec<Option<f64>> = transactions.iter().map(Transaction::sales_amount).collect();
    let profit: Vec<Option<f64>> = transactions.iter().map(Transaction::profit_amount).collect();

    let df = df!(
        CUSTOMER_ID_COLUMN => customers,
        ORDER_ID_COLUMN => orders,
        ORDER_DAY_COLUMN => days,
        ORDER_MONTH_COLUMN => months,
        SALES_CHANNEL_COLUMN => channels,
        PRODUCT_ID_COLUMN => products,
        QUANTITY_COLUMN => quantities,
        SALES_COLUMN => sales,
        PROFIT_COLUMN => profit
    )?;
    Ok(df)
}

/// Inverse of the `OrderDay` encoding used by [`transactions_frame`].
pub(crate) fn date_from_order_day(day: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day)
}

/// Parse a decimal number, tolerating surrounding whitespace and `,`
/// thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an order date in any of the layouts seen in sales exports.
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn non_negative(value: f64, row: usize, column: &str) -> RfmResult<f64> {
    if value < 0.0 {
        return Err(RfmError::validation(
            Some(row),
            column,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(value)
}

fn to_quantity(value: f64, row: usize) -> RfmResult<u32> {
    let value = non_negative(value, row, QUANTITY_COLUMN)?;
    if value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(RfmError::validation(
            Some(row),
            QUANTITY_COLUMN,
            format!("must be a whole number, got {value}"),
        ));
    }
    Ok(value as u32)
}

fn to_discount(value: f64, row: usize) -> RfmResult<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RfmError::validation(
            Some(row),
            DISCOUNT_COLUMN,
            format!("must be a fraction between 0 and 1, got {value}"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "OrderNumber,Sales Channel,_CustomerID,OrderDate,Order Quantity,Discount Applied,Unit Cost,Unit Price";

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_load_transactions() {
        let file = write_csv(&[
            "SO-000101,In-Store,15,31/05/18,5,0.075,1001.18,\"1,963.10\"",
            "SO-000102,Online,20,2018-06-01,3,0.05,3348.66,3939.60",
        ]);

        let loaded = load_transactions(file.path()).unwrap();
        assert_eq!(loaded.transactions.len(), 2);
        assert!(loaded.warnings.is_empty());

        let first = &loaded.transactions[0];
        assert_eq!(first.customer_id, "15");
        assert_eq!(first.order_id, "SO-000101");
        assert_eq!(first.order_date, date(2018, 5, 31));
        assert_eq!(first.quantity, Some(5));
        assert_eq!(first.unit_price, Some(1963.10));
        assert_eq!(loaded.transactions[1].order_date, date(2018, 6, 1));
        assert_eq!(first.sales_channel.as_deref(), Some("In-Store"));
        assert_eq!(first.product_id, None);
    }

    #[test]
    fn test_transactions_frame_keeps_missing_amounts_null() {
        let mut broken = Transaction::new("B", "SO-2", date(2020, 2, 29), 1, 5.0, 1.0, 0.0)
            .with_sales_channel("Online")
            .with_product_id("12");
        broken.discount = None;
        let transactions = vec![
            Transaction::new("A", "SO-1", date(2020, 1, 5), 2, 10.0, 4.0, 0.0),
            broken,
        ];

        let df = transactions_frame(&transactions).unwrap();
        assert_eq!(df.shape(), (2, 9));
        assert_eq!(df.column(SALES_COLUMN).unwrap().null_count(), 1);
        assert_eq!(df.column(SALES_CHANNEL_COLUMN).unwrap().null_count(), 1);

        let months: Vec<Option<i32>> = df
            .column(ORDER_MONTH_COLUMN)
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(months, vec![Some(202001), Some(202002)]);

        let day = df.column(ORDER_DAY_COLUMN).unwrap().i32().unwrap().get(1).unwrap();
        assert_eq!(date_from_order_day(day), Some(date(2020, 2, 29)));
    }

    #[test]
    fn test_unparseable_numbers_become_missing_with_warning() {
        let file = write_csv(&["SO-1,Online,7,2020-01-02,n/a,0.1,10,20"]);

        let loaded = load_transactions(file.path()).unwrap();
        let txn = &loaded.transactions[0];
        assert_eq!(txn.quantity, None);
        assert_eq!(txn.sales_amount(), None);
        assert_eq!(
            loaded.warnings,
            vec![RfmWarning::UnparseableValue {
                row: 1,
                column: QUANTITY_COLUMN.to_string(),
                value: "n/a".to_string(),
            }]
        );
    }

    #[test]
    fn test_malformed_date_fails_with_row_context() {
        let file = write_csv(&[
            "SO-1,Online,7,2020-01-02,1,0.1,10,20",
            "SO-2,Online,7,not-a-date,1,0.1,10,20",
        ]);

        match load_transactions(file.path()) {
            Err(RfmError::DataValidation { row, column, .. }) => {
                assert_eq!(row, Some(2));
                assert_eq!(column, ORDER_DATE_COLUMN);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "OrderNumber,_CustomerID,OrderDate").unwrap();
        writeln!(file, "SO-1,7,2020-01-02").unwrap();

        match load_transactions(file.path()) {
            Err(RfmError::DataValidation { row, column, .. }) => {
                assert_eq!(row, None);
                assert_eq!(column, QUANTITY_COLUMN);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_discount_is_rejected() {
        let file = write_csv(&["SO-1,Online,7,2020-01-02,1,1.5,10,20"]);
        assert!(matches!(
            load_transactions(file.path()),
            Err(RfmError::DataValidation { .. })
        ));
    }

    #[test]
    fn test_frame_with_numeric_columns() {
        let df = df!(
            "_CustomerID" => &[1i64, 2],
            "OrderNumber" => &["A", "B"],
            "OrderDate" => &["2020-03-01", "2020-03-02T10:15:00"],
            "Order Quantity" => &[2i64, 4],
            "Unit Price" => &[10.0, 2.5],
            "Unit Cost" => &[4.0, 1.0],
            "Discount Applied" => &[0.0, 0.5]
        )
        .unwrap();

        let loaded = transactions_from_frame(&df).unwrap();
        assert_eq!(loaded.transactions[0].customer_id, "1");
        assert_eq!(loaded.transactions[1].order_date, date(2020, 3, 2));
        assert_eq!(loaded.transactions[1].sales_amount(), Some(5.0));
    }

    #[test]
    fn test_sales_and_profit_amounts() {
        let txn = Transaction::new("c", "o", date(2020, 1, 1), 5, 1963.10, 1001.18, 0.075);
        assert_eq!(txn.sales_amount(), Some(9079.34));
        assert_eq!(txn.profit_amount(), Some(4073.44));
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
