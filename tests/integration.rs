//! Integration tests for RfmForge

use chrono::NaiveDate;
use rfmforge::{
    channel_product_volume, load_transactions, monthly_trend, score_aggregates,
    score_transactions, segment_totals, CustomerAggregate, Metric, RfmConfig, RfmError,
    RfmFilter, RfmWarning, SalesSummary, Segment, Transaction,
};
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "OrderNumber,Sales Channel,WarehouseCode,ProcuredDate,OrderDate,ShipDate,DeliveryDate,CurrencyCode,_SalesTeamID,_CustomerID,_StoreID,_ProductID,Order Quantity,Discount Applied,Unit Cost,Unit Price";

/// Create a test CSV file in the regional sales export layout
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();

    // Customer 15 - frequent, recent, high value
    writeln!(file, "SO-000101,In-Store,WARE-UHY1004,31/12/17,31/10/20,14/11/20,19/11/20,USD,6,15,259,12,5,0.075,\"1,001.18\",\"1,963.10\"").unwrap();
    writeln!(file, "SO-000102,Online,WARE-NMK1003,31/12/17,15/12/20,26/12/20,30/12/20,USD,14,15,196,27,3,0.075,\"3,348.66\",\"3,939.60\"").unwrap();
    writeln!(file, "SO-000103,Distributor,WARE-UHY1004,31/12/17,20/12/20,01/01/21,03/01/21,USD,21,15,213,16,1,0.05,781.22,\"1,775.50\"").unwrap();

    // Customer 20 - two orders mid-year
    writeln!(file, "SO-000104,Wholesale,WARE-NMK1003,31/12/17,01/06/20,09/06/20,14/06/20,USD,28,20,107,23,8,0.075,\"1,464.69\",\"2,324.90\"").unwrap();
    writeln!(file, "SO-000105,Distributor,WARE-PUJ1005,31/12/17,12/07/20,14/07/20,27/07/20,USD,22,20,111,26,8,0.1,\"1,476.14\",\"1,822.40\"").unwrap();

    // Customer 31 - single small order long ago
    writeln!(file, "SO-000106,Online,WARE-XYS1001,31/12/17,02/02/19,10/02/19,12/02/19,USD,12,31,285,1,2,0.05,446.56,526.70").unwrap();

    // Customer 44 - single order last quarter
    writeln!(file, "SO-000107,In-Store,WARE-PUJ1005,31/12/17,05/11/20,12/11/20,20/11/20,USD,10,44,6,5,6,0.15,536.47,\"1,038.20\"").unwrap();

    // Customer 50 - old, one order with two lines
    writeln!(file, "SO-000108,Online,WARE-UHY1004,31/12/17,10/03/19,17/03/19,20/03/19,USD,6,50,280,46,7,0.05,\"1,825.47\",\"2,211.00\"").unwrap();
    writeln!(file, "SO-000108,Online,WARE-UHY1004,31/12/17,10/03/19,17/03/19,20/03/19,USD,6,50,280,47,1,0.05,105.98,160.80").unwrap();

    file
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path()).unwrap();
    assert_eq!(loaded.transactions.len(), 9);
    assert!(loaded.warnings.is_empty());

    let report = score_transactions(&loaded.transactions, &RfmConfig::default()).unwrap();
    let table = &report.table;
    assert_eq!(table.len(), 5);

    let c15 = table.get("15").unwrap();
    assert_eq!(c15.frequency, 3);
    assert_eq!(c15.last_transaction, date(2020, 12, 20));
    assert_eq!(c15.recency_days, 12);
    assert_eq!(c15.scores.recency, 5);
    assert_eq!(c15.scores.frequency, 5);
    assert_eq!(c15.scores.monetary, 4);
    assert_eq!(c15.segment, Segment::Champions);

    let c50 = table.get("50").unwrap();
    assert_eq!(c50.frequency, 1);

    // Every customer appears exactly once and has a valid key
    let mut ids: Vec<&str> = table.rows().iter().map(|r| r.customer_id.as_str()).collect();
    ids.dedup();
    assert_eq!(ids, vec!["15", "20", "31", "44", "50"]);
    for row in table.rows() {
        assert_eq!(row.rfm_key.len(), 3);
        assert!(row.rfm_key.chars().all(|c| ('1'..='5').contains(&c)));
    }

    let totals = segment_totals(&loaded.transactions, table).unwrap();
    assert_eq!(totals.iter().map(|t| t.customers).sum::<usize>(), 5);
}

#[test]
fn test_pipeline_is_idempotent() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path()).unwrap();
    let config = RfmConfig::default();

    let first = score_transactions(&loaded.transactions, &config).unwrap();
    let second = score_transactions(&loaded.transactions, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_reference_date_changes_recency() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path()).unwrap();

    let config = RfmConfig::default().with_reference_date(date(2021, 6, 30));
    let report = score_transactions(&loaded.transactions, &config).unwrap();
    assert_eq!(report.table.get("15").unwrap().recency_days, 192);
}

#[test]
fn test_filters_on_loaded_data() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path()).unwrap();
    let report = score_transactions(&loaded.transactions, &RfmConfig::default()).unwrap();
    let table = &report.table;

    let recent = table.filter_recency(0..=60);
    assert_eq!(recent.len(), 2);

    let repeat_buyers = table.filter_frequency(2..=u32::MAX);
    assert_eq!(repeat_buyers.len(), 2);

    let champions = table.filter_segments(&[Segment::Champions]);
    assert!(champions.iter().any(|r| r.customer_id == "15"));

    let combined = table.filter(&RfmFilter::new().recency(0..=60).frequency(3..=3));
    assert_eq!(combined.len(), 1);
    assert_eq!(combined[0].customer_id, "15");
}

#[test]
fn test_identical_monetary_gives_neutral_scores() {
    let transactions: Vec<Transaction> = (0..6)
        .map(|i| {
            Transaction::new(
                format!("C{i}"),
                format!("SO-{i}"),
                date(2020, 1, 1) + chrono::Duration::days(i * 40),
                1,
                1000.0,
                400.0,
                0.0,
            )
        })
        .collect();

    let report = score_transactions(&transactions, &RfmConfig::default()).unwrap();
    assert!(report.table.rows().iter().all(|r| r.scores.monetary == 3));
    assert!(report.warnings.contains(&RfmWarning::DegenerateMetric {
        metric: Metric::Monetary,
        value: 1000.0
    }));
}

#[test]
fn test_recency_only_customers() {
    let reference = date(2021, 1, 1);
    let mut transactions = Vec::new();
    for (customer, days_ago) in [("now", 0), ("ten", 10), ("lapsed", 400)] {
        for order in 0..10 {
            transactions.push(Transaction::new(
                customer,
                format!("{customer}-{order}"),
                reference - chrono::Duration::days(days_ago),
                1,
                100.0,
                50.0,
                0.0,
            ));
        }
    }

    let report = score_transactions(&transactions, &RfmConfig::default()).unwrap();
    let table = &report.table;
    let now = table.get("now").unwrap();
    let ten = table.get("ten").unwrap();
    let lapsed = table.get("lapsed").unwrap();

    assert!(now.scores.recency > ten.scores.recency);
    assert!(ten.scores.recency > lapsed.scores.recency);
    for row in [now, ten, lapsed] {
        assert_eq!(&row.rfm_key[1..], "33");
    }
    assert_eq!(now.segment, Segment::Champions);
    assert_ne!(now.segment, ten.segment);
    assert_ne!(ten.segment, lapsed.segment);
}

#[test]
fn test_missing_values_flow_into_warnings() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    writeln!(file, "SO-1,Online,W,31/12/17,01/12/20,,,USD,1,7,1,1,2,0.1,10,20").unwrap();
    writeln!(file, "SO-2,Online,W,31/12/17,05/12/20,,,USD,1,7,1,1,2,0.1,10,N/A").unwrap();
    writeln!(file, "SO-3,Online,W,31/12/17,05/10/20,,,USD,1,8,1,1,1,0.0,10,30").unwrap();

    let loaded = load_transactions(file.path()).unwrap();
    assert_eq!(loaded.warnings.len(), 1);

    let report = score_transactions(&loaded.transactions, &RfmConfig::default()).unwrap();
    let c7 = report.table.get("7").unwrap();
    assert_eq!(c7.frequency, 2);
    assert_eq!(c7.last_transaction, date(2020, 12, 5));
    assert!((c7.monetary - 36.0).abs() < 1e-9);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, RfmWarning::MissingValue { order_id, .. } if order_id == "SO-2")));
}

#[test]
fn test_header_only_file_is_empty_dataset() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();

    let loaded = load_transactions(file.path()).unwrap();
    assert!(loaded.transactions.is_empty());
    assert!(matches!(
        score_transactions(&loaded.transactions, &RfmConfig::default()),
        Err(RfmError::EmptyDataset)
    ));
}

#[test]
fn test_collapsed_frequency_keeps_one_order_customers_neutral() {
    let reference = date(2021, 1, 1);
    let mut customers: Vec<CustomerAggregate> = (0..9)
        .map(|i| CustomerAggregate {
            customer_id: format!("c{i}"),
            last_transaction: reference - chrono::Duration::days(30 + i),
            frequency: 1,
            monetary: 100.0,
        })
        .collect();
    customers.push(CustomerAggregate {
        customer_id: "whale".to_string(),
        last_transaction: reference - chrono::Duration::days(5),
        frequency: 40,
        monetary: 50_000.0,
    });

    let report = score_aggregates(&customers, &RfmConfig::default()).unwrap();
    let c8 = report.table.get("c8").unwrap();
    assert_eq!(c8.scores.frequency, 3);
    assert_ne!(c8.segment, Segment::Champions);
    assert!(report.warnings.contains(&RfmWarning::DegenerateMetric {
        metric: Metric::Frequency,
        value: 1.0
    }));
    assert!(report.warnings.contains(&RfmWarning::DegenerateMetric {
        metric: Metric::Monetary,
        value: 100.0
    }));
}

#[test]
fn test_trend_and_channel_breakdowns_from_csv() {
    let test_file = create_test_csv();
    let loaded = load_transactions(test_file.path()).unwrap();
    let transactions = &loaded.transactions;

    let year = date(2020, 1, 1)..=date(2020, 12, 31);
    let summary = SalesSummary::for_period(transactions, year.clone());
    assert_eq!(summary.total_orders, 6);
    assert_eq!(summary.incomplete_rows, 0);

    let trend = monthly_trend(transactions, year).unwrap();
    let months: Vec<(NaiveDate, usize)> = trend.iter().map(|t| (t.month, t.customers)).collect();
    assert_eq!(
        months,
        vec![
            (date(2020, 6, 1), 1),
            (date(2020, 7, 1), 1),
            (date(2020, 10, 1), 1),
            (date(2020, 11, 1), 1),
            (date(2020, 12, 1), 1),
        ]
    );

    let volumes = channel_product_volume(transactions).unwrap();
    assert_eq!(volumes.len(), 9);
    assert_eq!(volumes.iter().map(|v| v.volume).sum::<u64>(), 41);
    let online_46 = volumes
        .iter()
        .find(|v| v.channel == "Online" && v.product_id == "46")
        .unwrap();
    assert_eq!(online_46.volume, 7);
}
