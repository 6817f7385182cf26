use chrono::NaiveDate;
use towerlog::destination::Warehouse;
use towerlog::destination::memory::MemoryWarehouse;
use towerlog::metadata::{TIMESTAMP_COLUMN, data_table_name, site_number};
use towerlog::schema::{SchemaOutcome, ensure_schema};
use towerlog::text::{ExtractedTable, TableExtraction, TextDocument, extract_table};
use towerlog::types::{Cell, ColumnKind};
use towerlog::upsert::{KeyStrategy, UpsertOutcome, upsert_new};
use towerlog_telemetry::tracing::init_test_tracing;

// ── helpers ──────────────────────────────────────────────────────────────

const HEADER: &str = "Export Parameters\nSite Number: 42\n\n";

fn extract(text: &str) -> ExtractedTable {
    match extract_table(&TextDocument::from_text(text), TIMESTAMP_COLUMN, TIMESTAMP_COLUMN) {
        TableExtraction::Table(table) => table,
        other => panic!("expected a table, got {other:?}"),
    }
}

fn load(warehouse: &MemoryWarehouse, table_name: &str, text: &str) -> UpsertOutcome {
    let table = extract(text);
    let outcome = ensure_schema(warehouse, table_name, &table.batch, TIMESTAMP_COLUMN, true).unwrap();
    assert!(outcome.is_ready());

    upsert_new(
        warehouse,
        table_name,
        table.batch,
        KeyStrategy::Primary {
            column: TIMESTAMP_COLUMN,
        },
    )
    .unwrap()
}

fn upsert_after_schema(warehouse: &MemoryWarehouse, table_name: &str, text: &str) -> UpsertOutcome {
    let table = extract(text);
    assert_eq!(
        ensure_schema(warehouse, table_name, &table.batch, TIMESTAMP_COLUMN, true).unwrap(),
        SchemaOutcome::Created
    );

    upsert_new(
        warehouse,
        table_name,
        table.batch,
        KeyStrategy::Primary {
            column: TIMESTAMP_COLUMN,
        },
    )
    .unwrap()
}

// ── scenarios ────────────────────────────────────────────────────────────

#[test]
fn single_row_export_creates_keyed_table() {
    init_test_tracing();

    let text = format!("{HEADER}Timestamp\tVal1\n2024-01-01T00:00:00\t10\n");
    let doc = TextDocument::from_text(&text);
    let table_name = data_table_name("NRG_Tower_SN", &site_number(&doc).unwrap());
    assert_eq!(table_name, "NRG_Tower_SN_42");

    let table = extract(&text);
    assert_eq!(table.batch.len(), 1);
    assert_eq!(table.batch.columns()[0].kind, ColumnKind::Timestamp);
    assert_eq!(table.batch.columns()[1].kind, ColumnKind::Integer);

    let warehouse = MemoryWarehouse::new();
    let outcome = upsert_after_schema(&warehouse, &table_name, &text);
    assert_eq!(outcome.as_count(), 1);

    let schema = warehouse.table_schema(&table_name).unwrap();
    assert_eq!(schema[0].name, "Timestamp");
    assert!(schema[0].primary_key);
}

#[test]
fn identical_batch_twice_inserts_nothing_new() {
    init_test_tracing();
    let warehouse = MemoryWarehouse::new();
    let text = format!(
        "{HEADER}Timestamp\tVal1\n2024-01-01 00:00:00\t10\n2024-01-01 00:10:00\t12\n"
    );

    assert_eq!(load(&warehouse, "NRG_Tower_SN_42", &text), UpsertOutcome::Inserted(2));
    assert_eq!(load(&warehouse, "NRG_Tower_SN_42", &text), UpsertOutcome::NothingNew);
    assert_eq!(warehouse.columns_added().unwrap(), 0);
}

#[test]
fn duplicate_timestamp_is_skipped() {
    init_test_tracing();
    let warehouse = MemoryWarehouse::new();

    let first = format!("{HEADER}Timestamp\tVal1\n2024-01-01 00:00:00\t10\n");
    let second = format!(
        "{HEADER}Timestamp\tVal1\n2024-01-01 00:00:00\t99\n2024-01-01 00:10:00\t11\n"
    );

    assert_eq!(load(&warehouse, "NRG_Tower_SN_42", &first).as_count(), 1);
    assert_eq!(load(&warehouse, "NRG_Tower_SN_42", &second).as_count(), 1);

    let midnight = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let rows = warehouse.table_rows("NRG_Tower_SN_42").unwrap();
    let stored = rows
        .iter()
        .find(|row| row.values()[0] == Cell::Timestamp(midnight))
        .unwrap();
    assert_eq!(stored.values()[1], Cell::Integer(10));
}

#[test]
fn new_metric_column_is_added() {
    init_test_tracing();
    let warehouse = MemoryWarehouse::new();

    let first = format!("{HEADER}Timestamp\tVal1\n2024-01-01 00:00:00\t10\n");
    let second = format!("{HEADER}Timestamp\tVal1\tNewMetric\n2024-01-01 00:10:00\t11\t0.5\n");
    load(&warehouse, "NRG_Tower_SN_42", &first);

    let table = extract(&second);
    let outcome =
        ensure_schema(&warehouse, "NRG_Tower_SN_42", &table.batch, TIMESTAMP_COLUMN, true).unwrap();

    assert_eq!(
        outcome,
        SchemaOutcome::Altered {
            added: vec!["NewMetric".to_owned()]
        }
    );
    assert_eq!(warehouse.columns_added().unwrap(), 1);
    assert_eq!(
        warehouse.table_columns("NRG_Tower_SN_42").unwrap(),
        vec!["Timestamp", "Val1", "NewMetric"]
    );

    let inserted = upsert_new(
        &warehouse,
        "NRG_Tower_SN_42",
        table.batch,
        KeyStrategy::Primary {
            column: TIMESTAMP_COLUMN,
        },
    )
    .unwrap();
    assert_eq!(inserted, UpsertOutcome::Inserted(1));
    assert_eq!(
        warehouse.table_rows("NRG_Tower_SN_42").unwrap()[0].values()[2],
        Cell::Null
    );
}
