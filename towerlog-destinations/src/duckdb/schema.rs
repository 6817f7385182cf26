use pg_escape::quote_identifier;
use towerlog::types::{ColumnKind, ColumnSchema};

/// Returns the DuckDB SQL type of a column created together with its table.
pub fn created_column_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "INTEGER",
        ColumnKind::Float => "DOUBLE",
        ColumnKind::Timestamp => "TIMESTAMP",
        ColumnKind::Text => "VARCHAR",
    }
}

/// Returns the DuckDB SQL type of a column added to an existing table.
///
/// Added columns are typed narrower than created ones.
pub fn added_column_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "SMALLINT",
        ColumnKind::Float => "DOUBLE",
        ColumnKind::Timestamp => "TIMESTAMP",
        ColumnKind::Text => "VARCHAR(512)",
    }
}

/// Returns `schema.table` with both parts quoted as needed.
pub fn qualified_table_name(schema: &str, table_name: &str) -> String {
    format!(
        "{}.{}",
        quote_identifier(schema),
        quote_identifier(table_name)
    )
}

/// Builds a `CREATE TABLE IF NOT EXISTS` statement.
///
/// Columns flagged as primary key are listed in a trailing `PRIMARY KEY` clause.
pub fn build_create_table_sql(schema: &str, table_name: &str, columns: &[ColumnSchema]) -> String {
    let mut definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            format!(
                "  {} {}",
                quote_identifier(&column.name),
                created_column_type(column.kind)
            )
        })
        .collect();

    let keys: Vec<String> = columns
        .iter()
        .filter(|column| column.primary_key)
        .map(|column| quote_identifier(&column.name).into_owned())
        .collect();
    if !keys.is_empty() {
        definitions.push(format!("  PRIMARY KEY ({})", keys.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        qualified_table_name(schema, table_name),
        definitions.join(",\n")
    )
}

pub fn build_add_column_sql(schema: &str, table_name: &str, column: &ColumnSchema) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        qualified_table_name(schema, table_name),
        quote_identifier(&column.name),
        added_column_type(column.kind)
    )
}

/// Builds a single-column `SELECT`, filtered by a bound parameter when `filter_column` is set.
pub fn build_select_column_sql(
    schema: &str,
    table_name: &str,
    column: &str,
    filter_column: Option<&str>,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        quote_identifier(column),
        qualified_table_name(schema, table_name)
    );
    if let Some(filter_column) = filter_column {
        sql.push_str(&format!(" WHERE {} = ?", quote_identifier(filter_column)));
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_alter_use_different_type_maps() {
        assert_eq!(created_column_type(ColumnKind::Integer), "INTEGER");
        assert_eq!(added_column_type(ColumnKind::Integer), "SMALLINT");
        assert_eq!(created_column_type(ColumnKind::Text), "VARCHAR");
        assert_eq!(added_column_type(ColumnKind::Text), "VARCHAR(512)");
        assert_eq!(added_column_type(ColumnKind::Float), "DOUBLE");
    }

    #[test]
    fn create_table_lists_primary_key() {
        let sql = build_create_table_sql(
            "main",
            "NRG_Tower_SN_42",
            &[
                ColumnSchema::new("Timestamp", ColumnKind::Timestamp).into_primary_key(),
                ColumnSchema::new("Ch1_Anem_80.00m_Avg", ColumnKind::Float),
            ],
        );

        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS main.\"NRG_Tower_SN_42\" (\n  \
             \"Timestamp\" TIMESTAMP,\n  \
             \"Ch1_Anem_80.00m_Avg\" DOUBLE,\n  \
             PRIMARY KEY (\"Timestamp\")\n)"
        );
    }

    #[test]
    fn select_binds_filter_value() {
        let sql = build_select_column_sql("main", "NRG_Sensors", "Channel", Some("Site Number"));

        assert_eq!(
            sql,
            "SELECT \"Channel\" FROM main.\"NRG_Sensors\" WHERE \"Site Number\" = ?"
        );
    }
}
