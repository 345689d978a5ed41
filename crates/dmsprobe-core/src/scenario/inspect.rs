//! Best-effort snapshots of the source tables.
//!
//! Snapshots are diagnostics: a failed query degrades to an empty value
//! (count 0, no schema, no rows) and is logged at debug. Tables are
//! missing between phases, so failures here are expected.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::services::RelationalStore;
use crate::types::{Credentials, Row};

/// One column as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub field: String,
    /// Lower-case type as the server spells it, e.g. `varchar(100)`.
    pub column_type: String,
    pub nullable: bool,
    pub key: String,
    pub default: Option<String>,
}

impl ColumnInfo {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            field: row.get_str("Field")?.to_owned(),
            column_type: row.get_str("Type")?.to_ascii_lowercase(),
            nullable: row.get_str("Null").is_some_and(|v| v.eq_ignore_ascii_case("YES")),
            key: row.get_str("Key").unwrap_or_default().to_owned(),
            default: row.get_str("Default").map(str::to_owned),
        })
    }
}

/// Find a column by name in a described table.
pub fn find_column<'a>(columns: &'a [ColumnInfo], field: &str) -> Option<&'a ColumnInfo> {
    columns.iter().find(|c| c.field == field)
}

pub async fn table_count(store: &dyn RelationalStore, credentials: &Credentials, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) AS count FROM {table}");
    match store.query(credentials, &sql).await {
        Ok(rows) => rows.first().and_then(|r| r.get_i64("count")).unwrap_or(0),
        Err(e) => {
            debug!(table, error = %e, "count query failed");
            0
        }
    }
}

pub async fn table_counts(
    store: &dyn RelationalStore,
    credentials: &Credentials,
    tables: &[&str],
) -> BTreeMap<String, i64> {
    let mut counts = BTreeMap::new();
    for table in tables {
        counts.insert((*table).to_owned(), table_count(store, credentials, table).await);
    }
    counts
}

/// Column list of `table`, or `None` when it cannot be described.
pub async fn table_schema(
    store: &dyn RelationalStore,
    credentials: &Credentials,
    table: &str,
) -> Option<Vec<ColumnInfo>> {
    let sql = format!("DESCRIBE {table}");
    match store.query(credentials, &sql).await {
        Ok(rows) => Some(rows.iter().filter_map(ColumnInfo::from_row).collect()),
        Err(e) => {
            debug!(table, error = %e, "describe failed");
            None
        }
    }
}

pub async fn table_schemas(
    store: &dyn RelationalStore,
    credentials: &Credentials,
    tables: &[&str],
) -> BTreeMap<String, Option<Vec<ColumnInfo>>> {
    let mut schemas = BTreeMap::new();
    for table in tables {
        schemas.insert((*table).to_owned(), table_schema(store, credentials, table).await);
    }
    schemas
}

pub async fn table_data(
    store: &dyn RelationalStore,
    credentials: &Credentials,
    tables: &[&str],
) -> BTreeMap<String, Vec<Row>> {
    let mut data = BTreeMap::new();
    for table in tables {
        let sql = format!("SELECT * FROM {table}");
        let rows = store.query(credentials, &sql).await.unwrap_or_else(|e| {
            debug!(table, error = %e, "select failed");
            Vec::new()
        });
        data.insert((*table).to_owned(), rows);
    }
    data
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn column_info_from_describe_row() {
        let row: Row = [
            ("Field", json!("email")),
            ("Type", json!("VARCHAR(100)")),
            ("Null", json!("YES")),
            ("Key", json!("")),
            ("Default", Value::Null),
            ("Extra", json!("")),
        ]
        .into_iter()
        .collect();

        let column = ColumnInfo::from_row(&row).unwrap();
        assert_eq!(column.field, "email");
        assert_eq!(column.column_type, "varchar(100)");
        assert!(column.nullable);
        assert_eq!(column.default, None);
    }

    #[test]
    fn row_without_field_is_skipped() {
        let row: Row = [("Type", json!("int(11)"))].into_iter().collect();
        assert!(ColumnInfo::from_row(&row).is_none());
    }
}
