//! Value types exchanged with the collaborator services.
//!
//! Identifiers, statuses and cursors are opaque string tokens: the harness
//! compares them for equality and never enumerates their domain.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ResourceKind, ServiceError};

macro_rules! string_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_token!(
    /// Handle to a replication task owned by the control plane.
    TaskRef
);
string_token!(
    /// Status token reported by the control plane ("running", "stopped", ...).
    TaskStatus
);
string_token!(
    /// Handle to a partitioned log (stream).
    StreamRef
);
string_token!(
    /// One independently ordered partition (shard) of a stream.
    PartitionId
);
string_token!(
    /// Position inside a partition, returned by the log and handed back verbatim.
    StreamCursor
);
string_token!(
    /// Reference to a stored credentials secret.
    SecretRef
);

impl TaskStatus {
    pub const RUNNING: &str = "running";
    pub const STOPPED: &str = "stopped";

    pub fn running() -> Self {
        Self::new(Self::RUNNING)
    }

    pub fn stopped() -> Self {
        Self::new(Self::STOPPED)
    }
}

// ---------------------------------------------------------------------------
// Stack outputs
// ---------------------------------------------------------------------------

/// Named identifiers exported by the provisioning stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackOutputs {
    outputs: BTreeMap<String, String>,
}

impl StackOutputs {
    pub const FULL_TASK_SECRET: &str = "fullTaskSecret";
    pub const FULL_TASK_1: &str = "fullTask1";
    pub const FULL_TASK_2: &str = "fullTask2";
    pub const CDC_TASK_SECRET: &str = "cdcTaskSecret";
    pub const CDC_TASK_1: &str = "cdcTask1";
    pub const CDC_TASK_2: &str = "cdcTask2";
    pub const STREAM: &str = "kinesisStream";

    pub fn new(outputs: BTreeMap<String, String>) -> Self {
        Self { outputs }
    }

    pub fn get(&self, key: &str) -> Result<&str, ServiceError> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ServiceError::not_found(ResourceKind::StackOutput, key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn full_load_secret(&self) -> Result<SecretRef, ServiceError> {
        self.get(Self::FULL_TASK_SECRET).map(SecretRef::from)
    }

    /// The two full-load tasks: `a%` tables first, then `novels`.
    pub fn full_load_tasks(&self) -> Result<(TaskRef, TaskRef), ServiceError> {
        Ok((
            self.get(Self::FULL_TASK_1)?.into(),
            self.get(Self::FULL_TASK_2)?.into(),
        ))
    }

    pub fn cdc_secret(&self) -> Result<SecretRef, ServiceError> {
        self.get(Self::CDC_TASK_SECRET).map(SecretRef::from)
    }

    /// The two change-capture tasks: `a%` tables first, then `novels`.
    pub fn cdc_tasks(&self) -> Result<(TaskRef, TaskRef), ServiceError> {
        Ok((
            self.get(Self::CDC_TASK_1)?.into(),
            self.get(Self::CDC_TASK_2)?.into(),
        ))
    }

    pub fn stream(&self) -> Result<StreamRef, ServiceError> {
        self.get(Self::STREAM).map(StreamRef::from)
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Connection parameters for the relational store, as stored in a secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub dbname: String,
}

impl Credentials {
    /// Replace `alias` with `target` when it is the configured host.
    ///
    /// Secrets written for a containerised database name the container
    /// (e.g. `mariadb_server`), which only resolves inside its network.
    pub fn remap_host(&mut self, alias: &str, target: &str) -> bool {
        if self.host == alias {
            self.host = target.to_owned();
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .finish()
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Relational rows
// ---------------------------------------------------------------------------

/// One result row: column names with their values, in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column value rendered as text, if it is a string.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (k, v) in &self.columns {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Replication statistics
// ---------------------------------------------------------------------------

/// Per-table counters reported by the control plane for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStatistics {
    pub schema: String,
    pub table: String,
    pub rows_loaded: i64,
    pub error_rows: i64,
    pub table_state: String,
    pub inserts: i64,
    pub deletes: i64,
    pub updates: i64,
    pub ddls: i64,
}

/// The state the control plane reports once a table is fully loaded.
pub const TABLE_COMPLETED: &str = "Table completed";

/// Order statistics by (schema, table) so reports compare deterministically.
pub fn sort_statistics(stats: &mut [TableStatistics]) {
    stats.sort_by(|a, b| (&a.schema, &a.table).cmp(&(&b.schema, &b.table)));
}

// ---------------------------------------------------------------------------
// Partitioned log
// ---------------------------------------------------------------------------

/// Where a new cursor starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CursorPosition {
    /// The oldest record still retained by the partition.
    TrimHorizon,
}

/// One record read from a partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRecord {
    /// Decoded payload. Payloads that are not JSON are kept as a string.
    pub payload: Value,
    pub partition_key: String,
    pub arrival_time: DateTime<Utc>,
    /// Position of the record within its partition.
    pub sequence: String,
}

impl StreamRecord {
    /// Payload merged with its partition key, the shape printed in reports.
    pub fn flattened(&self) -> Value {
        let mut map = match &self.payload {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_owned(), other.clone());
                map
            }
        };
        map.insert(
            "partition_key".to_owned(),
            Value::String(self.partition_key.clone()),
        );
        Value::Object(map)
    }
}

/// Result of one `fetch` against a cursor.
#[derive(Debug, Clone, Default)]
pub struct FetchPage {
    pub records: Vec<StreamRecord>,
    /// `None` once the partition is closed and fully read.
    pub next_cursor: Option<StreamCursor>,
}
