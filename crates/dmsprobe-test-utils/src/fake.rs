//! In-memory replication pipeline for orchestration tests.
//!
//! One [`FakePipeline`] plays every collaborator at once so that store
//! mutations, task transitions and stream records stay consistent:
//!
//! - full-load tasks go `starting` -> `running` -> `stopped` on successive
//!   status reads and write drop, create and one load record per row for
//!   each table they cover when they reach `stopped`;
//! - change-capture tasks go `starting` -> `running`, write the exception
//!   table and one create record per table when they reach `running`, then
//!   one record per inserted row or altered table while running;
//! - the stream has one shard and stays open unless [`FakePipeline::close_stream`]
//!   is called, in which case reads past the end return no cursor.
//!
//! The store understands exactly the statement shapes the scenario fixtures
//! use.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use dmsprobe_core::error::{ResourceKind, ServiceError, StoreError};
use dmsprobe_core::scenario::fixtures::{FIRST_TASK_TABLES, SECOND_TASK_TABLES};
use dmsprobe_core::services::{
    PartitionedLog, RelationalStore, ReplicationControlPlane, SecretResolver, Services,
    StackOutputResolver,
};
use dmsprobe_core::types::{
    Credentials, CursorPosition, FetchPage, PartitionId, Row, SecretRef, StackOutputs,
    StreamCursor, StreamRecord, StreamRef, TABLE_COMPLETED, TableStatistics, TaskRef, TaskStatus,
};

pub const STACK_NAME: &str = "dms-sample";
pub const SCHEMA: &str = "dms_sample";
pub const SHARD: &str = "shardId-000000000000";
pub const STREAM_ARN: &str = "arn:aws:kinesis:us-east-1:000000000000:stream/dms-sample";
pub const FULL_SECRET: &str = "arn:aws:secretsmanager:us-east-1:000000000000:secret:full";
pub const CDC_SECRET: &str = "arn:aws:secretsmanager:us-east-1:000000000000:secret:cdc";
pub const FULL_TASK_1: &str = "arn:aws:dms:us-east-1:000000000000:task:full-load-a";
pub const FULL_TASK_2: &str = "arn:aws:dms:us-east-1:000000000000:task:full-load-novels";
pub const CDC_TASK_1: &str = "arn:aws:dms:us-east-1:000000000000:task:cdc-a";
pub const CDC_TASK_2: &str = "arn:aws:dms:us-east-1:000000000000:task:cdc-novels";

/// Host written into the fake secrets, as a containerised database would
/// name itself.
pub const SECRET_HOST: &str = "mariadb_server";

const EXCEPTIONS_TABLE: &str = "awsdms_apply_exceptions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    FullLoad,
    Cdc,
}

#[derive(Debug)]
struct FakeTask {
    kind: TaskKind,
    tables: &'static [&'static str],
    status: Option<TaskStatus>,
    pending: VecDeque<&'static str>,
    stats: BTreeMap<String, TableStatistics>,
}

impl FakeTask {
    fn new(kind: TaskKind, tables: &'static [&'static str]) -> Self {
        Self {
            kind,
            tables,
            status: None,
            pending: VecDeque::new(),
            stats: BTreeMap::new(),
        }
    }

    fn is_running(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.as_str() == TaskStatus::RUNNING)
    }

    fn captures(&self, table: &str) -> bool {
        self.kind == TaskKind::Cdc && self.is_running() && self.tables.contains(&table)
    }

    fn stats_mut(&mut self, table: &str) -> &mut TableStatistics {
        self.stats
            .entry(table.to_owned())
            .or_insert_with(|| TableStatistics {
                schema: SCHEMA.to_owned(),
                table: table.to_owned(),
                table_state: TABLE_COMPLETED.to_owned(),
                ..Default::default()
            })
    }
}

#[derive(Debug, Clone, Default)]
struct FakeTable {
    /// (name, lower-case type) in declaration order.
    columns: Vec<(String, String)>,
    rows: usize,
}

/// A committed change the change-capture tasks may pick up.
#[derive(Debug)]
enum Change {
    Insert { table: String, rows: usize },
    Ddl { table: String, operation: &'static str },
}

#[derive(Debug)]
struct State {
    outputs: BTreeMap<String, String>,
    secrets: BTreeMap<String, Credentials>,
    tables: BTreeMap<String, FakeTable>,
    statements: Vec<String>,
    hosts: Vec<String>,
    tasks: BTreeMap<String, FakeTask>,
    records: Vec<StreamRecord>,
    stream_closed: bool,
    status_failures: u32,
    records_to_lose: u32,
    /// Error rows reported by full-load tasks, per table.
    load_errors: BTreeMap<String, i64>,
}

/// Shared handle; clones see the same pipeline.
#[derive(Debug, Clone)]
pub struct FakePipeline {
    state: Arc<Mutex<State>>,
}

impl Default for FakePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePipeline {
    pub fn new() -> Self {
        let outputs = BTreeMap::from(
            [
                (StackOutputs::FULL_TASK_SECRET, FULL_SECRET),
                (StackOutputs::FULL_TASK_1, FULL_TASK_1),
                (StackOutputs::FULL_TASK_2, FULL_TASK_2),
                (StackOutputs::CDC_TASK_SECRET, CDC_SECRET),
                (StackOutputs::CDC_TASK_1, CDC_TASK_1),
                (StackOutputs::CDC_TASK_2, CDC_TASK_2),
                (StackOutputs::STREAM, STREAM_ARN),
            ]
            .map(|(k, v)| (k.to_owned(), v.to_owned())),
        );

        let credentials = |username: &str| Credentials {
            host: SECRET_HOST.to_owned(),
            port: 3306,
            username: username.to_owned(),
            password: "Password1!".to_owned(),
            dbname: SCHEMA.to_owned(),
        };
        let secrets = BTreeMap::from([
            (FULL_SECRET.to_owned(), credentials("full_user")),
            (CDC_SECRET.to_owned(), credentials("cdc_user")),
        ]);

        let tasks = BTreeMap::from([
            (FULL_TASK_1.to_owned(), FakeTask::new(TaskKind::FullLoad, &FIRST_TASK_TABLES)),
            (FULL_TASK_2.to_owned(), FakeTask::new(TaskKind::FullLoad, &SECOND_TASK_TABLES)),
            (CDC_TASK_1.to_owned(), FakeTask::new(TaskKind::Cdc, &FIRST_TASK_TABLES)),
            (CDC_TASK_2.to_owned(), FakeTask::new(TaskKind::Cdc, &SECOND_TASK_TABLES)),
        ]);

        Self {
            state: Arc::new(Mutex::new(State {
                outputs,
                secrets,
                tables: BTreeMap::new(),
                statements: Vec::new(),
                hosts: Vec::new(),
                tasks,
                records: Vec::new(),
                stream_closed: false,
                status_failures: 0,
                records_to_lose: 0,
                load_errors: BTreeMap::new(),
            })),
        }
    }

    /// Every collaborator backed by this pipeline.
    pub fn services(&self) -> Services {
        Services {
            stacks: Arc::new(self.clone()),
            secrets: Arc::new(self.clone()),
            store: Arc::new(self.clone()),
            control: Arc::new(self.clone()),
            log: Arc::new(self.clone()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake pipeline lock poisoned")
    }

    // -- knobs --------------------------------------------------------------

    /// Reads at the end of the shard return no cursor from now on.
    pub fn close_stream(&self) {
        self.lock().stream_closed = true;
    }

    /// The next `n` status reads fail as unavailable.
    pub fn fail_status_reads(&self, n: u32) {
        self.lock().status_failures = n;
    }

    /// The next `n` stream records are never written.
    pub fn lose_records(&self, n: u32) {
        self.lock().records_to_lose = n;
    }

    /// Full loads of `table` report `error_rows` failed rows and an error
    /// state. Every row still reaches the stream.
    pub fn fail_table_load(&self, table: &str, error_rows: i64) {
        self.lock().load_errors.insert(table.to_owned(), error_rows);
    }

    pub fn remove_output(&self, key: &str) {
        self.lock().outputs.remove(key);
    }

    // -- inspection ---------------------------------------------------------

    /// Batches committed to the store, statement by statement.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Hosts the store was reached with, one entry per call.
    pub fn store_hosts(&self) -> Vec<String> {
        self.lock().hosts.clone()
    }

    pub fn table_rows(&self, table: &str) -> Option<usize> {
        self.lock().tables.get(table).map(|t| t.rows)
    }

    pub fn records(&self) -> Vec<StreamRecord> {
        self.lock().records.clone()
    }

    pub fn task_status(&self, task: &str) -> Option<TaskStatus> {
        self.lock().tasks.get(task).and_then(|t| t.status.clone())
    }
}

// ---------------------------------------------------------------------------
// Stream writes
// ---------------------------------------------------------------------------

/// A timestamp strictly after the time of the call. Returns only once the
/// clock has moved past it, so later samples are strictly later too.
fn tick() -> DateTime<Utc> {
    let entered = Utc::now();
    let mut now = Utc::now();
    while now <= entered {
        std::hint::spin_loop();
        now = Utc::now();
    }
    while Utc::now() <= now {
        std::hint::spin_loop();
    }
    now
}

impl State {
    fn emit(&mut self, table: &str, record_type: &str, operation: &str, data: Value) {
        if self.records_to_lose > 0 {
            self.records_to_lose -= 1;
            return;
        }
        let arrival_time = tick();
        let payload = json!({
            "data": data,
            "metadata": {
                "timestamp": arrival_time.to_rfc3339(),
                "record-type": record_type,
                "operation": operation,
                "partition-key-type": "schema-table",
                "schema-name": SCHEMA,
                "table-name": table,
            }
        });
        let sequence = format!("{:021}", self.records.len());
        self.records.push(StreamRecord {
            payload,
            partition_key: format!("{SCHEMA}.{table}"),
            arrival_time,
            sequence,
        });
    }

    fn emit_full_load(&mut self, task: &str) {
        let Some(covered) = self.tasks.get(task).map(|t| t.tables) else {
            return;
        };
        for &table in covered {
            let Some(rows) = self.tables.get(table).map(|t| t.rows) else {
                continue;
            };
            self.emit(table, "control", "drop-table", Value::Null);
            self.emit(table, "control", "create-table", Value::Null);
            for row in 0..rows {
                self.emit(table, "data", "load", json!({ "row": row + 1 }));
            }
            let load_errors = self.load_errors.get(table).copied();
            if let Some(task) = self.tasks.get_mut(task) {
                let stats = task.stats_mut(table);
                stats.rows_loaded = rows as i64;
                if let Some(error_rows) = load_errors {
                    stats.error_rows = error_rows;
                    stats.table_state = "Table error".to_owned();
                }
            }
        }
    }

    fn emit_cdc_start(&mut self, task: &str) {
        let Some(covered) = self.tasks.get(task).map(|t| t.tables) else {
            return;
        };
        self.emit(EXCEPTIONS_TABLE, "control", "create-table", Value::Null);
        for &table in covered {
            self.emit(table, "control", "create-table", Value::Null);
            if let Some(task) = self.tasks.get_mut(task) {
                task.stats_mut(table);
            }
        }
    }

    fn capture(&mut self, change: &Change) {
        let table = match change {
            Change::Insert { table, .. } | Change::Ddl { table, .. } => table.as_str(),
        };
        let capturing: Vec<String> = self
            .tasks
            .iter()
            .filter(|(_, t)| t.captures(table))
            .map(|(id, _)| id.clone())
            .collect();

        for id in capturing {
            match change {
                Change::Insert { rows, .. } => {
                    for row in 0..*rows {
                        self.emit(table, "data", "insert", json!({ "row": row + 1 }));
                    }
                    if let Some(task) = self.tasks.get_mut(&id) {
                        task.stats_mut(table).inserts += *rows as i64;
                    }
                }
                Change::Ddl { operation, .. } => {
                    self.emit(table, "control", operation, Value::Null);
                    if let Some(task) = self.tasks.get_mut(&id) {
                        task.stats_mut(table).ddls += 1;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Statement interpretation
// ---------------------------------------------------------------------------

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn identifier(s: &str) -> &str {
    s.trim_start()
        .split(|c: char| c == '(' || c == ';' || c.is_whitespace())
        .next()
        .unwrap_or_default()
}

/// Leading column type of a definition, parentheses included.
fn column_type(definition: &str) -> String {
    let definition = definition.trim_start();
    let mut depth = 0usize;
    let mut end = definition.len();
    for (i, c) in definition.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    definition[..end].to_ascii_lowercase()
}

/// Split on `sep` outside quotes and parentheses.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            c if c == sep && !quoted && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_columns(body: &str) -> Vec<(String, String)> {
    const CONSTRAINTS: [&str; 6] = ["FOREIGN", "PRIMARY", "KEY", "UNIQUE", "CONSTRAINT", "INDEX"];
    split_top_level(body, ',')
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter(|part| {
            let first = identifier(part);
            !CONSTRAINTS.iter().any(|k| first.eq_ignore_ascii_case(k))
        })
        .map(|part| {
            let name = identifier(part);
            (name.to_owned(), column_type(&part[name.len()..]))
        })
        .collect()
}

fn count_tuples(values: &str) -> usize {
    split_top_level(values, ',')
        .iter()
        .filter(|part| part.trim_start().starts_with('('))
        .count()
}

fn apply(tables: &mut BTreeMap<String, FakeTable>, sql: &str) -> Result<Option<Change>, String> {
    let sql = sql.trim().trim_end_matches(';').trim();

    if let Some(rest) = strip_prefix_ci(sql, "DROP TABLE IF EXISTS ") {
        tables.remove(identifier(rest));
        return Ok(None);
    }

    if let Some(rest) = strip_prefix_ci(sql, "CREATE TABLE ") {
        let name = identifier(rest);
        if tables.contains_key(name) {
            return Err(format!("Table '{name}' already exists"));
        }
        let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) else {
            return Err(format!("malformed CREATE TABLE {name}"));
        };
        let columns = parse_columns(&rest[open + 1..close]);
        tables.insert(name.to_owned(), FakeTable { columns, rows: 0 });
        return Ok(None);
    }

    if let Some(rest) = strip_prefix_ci(sql, "INSERT INTO ") {
        let name = identifier(rest);
        let table = tables
            .get_mut(name)
            .ok_or_else(|| format!("Table '{name}' doesn't exist"))?;
        let Some(at) = rest.to_ascii_uppercase().find("VALUES") else {
            return Err(format!("INSERT INTO {name} has no VALUES"));
        };
        let rows = count_tuples(&rest[at + "VALUES".len()..]);
        table.rows += rows;
        return Ok(Some(Change::Insert {
            table: name.to_owned(),
            rows,
        }));
    }

    if let Some(rest) = strip_prefix_ci(sql, "ALTER TABLE ") {
        let name = identifier(rest);
        let table = tables
            .get_mut(name)
            .ok_or_else(|| format!("Table '{name}' doesn't exist"))?;
        let action = rest[name.len()..].trim();

        let operation = if let Some(def) = strip_prefix_ci(action, "MODIFY COLUMN ") {
            let column = identifier(def);
            let ty = column_type(&def.trim_start()[column.len()..]);
            let slot = table
                .columns
                .iter_mut()
                .find(|(c, _)| c == column)
                .ok_or_else(|| format!("Unknown column '{column}'"))?;
            slot.1 = ty;
            "column-type-change"
        } else if let Some(def) = strip_prefix_ci(action, "DROP COLUMN ") {
            let column = identifier(def);
            let before = table.columns.len();
            table.columns.retain(|(c, _)| c != column);
            if table.columns.len() == before {
                return Err(format!("Can't DROP COLUMN '{column}'"));
            }
            "drop-column"
        } else if let Some(def) = strip_prefix_ci(action, "ADD COLUMN ") {
            let column = identifier(def);
            let ty = column_type(&def.trim_start()[column.len()..]);
            table.columns.push((column.to_owned(), ty));
            "add-column"
        } else {
            return Err(format!("unsupported ALTER TABLE action: {action}"));
        };

        return Ok(Some(Change::Ddl {
            table: name.to_owned(),
            operation,
        }));
    }

    Err(format!("unsupported statement: {sql}"))
}

fn missing_table(statement: &str, table: &str) -> StoreError {
    StoreError::Statement {
        index: 0,
        statement: statement.to_owned(),
        source: format!("Table '{SCHEMA}.{table}' doesn't exist").into(),
    }
}

// ---------------------------------------------------------------------------
// Collaborator impls
// ---------------------------------------------------------------------------

#[async_trait]
impl StackOutputResolver for FakePipeline {
    async fn describe(&self, stack_name: &str) -> Result<StackOutputs, ServiceError> {
        if stack_name != STACK_NAME {
            return Err(ServiceError::not_found(ResourceKind::Stack, stack_name));
        }
        Ok(StackOutputs::new(self.lock().outputs.clone()))
    }
}

#[async_trait]
impl SecretResolver for FakePipeline {
    async fn get_credentials(&self, secret: &SecretRef) -> Result<Credentials, ServiceError> {
        self.lock()
            .secrets
            .get(secret.as_str())
            .cloned()
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Secret, secret.as_str()))
    }
}

#[async_trait]
impl RelationalStore for FakePipeline {
    async fn execute(
        &self,
        credentials: &Credentials,
        statements: &[&str],
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.hosts.push(credentials.host.clone());

        // Work on a copy so a failing statement leaves nothing behind.
        let mut tables = state.tables.clone();
        let mut changes = Vec::new();
        for (index, statement) in statements.iter().enumerate() {
            match apply(&mut tables, statement) {
                Ok(change) => changes.extend(change),
                Err(message) => {
                    return Err(StoreError::Statement {
                        index,
                        statement: (*statement).to_owned(),
                        source: message.into(),
                    });
                }
            }
        }

        state.tables = tables;
        state
            .statements
            .extend(statements.iter().map(|s| (*s).to_owned()));
        for change in &changes {
            state.capture(change);
        }
        Ok(())
    }

    async fn query(&self, credentials: &Credentials, statement: &str) -> Result<Vec<Row>, StoreError> {
        let mut state = self.lock();
        state.hosts.push(credentials.host.clone());
        let sql = statement.trim().trim_end_matches(';').trim();

        if let Some(rest) = strip_prefix_ci(sql, "SELECT COUNT(*) AS count FROM ") {
            let name = identifier(rest);
            let table = state.tables.get(name).ok_or_else(|| missing_table(statement, name))?;
            let row: Row = [("count", json!(table.rows.to_string()))].into_iter().collect();
            return Ok(vec![row]);
        }

        if let Some(rest) = strip_prefix_ci(sql, "DESCRIBE ") {
            let name = identifier(rest);
            let table = state.tables.get(name).ok_or_else(|| missing_table(statement, name))?;
            return Ok(table
                .columns
                .iter()
                .map(|(field, ty)| {
                    [
                        ("Field", json!(field)),
                        ("Type", json!(ty)),
                        ("Null", json!("YES")),
                        ("Key", json!("")),
                        ("Default", Value::Null),
                        ("Extra", json!("")),
                    ]
                    .into_iter()
                    .collect::<Row>()
                })
                .collect());
        }

        if let Some(rest) = strip_prefix_ci(sql, "SELECT * FROM ") {
            let name = identifier(rest);
            let table = state.tables.get(name).ok_or_else(|| missing_table(statement, name))?;
            return Ok((0..table.rows)
                .map(|i| {
                    table
                        .columns
                        .iter()
                        .enumerate()
                        .map(|(c, (field, _))| {
                            let value = if c == 0 { json!((i + 1).to_string()) } else { Value::Null };
                            (field.clone(), value)
                        })
                        .collect::<Row>()
                })
                .collect());
        }

        Err(StoreError::Statement {
            index: 0,
            statement: statement.to_owned(),
            source: format!("unsupported query: {sql}").into(),
        })
    }
}

#[async_trait]
impl ReplicationControlPlane for FakePipeline {
    async fn start(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError> {
        let mut state = self.lock();
        let fake = state
            .tasks
            .get_mut(task.as_str())
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Task, task.as_str()))?;
        fake.pending = match fake.kind {
            TaskKind::FullLoad => VecDeque::from(["running", "stopped"]),
            TaskKind::Cdc => VecDeque::from(["running"]),
        };
        fake.stats.clear();
        fake.status = Some(TaskStatus::new("starting"));
        Ok(fake.status.clone())
    }

    async fn stop(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError> {
        let mut state = self.lock();
        let fake = state
            .tasks
            .get_mut(task.as_str())
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Task, task.as_str()))?;
        fake.pending = VecDeque::from(["stopped"]);
        fake.status = Some(TaskStatus::new("stopping"));
        Ok(fake.status.clone())
    }

    async fn describe_status(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError> {
        let mut state = self.lock();
        if state.status_failures > 0 {
            state.status_failures -= 1;
            return Err(ServiceError::unavailable(
                "describe replication tasks",
                "Rate exceeded",
            ));
        }

        let fake = state
            .tasks
            .get_mut(task.as_str())
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Task, task.as_str()))?;
        let Some(next) = fake.pending.pop_front() else {
            return Ok(fake.status.clone());
        };
        fake.status = Some(TaskStatus::new(next));
        let kind = fake.kind;

        match (kind, next) {
            (TaskKind::FullLoad, TaskStatus::STOPPED) => state.emit_full_load(task.as_str()),
            (TaskKind::Cdc, TaskStatus::RUNNING) => state.emit_cdc_start(task.as_str()),
            _ => {}
        }
        Ok(Some(TaskStatus::new(next)))
    }

    async fn describe_table_statistics(
        &self,
        task: &TaskRef,
    ) -> Result<Vec<TableStatistics>, ServiceError> {
        let state = self.lock();
        let fake = state
            .tasks
            .get(task.as_str())
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Task, task.as_str()))?;
        // Reverse order: callers must not rely on the service sorting.
        Ok(fake.stats.values().rev().cloned().collect())
    }
}

#[async_trait]
impl PartitionedLog for FakePipeline {
    async fn describe_partitions(&self, stream: &StreamRef) -> Result<Vec<PartitionId>, ServiceError> {
        if stream.as_str() != STREAM_ARN {
            return Err(ServiceError::not_found(ResourceKind::Stream, stream.as_str()));
        }
        Ok(vec![PartitionId::new(SHARD)])
    }

    async fn open_cursor(
        &self,
        stream: &StreamRef,
        partition: &PartitionId,
        position: CursorPosition,
    ) -> Result<StreamCursor, ServiceError> {
        if stream.as_str() != STREAM_ARN {
            return Err(ServiceError::not_found(ResourceKind::Stream, stream.as_str()));
        }
        if partition.as_str() != SHARD {
            return Err(ServiceError::not_found(ResourceKind::Partition, partition.as_str()));
        }
        match position {
            CursorPosition::TrimHorizon => Ok(StreamCursor::new(format!("{SHARD}:0"))),
            _ => Err(ServiceError::invalid("get shard iterator", "unsupported position")),
        }
    }

    async fn fetch(&self, cursor: &StreamCursor, limit: u32) -> Result<FetchPage, ServiceError> {
        let start: usize = cursor
            .as_str()
            .rsplit_once(':')
            .and_then(|(_, offset)| offset.parse().ok())
            .ok_or_else(|| ServiceError::invalid("get records", format!("bad cursor {cursor}")))?;

        let state = self.lock();
        let start = start.min(state.records.len());
        let end = (start + limit as usize).min(state.records.len());
        let next_cursor = if end == state.records.len() && state.stream_closed {
            None
        } else {
            Some(StreamCursor::new(format!("{SHARD}:{end}")))
        };
        Ok(FetchPage {
            records: state.records[start..end].to_vec(),
            next_cursor,
        })
    }
}
