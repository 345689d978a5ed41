//! Per-call MySQL connections.
//!
//! Every call opens its own connection and closes it before returning,
//! whatever the outcome. Batches run inside one transaction. MySQL commits
//! implicitly around DDL, so all-or-nothing holds for DML batches only; a
//! batch that fails after a `CREATE` or `ALTER` keeps that statement.

use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use sqlx::{ConnectOptions, Connection, Executor};
use tracing::debug;

use dmsprobe_core::error::{BoxError, StoreError};
use dmsprobe_core::services::RelationalStore;
use dmsprobe_core::types::{Credentials, Row};

use crate::config::{connect_options, endpoint};
use crate::decode::decode_row;

/// Relational store reached over the MySQL wire protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlStore;

impl MySqlStore {
    pub fn new() -> Self {
        Self
    }
}

async fn connect(credentials: &Credentials) -> Result<MySqlConnection, StoreError> {
    debug!(endpoint = %endpoint(credentials), "connecting");
    connect_options(credentials)
        .connect()
        .await
        .map_err(|e| StoreError::Connect {
            host: credentials.host.clone(),
            port: credentials.port,
            dbname: credentials.dbname.clone(),
            source: Box::new(e),
        })
}

async fn close(conn: MySqlConnection) {
    if let Err(e) = conn.close().await {
        debug!(error = %e, "error closing connection");
    }
}

fn statement_error(index: usize, statement: &str, error: sqlx::Error) -> StoreError {
    StoreError::Statement {
        index,
        statement: statement.to_owned(),
        source: BoxError::from(error),
    }
}

async fn run_batch(conn: &mut MySqlConnection, statements: &[&str]) -> Result<(), StoreError> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| statement_error(0, "BEGIN", e))?;

    for (index, statement) in statements.iter().enumerate() {
        debug!(index, "executing statement");
        if let Err(e) = (&mut *tx).execute(*statement).await {
            if let Err(rollback) = tx.rollback().await {
                debug!(error = %rollback, "rollback failed");
            }
            return Err(statement_error(index, statement, e));
        }
    }

    tx.commit()
        .await
        .map_err(|e| statement_error(statements.len(), "COMMIT", e))
}

async fn fetch(conn: &mut MySqlConnection, statement: &str) -> Result<Vec<Row>, StoreError> {
    let rows = conn
        .fetch_all(statement)
        .await
        .map_err(|e| statement_error(0, statement, e))?;
    rows.iter().map(decode_row).collect()
}

#[async_trait]
impl RelationalStore for MySqlStore {
    async fn execute(
        &self,
        credentials: &Credentials,
        statements: &[&str],
    ) -> Result<(), StoreError> {
        let mut conn = connect(credentials).await?;
        let result = run_batch(&mut conn, statements).await;
        close(conn).await;
        result
    }

    async fn query(&self, credentials: &Credentials, statement: &str) -> Result<Vec<Row>, StoreError> {
        let mut conn = connect(credentials).await?;
        let result = fetch(&mut conn, statement).await;
        close(conn).await;
        result
    }
}
