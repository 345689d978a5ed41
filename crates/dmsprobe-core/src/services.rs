//! Collaborator interfaces.
//!
//! The harness reaches every external system through one of these traits.
//! All are object-safe so a [`Services`] bundle can hold them as
//! `Arc<dyn _>`: vendor adapters in production, in-memory fakes in tests.
//!
//! ```text
//! ScenarioDriver
//!     |-- StackOutputResolver  describe(stack) -> StackOutputs
//!     |-- SecretResolver       get_credentials(secret) -> Credentials
//!     |-- RelationalStore      execute(creds, stmts) / query(creds, stmt)
//!     |-- ReplicationControlPlane  start / stop / describe_status / statistics
//!     `-- PartitionedLog       describe_partitions / open_cursor / fetch
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ServiceError, StoreError};
use crate::types::{
    CursorPosition, Credentials, FetchPage, PartitionId, Row, SecretRef, StackOutputs,
    StreamCursor, StreamRef, TableStatistics, TaskRef, TaskStatus,
};

/// Resolves the identifiers exported by a provisioning stack.
#[async_trait]
pub trait StackOutputResolver: Send + Sync {
    /// Fails with [`ServiceError::NotFound`] when no stack has this name.
    async fn describe(&self, stack_name: &str) -> Result<StackOutputs, ServiceError>;
}

/// Resolves database credentials stored as a secret.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn get_credentials(&self, secret: &SecretRef) -> Result<Credentials, ServiceError>;
}

/// A relational database reached with per-call connections.
///
/// Implementations open a connection, use it, and close it on every exit
/// path. No connection outlives a call.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Run `statements` in order inside one transaction; all or nothing.
    async fn execute(&self, credentials: &Credentials, statements: &[&str])
    -> Result<(), StoreError>;

    /// Run one query and return its rows in server order.
    async fn query(&self, credentials: &Credentials, statement: &str)
    -> Result<Vec<Row>, StoreError>;
}

/// The replication engine's management API.
#[async_trait]
pub trait ReplicationControlPlane: Send + Sync {
    /// Start (or restart) a task. Returns the status reported at start, if any.
    async fn start(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError>;

    /// Request a task stop. Returns the status reported at stop, if any.
    async fn stop(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError>;

    /// Current status. `None` when the service omits it.
    async fn describe_status(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError>;

    /// Per-table counters for a task, in whatever order the service returns.
    async fn describe_table_statistics(
        &self,
        task: &TaskRef,
    ) -> Result<Vec<TableStatistics>, ServiceError>;
}

/// A shard-partitioned, append-only log read through cursors.
#[async_trait]
pub trait PartitionedLog: Send + Sync {
    async fn describe_partitions(&self, stream: &StreamRef)
    -> Result<Vec<PartitionId>, ServiceError>;

    async fn open_cursor(
        &self,
        stream: &StreamRef,
        partition: &PartitionId,
        position: CursorPosition,
    ) -> Result<StreamCursor, ServiceError>;

    /// Read up to `limit` records at `cursor`.
    async fn fetch(&self, cursor: &StreamCursor, limit: u32) -> Result<FetchPage, ServiceError>;
}

/// Handles to every collaborator, built once per process and passed by
/// reference.
#[derive(Clone)]
pub struct Services {
    pub stacks: Arc<dyn StackOutputResolver>,
    pub secrets: Arc<dyn SecretResolver>,
    pub store: Arc<dyn RelationalStore>,
    pub control: Arc<dyn ReplicationControlPlane>,
    pub log: Arc<dyn PartitionedLog>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

// Compile-time assertion: every collaborator trait is object-safe.
const _: () = {
    fn _assert_object_safe(
        _: &dyn StackOutputResolver,
        _: &dyn SecretResolver,
        _: &dyn RelationalStore,
        _: &dyn ReplicationControlPlane,
        _: &dyn PartitionedLog,
    ) {
    }
};
