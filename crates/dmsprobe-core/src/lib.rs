//! Verification harness for DMS replication pipelines.
//!
//! The crate drives a relational source through load and change-capture
//! phases, then checks what the replication tasks report and what lands
//! on the target stream. External systems are reached only through the
//! traits in [`services`].

pub mod collector;
pub mod error;
pub mod retry;
pub mod scenario;
pub mod services;
pub mod settings;
pub mod types;
pub mod watcher;

pub use collector::{EventWindow, StreamCollector};
pub use error::{ResourceKind, ScenarioError, ScenarioFailure, ServiceError, StoreError, WatchError};
pub use retry::{retry, retry_if};
pub use scenario::{Flow, Mode, ScenarioDriver};
pub use services::{
    PartitionedLog, RelationalStore, ReplicationControlPlane, SecretResolver, Services,
    StackOutputResolver,
};
pub use settings::{CollectorSettings, HarnessSettings, HostRemap, RetryPolicy};
pub use watcher::TaskWatcher;
