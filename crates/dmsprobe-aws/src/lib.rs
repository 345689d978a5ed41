//! AWS adapters for the harness collaborators.
//!
//! | Trait | Service |
//! |-------|---------|
//! | `StackOutputResolver` | CloudFormation |
//! | `SecretResolver` | Secrets Manager |
//! | `ReplicationControlPlane` | Database Migration Service |
//! | `PartitionedLog` | Kinesis Data Streams |
//!
//! Clients are built once from one shared SDK config. An endpoint override
//! points every client at a local emulator.

pub mod cloudformation;
pub mod dms;
mod error;
pub mod kinesis;
pub mod secrets;

use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use tracing::info;

use dmsprobe_core::services::{RelationalStore, Services};

pub use cloudformation::CloudFormationStacks;
pub use dms::DmsControlPlane;
pub use kinesis::KinesisLog;
pub use secrets::SecretsManagerResolver;

/// Load region and credentials from the environment, optionally pinning
/// every service to `endpoint_url`.
pub async fn load_sdk_config(endpoint_url: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(url) = endpoint_url {
        info!(endpoint_url = url, "using endpoint override");
        loader = loader.endpoint_url(url);
    }
    loader.load().await
}

/// Build the collaborator bundle: AWS for everything but the database.
pub fn services(config: &SdkConfig, store: Arc<dyn RelationalStore>) -> Services {
    Services {
        stacks: Arc::new(CloudFormationStacks::new(config)),
        secrets: Arc::new(SecretsManagerResolver::new(config)),
        store,
        control: Arc::new(DmsControlPlane::new(config)),
        log: Arc::new(KinesisLog::new(config)),
    }
}
