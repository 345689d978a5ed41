use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::Client;
use tracing::debug;

use dmsprobe_core::error::{ResourceKind, ServiceError};
use dmsprobe_core::services::StackOutputResolver;
use dmsprobe_core::types::StackOutputs;

use crate::error::classify;

/// Stack outputs read from CloudFormation.
#[derive(Debug, Clone)]
pub struct CloudFormationStacks {
    client: Client,
}

impl CloudFormationStacks {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl StackOutputResolver for CloudFormationStacks {
    async fn describe(&self, stack_name: &str) -> Result<StackOutputs, ServiceError> {
        let out = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| classify("describe stacks", (ResourceKind::Stack, stack_name), e))?;

        let stack = out
            .stacks()
            .first()
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Stack, stack_name))?;

        let outputs: BTreeMap<String, String> = stack
            .outputs()
            .iter()
            .filter_map(|o| Some((o.output_key()?.to_owned(), o.output_value()?.to_owned())))
            .collect();
        debug!(stack = stack_name, keys = ?outputs.keys().collect::<Vec<_>>(), "stack outputs");

        Ok(StackOutputs::new(outputs))
    }
}
