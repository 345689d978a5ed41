use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::Client;

use dmsprobe_core::error::{ResourceKind, ServiceError};
use dmsprobe_core::services::SecretResolver;
use dmsprobe_core::types::{Credentials, SecretRef};

use crate::error::classify;

const OPERATION: &str = "get secret value";

/// Database credentials stored as a JSON secret string.
#[derive(Debug, Clone)]
pub struct SecretsManagerResolver {
    client: Client,
}

impl SecretsManagerResolver {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// Parse the secret string. Keys other than the credential fields (such
/// as `engine`) are ignored.
pub fn parse_credentials(secret_string: &str) -> Result<Credentials, ServiceError> {
    serde_json::from_str(secret_string).map_err(|e| ServiceError::invalid(OPERATION, e.to_string()))
}

#[async_trait]
impl SecretResolver for SecretsManagerResolver {
    async fn get_credentials(&self, secret: &SecretRef) -> Result<Credentials, ServiceError> {
        let out = self
            .client
            .get_secret_value()
            .secret_id(secret.as_str())
            .send()
            .await
            .map_err(|e| classify(OPERATION, (ResourceKind::Secret, secret.as_str()), e))?;

        let text = out
            .secret_string()
            .ok_or_else(|| ServiceError::invalid(OPERATION, "secret has no string value"))?;
        parse_credentials(text)
    }
}
