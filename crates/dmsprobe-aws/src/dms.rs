use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_databasemigration::Client;
use aws_sdk_databasemigration::types::{self as dms, Filter, StartReplicationTaskTypeValue};

use dmsprobe_core::error::{ResourceKind, ServiceError};
use dmsprobe_core::services::ReplicationControlPlane;
use dmsprobe_core::types::{TableStatistics, TaskRef, TaskStatus};

use crate::error::classify;

/// Replication task control over the DMS API.
#[derive(Debug, Clone)]
pub struct DmsControlPlane {
    client: Client,
}

impl DmsControlPlane {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn status_of(task: Option<&dms::ReplicationTask>) -> Option<TaskStatus> {
    task.and_then(|t| t.status()).map(TaskStatus::from)
}

/// Counters missing from the response read as zero.
pub fn convert_statistics(stats: &dms::TableStatistics) -> TableStatistics {
    TableStatistics {
        schema: stats.schema_name().unwrap_or_default().to_owned(),
        table: stats.table_name().unwrap_or_default().to_owned(),
        rows_loaded: stats.full_load_rows(),
        error_rows: stats.full_load_error_rows(),
        table_state: stats.table_state().unwrap_or_default().to_owned(),
        inserts: stats.inserts(),
        deletes: stats.deletes(),
        updates: stats.updates(),
        ddls: stats.ddls(),
    }
}

#[async_trait]
impl ReplicationControlPlane for DmsControlPlane {
    async fn start(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError> {
        let out = self
            .client
            .start_replication_task()
            .replication_task_arn(task.as_str())
            .start_replication_task_type(StartReplicationTaskTypeValue::StartReplication)
            .send()
            .await
            .map_err(|e| classify("start replication task", (ResourceKind::Task, task.as_str()), e))?;
        Ok(status_of(out.replication_task()))
    }

    async fn stop(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError> {
        let out = self
            .client
            .stop_replication_task()
            .replication_task_arn(task.as_str())
            .send()
            .await
            .map_err(|e| classify("stop replication task", (ResourceKind::Task, task.as_str()), e))?;
        Ok(status_of(out.replication_task()))
    }

    async fn describe_status(&self, task: &TaskRef) -> Result<Option<TaskStatus>, ServiceError> {
        const OPERATION: &str = "describe replication tasks";
        let filter = Filter::builder()
            .name("replication-task-arn")
            .values(task.as_str())
            .build()
            .map_err(|e| ServiceError::invalid(OPERATION, e.to_string()))?;

        let out = self
            .client
            .describe_replication_tasks()
            .filters(filter)
            .without_settings(true)
            .send()
            .await
            .map_err(|e| classify(OPERATION, (ResourceKind::Task, task.as_str()), e))?;

        match out.replication_tasks().first() {
            Some(found) => Ok(status_of(Some(found))),
            None => Err(ServiceError::not_found(ResourceKind::Task, task.as_str())),
        }
    }

    async fn describe_table_statistics(
        &self,
        task: &TaskRef,
    ) -> Result<Vec<TableStatistics>, ServiceError> {
        let mut stats = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let out = self
                .client
                .describe_table_statistics()
                .replication_task_arn(task.as_str())
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    classify("describe table statistics", (ResourceKind::Task, task.as_str()), e)
                })?;

            stats.extend(out.table_statistics().iter().map(convert_statistics));
            marker = out.marker().map(str::to_owned);
            if marker.is_none() {
                return Ok(stats);
            }
        }
    }
}
