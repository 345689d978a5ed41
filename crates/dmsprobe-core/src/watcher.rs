//! Task state watcher: poll a replication task until it reports a status.

use tracing::info;

use crate::error::WatchError;
use crate::retry::retry_if;
use crate::services::ReplicationControlPlane;
use crate::settings::RetryPolicy;
use crate::types::{TaskRef, TaskStatus};

/// Polls the control plane for task status under a retry budget.
pub struct TaskWatcher<'a> {
    control: &'a dyn ReplicationControlPlane,
    policy: RetryPolicy,
}

impl<'a> TaskWatcher<'a> {
    pub fn new(control: &'a dyn ReplicationControlPlane, policy: RetryPolicy) -> Self {
        Self { control, policy }
    }

    /// Wait until `task` is observed in `expected`.
    ///
    /// A successful return means the status matched at one observation; it
    /// may have changed again since. Mismatches and transient service
    /// errors are retried; a missing task fails on the spot. On exhaustion
    /// the error carries the last status seen.
    pub async fn wait_for_status(
        &self,
        task: &TaskRef,
        expected: &TaskStatus,
    ) -> Result<TaskStatus, WatchError> {
        info!(task = %task, expected = %expected, "waiting for task status");

        retry_if(
            move || self.observe(task, expected),
            self.policy,
            WatchError::is_transient,
        )
        .await
    }

    async fn observe(&self, task: &TaskRef, expected: &TaskStatus) -> Result<TaskStatus, WatchError> {
        let observed = self.control.describe_status(task).await?;
        info!(
            task = %task,
            status = observed.as_ref().map_or("<none>", TaskStatus::as_str),
            "observed task status"
        );

        match observed {
            Some(status) if &status == expected => Ok(status),
            observed => Err(WatchError::Mismatch {
                task: task.clone(),
                expected: expected.clone(),
                observed,
            }),
        }
    }
}
