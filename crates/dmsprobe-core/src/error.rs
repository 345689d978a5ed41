//! Error taxonomy for the harness.
//!
//! | Error | Retried | Meaning |
//! |-------|---------|---------|
//! | [`ServiceError::NotFound`] | never | stack, secret, task or stream does not resolve |
//! | [`ServiceError::Unavailable`] | yes | the collaborator call failed in transit |
//! | [`ServiceError::Invalid`] | never | the collaborator answered with something unusable |
//! | [`WatchError::Mismatch`] | yes | the task was observed in another status |
//! | [`StoreError`] | never | relational store connection or statement failure |
//! | [`ScenarioError`] | n/a | what a scenario run ends with, carried in [`ScenarioFailure`] |

use std::fmt;

use thiserror::Error;

use crate::scenario::report::ScenarioReport;
use crate::types::{StreamRecord, TaskRef, TaskStatus};

/// Boxed error used to carry driver-specific sources across crate borders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of external resource a [`ServiceError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Stack,
    StackOutput,
    Secret,
    Task,
    Stream,
    Partition,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stack => "stack",
            Self::StackOutput => "stack output",
            Self::Secret => "secret",
            Self::Task => "replication task",
            Self::Stream => "stream",
            Self::Partition => "stream partition",
        };
        f.write_str(s)
    }
}

/// Failure reported by one of the collaborator services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The referenced resource does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    /// The call did not complete; trying again may succeed.
    #[error("{operation} failed: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    /// The call completed but the response could not be used.
    #[error("{operation} returned an unusable response: {message}")]
    Invalid {
        operation: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }

    pub fn invalid(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            operation,
            message: message.into(),
        }
    }

    /// Whether a retry can change the outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Relational store failure. The connection is already closed when one of
/// these is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to {host}:{port}/{dbname}")]
    Connect {
        host: String,
        port: u16,
        dbname: String,
        #[source]
        source: BoxError,
    },

    /// Statement `index` of the submitted batch failed; nothing in the batch
    /// was committed.
    #[error("statement {index} failed: {statement}")]
    Statement {
        index: usize,
        statement: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to decode column {column}: {message}")]
    Decode { column: String, message: String },
}

/// Failure of [`crate::watcher::TaskWatcher::wait_for_status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error(
        "task {task} did not reach status {expected}; last observed {}",
        .observed.as_ref().map_or("<none>", TaskStatus::as_str)
    )]
    Mismatch {
        task: TaskRef,
        expected: TaskStatus,
        observed: Option<TaskStatus>,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl WatchError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Mismatch { .. } => true,
            Self::Service(e) => e.is_transient(),
        }
    }
}

/// Why a scenario run stopped.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Fewer stream records than expected were observed before the
    /// collector returned. The records that did arrive are kept.
    #[error("{phase}: expected {expected} stream records, collected {}", .records.len())]
    PartialCollection {
        phase: String,
        expected: usize,
        records: Vec<StreamRecord>,
    },

    #[error("{phase}: {message}")]
    Assertion { phase: String, message: String },
}

impl ScenarioError {
    pub fn assertion(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Assertion {
            phase: phase.into(),
            message: message.into(),
        }
    }
}

/// A failed scenario run together with everything captured before the
/// failure.
#[derive(Debug, Error)]
#[error("scenario failed: {error}")]
pub struct ScenarioFailure {
    #[source]
    pub error: ScenarioError,
    pub report: Box<ScenarioReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(ServiceError::unavailable("describe", "timeout").is_transient());
        assert!(!ServiceError::not_found(ResourceKind::Task, "arn:1").is_transient());
        assert!(!ServiceError::invalid("describe", "empty").is_transient());
    }

    #[test]
    fn mismatch_names_task_and_statuses() {
        let err = WatchError::Mismatch {
            task: TaskRef::new("arn:task:1"),
            expected: TaskStatus::stopped(),
            observed: Some(TaskStatus::running()),
        };
        let msg = err.to_string();
        assert!(msg.contains("arn:task:1"), "{msg}");
        assert!(msg.contains("stopped"), "{msg}");
        assert!(msg.contains("running"), "{msg}");
        assert!(err.is_transient());
    }

    #[test]
    fn mismatch_without_observation() {
        let err = WatchError::Mismatch {
            task: TaskRef::new("t"),
            expected: TaskStatus::running(),
            observed: None,
        };
        assert!(err.to_string().ends_with("last observed <none>"));
    }

    #[test]
    fn watch_error_inherits_service_transience() {
        let fatal = WatchError::from(ServiceError::not_found(ResourceKind::Task, "t"));
        assert!(!fatal.is_transient());
        let transient = WatchError::from(ServiceError::unavailable("describe", "throttled"));
        assert!(transient.is_transient());
    }
}
