//! Auditable trace of a scenario run.
//!
//! Every phase fills its section as it goes, so a failed run still carries
//! everything observed up to the failure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::inspect::ColumnInfo;
use crate::types::{Row, StreamRecord, TableStatistics};

/// Source tables at one point in the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateSnapshot {
    pub counts: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Option<Vec<ColumnInfo>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, Vec<Row>>>,
}

impl StateSnapshot {
    pub fn count(&self, table: &str) -> i64 {
        self.counts.get(table).copied().unwrap_or(0)
    }

    pub fn schema(&self, table: &str) -> Option<&[ColumnInfo]> {
        self.schemas.get(table)?.as_deref()
    }
}

/// Records gathered for one collection step.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedStep {
    pub phase: String,
    pub expected: usize,
    pub threshold: DateTime<Utc>,
    #[serde(serialize_with = "serialize_flattened")]
    pub records: Vec<StreamRecord>,
}

impl CollectedStep {
    pub fn found(&self) -> usize {
        self.records.len()
    }
}

fn serialize_flattened<S: serde::Serializer>(
    records: &[StreamRecord],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(records.iter().map(StreamRecord::flattened))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FullLoadReport {
    pub initial: Option<StateSnapshot>,
    pub post_load: Option<StateSnapshot>,
    pub final_state: Option<StateSnapshot>,
    pub steps: Vec<CollectedStep>,
    /// Sorted table statistics, keyed by task reference.
    pub statistics: BTreeMap<String, Vec<TableStatistics>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CdcReport {
    pub initial: Option<StateSnapshot>,
    pub post_create: Option<StateSnapshot>,
    pub post_insert: Option<StateSnapshot>,
    pub post_alter: Option<StateSnapshot>,
    pub final_state: Option<StateSnapshot>,
    pub steps: Vec<CollectedStep>,
    pub statistics: BTreeMap<String, Vec<TableStatistics>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_load: Option<FullLoadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdc: Option<CdcReport>,
}

impl ScenarioReport {
    /// Pretty JSON for printing. Serialising plain data cannot fail in
    /// practice; a failure is rendered as a JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| Value::String(format!("unserialisable report: {e}")).to_string())
    }

    /// Every collection step across both flows, in run order.
    pub fn steps(&self) -> impl Iterator<Item = &CollectedStep> {
        let full = self.full_load.iter().flat_map(|r| r.steps.iter());
        let cdc = self.cdc.iter().flat_map(|r| r.steps.iter());
        full.chain(cdc)
    }
}
