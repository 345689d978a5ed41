//! Scenario driver: sequences workload phases against the source database
//! and checks what the replication tasks and the stream report.
//!
//! Both entry points share every step. [`Mode::Observe`] runs the flows and
//! logs discrepancies; [`Mode::Assert`] turns the same discrepancies into
//! [`ScenarioError`]s. Either way the caller gets the [`ScenarioReport`]
//! built so far.
//!
//! Each collection step samples its own threshold right before the
//! mutation that triggers it. The settle pauses around mutations stand in
//! for a flush signal the pipeline does not offer.

mod cdc;
pub mod fixtures;
mod full_load;
pub mod inspect;
pub mod report;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::collector::{EventWindow, StreamCollector};
use crate::error::{ScenarioError, ScenarioFailure};
use crate::services::Services;
use crate::settings::HarnessSettings;
use crate::types::{
    Credentials, SecretRef, StreamRef, TABLE_COMPLETED, TableStatistics, TaskRef, TaskStatus,
    sort_statistics,
};
use crate::watcher::TaskWatcher;

use self::report::{CdcReport, CollectedStep, FullLoadReport, ScenarioReport, StateSnapshot};

/// Whether discrepancies fail the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Direct run: report everything, fail only on collaborator errors.
    Observe,
    /// Verification: every expectation must hold.
    Assert,
}

/// Which flows to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    FullLoad,
    Cdc,
    All,
}

impl Flow {
    fn includes_full_load(self) -> bool {
        matches!(self, Self::FullLoad | Self::All)
    }

    fn includes_cdc(self) -> bool {
        matches!(self, Self::Cdc | Self::All)
    }
}

pub struct ScenarioDriver<'a> {
    services: &'a Services,
    settings: &'a HarnessSettings,
    mode: Mode,
}

impl<'a> ScenarioDriver<'a> {
    pub fn new(services: &'a Services, settings: &'a HarnessSettings, mode: Mode) -> Self {
        Self {
            services,
            settings,
            mode,
        }
    }

    /// Resolve the stack and run the selected flows in order: full load,
    /// then change capture.
    pub async fn run(&self, stack_name: &str, flow: Flow) -> Result<ScenarioReport, ScenarioFailure> {
        let mut report = ScenarioReport::default();

        let outputs = match self.services.stacks.describe(stack_name).await {
            Ok(outputs) => outputs,
            Err(e) => return Err(failure(e.into(), report)),
        };
        info!(stack = stack_name, outputs = outputs.iter().count(), "resolved stack outputs");

        if flow.includes_full_load() {
            let section = report.full_load.insert(FullLoadReport::default());
            let result = self.full_load(&outputs, section).await;
            if let Err(error) = result {
                return Err(failure(error, report));
            }
        }

        if flow.includes_cdc() {
            let section = report.cdc.insert(CdcReport::default());
            let result = self.cdc(&outputs, section).await;
            if let Err(error) = result {
                return Err(failure(error, report));
            }
        }

        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Store helpers
    // -----------------------------------------------------------------------

    async fn credentials(&self, secret: &SecretRef) -> Result<Credentials, ScenarioError> {
        let mut credentials = self.services.secrets.get_credentials(secret).await?;
        let remap = &self.settings.host_remap;
        if credentials.remap_host(&remap.alias, &remap.target) {
            info!(alias = %remap.alias, host = %remap.target, "remapped database host");
        }
        info!(
            host = %credentials.host,
            port = credentials.port,
            dbname = %credentials.dbname,
            "database endpoint"
        );
        Ok(credentials)
    }

    async fn execute(
        &self,
        credentials: &Credentials,
        what: &str,
        statements: &[&str],
    ) -> Result<(), ScenarioError> {
        info!(statements = statements.len(), "{what}");
        self.services.store.execute(credentials, statements).await?;
        Ok(())
    }

    async fn snapshot(
        &self,
        credentials: &Credentials,
        schemas: bool,
        data: bool,
    ) -> StateSnapshot {
        let store = self.services.store.as_ref();
        let tables = &fixtures::TABLES;
        let mut snapshot = StateSnapshot {
            counts: inspect::table_counts(store, credentials, tables).await,
            ..Default::default()
        };
        if schemas {
            snapshot.schemas = inspect::table_schemas(store, credentials, tables).await;
        }
        if data {
            snapshot.data = Some(inspect::table_data(store, credentials, tables).await);
        }
        snapshot
    }

    // -----------------------------------------------------------------------
    // Task helpers
    // -----------------------------------------------------------------------

    async fn start_task(&self, task: &TaskRef) -> Result<(), ScenarioError> {
        let status = self.services.control.start(task).await?;
        info!(task = %task, status = status.as_ref().map_or("<none>", TaskStatus::as_str), "started task");
        Ok(())
    }

    async fn stop_task(&self, task: &TaskRef) -> Result<(), ScenarioError> {
        let status = self.services.control.stop(task).await?;
        info!(task = %task, status = status.as_ref().map_or("<none>", TaskStatus::as_str), "stopping task");
        Ok(())
    }

    async fn wait_for(&self, task: &TaskRef, status: TaskStatus) -> Result<(), ScenarioError> {
        TaskWatcher::new(self.services.control.as_ref(), self.settings.retry)
            .wait_for_status(task, &status)
            .await?;
        Ok(())
    }

    async fn statistics(&self, task: &TaskRef) -> Result<Vec<TableStatistics>, ScenarioError> {
        let mut stats = self.services.control.describe_table_statistics(task).await?;
        sort_statistics(&mut stats);
        for s in &stats {
            info!(
                task = %task,
                table = %format_args!("{}.{}", s.schema, s.table),
                rows_loaded = s.rows_loaded,
                error_rows = s.error_rows,
                inserts = s.inserts,
                ddls = s.ddls,
                state = %s.table_state,
                "table statistics"
            );
        }
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Stream helpers
    // -----------------------------------------------------------------------

    fn sample_threshold(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn settle(&self) {
        tokio::time::sleep(self.settings.settle_delay).await;
    }

    /// Collect one step into `steps`. The records are stored before the
    /// count is checked so a failed step still shows what arrived.
    async fn collect(
        &self,
        steps: &mut Vec<CollectedStep>,
        stream: &StreamRef,
        phase: &str,
        expected: usize,
        threshold: DateTime<Utc>,
    ) -> Result<(), ScenarioError> {
        info!(phase, expected, "collecting stream records");
        let collector = StreamCollector::new(self.services.log.as_ref(), self.settings.collector);
        let records = collector
            .collect(stream, EventWindow::new(threshold, expected))
            .await?;
        let found = records.len();

        steps.push(CollectedStep {
            phase: phase.to_owned(),
            expected,
            threshold,
            records,
        });

        if found == expected {
            return Ok(());
        }
        match self.mode {
            Mode::Observe => {
                warn!(phase, expected, found, "unexpected number of stream records");
                Ok(())
            }
            Mode::Assert if found < expected => Err(ScenarioError::PartialCollection {
                phase: phase.to_owned(),
                expected,
                records: steps.last().map(|s| s.records.clone()).unwrap_or_default(),
            }),
            Mode::Assert => Err(ScenarioError::assertion(
                phase,
                format!("expected {expected} stream records, collected {found}"),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Expectations
    // -----------------------------------------------------------------------

    /// Fails in [`Mode::Assert`]; only warns in [`Mode::Observe`].
    fn check(
        &self,
        phase: &str,
        holds: bool,
        message: impl FnOnce() -> String,
    ) -> Result<(), ScenarioError> {
        if holds {
            return Ok(());
        }
        let message = message();
        match self.mode {
            Mode::Assert => Err(ScenarioError::assertion(phase, message)),
            Mode::Observe => {
                warn!(phase, "{message}");
                Ok(())
            }
        }
    }

    fn check_counts(&self, phase: &str, snapshot: &StateSnapshot) -> Result<(), ScenarioError> {
        for (table, expected) in fixtures::PRESEED_COUNTS {
            let actual = snapshot.count(table);
            self.check(phase, actual == expected, || {
                format!("{table} has {actual} rows, expected {expected}")
            })?;
        }
        Ok(())
    }

    /// A fully loaded table: `rows_loaded` rows, no errors, completed.
    fn check_loaded(
        &self,
        phase: &str,
        stats: &[TableStatistics],
        table: &str,
        rows_loaded: i64,
    ) -> Result<(), ScenarioError> {
        let Some(s) = stats.iter().find(|s| s.table == table) else {
            return self.check(phase, false, || format!("no statistics for table {table}"));
        };
        self.check(phase, s.rows_loaded == rows_loaded, || {
            format!("{table} loaded {} rows, expected {rows_loaded}", s.rows_loaded)
        })?;
        self.check(phase, s.error_rows == 0, || {
            format!("{table} reported {} error rows", s.error_rows)
        })?;
        self.check(phase, s.table_state == TABLE_COMPLETED, || {
            format!("{table} is in state {:?}, expected {TABLE_COMPLETED:?}", s.table_state)
        })
    }
}

fn failure(error: ScenarioError, report: ScenarioReport) -> ScenarioFailure {
    ScenarioFailure {
        error,
        report: Box::new(report),
    }
}
