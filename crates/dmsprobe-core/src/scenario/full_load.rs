//! Full-load flow: seed the source, run each one-shot task to `stopped`,
//! and count what it wrote to the stream.

use tracing::info;

use super::fixtures::{self, FIRST_TASK_TABLES, SECOND_TASK_TABLES};
use super::report::FullLoadReport;
use super::ScenarioDriver;
use crate::error::ScenarioError;
use crate::types::{StackOutputs, TaskStatus};

const SEED: &str = "full load: seed";
const FIRST_TASK: &str = "full load: task 1 (a%)";
const SECOND_TASK: &str = "full load: task 2 (novels)";

impl ScenarioDriver<'_> {
    pub(super) async fn full_load(
        &self,
        outputs: &StackOutputs,
        report: &mut FullLoadReport,
    ) -> Result<(), ScenarioError> {
        info!("starting full load flow");
        let credentials = self.credentials(&outputs.full_load_secret()?).await?;
        let (first, second) = outputs.full_load_tasks()?;
        let stream = outputs.stream()?;

        report.initial = Some(self.snapshot(&credentials, false, false).await);

        self.execute(&credentials, "dropping tables", &fixtures::DROP_TABLES).await?;
        self.execute(&credentials, "creating tables", &fixtures::CREATE_TABLES).await?;
        self.execute(&credentials, "inserting data", &fixtures::PRESEED_DATA).await?;

        let post_load = report.post_load.insert(self.snapshot(&credentials, true, true).await);
        self.check_counts(SEED, post_load)?;

        // Task 1: 2 drops, 2 creates, 1 author, 1 account.
        let threshold = self.sample_threshold();
        self.start_task(&first).await?;
        self.wait_for(&first, TaskStatus::stopped()).await?;
        tokio::time::sleep(self.settings.statistics_settle).await;
        let stats = self.statistics(&first).await?;
        report.statistics.insert(first.to_string(), stats);
        let stats = &report.statistics[first.as_str()];
        for table in FIRST_TASK_TABLES {
            self.check_loaded(FIRST_TASK, stats, table, 1)?;
        }
        self.collect(
            &mut report.steps,
            &stream,
            FIRST_TASK,
            fixtures::FULL_LOAD_FIRST_EVENTS,
            threshold,
        )
        .await?;

        self.settle().await;

        // Task 2: 1 drop, 1 create, 2 novels.
        let threshold = self.sample_threshold();
        self.start_task(&second).await?;
        self.wait_for(&second, TaskStatus::stopped()).await?;
        tokio::time::sleep(self.settings.statistics_settle).await;
        let stats = self.statistics(&second).await?;
        report.statistics.insert(second.to_string(), stats);
        let stats = &report.statistics[second.as_str()];
        for table in SECOND_TASK_TABLES {
            self.check_loaded(SECOND_TASK, stats, table, 2)?;
        }
        self.collect(
            &mut report.steps,
            &stream,
            SECOND_TASK,
            fixtures::FULL_LOAD_SECOND_EVENTS,
            threshold,
        )
        .await?;

        report.final_state = Some(self.snapshot(&credentials, false, false).await);
        self.execute(&credentials, "dropping tables", &fixtures::DROP_TABLES).await?;

        info!("full load flow finished");
        Ok(())
    }
}
