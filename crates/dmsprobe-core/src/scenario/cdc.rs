//! Change-capture flow: start both tasks, then insert and alter as
//! separate phases, each with its own threshold and collection.

use tracing::info;

use super::fixtures;
use super::inspect::find_column;
use super::report::{CdcReport, StateSnapshot};
use super::ScenarioDriver;
use crate::error::ScenarioError;
use crate::types::{StackOutputs, TaskStatus};

const CREATE: &str = "cdc: create tables";
const INSERT: &str = "cdc: insert rows";
const ALTER: &str = "cdc: alter tables";

impl ScenarioDriver<'_> {
    pub(super) async fn cdc(
        &self,
        outputs: &StackOutputs,
        report: &mut CdcReport,
    ) -> Result<(), ScenarioError> {
        info!("starting cdc flow");
        let credentials = self.credentials(&outputs.cdc_secret()?).await?;
        let (first, second) = outputs.cdc_tasks()?;
        let stream = outputs.stream()?;

        report.initial = Some(self.snapshot(&credentials, false, false).await);

        self.execute(&credentials, "dropping tables", &fixtures::DROP_TABLES).await?;
        self.execute(&credentials, "creating tables", &fixtures::CREATE_TABLES).await?;
        report.post_create = Some(self.snapshot(&credentials, true, false).await);

        // The exceptions table is created once per task, plus one record
        // per source table.
        let threshold = self.sample_threshold();
        self.start_task(&first).await?;
        self.start_task(&second).await?;
        self.wait_for(&first, TaskStatus::running()).await?;
        self.wait_for(&second, TaskStatus::running()).await?;
        self.collect(
            &mut report.steps,
            &stream,
            CREATE,
            fixtures::CDC_CREATE_EVENTS,
            threshold,
        )
        .await?;

        self.settle().await;
        let threshold = self.sample_threshold();
        self.settle().await;
        self.execute(&credentials, "inserting data", &fixtures::PRESEED_DATA).await?;
        let post_insert = report.post_insert.insert(self.snapshot(&credentials, false, true).await);
        self.check_counts(INSERT, post_insert)?;
        self.collect(
            &mut report.steps,
            &stream,
            INSERT,
            fixtures::CDC_INSERT_EVENTS,
            threshold,
        )
        .await?;

        self.settle().await;
        let threshold = self.sample_threshold();
        self.settle().await;
        self.execute(&credentials, "altering tables", &fixtures::ALTER_TABLES).await?;
        let post_alter = report.post_alter.insert(self.snapshot(&credentials, true, false).await);
        self.check_altered(post_alter)?;
        self.collect(
            &mut report.steps,
            &stream,
            ALTER,
            fixtures::CDC_ALTER_EVENTS,
            threshold,
        )
        .await?;

        for task in [&first, &second] {
            let stats = self.statistics(task).await?;
            report.statistics.insert(task.to_string(), stats);
        }

        self.stop_task(&first).await?;
        self.stop_task(&second).await?;
        self.wait_for(&first, TaskStatus::stopped()).await?;
        self.wait_for(&second, TaskStatus::stopped()).await?;

        report.final_state = Some(self.snapshot(&credentials, false, false).await);
        self.execute(&credentials, "dropping tables", &fixtures::DROP_TABLES).await?;

        info!("cdc flow finished");
        Ok(())
    }

    /// One check per alteration in [`fixtures::ALTER_TABLES`].
    fn check_altered(&self, snapshot: &StateSnapshot) -> Result<(), ScenarioError> {
        let authors = snapshot.schema("authors").unwrap_or_default();
        let email = find_column(authors, "email").map(|c| c.column_type.as_str());
        self.check(ALTER, email == Some("varchar(100)"), || {
            format!("authors.email has type {email:?}, expected varchar(100)")
        })?;

        let accounts = snapshot.schema("accounts").unwrap_or_default();
        self.check(ALTER, find_column(accounts, "profile_picture").is_none(), || {
            "accounts.profile_picture still exists".to_owned()
        })?;

        let novels = snapshot.schema("novels").unwrap_or_default();
        self.check(ALTER, find_column(novels, "is_stock").is_some(), || {
            "novels.is_stock was not added".to_owned()
        })
    }
}
