//! Single-step operator commands: `outputs`, `wait`, `events`, `stats`.
//!
//! Each runs one harness component on its own against the live stack, for
//! poking at a pipeline without a full scenario run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use dmsprobe_core::settings::HarnessSettings;
use dmsprobe_core::types::{StreamRecord, TableStatistics, TaskRef, TaskStatus, sort_statistics};
use dmsprobe_core::{EventWindow, Services, StreamCollector, TaskWatcher};

/// Print every output of the stack.
pub async fn run_outputs(services: &Services, stack_name: &str) -> Result<()> {
    let outputs = services
        .stacks
        .describe(stack_name)
        .await
        .with_context(|| format!("failed to resolve stack {stack_name}"))?;

    println!("Stack: {stack_name}");
    for (key, value) in outputs.iter() {
        println!("  {key:<16} {value}");
    }
    Ok(())
}

/// Block until the task reports `status`, within the retry budget.
pub async fn run_wait(
    services: &Services,
    settings: &HarnessSettings,
    task: &str,
    status: &str,
) -> Result<()> {
    let task = TaskRef::new(task);
    let expected = TaskStatus::new(status);
    let watcher = TaskWatcher::new(services.control.as_ref(), settings.retry);

    let observed = watcher
        .wait_for_status(&task, &expected)
        .await
        .with_context(|| format!("task {task} did not reach {expected}"))?;
    println!("Task {task} is {observed}.");
    Ok(())
}

/// Collect `expected` records that arrived after `since` from the stack's
/// stream. Without `since`, every retained record is eligible.
pub async fn collect_events(
    services: &Services,
    settings: &HarnessSettings,
    stack_name: &str,
    expected: usize,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<StreamRecord>> {
    let outputs = services
        .stacks
        .describe(stack_name)
        .await
        .with_context(|| format!("failed to resolve stack {stack_name}"))?;
    let stream = outputs.stream()?;

    let window = EventWindow::new(since.unwrap_or(DateTime::UNIX_EPOCH), expected);
    let records = StreamCollector::new(services.log.as_ref(), settings.collector)
        .collect(&stream, window)
        .await
        .with_context(|| format!("failed to read stream {stream}"))?;
    Ok(records)
}

pub async fn run_events(
    services: &Services,
    settings: &HarnessSettings,
    stack_name: &str,
    expected: usize,
    since: Option<DateTime<Utc>>,
) -> Result<()> {
    let records = collect_events(services, settings, stack_name, expected, since).await?;
    for record in &records {
        let line = serde_json::to_string(&record.flattened()).context("failed to encode record")?;
        println!("{line}");
    }
    println!("Collected {}/{expected} records.", records.len());
    Ok(())
}

/// Render statistics as aligned table rows.
pub fn statistics_lines(stats: &[TableStatistics]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<24} {:>6} {:>6} {:>7} {:>7} {:>7} {:>5}  {}",
        "TABLE", "LOADED", "ERRORS", "INSERTS", "UPDATES", "DELETES", "DDLS", "STATE"
    )];
    lines.extend(stats.iter().map(|s| {
        format!(
            "{:<24} {:>6} {:>6} {:>7} {:>7} {:>7} {:>5}  {}",
            format!("{}.{}", s.schema, s.table),
            s.rows_loaded,
            s.error_rows,
            s.inserts,
            s.updates,
            s.deletes,
            s.ddls,
            s.table_state,
        )
    }));
    lines
}

/// Print the task's table statistics, sorted by schema and table.
pub async fn run_stats(services: &Services, task: &str) -> Result<()> {
    let task = TaskRef::new(task);
    let mut stats = services
        .control
        .describe_table_statistics(&task)
        .await
        .with_context(|| format!("failed to read statistics for task {task}"))?;
    sort_statistics(&mut stats);

    if stats.is_empty() {
        println!("No table statistics for task {task}.");
        return Ok(());
    }
    for line in statistics_lines(&stats) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use dmsprobe_core::{Flow, Mode, ScenarioDriver};
    use dmsprobe_test_utils::fake::{self, FakePipeline};

    use super::*;

    fn settings() -> HarnessSettings {
        HarnessSettings::for_endpoint(Some("http://localhost:4566"))
    }

    async fn run_full_load(pipeline: &FakePipeline, settings: &HarnessSettings) {
        let services = pipeline.services();
        ScenarioDriver::new(&services, settings, Mode::Observe)
            .run(fake::STACK_NAME, Flow::FullLoad)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn events_without_since_reads_from_the_start() {
        let pipeline = FakePipeline::new();
        let settings = settings();
        run_full_load(&pipeline, &settings).await;
        let services = pipeline.services();

        let records = collect_events(&services, &settings, fake::STACK_NAME, 10, None)
            .await
            .unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records, pipeline.records()[..10]);
    }

    #[tokio::test(start_paused = true)]
    async fn events_since_excludes_earlier_records() {
        let pipeline = FakePipeline::new();
        let settings = settings();
        run_full_load(&pipeline, &settings).await;
        let services = pipeline.services();
        pipeline.close_stream();

        let all = pipeline.records();
        let since = all[5].arrival_time;
        let records = collect_events(&services, &settings, fake::STACK_NAME, 100, Some(since))
            .await
            .unwrap();
        assert_eq!(records.len(), all.len() - 6);
        assert!(records.iter().all(|r| r.arrival_time > since));
    }

    #[tokio::test(start_paused = true)]
    async fn events_for_unknown_stack_fail() {
        let services = FakePipeline::new().services();
        let err = collect_events(&services, &settings(), "no-such-stack", 1, None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("no-such-stack"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_once_task_has_stopped() {
        let pipeline = FakePipeline::new();
        let settings = settings();
        run_full_load(&pipeline, &settings).await;
        let services = pipeline.services();

        run_wait(&services, &settings, fake::FULL_TASK_1, TaskStatus::STOPPED)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stats_for_unknown_task_fail() {
        let services = FakePipeline::new().services();
        assert!(run_stats(&services, "arn:aws:dms:none").await.is_err());
    }

    #[test]
    fn statistics_lines_include_header_and_qualified_names() {
        let stats = vec![TableStatistics {
            schema: "dms_sample".to_owned(),
            table: "novels".to_owned(),
            rows_loaded: 2,
            table_state: "Table completed".to_owned(),
            ..TableStatistics::default()
        }];

        let lines = statistics_lines(&stats);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("TABLE"));
        assert!(lines[1].starts_with("dms_sample.novels"));
        assert!(lines[1].ends_with("Table completed"));
    }
}
