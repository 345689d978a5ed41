//! Scenario driver against the in-memory pipeline.

use std::time::Duration;

use dmsprobe_core::error::{ResourceKind, ScenarioError, ServiceError, WatchError};
use dmsprobe_core::scenario::report::ScenarioReport;
use dmsprobe_core::settings::{HarnessSettings, RetryPolicy};
use dmsprobe_core::types::{StackOutputs, TABLE_COMPLETED, TaskStatus};
use dmsprobe_core::{Flow, Mode, ScenarioDriver};
use dmsprobe_test_utils::fake::{self, FakePipeline};

fn settings() -> HarnessSettings {
    HarnessSettings::for_endpoint(Some("http://localhost:4566"))
}

fn step_counts(report: &ScenarioReport) -> Vec<(String, usize)> {
    report
        .steps()
        .map(|s| (s.phase.clone(), s.found()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn full_load_collects_and_checks_statistics() {
    let pipeline = FakePipeline::new();
    let services = pipeline.services();
    let settings = settings();

    let report = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap();

    assert!(report.cdc.is_none());
    assert_eq!(
        step_counts(&report),
        [
            ("full load: task 1 (a%)".to_owned(), 6),
            ("full load: task 2 (novels)".to_owned(), 4),
        ]
    );

    let full = report.full_load.as_ref().unwrap();
    let post_load = full.post_load.as_ref().unwrap();
    assert_eq!(post_load.count("authors"), 1);
    assert_eq!(post_load.count("accounts"), 1);
    assert_eq!(post_load.count("novels"), 2);
    assert_eq!(post_load.data.as_ref().unwrap()["novels"].len(), 2);

    // Statistics come back sorted regardless of service order.
    let first = &full.statistics[fake::FULL_TASK_1];
    let tables: Vec<_> = first.iter().map(|s| s.table.as_str()).collect();
    assert_eq!(tables, ["accounts", "authors"]);
    assert!(first.iter().all(|s| s.table_state == TABLE_COMPLETED && s.error_rows == 0));
    assert_eq!(full.statistics[fake::FULL_TASK_2][0].rows_loaded, 2);

    // Tables are cleaned up at the end of the flow.
    assert_eq!(pipeline.table_rows("authors"), None);
    assert_eq!(full.final_state.as_ref().unwrap().count("novels"), 2);
}

#[tokio::test(start_paused = true)]
async fn cdc_collects_each_phase_and_stops_tasks() {
    let pipeline = FakePipeline::new();
    let services = pipeline.services();
    let settings = settings();

    let report = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::Cdc)
        .await
        .unwrap();

    assert!(report.full_load.is_none());
    let counts: Vec<usize> = report.steps().map(|s| s.found()).collect();
    assert_eq!(counts, [5, 4, 3]);

    let cdc = report.cdc.as_ref().unwrap();
    assert_eq!(cdc.post_insert.as_ref().unwrap().count("novels"), 2);
    let post_alter = cdc.post_alter.as_ref().unwrap();
    assert!(post_alter.schema("novels").unwrap().iter().any(|c| c.field == "is_stock"));

    let stats = &cdc.statistics[fake::CDC_TASK_2];
    assert_eq!(stats[0].inserts, 2);
    assert_eq!(stats[0].ddls, 1);

    assert_eq!(pipeline.task_status(fake::CDC_TASK_1), Some(TaskStatus::stopped()));
    assert_eq!(pipeline.task_status(fake::CDC_TASK_2), Some(TaskStatus::stopped()));
}

#[tokio::test(start_paused = true)]
async fn full_load_is_repeatable() {
    let pipeline = FakePipeline::new();
    let services = pipeline.services();
    let settings = settings();
    let driver = ScenarioDriver::new(&services, &settings, Mode::Assert);

    let first = driver.run(fake::STACK_NAME, Flow::FullLoad).await.unwrap();
    let second = driver.run(fake::STACK_NAME, Flow::FullLoad).await.unwrap();

    let post_load = |report: &ScenarioReport| {
        report.full_load.as_ref().unwrap().post_load.as_ref().unwrap().counts.clone()
    };
    assert_eq!(post_load(&first), post_load(&second));
    assert_eq!(step_counts(&first), step_counts(&second));
    assert_eq!(pipeline.records().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn load_errors_fail_verification_with_statistics_in_report() {
    let pipeline = FakePipeline::new();
    pipeline.fail_table_load("accounts", 1);
    let services = pipeline.services();
    let settings = settings();

    let failure = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap_err();

    match &failure.error {
        ScenarioError::Assertion { phase, message } => {
            assert_eq!(phase, "full load: task 1 (a%)");
            assert!(message.contains("accounts reported 1 error rows"), "unexpected message: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failing task's statistics are still reported.
    let full = failure.report.full_load.as_ref().unwrap();
    let stats = &full.statistics[fake::FULL_TASK_1];
    assert_eq!(stats.len(), 2);
    let accounts = stats.iter().find(|s| s.table == "accounts").unwrap();
    assert_eq!(accounts.error_rows, 1);
    assert!(full.steps.is_empty());
    assert!(!full.statistics.contains_key(fake::FULL_TASK_2));
}

#[tokio::test(start_paused = true)]
async fn second_task_load_errors_keep_both_tasks_statistics() {
    let pipeline = FakePipeline::new();
    pipeline.fail_table_load("novels", 2);
    let services = pipeline.services();
    let settings = settings();

    let failure = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap_err();

    match &failure.error {
        ScenarioError::Assertion { phase, message } => {
            assert_eq!(phase, "full load: task 2 (novels)");
            assert!(message.contains("novels"), "unexpected message: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let full = failure.report.full_load.as_ref().unwrap();
    assert_eq!(full.statistics.len(), 2);
    let novels = &full.statistics[fake::FULL_TASK_2][0];
    assert_eq!(novels.error_rows, 2);
    assert_eq!(novels.table_state, "Table error");
    assert_eq!(full.steps.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn observe_mode_reports_load_errors_without_failing() {
    let pipeline = FakePipeline::new();
    pipeline.fail_table_load("authors", 1);
    let services = pipeline.services();
    let settings = settings();

    let report = ScenarioDriver::new(&services, &settings, Mode::Observe)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap();

    let full = report.full_load.as_ref().unwrap();
    let authors = full.statistics[fake::FULL_TASK_1]
        .iter()
        .find(|s| s.table == "authors")
        .unwrap();
    assert_ne!(authors.table_state, TABLE_COMPLETED);
    assert_eq!(step_counts(&report).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn both_flows_run_in_order() {
    let pipeline = FakePipeline::new();
    let services = pipeline.services();
    let settings = settings();

    let report = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::All)
        .await
        .unwrap();

    let counts: Vec<usize> = report.steps().map(|s| s.found()).collect();
    assert_eq!(counts, [6, 4, 5, 4, 3]);
    assert_eq!(pipeline.records().len(), 22);
}

#[tokio::test(start_paused = true)]
async fn database_host_alias_is_remapped() {
    let pipeline = FakePipeline::new();
    let services = pipeline.services();
    let settings = settings();

    ScenarioDriver::new(&services, &settings, Mode::Observe)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap();

    let hosts = pipeline.store_hosts();
    assert!(!hosts.is_empty());
    assert!(hosts.iter().all(|h| h == "localhost"), "{hosts:?}");
}

#[tokio::test(start_paused = true)]
async fn transient_status_errors_are_retried() {
    let pipeline = FakePipeline::new();
    pipeline.fail_status_reads(3);
    let services = pipeline.services();
    let settings = settings();

    let report = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap();

    assert_eq!(report.steps().count(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_stack_is_fatal() {
    let services = FakePipeline::new().services();
    let settings = settings();

    let failure = ScenarioDriver::new(&services, &settings, Mode::Observe)
        .run("no-such-stack", Flow::All)
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        ScenarioError::Service(ServiceError::NotFound {
            kind: ResourceKind::Stack,
            ..
        })
    ));
    assert!(failure.report.full_load.is_none());
}

#[tokio::test(start_paused = true)]
async fn missing_output_fails_before_touching_the_store() {
    let pipeline = FakePipeline::new();
    pipeline.remove_output(StackOutputs::FULL_TASK_2);
    let services = pipeline.services();
    let settings = settings();

    let failure = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        ScenarioError::Service(ServiceError::NotFound {
            kind: ResourceKind::StackOutput,
            ..
        })
    ));
    assert!(pipeline.statements().is_empty());
}

#[tokio::test(start_paused = true)]
async fn short_collection_keeps_records_and_report() {
    let pipeline = FakePipeline::new();
    pipeline.close_stream();
    pipeline.lose_records(1);
    let services = pipeline.services();
    let settings = settings();

    let failure = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap_err();

    match &failure.error {
        ScenarioError::PartialCollection {
            expected, records, ..
        } => {
            assert_eq!(*expected, 6);
            assert_eq!(records.len(), 5);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The partial report still shows the seeded state and the short step.
    let full = failure.report.full_load.as_ref().unwrap();
    assert_eq!(full.post_load.as_ref().unwrap().count("novels"), 2);
    assert_eq!(full.steps.len(), 1);
    assert_eq!(full.steps[0].found(), 5);
}

#[tokio::test(start_paused = true)]
async fn observe_mode_tolerates_short_collection() {
    let pipeline = FakePipeline::new();
    pipeline.close_stream();
    pipeline.lose_records(1);
    let services = pipeline.services();
    let settings = settings();

    let report = ScenarioDriver::new(&services, &settings, Mode::Observe)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap();

    let counts: Vec<usize> = report.steps().map(|s| s.found()).collect();
    assert_eq!(counts, [5, 4]);
}

#[tokio::test(start_paused = true)]
async fn task_that_never_stops_exhausts_the_watcher() {
    let pipeline = FakePipeline::new();
    let services = pipeline.services();
    let mut settings = settings();
    // One status read: the task is only ever seen as running.
    settings.retry = RetryPolicy::new(0, Duration::from_secs(1));

    let failure = ScenarioDriver::new(&services, &settings, Mode::Assert)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap_err();

    match failure.error {
        ScenarioError::Watch(WatchError::Mismatch {
            expected, observed, ..
        }) => {
            assert_eq!(expected, TaskStatus::stopped());
            assert_eq!(observed, Some(TaskStatus::running()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn report_serialises_flattened_records() {
    let pipeline = FakePipeline::new();
    let services = pipeline.services();
    let settings = settings();

    let report = ScenarioDriver::new(&services, &settings, Mode::Observe)
        .run(fake::STACK_NAME, Flow::FullLoad)
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty()).unwrap();
    let first = &json["full_load"]["steps"][0]["records"][0];
    assert_eq!(first["partition_key"], "dms_sample.authors");
    assert_eq!(first["metadata"]["record-type"], "control");
}
