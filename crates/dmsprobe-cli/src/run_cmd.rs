//! `dmsprobe run` and `dmsprobe verify`: drive the scenario flows.

use anyhow::Result;

use dmsprobe_core::scenario::report::ScenarioReport;
use dmsprobe_core::settings::HarnessSettings;
use dmsprobe_core::{Flow, Mode, ScenarioDriver, Services};

/// One line per collection step: phase, records found, records expected.
pub fn summary_lines(report: &ScenarioReport) -> Vec<String> {
    report
        .steps()
        .map(|step| {
            let marker = if step.found() == step.expected { "ok" } else { "MISMATCH" };
            format!(
                "  {:<32} {:>3}/{:<3} {marker}",
                step.phase,
                step.found(),
                step.expected
            )
        })
        .collect()
}

fn print_report(report: &ScenarioReport) {
    println!("Collection steps:");
    for line in summary_lines(report) {
        println!("{line}");
    }
    println!();
    println!("{}", report.to_json_pretty());
}

/// Run the selected flows and print the report.
///
/// On failure the partial report is printed before the error is returned,
/// so the caller exits non-zero with the last known state on screen.
pub async fn run_scenario(
    services: &Services,
    settings: &HarnessSettings,
    stack_name: &str,
    flow: Flow,
    mode: Mode,
) -> Result<()> {
    let driver = ScenarioDriver::new(services, settings, mode);
    match driver.run(stack_name, flow).await {
        Ok(report) => {
            print_report(&report);
            if mode == Mode::Assert {
                println!("Verification passed.");
            }
            Ok(())
        }
        Err(failure) => {
            print_report(&failure.report);
            let verb = match mode {
                Mode::Assert => "verification",
                Mode::Observe => "run",
            };
            Err(anyhow::Error::new(failure.error).context(format!("{verb} of stack {stack_name} failed")))
        }
    }
}
