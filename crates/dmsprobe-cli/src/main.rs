mod config;
mod inspect_cmds;
mod run_cmd;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use dmsprobe_core::{Flow, Mode, Services};
use dmsprobe_db::MySqlStore;

use config::{DmsprobeConfig, Overrides};

#[derive(Parser)]
#[command(name = "dmsprobe", about = "Verification harness for DMS replication pipelines")]
struct Cli {
    /// CloudFormation stack that owns the pipeline (overrides STACK_NAME env var)
    #[arg(long, global = true)]
    stack_name: Option<String>,

    /// Endpoint override for a local AWS emulator (overrides ENDPOINT_URL env var)
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    /// Retries per wait after the first attempt
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Seconds between retries
    #[arg(long, global = true)]
    retry_delay: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            stack_name: self.stack_name.clone(),
            endpoint_url: self.endpoint_url.clone(),
            retries: self.retries,
            retry_delay: self.retry_delay,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FlowArg {
    FullLoad,
    Cdc,
    All,
}

impl From<FlowArg> for Flow {
    fn from(flow: FlowArg) -> Self {
        match flow {
            FlowArg::FullLoad => Flow::FullLoad,
            FlowArg::Cdc => Flow::Cdc,
            FlowArg::All => Flow::All,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a dmsprobe config file from --stack-name and --endpoint-url
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run the scenario flows and print everything observed
    Run {
        #[arg(long, value_enum, default_value = "all")]
        flow: FlowArg,
    },
    /// Run the scenario flows and fail on the first unmet expectation
    Verify {
        #[arg(long, value_enum, default_value = "all")]
        flow: FlowArg,
    },
    /// Print the stack outputs
    Outputs,
    /// Wait for a replication task to reach a status
    Wait {
        /// Replication task ARN
        task: String,
        /// Status to wait for, e.g. running or stopped
        status: String,
    },
    /// Collect records from the stack's stream
    Events {
        /// Number of records to wait for
        #[arg(long)]
        expected: usize,
        /// Only records that arrived after this RFC 3339 time
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Print table statistics for a replication task
    Stats {
        /// Replication task ARN
        task: String,
    },
}

/// Execute the `dmsprobe init` command: write config file.
fn cmd_init(overrides: &Overrides, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let resolved = DmsprobeConfig::resolve_with(overrides, &config::ConfigFile::default())?;
    let stack_name = resolved.stack_name()?;

    let mut cfg = config::ConfigFile::default();
    cfg.stack.name = Some(stack_name.to_owned());
    cfg.aws.endpoint_url = resolved.endpoint_url.clone();

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  stack.name = {stack_name}");
    if let Some(url) = &resolved.endpoint_url {
        println!("  aws.endpoint_url = {url}");
    }
    println!();
    println!("Next: run `dmsprobe outputs` to check the stack is reachable.");

    Ok(())
}

/// Build the AWS-backed collaborators, with MySQL for the source database.
async fn connect(resolved: &DmsprobeConfig) -> Services {
    let retry = resolved.settings.retry;
    tracing::debug!(
        max_attempts = retry.max_attempts,
        delay_secs = retry.delay.as_secs(),
        poll_interval_secs = resolved.settings.collector.poll_interval.as_secs(),
        "resolved harness settings"
    );
    let sdk = dmsprobe_aws::load_sdk_config(resolved.endpoint_url.as_deref()).await;
    dmsprobe_aws::services(&sdk, Arc::new(MySqlStore::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let overrides = cli.overrides();

    if let Commands::Init { force } = cli.command {
        return cmd_init(&overrides, force);
    }

    let resolved = DmsprobeConfig::resolve(&overrides).context("failed to resolve configuration")?;
    let services = connect(&resolved).await;
    let settings = &resolved.settings;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Run { flow } => {
            let stack_name = resolved.stack_name()?;
            run_cmd::run_scenario(&services, settings, stack_name, flow.into(), Mode::Observe)
                .await?;
        }
        Commands::Verify { flow } => {
            let stack_name = resolved.stack_name()?;
            run_cmd::run_scenario(&services, settings, stack_name, flow.into(), Mode::Assert)
                .await?;
        }
        Commands::Outputs => {
            inspect_cmds::run_outputs(&services, resolved.stack_name()?).await?;
        }
        Commands::Wait { task, status } => {
            inspect_cmds::run_wait(&services, settings, &task, &status).await?;
        }
        Commands::Events { expected, since } => {
            let stack_name = resolved.stack_name()?;
            inspect_cmds::run_events(&services, settings, stack_name, expected, since).await?;
        }
        Commands::Stats { task } => {
            inspect_cmds::run_stats(&services, &task).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dmsprobe",
            "verify",
            "--flow",
            "full-load",
            "--stack-name",
            "dms-sample",
            "--retries",
            "3",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.stack_name.as_deref(), Some("dms-sample"));
        assert_eq!(overrides.retries, Some(3));
        assert!(matches!(cli.command, Commands::Verify { flow: FlowArg::FullLoad }));
    }

    #[test]
    fn run_defaults_to_all_flows() {
        let cli = Cli::try_parse_from(["dmsprobe", "run"]).unwrap();
        match cli.command {
            Commands::Run { flow } => assert_eq!(Flow::from(flow), Flow::All),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn events_since_parses_rfc3339() {
        let cli = Cli::try_parse_from([
            "dmsprobe",
            "events",
            "--expected",
            "5",
            "--since",
            "2024-05-01T12:00:00.250Z",
        ])
        .unwrap();
        match cli.command {
            Commands::Events { expected, since } => {
                assert_eq!(expected, 5);
                let since = since.unwrap();
                assert_eq!(since.timestamp_subsec_millis(), 250);
            }
            _ => panic!("expected events"),
        }
    }

    #[test]
    fn events_requires_expected() {
        assert!(Cli::try_parse_from(["dmsprobe", "events"]).is_err());
    }

    #[test]
    fn wait_takes_task_and_status() {
        let cli = Cli::try_parse_from(["dmsprobe", "wait", "arn:aws:dms:task:a", "stopped"]).unwrap();
        match cli.command {
            Commands::Wait { task, status } => {
                assert_eq!(task, "arn:aws:dms:task:a");
                assert_eq!(status, "stopped");
            }
            _ => panic!("expected wait"),
        }
    }
}
