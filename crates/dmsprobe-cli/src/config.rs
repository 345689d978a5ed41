//! Configuration file management for dmsprobe.
//!
//! Provides a TOML-based config file at `~/.config/dmsprobe/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use dmsprobe_core::settings::{HarnessSettings, RetryPolicy};

pub const STACK_NAME_ENV: &str = "STACK_NAME";
pub const ENDPOINT_URL_ENV: &str = "ENDPOINT_URL";
pub const RETRIES_ENV: &str = "DMSPROBE_RETRIES";
pub const RETRY_DELAY_ENV: &str = "DMSPROBE_RETRY_DELAY";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub stack: StackSection,
    pub aws: AwsSection,
    pub retry: RetrySection,
    pub collector: CollectorSection,
    pub scenario: ScenarioSection,
    pub database: DatabaseSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSection {
    /// Endpoint override for a local emulator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_settle_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Host name in the secret that is unreachable from this machine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_host_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_host_target: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the dmsprobe config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/dmsprobe` or `~/.config/dmsprobe`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dmsprobe");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("dmsprobe")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns `None` if it does not exist.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub stack_name: Option<String>,
    pub endpoint_url: Option<String>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct DmsprobeConfig {
    stack_name: Option<String>,
    pub endpoint_url: Option<String>,
    pub settings: HarnessSettings,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_var(name)
        .map(|v| v.parse::<T>().with_context(|| format!("{name} is not a valid number: {v}")))
        .transpose()
}

impl DmsprobeConfig {
    /// Resolve against the config file on disk.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let file = load_config()?.unwrap_or_default();
        Self::resolve_with(overrides, &file)
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// Retry defaults depend on the endpoint override, so it is resolved
    /// first. The collector poll interval follows the resolved retry delay
    /// unless the file sets one.
    pub fn resolve_with(overrides: &Overrides, file: &ConfigFile) -> Result<Self> {
        let stack_name = overrides
            .stack_name
            .clone()
            .or_else(|| env_var(STACK_NAME_ENV))
            .or_else(|| file.stack.name.clone());

        let endpoint_url = overrides
            .endpoint_url
            .clone()
            .or_else(|| env_var(ENDPOINT_URL_ENV))
            .or_else(|| file.aws.endpoint_url.clone());

        let mut settings = HarnessSettings::for_endpoint(endpoint_url.as_deref());
        let defaults = settings.retry;

        let max_attempts = match overrides.retries {
            Some(n) => n,
            None => env_parse(RETRIES_ENV)?
                .or(file.retry.max_attempts)
                .unwrap_or(defaults.max_attempts),
        };
        let delay = match overrides.retry_delay {
            Some(secs) => Duration::from_secs(secs),
            None => env_parse(RETRY_DELAY_ENV)?
                .or(file.retry.delay_secs)
                .map_or(defaults.delay, Duration::from_secs),
        };
        settings.retry = RetryPolicy::new(max_attempts, delay);

        let collector = &mut settings.collector;
        collector.poll_interval = file
            .collector
            .poll_interval_secs
            .map_or(delay, Duration::from_secs);
        if let Some(limit) = file.collector.page_limit {
            if limit == 0 {
                bail!("collector.page_limit must be at least 1");
            }
            collector.page_limit = limit;
        }
        collector.max_polls = file.collector.max_polls;

        if let Some(secs) = file.scenario.settle_secs {
            settings.settle_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = file.scenario.statistics_settle_secs {
            settings.statistics_settle = Duration::from_secs(secs);
        }
        if let Some(alias) = &file.database.local_host_alias {
            settings.host_remap.alias = alias.clone();
        }
        if let Some(target) = &file.database.local_host_target {
            settings.host_remap.target = target.clone();
        }

        Ok(Self {
            stack_name,
            endpoint_url,
            settings,
        })
    }

    /// The stack name, which every stack-driven command requires.
    pub fn stack_name(&self) -> Result<&str> {
        match self.stack_name.as_deref() {
            Some(name) => Ok(name),
            None => bail!(
                "stack name not set; pass --stack-name, set {STACK_NAME_ENV}, or run `dmsprobe init`"
            ),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        for name in [STACK_NAME_ENV, ENDPOINT_URL_ENV, RETRIES_ENV, RETRY_DELAY_ENV] {
            unsafe { std::env::remove_var(name) };
        }
    }

    #[test]
    fn defaults_without_endpoint_are_remote() {
        let _lock = lock_env();
        clear_env();

        let config = DmsprobeConfig::resolve_with(&Overrides::default(), &ConfigFile::default())
            .unwrap();
        assert_eq!(config.settings.retry, RetryPolicy::remote());
        assert_eq!(config.settings.collector.poll_interval, Duration::from_secs(5));
        assert!(config.endpoint_url.is_none());

        let err = config.stack_name().unwrap_err().to_string();
        assert!(err.contains("stack name not set"), "unexpected error: {err}");
    }

    #[test]
    fn endpoint_from_env_selects_local_budget() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(ENDPOINT_URL_ENV, "http://localhost:4566") };

        let config = DmsprobeConfig::resolve_with(&Overrides::default(), &ConfigFile::default())
            .unwrap();
        clear_env();

        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.settings.retry, RetryPolicy::local());
    }

    #[test]
    fn cli_flag_overrides_env_and_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(STACK_NAME_ENV, "from-env") };
        unsafe { std::env::set_var(RETRIES_ENV, "7") };

        let mut file = ConfigFile::default();
        file.stack.name = Some("from-file".to_owned());
        file.retry.max_attempts = Some(3);

        let overrides = Overrides {
            stack_name: Some("from-cli".to_owned()),
            retries: Some(1),
            ..Overrides::default()
        };
        let config = DmsprobeConfig::resolve_with(&overrides, &file).unwrap();
        assert_eq!(config.stack_name().unwrap(), "from-cli");
        assert_eq!(config.settings.retry.max_attempts, 1);

        let config = DmsprobeConfig::resolve_with(&Overrides::default(), &file).unwrap();
        clear_env();
        assert_eq!(config.stack_name().unwrap(), "from-env");
        assert_eq!(config.settings.retry.max_attempts, 7);
    }

    #[test]
    fn file_values_fill_remaining_settings() {
        let _lock = lock_env();
        clear_env();

        let file: ConfigFile = toml::from_str(
            r#"
            [stack]
            name = "dms-sample"

            [retry]
            delay_secs = 2

            [collector]
            page_limit = 10
            max_polls = 30

            [scenario]
            settle_secs = 3

            [database]
            local_host_target = "127.0.0.1"
            "#,
        )
        .unwrap();

        let config = DmsprobeConfig::resolve_with(&Overrides::default(), &file).unwrap();
        let settings = &config.settings;
        assert_eq!(config.stack_name().unwrap(), "dms-sample");
        assert_eq!(settings.retry.delay, Duration::from_secs(2));
        assert_eq!(settings.collector.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.collector.page_limit, 10);
        assert_eq!(settings.collector.max_polls, Some(30));
        assert_eq!(settings.settle_delay, Duration::from_secs(3));
        assert_eq!(settings.statistics_settle, Duration::from_secs(5));
        assert_eq!(settings.host_remap.alias, "mariadb_server");
        assert_eq!(settings.host_remap.target, "127.0.0.1");
    }

    #[test]
    fn invalid_env_number_is_an_error() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(RETRY_DELAY_ENV, "soon") };

        let result = DmsprobeConfig::resolve_with(&Overrides::default(), &ConfigFile::default());
        clear_env();

        let msg = result.unwrap_err().to_string();
        assert!(msg.contains(RETRY_DELAY_ENV), "unexpected error: {msg}");
    }

    #[test]
    fn zero_page_limit_is_rejected() {
        let _lock = lock_env();
        clear_env();

        let mut file = ConfigFile::default();
        file.collector.page_limit = Some(0);
        assert!(DmsprobeConfig::resolve_with(&Overrides::default(), &file).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_writes_owner_only_file() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let mut config = ConfigFile::default();
        config.stack.name = Some("dms-sample".to_owned());
        config.aws.endpoint_url = Some("http://localhost:4566".to_owned());
        let saved = save_config(&config);
        let loaded = load_config();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        let path = saved.unwrap();
        assert_eq!(path, tmp.path().join("dmsprobe").join("config.toml"));
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);

        let loaded = loaded.unwrap().unwrap();
        assert_eq!(loaded.stack.name.as_deref(), Some("dms-sample"));
        assert_eq!(loaded.aws.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert!(loaded.retry.max_attempts.is_none());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("dmsprobe/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
