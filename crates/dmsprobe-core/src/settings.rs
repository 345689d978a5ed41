//! Runtime settings resolved once at startup and shared read-only.

use std::time::Duration;

/// Constant-delay retry budget.
///
/// An operation runs at most `max_attempts + 1` times, sleeping `delay` between
/// failed attempts. The delay never grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Budget for a real cloud deployment, where tasks take minutes.
    pub const fn remote() -> Self {
        Self::new(100, Duration::from_secs(5))
    }

    /// Budget for a local emulator reached through an endpoint override.
    pub const fn local() -> Self {
        Self::new(10, Duration::from_secs(1))
    }

    /// Pick [`Self::local`] when an endpoint override is configured.
    pub fn for_endpoint(endpoint_url: Option<&str>) -> Self {
        match endpoint_url {
            Some(_) => Self::local(),
            None => Self::remote(),
        }
    }

    /// Total number of invocations this policy allows.
    pub fn total_attempts(&self) -> u64 {
        u64::from(self.max_attempts) + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::remote()
    }
}

/// Settings for [`crate::collector::StreamCollector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Records requested per fetch.
    pub page_limit: u32,
    /// Sleep between fetches that did not reach the target.
    pub poll_interval: Duration,
    /// Polls without reaching the target after which a stall is logged.
    pub stall_warning_polls: u32,
    /// Optional hard cap on polls. `None` keeps polling until the target is
    /// reached or the partition is exhausted.
    pub max_polls: Option<u32>,
}

impl CollectorSettings {
    pub const DEFAULT_PAGE_LIMIT: u32 = 50;
    pub const DEFAULT_STALL_WARNING_POLLS: u32 = 60;

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            page_limit: Self::DEFAULT_PAGE_LIMIT,
            poll_interval,
            stall_warning_polls: Self::DEFAULT_STALL_WARNING_POLLS,
            max_polls: None,
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::with_poll_interval(RetryPolicy::default().delay)
    }
}

/// Host substitution applied to every resolved credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRemap {
    pub alias: String,
    pub target: String,
}

impl Default for HostRemap {
    fn default() -> Self {
        Self {
            alias: "mariadb_server".to_owned(),
            target: "localhost".to_owned(),
        }
    }
}

/// Everything the scenario driver needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSettings {
    pub retry: RetryPolicy,
    pub collector: CollectorSettings,
    /// Pause around mutations so their events land after a fresh threshold.
    pub settle_delay: Duration,
    /// Pause before reading table statistics after a full load.
    pub statistics_settle: Duration,
    pub host_remap: HostRemap,
}

impl HarnessSettings {
    /// Defaults derived from whether an endpoint override is in use.
    pub fn for_endpoint(endpoint_url: Option<&str>) -> Self {
        let retry = RetryPolicy::for_endpoint(endpoint_url);
        Self {
            retry,
            collector: CollectorSettings::with_poll_interval(retry.delay),
            settle_delay: Duration::from_secs(1),
            statistics_settle: Duration::from_secs(5),
            host_remap: HostRemap::default(),
        }
    }
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self::for_endpoint(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_override_selects_local_budget() {
        assert_eq!(RetryPolicy::for_endpoint(None), RetryPolicy::remote());
        assert_eq!(
            RetryPolicy::for_endpoint(Some("http://localhost:4566")),
            RetryPolicy::local()
        );
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).total_attempts(), 1);
        assert_eq!(RetryPolicy::new(u32::MAX, Duration::ZERO).total_attempts(), 1 << 32);
    }

    #[test]
    fn poll_interval_follows_retry_delay() {
        let settings = HarnessSettings::for_endpoint(Some("http://localhost:4566"));
        assert_eq!(settings.collector.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.collector.page_limit, 50);
        assert_eq!(settings.collector.max_polls, None);
    }
}
