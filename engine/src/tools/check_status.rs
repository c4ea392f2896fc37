//! `check_status`: poll a branch until it reaches a terminal status

use super::{extract_branch_id, remote_error, require, BranchTracker, ToolDispatcher, ToolExecutionError};
use crate::config::PollingConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Statuses after which a branch never changes again
pub const TERMINAL_STATUSES: [&str; 2] = ["succeed", "failed"];

/// Deadline used when a requested timeout cannot be represented
const MAX_WAIT: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckStatusArgs {
    pub branch_id: String,

    #[serde(default)]
    pub timeout_seconds: Option<f64>,

    #[serde(default)]
    pub poll_interval_seconds: Option<f64>,

    #[serde(default)]
    pub max_poll_interval_seconds: Option<f64>,
}

impl CheckStatusArgs {
    pub fn new(branch_id: impl Into<String>) -> Self {
        Self {
            branch_id: branch_id.into(),
            ..Self::default()
        }
    }
}

/// Effective polling schedule of one `check_status` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSchedule {
    pub timeout: Duration,
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
}

fn positive_secs(value: Option<f64>) -> Option<Duration> {
    value
        .filter(|v| *v > 0.0)
        .and_then(|v| Duration::try_from_secs_f64(v).ok())
}

impl PollSchedule {
    /// Resolve call overrides against the configured defaults
    ///
    /// Non-positive overrides are ignored; a ceiling below the initial
    /// interval falls back to the configured ceiling.
    pub fn resolve(args: &CheckStatusArgs, defaults: &PollingConfig) -> Self {
        let default_secs = |v: f64| Duration::try_from_secs_f64(v).unwrap_or_default();

        let timeout = positive_secs(args.timeout_seconds)
            .unwrap_or_else(|| default_secs(defaults.timeout_secs));
        let initial = positive_secs(args.poll_interval_seconds)
            .unwrap_or_else(|| default_secs(defaults.initial_secs));
        let max = positive_secs(args.max_poll_interval_seconds)
            .filter(|max| *max >= initial)
            .unwrap_or_else(|| default_secs(defaults.max_secs));

        Self {
            timeout,
            initial,
            max,
            factor: defaults.backoff_factor,
        }
    }

    /// Interval following `current`
    pub fn next(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// Lowercased, trimmed status of a branch record
pub fn branch_status(record: &Value) -> String {
    record
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default()
}

pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

impl ToolDispatcher {
    /// Poll `get_branch` until the status is terminal or the deadline passes
    ///
    /// Every response's identifier is recorded into `tracker`. Returns the
    /// terminal branch record unchanged.
    pub async fn check_status(
        &self,
        args: CheckStatusArgs,
        tracker: &mut BranchTracker,
    ) -> Result<Value, ToolExecutionError> {
        require("branch_id", &args.branch_id)?;

        let schedule = PollSchedule::resolve(&args, &self.polling);
        let started = Instant::now();
        let deadline = started
            .checked_add(schedule.timeout)
            .unwrap_or_else(|| started + MAX_WAIT);
        let mut sleep = schedule.initial;

        info!(
            "Checking status for branch {} (timeout={:?})",
            args.branch_id, schedule.timeout
        );

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let response = self.client.get_branch(&args.branch_id).await?;

            if let Some(message) = remote_error(&response) {
                return Err(ToolExecutionError::Remote(message));
            }
            let branch_id =
                extract_branch_id(&response).ok_or(ToolExecutionError::MissingBranchId("get_branch"))?;
            tracker.record(&branch_id);

            let status = branch_status(&response);
            info!(
                "Branch {} response (attempt {}): status={}",
                args.branch_id, attempt, status
            );
            if is_terminal(&status) {
                return Ok(response);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ToolExecutionError::Timeout {
                    branch_id: args.branch_id,
                    status,
                });
            }

            let wait = sleep.min(deadline - now);
            info!(
                "Branch {} still active (status={}). Sleeping {:.1}s.",
                args.branch_id,
                status,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
            sleep = schedule.next(sleep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_defaults() {
        let schedule = PollSchedule::resolve(&CheckStatusArgs::new("b"), &PollingConfig::default());
        assert_eq!(schedule.timeout, Duration::from_secs(1800));
        assert_eq!(schedule.initial, Duration::from_secs(3));
        assert_eq!(schedule.max, Duration::from_secs(30));
    }

    #[test]
    fn test_schedule_ignores_bad_overrides() {
        let args = CheckStatusArgs {
            branch_id: "b".into(),
            timeout_seconds: Some(-5.0),
            poll_interval_seconds: Some(10.0),
            max_poll_interval_seconds: Some(2.0),
        };
        let schedule = PollSchedule::resolve(&args, &PollingConfig::default());
        assert_eq!(schedule.timeout, Duration::from_secs(1800));
        assert_eq!(schedule.initial, Duration::from_secs(10));
        assert_eq!(schedule.max, Duration::from_secs(30));
    }

    #[test]
    fn test_interval_grows_to_ceiling() {
        let schedule = PollSchedule::resolve(&CheckStatusArgs::new("b"), &PollingConfig::default());
        let mut interval = schedule.initial;
        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.push(interval);
            interval = schedule.next(interval);
        }
        assert_eq!(seen[1], Duration::from_millis(4500));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(branch_status(&json!({"status": "  SUCCEED "})), "succeed");
        assert_eq!(branch_status(&json!({"status": 3})), "");
        assert!(is_terminal("failed"));
        assert!(!is_terminal("running"));
    }
}
