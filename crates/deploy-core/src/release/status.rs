//! CI check state for a commit and the pre-deployment wait on it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::client::{CheckRun, CheckRunList};
use crate::error::{DeployError, Result};

pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Pending,
    Success,
    Failure,
    Error,
    /// A conclusion this tool does not recognise; never terminal
    Unknown,
}

impl CheckState {
    /// Map a check run's `status` and `conclusion`.
    pub fn from_check_run(run: &CheckRun) -> Self {
        if run.status != "completed" {
            return CheckState::Pending;
        }
        match run.conclusion.as_deref() {
            Some("success" | "neutral" | "skipped") => CheckState::Success,
            Some("failure" | "timed_out" | "cancelled" | "action_required") => CheckState::Failure,
            Some("startup_failure") => CheckState::Error,
            _ => CheckState::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckState::Success | CheckState::Failure | CheckState::Error
        )
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckState::Pending => "pending",
            CheckState::Success => "success",
            CheckState::Failure => "failure",
            CheckState::Error => "error",
            CheckState::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStatus {
    pub name: String,
    pub state: CheckState,
}

/// One read of every check on a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub overall: CheckState,
    pub checks: Vec<CheckStatus>,
}

impl StatusSnapshot {
    /// Summarise check runs. The overall state is terminal only once every
    /// check is; a commit without checks counts as successful.
    pub fn from_check_runs(runs: &[CheckRun]) -> Self {
        let checks: Vec<CheckStatus> = runs
            .iter()
            .map(|run| CheckStatus {
                name: run.name.clone(),
                state: CheckState::from_check_run(run),
            })
            .collect();

        let any = |state: CheckState| checks.iter().any(|c| c.state == state);
        let overall = if any(CheckState::Pending) {
            CheckState::Pending
        } else if any(CheckState::Unknown) {
            CheckState::Unknown
        } else if any(CheckState::Failure) {
            CheckState::Failure
        } else if any(CheckState::Error) {
            CheckState::Error
        } else {
            CheckState::Success
        };

        Self { overall, checks }
    }

    /// Summarise a fetched listing. Runs GitHub counted but did not return
    /// are unseen, so a short listing stays pending.
    pub fn from_listing(listing: &CheckRunList) -> Self {
        let mut snapshot = Self::from_check_runs(&listing.check_runs);
        if !listing.is_complete() {
            snapshot.overall = CheckState::Pending;
        }
        snapshot
    }

    /// Names of checks in a failing state.
    pub fn failing(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| matches!(c.state, CheckState::Failure | CheckState::Error))
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Poll interval and overall timeout for the check wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_STATUS_INTERVAL,
            timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }
}

/// Wait for every check on `sha` to settle.
///
/// Lookup errors are logged and retried until the timeout. A settled failing
/// state fails with the failing check names.
pub async fn poll_status_checks<F, Fut>(
    sha: &str,
    policy: &StatusPolicy,
    mut fetch: F,
) -> Result<StatusSnapshot>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusSnapshot>>,
{
    let start = Instant::now();
    let mut last: Option<CheckState> = None;

    loop {
        match fetch().await {
            Ok(snapshot) => {
                if last != Some(snapshot.overall) {
                    info!("Status checks for {}: {}", short(sha), snapshot.overall);
                    last = Some(snapshot.overall);
                }
                match snapshot.overall {
                    CheckState::Success => return Ok(snapshot),
                    CheckState::Failure | CheckState::Error => {
                        return Err(DeployError::StatusCheckFailed {
                            sha: sha.to_string(),
                            checks: snapshot.failing(),
                        });
                    }
                    CheckState::Pending | CheckState::Unknown => {}
                }
            }
            Err(err) => warn!("Could not read status checks, retrying: {}", err),
        }

        let waited = start.elapsed();
        if waited >= policy.timeout {
            return Err(DeployError::StatusCheckTimeout {
                sha: sha.to_string(),
                waited_secs: waited.as_secs(),
            });
        }
        tokio::time::sleep(policy.interval.min(policy.timeout - waited)).await;
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
