//! Fixed-interval polling with a hard attempt ceiling.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// How often and how many times an artifact is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Result of a single lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Present,
    Missing,
}

/// Call `probe` until it reports [`Probe::Present`] or the ceiling is hit.
///
/// Returns the number of attempts made when the artifact was found, `None`
/// after exactly `max_attempts` misses. An error from `probe` stops polling
/// immediately. The attempt counter lives in this call only.
pub async fn poll_until_present<F, Fut>(policy: &PollPolicy, mut probe: F) -> Result<Option<u32>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Probe>>,
{
    for attempt in 1..=policy.max_attempts {
        if probe(attempt).await? == Probe::Present {
            return Ok(Some(attempt));
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Ok(None)
}
