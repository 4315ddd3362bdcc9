//! Readiness polling.
//!
//! A fixed-interval health poll races a one-shot deadline. Both are
//! observed from a single `select!`, so exactly one of them ends the wait.
//! The deadline arm is checked first: when a poll and the deadline become
//! due at the same instant, the wait times out.

use packtest_common::error::Result;
use packtest_common::types::ReadinessPolicy;
use tokio::time::MissedTickBehavior;

use crate::backend::HealthStatus;

/// How a readiness wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The instance reported healthy (or runs without a health check).
    Ready {
        /// Health queries made.
        polls: u32,
    },
    /// The instance reported unhealthy or exited.
    Unhealthy {
        /// Health queries made.
        polls: u32,
    },
    /// The deadline elapsed first.
    TimedOut {
        /// Health queries made.
        polls: u32,
    },
}

/// Polls `probe` every `policy.poll_interval` until it reports a terminal
/// status or `policy.deadline` elapses.
///
/// The first poll happens immediately.
///
/// # Errors
///
/// Returns `HarnessError::Config` if the policy's poll interval is zero,
/// or the probe's error if a health query fails; the wait stops at that
/// point.
pub async fn wait_for_ready<F>(policy: ReadinessPolicy, mut probe: F) -> Result<ReadinessOutcome>
where
    F: FnMut() -> Result<HealthStatus>,
{
    policy.validate()?;
    let deadline = tokio::time::sleep(policy.deadline);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(policy.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = &mut deadline => {
                tracing::debug!(polls, "readiness deadline elapsed");
                return Ok(ReadinessOutcome::TimedOut { polls });
            }
            _ = ticker.tick() => {
                polls = polls.saturating_add(1);
                match probe()? {
                    HealthStatus::Healthy | HealthStatus::None => {
                        return Ok(ReadinessOutcome::Ready { polls });
                    }
                    HealthStatus::Unhealthy | HealthStatus::Exited => {
                        return Ok(ReadinessOutcome::Unhealthy { polls });
                    }
                    HealthStatus::Starting => {
                        tracing::trace!(polls, "instance still starting");
                    }
                }
            }
        }
    }
}
