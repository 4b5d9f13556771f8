//! Next-poll timing.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::time::Instant;

use crate::protocol_constants::{MAX_LOOKAHEAD_SECS, SCHEDULE_SLACK_SECS};

/// Computes how long to wait before the next poll.
///
/// When the next known entry is due within the lookahead window, the poll
/// lands one second after it. Otherwise it lands one second past the next
/// minute boundary, which is when untimestamped changes are picked up.
#[must_use]
pub fn next_delay(next_event: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    if let Some(at) = next_event {
        let millis = (at - now).num_milliseconds();
        if millis > 0 && millis <= MAX_LOOKAHEAD_SECS * 1000 {
            // Round partial seconds up so the poll never lands early.
            let secs = (millis as u64).div_ceil(1000);
            return Duration::from_secs(secs + SCHEDULE_SLACK_SECS);
        }
    }
    Duration::from_secs(61 - u64::from(now.second()))
}

/// Single-shot poll timer.
///
/// Armed while any client is connected; idle otherwise. Built on
/// `tokio::time` so tests can drive it with a paused clock.
#[derive(Debug, Default)]
pub struct Scheduler {
    deadline: Option<Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer for the next poll, replacing any pending deadline.
    pub fn arm(&mut self, next_event: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        let delay = next_delay(next_event, now);
        self.deadline = Some(Instant::now() + delay);
        delay
    }

    /// Disarms the timer. Returns `true` if it was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the deadline passes, disarming the timer.
    ///
    /// Never resolves while idle.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
