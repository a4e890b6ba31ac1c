//! Polling budget for the receive-frame loop

use std::time::{Duration, Instant};

/// How long the decode loop keeps asking for a frame.
///
/// Both limits are optional; with neither set the loop polls until the
/// decoder produces a frame or fails for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
    /// Pause between two attempts.
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(100),
            deadline: Some(Duration::from_secs(5)),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            deadline: None,
            poll_interval: Duration::ZERO,
        }
    }

    /// At most `max` attempts, no deadline, no pause.
    pub fn attempts(max: u32) -> Self {
        Self {
            max_attempts: Some(max),
            deadline: None,
            poll_interval: Duration::ZERO,
        }
    }

    pub fn start(&self) -> RetryBudget {
        RetryBudget {
            policy: *self,
            started: Instant::now(),
            attempts: 0,
        }
    }
}

/// A running [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryBudget {
    policy: RetryPolicy,
    started: Instant,
    attempts: u32,
}

impl RetryBudget {
    /// Claim one attempt. `false` once the budget is spent.
    pub fn try_attempt(&mut self) -> bool {
        if self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return false;
        }
        // The first attempt is always allowed, however short the deadline.
        if self.attempts > 0 && self.expired() {
            return false;
        }
        self.attempts += 1;
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the deadline, if any, has passed.
    pub fn expired(&self) -> bool {
        self.policy
            .deadline
            .is_some_and(|deadline| self.started.elapsed() >= deadline)
    }

    pub fn pause(&self) {
        if !self.policy.poll_interval.is_zero() {
            std::thread::sleep(self.policy.poll_interval);
        }
    }
}
