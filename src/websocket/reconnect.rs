//! Reconnect state machine.
//!
//! `Idle -> Connecting -> Connected -> (close) -> Backoff(n) -> Connecting -> ...`
//!
//! Pure bookkeeping with no IO: the connection task feeds it socket events
//! and the current instant, and it answers with the next deadline. The
//! failure counter is reset only once a connection outlives the grace
//! window, so one flaky open does not hide a run of failures.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

/// Exponential backoff bounded by a cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before attempt `n`: `min(max, base * 2^n)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Where the reconnector currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPhase {
    /// `connect` was never called
    Idle,
    Connecting,
    Connected { since: Instant, settled: bool },
    /// Waiting before the next attempt
    Backoff { attempt: u32, until: Instant },
}

#[derive(Debug, Clone)]
pub struct Reconnector {
    policy: BackoffPolicy,
    grace: Duration,
    phase: ReconnectPhase,
    failures: u32,
}

impl Reconnector {
    pub fn new(policy: BackoffPolicy, grace: Duration) -> Self {
        Self {
            policy,
            grace,
            phase: ReconnectPhase::Idle,
            failures: 0,
        }
    }

    pub fn phase(&self) -> ReconnectPhase {
        self.phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Leave `Idle`. Returns false if already started, making `connect`
    /// idempotent.
    pub fn start(&mut self) -> bool {
        if self.phase != ReconnectPhase::Idle {
            return false;
        }
        self.phase = ReconnectPhase::Connecting;
        true
    }

    pub fn on_connected(&mut self, now: Instant) {
        self.phase = ReconnectPhase::Connected {
            since: now,
            settled: false,
        };
    }

    /// Deadline at which the open connection counts as stable
    pub fn grace_deadline(&self) -> Option<Instant> {
        match self.phase {
            ReconnectPhase::Connected {
                since,
                settled: false,
            } => Some(since + self.grace),
            _ => None,
        }
    }

    /// Reset the failure counter if the connection outlived the grace window.
    /// Returns true when the counter changed.
    pub fn settle(&mut self, now: Instant) -> bool {
        if let ReconnectPhase::Connected { since, settled } = &mut self.phase {
            if !*settled && now.duration_since(*since) >= self.grace {
                *settled = true;
                if self.failures > 0 {
                    debug!("Connection stable, resetting {} failures", self.failures);
                    self.failures = 0;
                    return true;
                }
            }
        }
        false
    }

    /// An open connection closed. Schedules the next attempt and returns
    /// its delay.
    pub fn on_closed(&mut self, now: Instant) -> Duration {
        self.settle(now);
        self.schedule(now)
    }

    /// A connect attempt failed before opening.
    pub fn on_connect_failed(&mut self, now: Instant) -> Duration {
        self.schedule(now)
    }

    fn schedule(&mut self, now: Instant) -> Duration {
        let attempt = self.failures;
        let delay = self.policy.delay(attempt);
        self.failures = self.failures.saturating_add(1);
        self.phase = ReconnectPhase::Backoff {
            attempt,
            until: now + delay,
        };
        info!(
            "Reconnect attempt {} scheduled in {}ms",
            attempt + 1,
            delay.as_millis()
        );
        delay
    }

    pub fn backoff_deadline(&self) -> Option<Instant> {
        match self.phase {
            ReconnectPhase::Backoff { until, .. } => Some(until),
            _ => None,
        }
    }

    /// Backoff timer fired. Returns true if an attempt should start now.
    pub fn backoff_elapsed(&mut self, now: Instant) -> bool {
        match self.phase {
            ReconnectPhase::Backoff { until, .. } if now >= until => {
                self.phase = ReconnectPhase::Connecting;
                true
            }
            _ => false,
        }
    }

    /// The health endpoint answered. Skips the rest of a pending backoff.
    pub fn on_probe_alive(&mut self) -> bool {
        if let ReconnectPhase::Backoff { attempt, .. } = self.phase {
            info!("Backend alive, skipping backoff before attempt {}", attempt + 1);
            self.phase = ReconnectPhase::Connecting;
            return true;
        }
        false
    }

    /// User asked for a reconnect. Cancels any pending backoff timer; an
    /// open connection is torn down by the caller first.
    pub fn manual_reconnect(&mut self) -> bool {
        match self.phase {
            ReconnectPhase::Idle => false,
            ReconnectPhase::Connecting => false,
            _ => {
                self.phase = ReconnectPhase::Connecting;
                true
            }
        }
    }
}
