//! Deadline queue for the session's local timers.
//!
//! The session is driven from one task, so timers are plain data: the run
//! loop sleeps until [`TimerQueue::next_deadline`] and then drains
//! everything due. Events with equal deadlines fire in scheduling order.

use std::collections::BTreeMap;

use tokio::time::Instant;

/// What to do when a deadline passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Debounce before auto-approving this tool call
    AutoApprove(String),
    /// Fail these tool calls if they are still in flight after a stop
    StopGrace(Vec<String>),
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(Instant, u64), TimerEvent>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, event: TimerEvent) {
        self.entries.insert((at, self.seq), event);
        self.seq += 1;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Remove and return every event due at `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut due = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
