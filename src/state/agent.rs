//! Agent-mode controller.
//!
//! Tracks the user's agent-mode toggle, the run the backend reported as
//! active, and at most one pending question. Stopping clears local state
//! immediately; the session arms the tool grace timeout on top of it.

use tracing::{debug, info};

use crate::error::OperationError;
use crate::traits::{FrameSink, SendOutcome};
use crate::websocket::messages::{AgentAnswer, AgentMode, AgentStop, OutgoingFrame};

/// What a run looked like when it was stopped
#[derive(Debug, Clone, PartialEq)]
pub struct StopSignal {
    pub run_id: Option<String>,
    pub outcome: SendOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct AgentController {
    enabled: bool,
    pending_question: Option<String>,
    /// `Some` while a run is active; the inner id is optional on the wire
    run: Option<Option<String>>,
}

impl AgentController {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn pending_question(&self) -> Option<&str> {
        self.pending_question.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run.as_ref().and_then(|id| id.as_deref())
    }

    /// Flip agent mode locally and tell the backend.
    pub fn set_enabled(&mut self, sink: &dyn FrameSink, enabled: bool) -> SendOutcome {
        self.enabled = enabled;
        info!("Agent mode {}", if enabled { "enabled" } else { "disabled" });
        sink.send(OutgoingFrame::AgentMode(AgentMode { enabled }))
    }

    /// A new question replaces any unanswered one.
    pub fn on_question(&mut self, question: &str) {
        if let Some(previous) = self.pending_question.replace(question.to_string()) {
            debug!("Agent question replaced unanswered one: {}", previous);
        }
    }

    /// Send the answer. The question stays pending if the socket is down.
    pub fn answer(&mut self, sink: &dyn FrameSink, text: &str) -> Result<SendOutcome, OperationError> {
        if self.pending_question.is_none() {
            return Err(OperationError::NoPendingQuestion);
        }
        let outcome = sink.send(OutgoingFrame::AgentAnswer(AgentAnswer {
            answer: text.to_string(),
        }));
        if outcome.is_sent() {
            self.pending_question = None;
        }
        Ok(outcome)
    }

    pub fn on_run_started(&mut self, run_id: Option<String>) {
        debug!("Agent run started: {:?}", run_id);
        self.run = Some(run_id);
    }

    pub fn on_run_finished(&mut self, run_id: Option<&str>) {
        let current = self.run_id();
        if let (Some(finished), Some(current)) = (run_id, current) {
            if finished != current {
                debug!("Ignoring finish for run {} while {} is active", finished, current);
                return;
            }
        }
        debug!("Agent run finished");
        self.run = None;
        self.pending_question = None;
    }

    /// A run is active or a question is waiting
    pub fn is_active(&self) -> bool {
        self.run.is_some() || self.pending_question.is_some()
    }

    /// Send the stop signal and clear the run and question locally,
    /// whether or not the frame reached the backend.
    pub fn stop(&mut self, sink: &dyn FrameSink) -> StopSignal {
        let run_id = self.run.take().flatten();
        self.pending_question = None;
        let outcome = sink.send(OutgoingFrame::AgentStop(AgentStop {
            run_id: run_id.clone(),
        }));
        info!("Agent stop requested ({:?})", outcome);
        StopSignal { run_id, outcome }
    }
}
