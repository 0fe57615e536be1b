//! Tool lifecycle controller and approval gate.
//!
//! Per tool call: `calling -> in_progress -> {completed | failed}`.
//! Terminal states never change again; frames arriving afterwards are
//! reported as anomalies and dropped. Tool calls failed locally after an
//! agent stop are remembered so their late frames are discarded quietly.
//!
//! Approvals start `pending`. With auto-approve on and `admin_required`
//! off, an approval is scheduled after a short debounce so the pending
//! state renders at least once; the policy is read again when the timer
//! fires.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use super::conversation::Conversation;
use super::timers::{TimerEvent, TimerQueue};
use crate::error::{OperationError, ProtocolAnomaly};
use crate::models::{ApprovalEntry, ApprovalStatus, Progress, ToolCallEntry, ToolCallStatus};
use crate::traits::{AutoApproveSource, FrameSink, SendOutcome};
use crate::websocket::messages::{
    OutgoingFrame, ToolApprovalRequest, ToolApprovalResponse, ToolCallProgress, ToolCallResult,
    ToolCallStart,
};

/// Reason sent when the user rejects without giving one
pub const DEFAULT_REJECTION_REASON: &str = "Rejected by user";

/// Result stored on tool calls failed locally after a stop
pub const CANCELLED_ERROR: &str = "cancelled: agent stopped";

#[derive(Debug, Clone)]
pub struct ToolLifecycle {
    auto_approve_debounce: Duration,
    /// Tool calls failed locally by a stop
    cancelled: HashSet<String>,
    /// Auto-approvals that fired while disconnected
    deferred: Vec<String>,
}

impl ToolLifecycle {
    pub fn new(auto_approve_debounce: Duration) -> Self {
        Self {
            auto_approve_debounce,
            cancelled: HashSet::new(),
            deferred: Vec::new(),
        }
    }

    pub fn on_start(&mut self, conversation: &mut Conversation, frame: &ToolCallStart) -> bool {
        debug!("Tool call {} ({}) started", frame.tool_call_id, frame.tool_name);
        conversation.append_tool_call(ToolCallEntry::new(
            frame.tool_call_id.clone(),
            frame.tool_name.clone(),
            frame.server_name.clone(),
            frame.arguments.clone(),
        ))
    }

    pub fn on_progress(&mut self, conversation: &mut Conversation, frame: &ToolCallProgress) -> bool {
        if !self.accepts(conversation, &frame.tool_call_id, "tool_call_progress") {
            return false;
        }
        let progress = Progress::from_wire(frame.progress, frame.total);
        conversation
            .update_tool_call(&frame.tool_call_id, |entry| {
                entry.status = ToolCallStatus::InProgress;
                entry.progress = Some(progress);
                if frame.message.is_some() {
                    entry.progress_message = frame.message.clone();
                }
            })
            .is_some()
    }

    pub fn on_result(&mut self, conversation: &mut Conversation, frame: &ToolCallResult) -> bool {
        if !self.accepts(conversation, &frame.tool_call_id, "tool_call_result") {
            return false;
        }
        let (status, result) = if frame.success {
            (ToolCallStatus::Completed, frame.result.clone())
        } else {
            (ToolCallStatus::Failed, error_detail(&frame.result))
        };
        debug!("Tool call {} {}", frame.tool_call_id, status.as_str());
        conversation
            .update_tool_call(&frame.tool_call_id, |entry| {
                entry.status = status;
                entry.result = Some(result);
            })
            .is_some()
    }

    /// Whether a frame may be applied to this tool call, reporting why not.
    fn accepts(&self, conversation: &Conversation, id: &str, frame: &'static str) -> bool {
        let Some(entry) = conversation.tool_call(id) else {
            ProtocolAnomaly::UnknownToolCall {
                tool_call_id: id.to_string(),
                frame,
            }
            .report();
            return false;
        };
        if !entry.status.is_terminal() {
            return true;
        }
        let anomaly = if self.cancelled.contains(id) {
            ProtocolAnomaly::AfterCancel {
                tool_call_id: id.to_string(),
                frame,
            }
        } else {
            ProtocolAnomaly::AfterTerminal {
                tool_call_id: id.to_string(),
                status: entry.status.as_str().to_string(),
                frame,
            }
        };
        anomaly.report();
        false
    }

    /// Ids of tool calls not yet completed or failed, in log order
    pub fn in_flight(&self, conversation: &Conversation) -> Vec<String> {
        conversation
            .tool_calls()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.tool_call_id.clone())
            .collect()
    }

    /// Fail the given tool calls that are still in flight. Returns the ids
    /// actually failed.
    pub fn fail_in_flight(&mut self, conversation: &mut Conversation, ids: &[String]) -> Vec<String> {
        let mut failed = Vec::new();
        for id in ids {
            let changed = conversation.update_tool_call(id, |entry| {
                if entry.status.is_terminal() {
                    return false;
                }
                entry.status = ToolCallStatus::Failed;
                entry.result = Some(json!({ "error": CANCELLED_ERROR }));
                true
            });
            if changed == Some(true) {
                self.cancelled.insert(id.clone());
                failed.push(id.clone());
            }
        }
        if !failed.is_empty() {
            info!("Failed {} tool call(s) after stop: {:?}", failed.len(), failed);
        }
        failed
    }

    /// Record a pending approval and schedule auto-approval when policy
    /// allows. Returns false for a duplicate request, which changes nothing.
    pub fn on_approval_request(
        &mut self,
        conversation: &mut Conversation,
        timers: &mut TimerQueue,
        policy: &dyn AutoApproveSource,
        frame: &ToolApprovalRequest,
        now: Instant,
    ) -> bool {
        let entry = ApprovalEntry::new(
            frame.tool_call_id.clone(),
            frame.tool_name.clone(),
            frame.server_name.clone(),
            frame.arguments.clone(),
            frame.admin_required,
        );
        if !conversation.append_approval(entry) {
            return false;
        }
        if frame.admin_required || !policy.auto_approve_enabled() {
            debug!("Approval {} waiting for the user", frame.tool_call_id);
            return true;
        }
        timers.schedule(
            now + self.auto_approve_debounce,
            TimerEvent::AutoApprove(frame.tool_call_id.clone()),
        );
        true
    }

    /// Debounce elapsed. Approves only if still pending, not admin-gated,
    /// and the policy is still on.
    pub fn fire_auto_approve(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
        policy: &dyn AutoApproveSource,
        id: &str,
    ) -> Option<SendOutcome> {
        let entry = conversation.approval(id)?;
        if entry.status.is_resolved() || entry.admin_required {
            return None;
        }
        if !policy.auto_approve_enabled() {
            debug!("Auto-approve turned off before {} fired", id);
            return None;
        }
        info!("Auto-approving tool call {} ({})", id, entry.tool_name);
        let outcome = self
            .resolve(conversation, sink, id, Resolution::Approve { auto: true })
            .ok();
        if outcome == Some(SendOutcome::NotConnected) && !self.deferred.iter().any(|d| d == id) {
            self.deferred.push(id.to_string());
        }
        outcome
    }

    /// Transport is back. Re-arm the debounce for auto-approvals that
    /// could not be sent; the policy is checked again when they fire.
    pub fn resume_deferred(&mut self, timers: &mut TimerQueue, now: Instant) -> usize {
        let deferred = std::mem::take(&mut self.deferred);
        let count = deferred.len();
        for id in deferred {
            debug!("Re-arming auto-approval for {}", id);
            timers.schedule(now + self.auto_approve_debounce, TimerEvent::AutoApprove(id));
        }
        count
    }

    /// Approve with the current (possibly edited) arguments.
    pub fn approve(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
        id: &str,
    ) -> Result<SendOutcome, OperationError> {
        self.resolve(conversation, sink, id, Resolution::Approve { auto: false })
    }

    /// Reject with a free-text reason; blank reasons get the default.
    pub fn reject(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
        id: &str,
        reason: &str,
    ) -> Result<SendOutcome, OperationError> {
        let reason = match reason.trim() {
            "" => DEFAULT_REJECTION_REASON.to_string(),
            given => given.to_string(),
        };
        self.resolve(conversation, sink, id, Resolution::Reject(reason))
    }

    /// Replace the arguments of a pending approval, keeping the backend's
    /// original for display.
    pub fn edit_arguments(
        &mut self,
        conversation: &mut Conversation,
        id: &str,
        arguments: Value,
    ) -> Result<(), OperationError> {
        conversation
            .update_approval(id, |entry| {
                if entry.status.is_resolved() {
                    return false;
                }
                if entry.original_arguments.is_none() {
                    entry.original_arguments = Some(entry.arguments.clone());
                }
                entry.arguments = arguments;
                true
            })
            .filter(|edited| *edited)
            .map(|_| ())
            .ok_or_else(|| OperationError::NoPendingApproval(id.to_string()))
    }

    /// Pending approvals in log order
    pub fn pending_approvals<'a>(
        &self,
        conversation: &'a Conversation,
    ) -> impl Iterator<Item = &'a ApprovalEntry> {
        conversation
            .approvals()
            .filter(|a| a.status == ApprovalStatus::Pending)
    }

    /// Send the decision; the entry changes only once the frame is on the
    /// socket, so a disconnected send leaves it pending for another try.
    fn resolve(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
        id: &str,
        resolution: Resolution,
    ) -> Result<SendOutcome, OperationError> {
        let entry = conversation
            .approval(id)
            .filter(|a| a.status == ApprovalStatus::Pending)
            .ok_or_else(|| {
                ProtocolAnomaly::UnknownApproval {
                    tool_call_id: id.to_string(),
                }
                .report();
                OperationError::NoPendingApproval(id.to_string())
            })?;

        let response = match &resolution {
            Resolution::Approve { .. } => {
                ToolApprovalResponse::approve(id.to_string(), entry.arguments.clone())
            }
            Resolution::Reject(reason) => ToolApprovalResponse::reject(id.to_string(), reason.clone()),
        };
        let outcome = sink.send(OutgoingFrame::ToolApprovalResponse(response));
        if !outcome.is_sent() {
            return Ok(outcome);
        }

        conversation.update_approval(id, |entry| match resolution {
            Resolution::Approve { auto } => {
                entry.status = ApprovalStatus::Approved;
                entry.auto_approved = auto;
            }
            Resolution::Reject(reason) => {
                entry.status = ApprovalStatus::Rejected;
                entry.rejection_reason = Some(reason);
            }
        });
        Ok(outcome)
    }
}

enum Resolution {
    Approve { auto: bool },
    Reject(String),
}

/// Failure results are stored as `{"error": ...}` unless they already are.
fn error_detail(result: &Value) -> Value {
    match result {
        Value::Object(map) if map.contains_key("error") => result.clone(),
        Value::Null => json!({ "error": "tool call failed" }),
        other => json!({ "error": other }),
    }
}
