//! Elicitation controller.
//!
//! One request is active at a time. Requests arriving while one is active
//! wait in a FIFO queue and are promoted, in order, as soon as the active
//! one is accepted, declined or cancelled. A request's log entry is
//! appended when it becomes active.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, info};

use super::conversation::Conversation;
use crate::error::{OperationError, ProtocolAnomaly};
use crate::models::{ElicitationAction, ElicitationEntry, ElicitationOutcome, ElicitationRequest};
use crate::traits::{FrameSink, SendOutcome};
use crate::websocket::messages::{ElicitationRequestFrame, ElicitationResponse, OutgoingFrame};

#[derive(Debug, Clone, Default)]
pub struct ElicitationController {
    active: Option<ElicitationRequest>,
    queue: VecDeque<ElicitationRequest>,
}

impl ElicitationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ElicitationRequest> {
        self.active.as_ref()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Take a new request. Returns true if it became active immediately,
    /// false if it was queued or rejected as a duplicate.
    pub fn on_request(&mut self, conversation: &mut Conversation, frame: &ElicitationRequestFrame) -> bool {
        let id = &frame.elicitation_id;
        let known = self.active.iter().chain(self.queue.iter()).any(|r| &r.elicitation_id == id)
            || conversation.elicitation(id).is_some();
        if known {
            ProtocolAnomaly::DuplicateId {
                kind: "elicitation",
                id: id.clone(),
            }
            .report();
            return false;
        }

        let request = ElicitationRequest::from_schema(
            id.clone(),
            frame.tool_call_id.clone(),
            frame.message.clone(),
            frame.requested_schema.as_ref(),
        );
        if self.active.is_some() {
            debug!("Elicitation {} queued behind the active one", id);
            self.queue.push_back(request);
            return false;
        }
        self.activate(conversation, request);
        true
    }

    /// Set a field from text input, coerced to the field's kind.
    pub fn set_field(&mut self, name: &str, input: &str) -> Result<(), OperationError> {
        let request = self.active.as_mut().ok_or(OperationError::NoActiveElicitation)?;
        let field = request
            .field_mut(name)
            .ok_or_else(|| OperationError::UnknownField(name.to_string()))?;
        let value = field
            .coerce(input)
            .map_err(|message| OperationError::InvalidFieldValue {
                field: name.to_string(),
                message,
            })?;
        field.value = Some(value);
        Ok(())
    }

    /// Send the filled fields. Fails, leaving the request active, while
    /// required fields are empty or the socket is down.
    pub fn accept(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
    ) -> Result<SendOutcome, OperationError> {
        let request = self.active.as_ref().ok_or(OperationError::NoActiveElicitation)?;
        let missing = request.missing_required();
        if !missing.is_empty() {
            return Err(OperationError::MissingRequiredFields(missing));
        }
        let data = request.accept_payload();
        self.respond(conversation, sink, ElicitationAction::Accept, data, false)
    }

    /// Explicit "no". Stays active if the frame could not be sent.
    pub fn decline(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
    ) -> Result<SendOutcome, OperationError> {
        self.respond(conversation, sink, ElicitationAction::Decline, Value::Null, false)
    }

    /// "Could not answer". Clears locally whether or not the frame went out.
    pub fn cancel(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
    ) -> Result<SendOutcome, OperationError> {
        self.respond(conversation, sink, ElicitationAction::Cancel, Value::Null, true)
    }

    fn respond(
        &mut self,
        conversation: &mut Conversation,
        sink: &dyn FrameSink,
        action: ElicitationAction,
        data: Value,
        clear_unsent: bool,
    ) -> Result<SendOutcome, OperationError> {
        let id = self
            .active
            .as_ref()
            .map(|r| r.elicitation_id.clone())
            .ok_or(OperationError::NoActiveElicitation)?;

        let outcome = sink.send(OutgoingFrame::ElicitationResponse(ElicitationResponse {
            elicitation_id: id.clone(),
            action,
            data,
        }));
        if outcome.is_sent() || clear_unsent {
            self.resolve(conversation, action.into());
        }
        Ok(outcome)
    }

    fn resolve(&mut self, conversation: &mut Conversation, outcome: ElicitationOutcome) {
        let Some(request) = self.active.take() else {
            return;
        };
        info!("Elicitation {} {:?}", request.elicitation_id, outcome);
        conversation.update_elicitation(&request.elicitation_id, |entry| entry.outcome = outcome);

        if let Some(next) = self.queue.pop_front() {
            self.activate(conversation, next);
        }
    }

    fn activate(&mut self, conversation: &mut Conversation, request: ElicitationRequest) {
        conversation.append_elicitation(ElicitationEntry::new(
            request.elicitation_id.clone(),
            request.tool_call_id.clone(),
            request.message.clone(),
        ));
        debug!(
            "Elicitation {} active with {} field(s)",
            request.elicitation_id,
            request.fields.len()
        );
        self.active = Some(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockFrameSink;
    use crate::websocket::ConnectionStatus;
    use serde_json::json;

    fn frame(id: &str, schema: Option<Value>) -> ElicitationRequestFrame {
        ElicitationRequestFrame {
            elicitation_id: id.to_string(),
            tool_call_id: None,
            message: format!("question {}", id),
            requested_schema: schema,
        }
    }

    fn sent_response(sink: &MockFrameSink, idx: usize) -> ElicitationResponse {
        match &sink.sent()[idx] {
            OutgoingFrame::ElicitationResponse(response) => response.clone(),
            other => panic!("expected elicitation response, got {:?}", other),
        }
    }

    #[test]
    fn test_single_flight_fifo() {
        let mut ctl = ElicitationController::new();
        let mut c = Conversation::new();
        let sink = MockFrameSink::new();

        assert!(ctl.on_request(&mut c, &frame("e1", None)));
        assert!(!ctl.on_request(&mut c, &frame("e2", None)));
        assert!(!ctl.on_request(&mut c, &frame("e3", None)));
        assert_eq!(ctl.active().unwrap().elicitation_id, "e1");
        assert_eq!(ctl.queued(), 2);
        // Queued requests are not presented yet
        assert!(c.elicitation("e2").is_none());

        ctl.decline(&mut c, &sink).unwrap();
        assert_eq!(ctl.active().unwrap().elicitation_id, "e2");
        assert!(!c.elicitation("e2").unwrap().is_resolved());
        assert!(c.elicitation("e1").unwrap().is_resolved());
        assert_eq!(c.elicitation("e1").unwrap().outcome, ElicitationOutcome::Declined);

        ctl.cancel(&mut c, &sink).unwrap();
        assert_eq!(ctl.active().unwrap().elicitation_id, "e3");
        assert_eq!(c.elicitation("e2").unwrap().outcome, ElicitationOutcome::Cancelled);
    }

    #[test]
    fn test_accept_without_fields_sends_null() {
        let mut ctl = ElicitationController::new();
        let mut c = Conversation::new();
        let sink = MockFrameSink::new();
        ctl.on_request(&mut c, &frame("e1", Some(json!({"type": "object", "properties": {}}))));
        assert!(ctl.active().unwrap().is_approval_only());

        ctl.accept(&mut c, &sink).unwrap();
        let response = sent_response(&sink, 0);
        assert_eq!(response.action, ElicitationAction::Accept);
        assert_eq!(response.data, Value::Null);
        assert!(ctl.active().is_none());
        assert_eq!(c.elicitation("e1").unwrap().outcome, ElicitationOutcome::Accepted);
    }

    #[test]
    fn test_accept_single_value_field_unwrapped() {
        let mut ctl = ElicitationController::new();
        let mut c = Conversation::new();
        let sink = MockFrameSink::new();
        let schema = json!({
            "type": "object",
            "properties": {"value": {"type": "integer"}},
            "required": ["value"]
        });
        ctl.on_request(&mut c, &frame("e1", Some(schema)));

        ctl.set_field("value", "7").unwrap();
        ctl.accept(&mut c, &sink).unwrap();
        assert_eq!(sent_response(&sink, 0).data, json!(7));
    }

    #[test]
    fn test_accept_multiple_fields_sends_map() {
        let mut ctl = ElicitationController::new();
        let mut c = Conversation::new();
        let sink = MockFrameSink::new();
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "confirm": {"type": "boolean"}
            },
            "required": ["name"]
        });
        ctl.on_request(&mut c, &frame("e1", Some(schema)));

        assert_eq!(
            ctl.accept(&mut c, &sink),
            Err(OperationError::MissingRequiredFields(vec!["name".to_string()]))
        );
        assert!(ctl.active().is_some());

        ctl.set_field("name", "Ada").unwrap();
        ctl.set_field("confirm", "yes").unwrap();
        ctl.accept(&mut c, &sink).unwrap();
        assert_eq!(
            sent_response(&sink, 0).data,
            json!({"name": "Ada", "confirm": true})
        );
    }

    #[test]
    fn test_set_field_errors() {
        let mut ctl = ElicitationController::new();
        let mut c = Conversation::new();
        assert_eq!(
            ctl.set_field("x", "1"),
            Err(OperationError::NoActiveElicitation)
        );
        let schema = json!({"properties": {"count": {"type": "integer"}}});
        ctl.on_request(&mut c, &frame("e1", Some(schema)));
        assert_eq!(
            ctl.set_field("other", "1"),
            Err(OperationError::UnknownField("other".to_string()))
        );
        assert!(matches!(
            ctl.set_field("count", "many"),
            Err(OperationError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_decline_while_disconnected_stays_active_but_cancel_clears() {
        let mut ctl = ElicitationController::new();
        let mut c = Conversation::new();
        let sink = MockFrameSink::disconnected();
        ctl.on_request(&mut c, &frame("e1", None));

        assert_eq!(ctl.decline(&mut c, &sink), Ok(SendOutcome::NotConnected));
        assert!(ctl.active().is_some());

        assert_eq!(ctl.cancel(&mut c, &sink), Ok(SendOutcome::NotConnected));
        assert!(ctl.active().is_none());
        assert_eq!(c.elicitation("e1").unwrap().outcome, ElicitationOutcome::Cancelled);

        sink.set_status(ConnectionStatus::Connected);
        assert_eq!(
            ctl.accept(&mut c, &sink),
            Err(OperationError::NoActiveElicitation)
        );
    }

    #[test]
    fn test_duplicate_request_ignored() {
        let mut ctl = ElicitationController::new();
        let mut c = Conversation::new();
        ctl.on_request(&mut c, &frame("e1", None));
        assert!(!ctl.on_request(&mut c, &frame("e1", None)));
        assert_eq!(ctl.queued(), 0);
    }
}
