//! The session object.
//!
//! One [`Session`] per connection: it owns the conversation log, the
//! controllers, the local timers and the frame router, and is driven from
//! a single task. Inbound frames go through [`Session::handle_event`];
//! user actions go through the operation methods, which mutate state and
//! hand outbound frames to the [`FrameSink`]. Presentation layers read
//! state through the accessors and learn about changes from
//! [`Session::subscribe`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{OperationError, TetherResult};
use crate::models::{ApprovalEntry, Attachment, ConversationEntry, SendState};
use crate::router::{Dispatch, FrameRouter, Subscription};
use crate::state::{
    AgentController, Conversation, ElicitationController, StopSignal, TimerEvent, TimerQueue,
    ToolLifecycle,
};
use crate::traits::{AutoApproveSource, FrameSink, SendOutcome};
use crate::websocket::messages::{IncomingFrame, OutgoingFrame, UserMessage};
use crate::websocket::{ConnectionState, TransportEvent};

/// Which part of the session changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Conversation,
    Tools,
    Elicitation,
    Agent,
    Connection,
}

const CHANGE_CAPACITY: usize = 256;

/// Frame tags handled by the session itself
const BUILTIN_TAGS: &[&str] = &[
    "connected",
    "stream_start",
    "stream_delta",
    "stream_complete",
    "tool_call_start",
    "tool_call_progress",
    "tool_call_result",
    "tool_approval_request",
    "elicitation_request",
    "agent_question",
    "agent_run_started",
    "agent_run_finished",
    "message_ack",
    "message_rejected",
    "system",
    "log",
    "error",
];

/// Mutable session state handed to frame handlers.
///
/// Handlers registered from outside the crate only get read access; all
/// mutation goes through the built-in handlers and [`Session`] methods.
pub struct SessionCore {
    conversation: Conversation,
    tools: ToolLifecycle,
    elicitation: ElicitationController,
    agent: AgentController,
    timers: TimerQueue,
    sink: Arc<dyn FrameSink>,
    auto_approve: Arc<dyn AutoApproveSource>,
    connection: ConnectionState,
    session_id: Option<String>,
    stop_grace: Duration,
    changes: broadcast::Sender<SessionChange>,
}

impl SessionCore {
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn agent(&self) -> &AgentController {
        &self.agent
    }

    pub fn elicitation(&self) -> &ElicitationController {
        &self.elicitation
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn notify(&self, change: SessionChange) {
        // No receivers is fine
        let _ = self.changes.send(change);
    }

    /// Apply one inbound frame to the controllers.
    fn apply(&mut self, frame: &IncomingFrame) -> TetherResult<()> {
        match frame {
            IncomingFrame::Connected(f) => {
                info!("Backend session {:?}", f.session_id);
                self.session_id = f.session_id.clone();
                self.notify(SessionChange::Connection);
            }
            IncomingFrame::StreamStart(_) => {
                if self.conversation.begin_assistant_stream() {
                    self.notify(SessionChange::Conversation);
                }
            }
            IncomingFrame::StreamDelta(f) => {
                if self.conversation.append_stream_delta(&f.text) {
                    self.notify(SessionChange::Conversation);
                }
            }
            IncomingFrame::StreamComplete(_) => {
                if self.conversation.complete_assistant_stream() {
                    self.notify(SessionChange::Conversation);
                }
            }
            IncomingFrame::ToolCallStart(f) => {
                if self.tools.on_start(&mut self.conversation, f) {
                    self.notify(SessionChange::Tools);
                }
            }
            IncomingFrame::ToolCallProgress(f) => {
                if self.tools.on_progress(&mut self.conversation, f) {
                    self.notify(SessionChange::Tools);
                }
            }
            IncomingFrame::ToolCallResult(f) => {
                if self.tools.on_result(&mut self.conversation, f) {
                    self.notify(SessionChange::Tools);
                }
            }
            IncomingFrame::ToolApprovalRequest(f) => {
                let recorded = self.tools.on_approval_request(
                    &mut self.conversation,
                    &mut self.timers,
                    self.auto_approve.as_ref(),
                    f,
                    Instant::now(),
                );
                if recorded {
                    self.notify(SessionChange::Tools);
                }
            }
            IncomingFrame::ElicitationRequest(f) => {
                // Queued requests stay invisible until promoted
                if self.elicitation.on_request(&mut self.conversation, f) {
                    self.notify(SessionChange::Elicitation);
                }
            }
            IncomingFrame::AgentQuestion(f) => {
                self.agent.on_question(&f.question);
                self.notify(SessionChange::Agent);
            }
            IncomingFrame::AgentRunStarted(f) => {
                self.agent.on_run_started(f.run_id.clone());
                self.notify(SessionChange::Agent);
            }
            IncomingFrame::AgentRunFinished(f) => {
                self.agent.on_run_finished(f.run_id.as_deref());
                self.notify(SessionChange::Agent);
            }
            IncomingFrame::MessageAck(f) => {
                if self.conversation.reconcile_user(&f.client_id) {
                    self.notify(SessionChange::Conversation);
                }
            }
            IncomingFrame::MessageRejected(f) => {
                if self.conversation.discard_user(&f.client_id).is_some() {
                    let reason = f.reason.as_deref().unwrap_or("no reason given");
                    warn!("Message {} rejected: {}", f.client_id, reason);
                    self.conversation
                        .append_system("error", format!("Message rejected: {}", reason));
                    self.notify(SessionChange::Conversation);
                }
            }
            IncomingFrame::System(f) => {
                self.conversation.append_system(f.subtype.clone(), f.text.clone());
                self.notify(SessionChange::Conversation);
            }
            IncomingFrame::Log(f) => {
                debug!("Backend log [{}]: {}", f.level.as_deref().unwrap_or("info"), f.message);
                self.conversation.append_system("log", f.message.clone());
                self.notify(SessionChange::Conversation);
            }
            IncomingFrame::Error(f) => {
                warn!("Backend error {:?}: {}", f.code, f.message);
                self.conversation.abort_stream();
                self.conversation.append_system("error", f.message.clone());
                self.notify(SessionChange::Conversation);
            }
        }
        Ok(())
    }
}

pub struct Session {
    router: FrameRouter<SessionCore>,
    core: SessionCore,
}

impl Session {
    pub fn new(
        config: &SessionConfig,
        sink: Arc<dyn FrameSink>,
        auto_approve: Arc<dyn AutoApproveSource>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let core = SessionCore {
            conversation: Conversation::new(),
            tools: ToolLifecycle::new(config.auto_approve_debounce),
            elicitation: ElicitationController::new(),
            agent: AgentController::default(),
            timers: TimerQueue::new(),
            sink,
            auto_approve,
            connection: ConnectionState::default(),
            session_id: None,
            stop_grace: config.stop_grace,
            changes,
        };

        let mut router = FrameRouter::new();
        for tag in BUILTIN_TAGS {
            // Built-in handlers live as long as the session
            let _ = router.register(tag, |core: &mut SessionCore, frame| core.apply(frame));
        }
        Self { router, core }
    }

    /// Replace the conversation with saved entries. Entries left streaming
    /// are sealed.
    pub fn resume(&mut self, entries: Vec<ConversationEntry>) {
        info!("Resuming conversation with {} entries", entries.len());
        self.core.conversation = Conversation::from_entries(entries);
        self.core.notify(SessionChange::Conversation);
    }

    /// Entries in log order, for persistence
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.core.conversation.entries().to_vec()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.core.changes.subscribe()
    }

    /// Add a read-only observer for frames tagged `tag`. It runs after the
    /// built-in handler.
    pub fn register<F>(&mut self, tag: &str, mut handler: F) -> Subscription
    where
        F: FnMut(&SessionCore, &IncomingFrame) + Send + 'static,
    {
        self.router.register(tag, move |core: &mut SessionCore, frame| {
            handler(core, frame);
            Ok(())
        })
    }

    pub fn unregister(&mut self, subscription: Subscription) -> bool {
        self.router.unregister(subscription)
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                debug!("Transport opened");
                let core = &mut self.core;
                core.tools.resume_deferred(&mut core.timers, Instant::now());
                core.notify(SessionChange::Connection);
            }
            TransportEvent::Frame(raw) => {
                self.handle_frame(&raw);
            }
            TransportEvent::Closed(reason) => {
                info!("Transport closed ({})", reason);
                // The reply cannot continue on a new socket
                if self.core.conversation.abort_stream() {
                    self.core.notify(SessionChange::Conversation);
                }
                self.core.notify(SessionChange::Connection);
            }
        }
    }

    pub fn handle_frame(&mut self, raw: &str) -> Dispatch {
        self.router.dispatch(&mut self.core, raw)
    }

    /// Track the transport's published state.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if state != self.core.connection {
            self.core.connection = state;
            self.core.notify(SessionChange::Connection);
        }
    }

    /// Earliest local timer, for the run loop to sleep until
    pub fn next_deadline(&self) -> Option<Instant> {
        self.core.timers.next_deadline()
    }

    /// Run every timer due at `now`. Returns how many fired.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let due = self.core.timers.pop_due(now);
        let fired = due.len();
        for event in due {
            let core = &mut self.core;
            match event {
                TimerEvent::AutoApprove(id) => {
                    let outcome = core.tools.fire_auto_approve(
                        &mut core.conversation,
                        core.sink.as_ref(),
                        core.auto_approve.as_ref(),
                        &id,
                    );
                    match outcome {
                        Some(SendOutcome::Sent) => core.notify(SessionChange::Tools),
                        Some(SendOutcome::NotConnected) => {
                            warn!("Auto-approval for {} not sent; retrying after reconnect", id)
                        }
                        None => {}
                    }
                }
                TimerEvent::StopGrace(ids) => {
                    let failed = core.tools.fail_in_flight(&mut core.conversation, &ids);
                    if !failed.is_empty() {
                        core.notify(SessionChange::Tools);
                    }
                }
            }
        }
        fired
    }

    /// Append a provisional user entry and send it. Returns the client id.
    pub fn send_user_message(
        &mut self,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> (String, SendOutcome) {
        let text = text.into();
        let client_id = self.core.conversation.append_user(text.clone(), attachments.clone());
        let outcome = self.send_user_frame(&client_id, text, attachments);
        self.core.notify(SessionChange::Conversation);
        (client_id, outcome)
    }

    /// Send an unacknowledged message again under the same client id.
    pub fn retry_user_message(&mut self, client_id: &str) -> Result<SendOutcome, OperationError> {
        let entry = self
            .core
            .conversation
            .user_message(client_id)
            .filter(|u| u.provisional)
            .ok_or_else(|| OperationError::UnknownMessage(client_id.to_string()))?;
        let (text, attachments) = (entry.text.clone(), entry.attachments.clone());
        let outcome = self.send_user_frame(client_id, text, attachments);
        self.core.notify(SessionChange::Conversation);
        Ok(outcome)
    }

    fn send_user_frame(
        &mut self,
        client_id: &str,
        text: String,
        attachments: Vec<Attachment>,
    ) -> SendOutcome {
        let outcome = self.core.sink.send(OutgoingFrame::UserMessage(UserMessage {
            client_id: client_id.to_string(),
            text,
            attachments,
        }));
        let state = match outcome {
            SendOutcome::Sent => SendState::Sent,
            SendOutcome::NotConnected => SendState::NotSent,
        };
        self.core.conversation.set_send_state(client_id, state);
        outcome
    }

    pub fn approve(&mut self, tool_call_id: &str) -> Result<SendOutcome, OperationError> {
        let core = &mut self.core;
        let outcome = core
            .tools
            .approve(&mut core.conversation, core.sink.as_ref(), tool_call_id)?;
        core.notify(SessionChange::Tools);
        Ok(outcome)
    }

    pub fn reject(&mut self, tool_call_id: &str, reason: &str) -> Result<SendOutcome, OperationError> {
        let core = &mut self.core;
        let outcome = core
            .tools
            .reject(&mut core.conversation, core.sink.as_ref(), tool_call_id, reason)?;
        core.notify(SessionChange::Tools);
        Ok(outcome)
    }

    pub fn edit_arguments(
        &mut self,
        tool_call_id: &str,
        arguments: serde_json::Value,
    ) -> Result<(), OperationError> {
        let core = &mut self.core;
        core.tools
            .edit_arguments(&mut core.conversation, tool_call_id, arguments)?;
        core.notify(SessionChange::Tools);
        Ok(())
    }

    pub fn set_elicitation_field(&mut self, name: &str, input: &str) -> Result<(), OperationError> {
        self.core.elicitation.set_field(name, input)?;
        self.core.notify(SessionChange::Elicitation);
        Ok(())
    }

    pub fn accept_elicitation(&mut self) -> Result<SendOutcome, OperationError> {
        let core = &mut self.core;
        let outcome = core
            .elicitation
            .accept(&mut core.conversation, core.sink.as_ref())?;
        core.notify(SessionChange::Elicitation);
        Ok(outcome)
    }

    pub fn decline_elicitation(&mut self) -> Result<SendOutcome, OperationError> {
        let core = &mut self.core;
        let outcome = core
            .elicitation
            .decline(&mut core.conversation, core.sink.as_ref())?;
        core.notify(SessionChange::Elicitation);
        Ok(outcome)
    }

    pub fn cancel_elicitation(&mut self) -> Result<SendOutcome, OperationError> {
        let core = &mut self.core;
        let outcome = core
            .elicitation
            .cancel(&mut core.conversation, core.sink.as_ref())?;
        core.notify(SessionChange::Elicitation);
        Ok(outcome)
    }

    pub fn answer(&mut self, text: &str) -> Result<SendOutcome, OperationError> {
        let outcome = self.core.agent.answer(self.core.sink.as_ref(), text)?;
        self.core.notify(SessionChange::Agent);
        Ok(outcome)
    }

    pub fn set_agent_enabled(&mut self, enabled: bool) -> SendOutcome {
        let outcome = self.core.agent.set_enabled(self.core.sink.as_ref(), enabled);
        self.core.notify(SessionChange::Agent);
        outcome
    }

    /// Stop the current agent run.
    ///
    /// Local state clears at once: the question, the open stream and the
    /// run. Tool calls still in flight are failed locally unless a terminal
    /// frame arrives within the stop grace period.
    pub fn stop(&mut self) -> Result<StopSignal, OperationError> {
        let core = &mut self.core;
        let in_flight = core.tools.in_flight(&core.conversation);
        let streaming = core.conversation.is_streaming();
        if !core.agent.is_active() && !streaming && in_flight.is_empty() {
            debug!("Stop requested with nothing running");
            return Err(OperationError::NothingToStop);
        }

        let signal = core.agent.stop(core.sink.as_ref());
        if core.conversation.cancel_stream() {
            core.notify(SessionChange::Conversation);
        }
        if !in_flight.is_empty() {
            debug!("{} tool call(s) get {:?} to finish", in_flight.len(), core.stop_grace);
            core.timers
                .schedule(Instant::now() + core.stop_grace, TimerEvent::StopGrace(in_flight));
        }
        core.notify(SessionChange::Agent);
        Ok(signal)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.core.conversation
    }

    pub fn agent(&self) -> &AgentController {
        &self.core.agent
    }

    pub fn elicitation(&self) -> &ElicitationController {
        &self.core.elicitation
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.core.connection
    }

    pub fn session_id(&self) -> Option<&str> {
        self.core.session_id()
    }

    pub fn pending_approvals(&self) -> Vec<&ApprovalEntry> {
        self.core
            .tools
            .pending_approvals(&self.core.conversation)
            .collect()
    }

    /// Ids of tool calls not yet completed or failed
    pub fn in_flight_tools(&self) -> Vec<String> {
        self.core.tools.in_flight(&self.core.conversation)
    }
}
