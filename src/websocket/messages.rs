//! Wire frames exchanged with the backend.
//!
//! Every frame is a JSON object discriminated by its `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{deserialize_id, deserialize_optional_id, Attachment, ElicitationAction};

/// Frames received from the backend
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingFrame {
    /// Handshake confirmation
    Connected(Connected),
    /// An assistant message starts streaming
    StreamStart(StreamStart),
    /// Token delta for the open assistant message
    StreamDelta(StreamDelta),
    /// The assistant message is complete
    StreamComplete(StreamComplete),
    ToolCallStart(ToolCallStart),
    ToolCallProgress(ToolCallProgress),
    ToolCallResult(ToolCallResult),
    /// Backend waits for the user to allow a tool call
    ToolApprovalRequest(ToolApprovalRequest),
    /// Backend asks for structured input mid-task
    ElicitationRequest(ElicitationRequestFrame),
    /// Agent mode asks the user a free-text question
    AgentQuestion(AgentQuestion),
    AgentRunStarted(AgentRun),
    AgentRunFinished(AgentRun),
    /// Backend accepted a user message
    MessageAck(MessageAck),
    /// Backend refused a user message
    MessageRejected(MessageRejected),
    System(SystemNotice),
    Log(LogLine),
    Error(BackendError),
}

impl IncomingFrame {
    /// The `type` discriminant, used as the router key
    pub fn tag(&self) -> &'static str {
        match self {
            IncomingFrame::Connected(_) => "connected",
            IncomingFrame::StreamStart(_) => "stream_start",
            IncomingFrame::StreamDelta(_) => "stream_delta",
            IncomingFrame::StreamComplete(_) => "stream_complete",
            IncomingFrame::ToolCallStart(_) => "tool_call_start",
            IncomingFrame::ToolCallProgress(_) => "tool_call_progress",
            IncomingFrame::ToolCallResult(_) => "tool_call_result",
            IncomingFrame::ToolApprovalRequest(_) => "tool_approval_request",
            IncomingFrame::ElicitationRequest(_) => "elicitation_request",
            IncomingFrame::AgentQuestion(_) => "agent_question",
            IncomingFrame::AgentRunStarted(_) => "agent_run_started",
            IncomingFrame::AgentRunFinished(_) => "agent_run_finished",
            IncomingFrame::MessageAck(_) => "message_ack",
            IncomingFrame::MessageRejected(_) => "message_rejected",
            IncomingFrame::System(_) => "system",
            IncomingFrame::Log(_) => "log",
            IncomingFrame::Error(_) => "error",
        }
    }

    /// Decode one text frame
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Connected {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StreamStart {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StreamDelta {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StreamComplete {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolCallStart {
    #[serde(deserialize_with = "deserialize_id")]
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolCallProgress {
    #[serde(deserialize_with = "deserialize_id")]
    pub tool_call_id: String,
    /// Percentage, or a count when `total` is present; absent means indeterminate
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolCallResult {
    #[serde(deserialize_with = "deserialize_id")]
    pub tool_call_id: String,
    pub success: bool,
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolApprovalRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub admin_required: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ElicitationRequestFrame {
    #[serde(deserialize_with = "deserialize_id")]
    pub elicitation_id: String,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub requested_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AgentQuestion {
    pub question: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AgentRun {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MessageAck {
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MessageRejected {
    pub client_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SystemNotice {
    #[serde(default = "default_system_subtype")]
    pub subtype: String,
    pub text: String,
}

fn default_system_subtype() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogLine {
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Frames sent to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingFrame {
    UserMessage(UserMessage),
    ToolApprovalResponse(ToolApprovalResponse),
    ElicitationResponse(ElicitationResponse),
    AgentAnswer(AgentAnswer),
    AgentStop(AgentStop),
    AgentMode(AgentMode),
}

impl OutgoingFrame {
    pub fn tag(&self) -> &'static str {
        match self {
            OutgoingFrame::UserMessage(_) => "user_message",
            OutgoingFrame::ToolApprovalResponse(_) => "tool_approval_response",
            OutgoingFrame::ElicitationResponse(_) => "elicitation_response",
            OutgoingFrame::AgentAnswer(_) => "agent_answer",
            OutgoingFrame::AgentStop(_) => "agent_stop",
            OutgoingFrame::AgentMode(_) => "agent_mode",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMessage {
    pub client_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolApprovalResponse {
    pub tool_call_id: String,
    pub approved: bool,
    /// Arguments to run with (possibly user-edited); only on approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToolApprovalResponse {
    pub fn approve(tool_call_id: String, arguments: Value) -> Self {
        Self {
            tool_call_id,
            approved: true,
            arguments: Some(arguments),
            reason: None,
        }
    }

    pub fn reject(tool_call_id: String, reason: String) -> Self {
        Self {
            tool_call_id,
            approved: false,
            arguments: None,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitationResponse {
    pub elicitation_id: String,
    pub action: ElicitationAction,
    /// Always present; `null` for decline, cancel and field-less accepts
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentAnswer {
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentStop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMode {
    pub enabled: bool,
}
