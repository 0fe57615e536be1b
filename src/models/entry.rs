//! Conversation log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::elicitation::ElicitationOutcome;
use super::tools::{ApprovalStatus, Progress, ToolCallStatus};

/// One entry in the ordered conversation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationEntry {
    User(UserEntry),
    Assistant(AssistantEntry),
    System(SystemEntry),
    ToolCall(ToolCallEntry),
    Approval(ApprovalEntry),
    Elicitation(ElicitationEntry),
}

impl ConversationEntry {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ConversationEntry::User(_) => "user",
            ConversationEntry::Assistant(_) => "assistant",
            ConversationEntry::System(_) => "system",
            ConversationEntry::ToolCall(_) => "tool_call",
            ConversationEntry::Approval(_) => "approval",
            ConversationEntry::Elicitation(_) => "elicitation",
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantEntry> {
        match self {
            ConversationEntry::Assistant(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserEntry> {
        match self {
            ConversationEntry::User(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallEntry> {
        match self {
            ConversationEntry::ToolCall(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_approval(&self) -> Option<&ApprovalEntry> {
        match self {
            ConversationEntry::Approval(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_system(&self) -> Option<&SystemEntry> {
        match self {
            ConversationEntry::System(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Whether a user message made it onto the socket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    /// Appended, outbound frame not attempted yet
    #[default]
    Queued,
    /// Handed to the transport
    Sent,
    /// Transport was disconnected; the caller may retry
    NotSent,
}

/// Resolved attachment carried by a user message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    /// Display name (usually the file name)
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub content: AttachmentContent,
}

/// Attachment payload after file resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentContent {
    /// Base64 encoded bytes
    Inline { data: String },
    /// Resolution failed; the marker is sent in place of the bytes
    Unavailable { marker: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserEntry {
    /// Client-generated id, echoed by the backend in `message_ack`
    pub client_id: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Shown before the backend confirmed it
    #[serde(default)]
    pub provisional: bool,
    #[serde(default)]
    pub send_state: SendState,
    pub created_at: DateTime<Utc>,
}

impl UserEntry {
    pub fn new(client_id: String, text: String, attachments: Vec<Attachment>) -> Self {
        Self {
            client_id,
            text,
            attachments,
            provisional: true,
            send_state: SendState::Queued,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantEntry {
    pub content: String,
    /// Only the single open entry has this set
    #[serde(default)]
    pub streaming: bool,
    pub created_at: DateTime<Utc>,
}

impl AssistantEntry {
    pub fn open() -> Self {
        Self {
            content: String::new(),
            streaming: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemEntry {
    /// e.g. "info", "log", "error"
    pub subtype: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl SystemEntry {
    pub fn new(subtype: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subtype: subtype.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallEntry {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub status: ToolCallStatus,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    /// Result payload on success, error detail on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl ToolCallEntry {
    pub fn new(
        tool_call_id: String,
        tool_name: String,
        server_name: Option<String>,
        arguments: Value,
    ) -> Self {
        Self {
            tool_call_id,
            tool_name,
            server_name,
            status: ToolCallStatus::Calling,
            arguments,
            progress: None,
            progress_message: None,
            result: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalEntry {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub status: ApprovalStatus,
    /// Never auto-resolved by client policy
    #[serde(default)]
    pub admin_required: bool,
    /// Arguments that will be sent on approval (possibly user-edited)
    #[serde(default)]
    pub arguments: Value,
    /// Backend-proposed arguments, kept once the user edits them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Set when the client policy resolved it rather than the user
    #[serde(default)]
    pub auto_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl ApprovalEntry {
    pub fn new(
        tool_call_id: String,
        tool_name: String,
        server_name: Option<String>,
        arguments: Value,
        admin_required: bool,
    ) -> Self {
        Self {
            tool_call_id,
            tool_name,
            server_name,
            status: ApprovalStatus::Pending,
            admin_required,
            arguments,
            original_arguments: None,
            rejection_reason: None,
            auto_approved: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_edited(&self) -> bool {
        self.original_arguments.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitationEntry {
    pub elicitation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub message: String,
    pub outcome: ElicitationOutcome,
    pub created_at: DateTime<Utc>,
}

impl ElicitationEntry {
    pub fn new(elicitation_id: String, tool_call_id: Option<String>, message: String) -> Self {
        Self {
            elicitation_id,
            tool_call_id,
            message,
            outcome: ElicitationOutcome::Pending,
            created_at: Utc::now(),
        }
    }

    /// Accepted, declined or cancelled
    pub fn is_resolved(&self) -> bool {
        self.outcome != ElicitationOutcome::Pending
    }
}
