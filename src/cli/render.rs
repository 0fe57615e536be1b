//! Line-based transcript output for the terminal driver.
//!
//! The renderer only reads the session. Each call returns the text to
//! print for whatever changed since the previous call; streamed assistant
//! text is emitted incrementally without a trailing newline until the
//! entry is sealed.

use std::collections::HashMap;

use crate::models::{ConversationEntry, FieldKind, ToolCallStatus};
use crate::session::{Session, SessionChange};
use crate::websocket::ConnectionStatus;

const ICON_OK: &str = "✓";
const ICON_FAIL: &str = "✗";
const ICON_WAIT: &str = "…";
const ICON_ASK: &str = "?";

#[derive(Debug, Default)]
pub struct Transcript {
    /// Entries fully printed
    printed: usize,
    /// Characters of the open assistant entry already printed
    streamed: usize,
    /// Last printed status per tool call / approval id
    tool_status: HashMap<String, String>,
    active_elicitation: Option<String>,
    question: Option<String>,
    connection: Option<ConnectionStatus>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip everything already in the log (after a resume).
    pub fn mark_printed(&mut self, session: &Session) {
        self.printed = session.conversation().len();
        for tool in session.conversation().tool_calls() {
            self.tool_status
                .insert(tool.tool_call_id.clone(), tool.status.as_str().to_string());
        }
    }

    pub fn render(&mut self, session: &Session, change: SessionChange) -> String {
        let mut out = String::new();
        match change {
            SessionChange::Conversation | SessionChange::Tools => {
                self.render_entries(session, &mut out);
                self.render_tools(session, &mut out);
            }
            SessionChange::Elicitation => {
                self.render_entries(session, &mut out);
                self.render_elicitation(session, &mut out);
            }
            SessionChange::Agent => self.render_agent(session, &mut out),
            SessionChange::Connection => self.render_connection(session, &mut out),
        }
        out
    }

    fn render_entries(&mut self, session: &Session, out: &mut String) {
        let entries = session.conversation().entries();
        // A rejected message can shrink the log
        self.printed = self.printed.min(entries.len());

        while let Some(entry) = entries.get(self.printed) {
            match entry {
                ConversationEntry::Assistant(a) => {
                    let start = self.streamed.min(a.content.len());
                    if let Some(fresh) = a.content.get(start..) {
                        out.push_str(fresh);
                    }
                    if a.streaming {
                        self.streamed = a.content.len();
                        return;
                    }
                    out.push('\n');
                    self.streamed = 0;
                }
                ConversationEntry::User(u) => {
                    out.push_str(&format!("> {}", u.text));
                    for attachment in &u.attachments {
                        out.push_str(&format!(" [{}]", attachment.name));
                    }
                    out.push('\n');
                }
                ConversationEntry::System(s) => {
                    out.push_str(&format!("[{}] {}\n", s.subtype, s.text));
                }
                ConversationEntry::ToolCall(t) => {
                    out.push_str(&format!("  {} {} ({})\n", ICON_WAIT, t.tool_name, t.tool_call_id));
                    self.tool_status
                        .insert(t.tool_call_id.clone(), t.status.as_str().to_string());
                }
                ConversationEntry::Approval(a) => {
                    let gate = if a.admin_required { " [admin]" } else { "" };
                    out.push_str(&format!(
                        "  {} approve {} ({}){}? args: {}\n",
                        ICON_ASK, a.tool_name, a.tool_call_id, gate, a.arguments
                    ));
                }
                ConversationEntry::Elicitation(_) => {}
            }
            self.printed += 1;
        }
    }

    fn render_tools(&mut self, session: &Session, out: &mut String) {
        for tool in session.conversation().tool_calls() {
            let status = match (tool.status, tool.progress.and_then(|p| p.as_percent())) {
                (ToolCallStatus::InProgress, Some(pct)) => format!("in_progress {:.0}%", pct),
                (status, _) => status.as_str().to_string(),
            };
            if self.tool_status.get(&tool.tool_call_id) == Some(&status) {
                continue;
            }
            let icon = match tool.status {
                ToolCallStatus::Completed => ICON_OK,
                ToolCallStatus::Failed => ICON_FAIL,
                _ => ICON_WAIT,
            };
            out.push_str(&format!("  {} {} {}\n", icon, tool.tool_name, status));
            self.tool_status.insert(tool.tool_call_id.clone(), status);
        }
        for approval in session.conversation().approvals() {
            let key = format!("approval:{}", approval.tool_call_id);
            let status = format!("{:?}", approval.status).to_lowercase();
            if self.tool_status.get(&key) == Some(&status) {
                continue;
            }
            if approval.status.is_resolved() {
                let how = if approval.auto_approved { " (auto)" } else { "" };
                out.push_str(&format!("  {} {}{}\n", approval.tool_call_id, status, how));
            }
            self.tool_status.insert(key, status);
        }
    }

    fn render_elicitation(&mut self, session: &Session, out: &mut String) {
        let active = session.elicitation().active();
        let id = active.map(|r| r.elicitation_id.clone());
        if id == self.active_elicitation {
            return;
        }
        if let Some(previous) = &self.active_elicitation {
            if let Some(entry) = session.conversation().elicitation(previous) {
                if entry.is_resolved() {
                    out.push_str(&format!("  {} {:?}\n", previous, entry.outcome));
                }
            }
        }
        if let Some(request) = active {
            out.push_str(&format!("{} {}\n", ICON_ASK, request.message));
            for field in &request.fields {
                let kind = match &field.kind {
                    FieldKind::Enum { options } => options.join("|"),
                    other => format!("{:?}", other).to_lowercase(),
                };
                let required = if field.required { " (required)" } else { "" };
                out.push_str(&format!("    {}: {}{}\n", field.name, kind, required));
            }
            out.push_str("  /accept [field=value ...], /decline or /cancel\n");
        }
        self.active_elicitation = id;
    }

    fn render_agent(&mut self, session: &Session, out: &mut String) {
        let question = session.agent().pending_question().map(str::to_string);
        if question != self.question {
            if let Some(q) = &question {
                out.push_str(&format!("{} {}  (/answer <text>)\n", ICON_ASK, q));
            }
            self.question = question;
        }
    }

    fn render_connection(&mut self, session: &Session, out: &mut String) {
        let state = session.connection();
        if self.connection == Some(state.status) {
            return;
        }
        self.connection = Some(state.status);
        match (&state.status, &state.last_error) {
            (ConnectionStatus::Disconnected, Some(err)) => out.push_str(&format!(
                "[connection] disconnected ({}, {} failed attempts)\n",
                err, state.consecutive_failures
            )),
            (status, _) => out.push_str(&format!("[connection] {}\n", status)),
        }
    }
}
