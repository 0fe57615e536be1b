//! Conversation state machine.
//!
//! Owns the ordered entry log and is the only place entries are mutated.
//! Tool, approval, elicitation and user entries are indexed by id for O(1)
//! lookup; other controllers hold ids and go through the `update_*`
//! methods here.
//!
//! At most one assistant entry is open (`streaming = true`) and it is the
//! last or second-to-last entry. One entry appended after it (typically a
//! user message sent mid-reply) leaves it open and deltas keep landing in
//! it. A second append seals it and leaves the stream *interrupted*, so the
//! next delta of the same reply opens a fresh segment at the end.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ProtocolAnomaly;
use crate::models::{
    ApprovalEntry, AssistantEntry, Attachment, ConversationEntry, ElicitationEntry, SendState,
    SystemEntry, ToolCallEntry, UserEntry,
};

/// Where the assistant stream is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// No reply streaming; deltas are anomalies
    Idle,
    /// Entry at this index is accumulating deltas
    Open(usize),
    /// Reply still running but its last segment fell too far back and was sealed
    Interrupted,
    /// Reply was cut off by a stop; late frames are discarded quietly
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
    stream: StreamPhase,
    tool_calls: HashMap<String, usize>,
    approvals: HashMap<String, usize>,
    elicitations: HashMap<String, usize>,
    user_messages: HashMap<String, usize>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            stream: StreamPhase::Idle,
            tool_calls: HashMap::new(),
            approvals: HashMap::new(),
            elicitations: HashMap::new(),
            user_messages: HashMap::new(),
        }
    }

    /// Rebuild from saved entries. Entries still flagged streaming are
    /// sealed, since their stream cannot resume.
    pub fn from_entries(entries: Vec<ConversationEntry>) -> Self {
        let mut conversation = Self::new();
        conversation.entries = entries;
        for entry in &mut conversation.entries {
            if let ConversationEntry::Assistant(assistant) = entry {
                if assistant.streaming {
                    debug!("Sealing assistant entry left streaming");
                    assistant.streaming = false;
                }
            }
        }
        conversation.rebuild_indexes();
        conversation
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stream_phase(&self) -> StreamPhase {
        self.stream
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.stream, StreamPhase::Open(_) | StreamPhase::Interrupted)
    }

    /// The assistant entry currently accumulating deltas
    pub fn open_stream(&self) -> Option<&AssistantEntry> {
        match self.stream {
            StreamPhase::Open(idx) => self.entries.get(idx).and_then(|e| e.as_assistant()),
            _ => None,
        }
    }

    /// Append a provisional user entry with a fresh client id and return
    /// the id. Sending the frame is the caller's job.
    pub fn append_user(&mut self, text: impl Into<String>, attachments: Vec<Attachment>) -> String {
        let client_id = Uuid::new_v4().to_string();
        let entry = UserEntry::new(client_id.clone(), text.into(), attachments);
        let idx = self.push(ConversationEntry::User(entry));
        self.user_messages.insert(client_id.clone(), idx);
        client_id
    }

    /// Open a streaming assistant entry. A duplicate start while one is
    /// open is ignored. Returns true if an entry was opened.
    pub fn begin_assistant_stream(&mut self) -> bool {
        if let StreamPhase::Open(_) = self.stream {
            debug!("Stream start while a stream is open, ignoring");
            return false;
        }
        self.open_segment(String::new());
        true
    }

    /// Concatenate a delta onto the open entry. Returns false (and logs)
    /// when no stream is open.
    pub fn append_stream_delta(&mut self, text: &str) -> bool {
        match self.stream {
            StreamPhase::Open(idx) => {
                if let Some(ConversationEntry::Assistant(entry)) = self.entries.get_mut(idx) {
                    entry.content.push_str(text);
                    return true;
                }
                warn!("Open stream index {} is not an assistant entry", idx);
                self.stream = StreamPhase::Idle;
                false
            }
            StreamPhase::Interrupted => {
                self.open_segment(text.to_string());
                true
            }
            StreamPhase::Cancelled => {
                debug!("Delta after stop discarded");
                false
            }
            StreamPhase::Idle => {
                ProtocolAnomaly::NoOpenStream {
                    frame: "stream_delta",
                }
                .report();
                false
            }
        }
    }

    /// Seal the open entry. Returns false when nothing was streaming.
    pub fn complete_assistant_stream(&mut self) -> bool {
        match self.stream {
            StreamPhase::Open(_) => {
                self.seal_open();
                self.stream = StreamPhase::Idle;
                true
            }
            StreamPhase::Interrupted => {
                self.stream = StreamPhase::Idle;
                true
            }
            StreamPhase::Cancelled => {
                debug!("Completion after stop discarded");
                self.stream = StreamPhase::Idle;
                false
            }
            StreamPhase::Idle => {
                ProtocolAnomaly::NoOpenStream {
                    frame: "stream_complete",
                }
                .report();
                false
            }
        }
    }

    /// Seal the stream after a stop. Late deltas and completions for the
    /// stopped reply are dropped without warnings.
    pub fn cancel_stream(&mut self) -> bool {
        let was_streaming = self.is_streaming();
        if was_streaming {
            self.seal_open();
            self.stream = StreamPhase::Cancelled;
        }
        was_streaming
    }

    /// Seal the stream after a backend error; the reply is over.
    pub fn abort_stream(&mut self) -> bool {
        let was_streaming = self.is_streaming();
        self.seal_open();
        self.stream = StreamPhase::Idle;
        was_streaming
    }

    pub fn append_system(&mut self, subtype: impl Into<String>, text: impl Into<String>) {
        self.push(ConversationEntry::System(SystemEntry::new(subtype, text)));
    }

    /// Append a tool call entry. A duplicate id is an anomaly and ignored.
    pub fn append_tool_call(&mut self, entry: ToolCallEntry) -> bool {
        if self.tool_calls.contains_key(&entry.tool_call_id) {
            ProtocolAnomaly::DuplicateId {
                kind: "tool_call",
                id: entry.tool_call_id,
            }
            .report();
            return false;
        }
        let id = entry.tool_call_id.clone();
        let idx = self.push(ConversationEntry::ToolCall(entry));
        self.tool_calls.insert(id, idx);
        true
    }

    /// Append an approval entry. A duplicate id is an anomaly and ignored.
    pub fn append_approval(&mut self, entry: ApprovalEntry) -> bool {
        if self.approvals.contains_key(&entry.tool_call_id) {
            ProtocolAnomaly::DuplicateId {
                kind: "approval",
                id: entry.tool_call_id,
            }
            .report();
            return false;
        }
        let id = entry.tool_call_id.clone();
        let idx = self.push(ConversationEntry::Approval(entry));
        self.approvals.insert(id, idx);
        true
    }

    pub fn append_elicitation(&mut self, entry: ElicitationEntry) -> bool {
        if self.elicitations.contains_key(&entry.elicitation_id) {
            ProtocolAnomaly::DuplicateId {
                kind: "elicitation",
                id: entry.elicitation_id,
            }
            .report();
            return false;
        }
        let id = entry.elicitation_id.clone();
        let idx = self.push(ConversationEntry::Elicitation(entry));
        self.elicitations.insert(id, idx);
        true
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCallEntry> {
        let idx = *self.tool_calls.get(id)?;
        self.entries.get(idx)?.as_tool_call()
    }

    pub fn approval(&self, id: &str) -> Option<&ApprovalEntry> {
        let idx = *self.approvals.get(id)?;
        self.entries.get(idx)?.as_approval()
    }

    pub fn elicitation(&self, id: &str) -> Option<&ElicitationEntry> {
        let idx = *self.elicitations.get(id)?;
        match self.entries.get(idx)? {
            ConversationEntry::Elicitation(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn user_message(&self, client_id: &str) -> Option<&UserEntry> {
        let idx = *self.user_messages.get(client_id)?;
        self.entries.get(idx)?.as_user()
    }

    /// Tool calls in log order
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallEntry> {
        self.entries.iter().filter_map(|e| e.as_tool_call())
    }

    /// Approvals in log order
    pub fn approvals(&self) -> impl Iterator<Item = &ApprovalEntry> {
        self.entries.iter().filter_map(|e| e.as_approval())
    }

    pub fn update_tool_call<R>(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut ToolCallEntry) -> R,
    ) -> Option<R> {
        let idx = *self.tool_calls.get(id)?;
        match self.entries.get_mut(idx)? {
            ConversationEntry::ToolCall(entry) => Some(f(entry)),
            _ => None,
        }
    }

    pub fn update_approval<R>(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut ApprovalEntry) -> R,
    ) -> Option<R> {
        let idx = *self.approvals.get(id)?;
        match self.entries.get_mut(idx)? {
            ConversationEntry::Approval(entry) => Some(f(entry)),
            _ => None,
        }
    }

    pub fn update_elicitation<R>(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut ElicitationEntry) -> R,
    ) -> Option<R> {
        let idx = *self.elicitations.get(id)?;
        match self.entries.get_mut(idx)? {
            ConversationEntry::Elicitation(entry) => Some(f(entry)),
            _ => None,
        }
    }

    /// Record whether a user message reached the socket
    pub fn set_send_state(&mut self, client_id: &str, state: SendState) -> bool {
        self.update_user(client_id, |entry| entry.send_state = state)
            .is_some()
    }

    /// The backend accepted the message; it is no longer provisional.
    pub fn reconcile_user(&mut self, client_id: &str) -> bool {
        let reconciled = self.update_user(client_id, |entry| {
            entry.provisional = false;
            entry.send_state = SendState::Sent;
        });
        if reconciled.is_none() {
            ProtocolAnomaly::UnknownMessage {
                client_id: client_id.to_string(),
            }
            .report();
        }
        reconciled.is_some()
    }

    /// The backend refused the message; drop the provisional entry.
    ///
    /// Already-acknowledged entries are kept.
    pub fn discard_user(&mut self, client_id: &str) -> Option<UserEntry> {
        let Some(&idx) = self.user_messages.get(client_id) else {
            ProtocolAnomaly::UnknownMessage {
                client_id: client_id.to_string(),
            }
            .report();
            return None;
        };
        let provisional = self
            .entries
            .get(idx)
            .and_then(|e| e.as_user())
            .map_or(false, |u| u.provisional);
        if !provisional {
            warn!("Rejection for acknowledged message {} ignored", client_id);
            return None;
        }

        let removed = self.entries.remove(idx);
        self.rebuild_indexes();
        match removed {
            ConversationEntry::User(entry) => Some(entry),
            _ => None,
        }
    }

    fn update_user<R>(&mut self, client_id: &str, f: impl FnOnce(&mut UserEntry) -> R) -> Option<R> {
        let idx = *self.user_messages.get(client_id)?;
        match self.entries.get_mut(idx)? {
            ConversationEntry::User(entry) => Some(f(entry)),
            _ => None,
        }
    }

    fn open_segment(&mut self, content: String) {
        let mut entry = AssistantEntry::open();
        entry.content = content;
        self.entries.push(ConversationEntry::Assistant(entry));
        self.stream = StreamPhase::Open(self.entries.len() - 1);
    }

    fn seal_open(&mut self) {
        if let StreamPhase::Open(idx) = self.stream {
            if let Some(ConversationEntry::Assistant(entry)) = self.entries.get_mut(idx) {
                entry.streaming = false;
            }
        }
    }

    /// Append a non-assistant entry. The open segment may have one entry
    /// after it; it is sealed before it would fall further back.
    fn push(&mut self, entry: ConversationEntry) -> usize {
        if let StreamPhase::Open(idx) = self.stream {
            if idx + 1 < self.entries.len() {
                debug!("{} entry interrupts the open stream", entry.kind());
                self.seal_open();
                self.stream = StreamPhase::Interrupted;
            }
        }
        self.entries.push(entry);
        self.entries.len() - 1
    }

    fn rebuild_indexes(&mut self) {
        self.tool_calls.clear();
        self.approvals.clear();
        self.elicitations.clear();
        self.user_messages.clear();
        let mut open = None;

        for (idx, entry) in self.entries.iter().enumerate() {
            let (index, id) = match entry {
                ConversationEntry::ToolCall(e) => (&mut self.tool_calls, &e.tool_call_id),
                ConversationEntry::Approval(e) => (&mut self.approvals, &e.tool_call_id),
                ConversationEntry::Elicitation(e) => (&mut self.elicitations, &e.elicitation_id),
                ConversationEntry::User(e) => (&mut self.user_messages, &e.client_id),
                ConversationEntry::Assistant(e) => {
                    if e.streaming {
                        open = Some(idx);
                    }
                    continue;
                }
                ConversationEntry::System(_) => continue,
            };
            if index.contains_key(id) {
                warn!("Duplicate {} id {} in log, keeping first", entry.kind(), id);
                continue;
            }
            index.insert(id.clone(), idx);
        }

        if let Some(idx) = open {
            self.stream = StreamPhase::Open(idx);
        } else if let StreamPhase::Open(_) = self.stream {
            self.stream = StreamPhase::Interrupted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolCallStatus;
    use serde_json::json;

    fn assistant_contents(conversation: &Conversation) -> Vec<(String, bool)> {
        conversation
            .entries()
            .iter()
            .filter_map(|e| e.as_assistant())
            .map(|a| (a.content.clone(), a.streaming))
            .collect()
    }

    #[test]
    fn test_begin_stream_is_idempotent() {
        let mut c = Conversation::new();
        assert!(c.begin_assistant_stream());
        assert!(!c.begin_assistant_stream());
        assert_eq!(c.len(), 1);
        assert_eq!(
            c.entries()
                .iter()
                .filter(|e| e.as_assistant().map_or(false, |a| a.streaming))
                .count(),
            1
        );
    }

    #[test]
    fn test_deltas_concatenate_then_complete() {
        let mut c = Conversation::new();
        c.begin_assistant_stream();
        assert!(c.append_stream_delta("Hel"));
        assert!(c.append_stream_delta("lo"));
        assert!(c.complete_assistant_stream());
        assert_eq!(assistant_contents(&c), vec![("Hello".to_string(), false)]);
        assert!(!c.is_streaming());
    }

    #[test]
    fn test_delta_without_open_stream_is_noop() {
        let mut c = Conversation::new();
        assert!(!c.append_stream_delta("stray"));
        assert!(!c.complete_assistant_stream());
        assert!(c.is_empty());

        c.begin_assistant_stream();
        c.append_stream_delta("done");
        c.complete_assistant_stream();
        // Delta after completion must not reopen or alter the entry
        assert!(!c.append_stream_delta(" late"));
        assert_eq!(assistant_contents(&c), vec![("done".to_string(), false)]);
    }

    #[test]
    fn test_one_entry_after_open_stream_keeps_it_open() {
        let mut c = Conversation::new();
        c.begin_assistant_stream();
        c.append_stream_delta("Hi");
        c.append_user("wait", Vec::new());
        assert_eq!(c.stream_phase(), StreamPhase::Open(0));
        assert_eq!(c.open_stream().map(|a| a.content.as_str()), Some("Hi"));

        c.append_stream_delta(" there");
        c.complete_assistant_stream();

        let kinds: Vec<_> = c.entries().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["assistant", "user"]);
        assert_eq!(assistant_contents(&c), vec![("Hi there".to_string(), false)]);
    }

    #[test]
    fn test_second_entry_after_open_stream_splits_it() {
        let mut c = Conversation::new();
        c.begin_assistant_stream();
        c.append_stream_delta("Let me check.");
        c.append_tool_call(ToolCallEntry::new(
            "t1".into(),
            "search".into(),
            None,
            json!({}),
        ));
        assert_eq!(c.stream_phase(), StreamPhase::Open(0));

        c.append_system("info", "note");
        assert_eq!(c.stream_phase(), StreamPhase::Interrupted);
        assert!(c.open_stream().is_none());

        c.append_stream_delta("Found it.");
        c.complete_assistant_stream();

        let kinds: Vec<_> = c.entries().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["assistant", "tool_call", "system", "assistant"]);
        assert_eq!(
            assistant_contents(&c),
            vec![
                ("Let me check.".to_string(), false),
                ("Found it.".to_string(), false)
            ]
        );
    }

    #[test]
    fn test_open_entry_is_last_or_second_to_last() {
        let mut c = Conversation::new();
        c.begin_assistant_stream();
        for i in 0..4 {
            c.append_system("info", format!("note {}", i));
            c.append_stream_delta("x");
            match c.stream_phase() {
                StreamPhase::Open(idx) => assert!(idx + 2 >= c.len()),
                other => panic!("expected open stream, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_cancelled_stream_discards_late_frames() {
        let mut c = Conversation::new();
        c.begin_assistant_stream();
        c.append_stream_delta("partial");
        assert!(c.cancel_stream());
        assert!(!c.append_stream_delta(" more"));
        assert!(!c.complete_assistant_stream());
        assert_eq!(assistant_contents(&c), vec![("partial".to_string(), false)]);
        // A new reply can start afterwards
        assert!(c.begin_assistant_stream());
    }

    #[test]
    fn test_tool_call_lookup_and_duplicates() {
        let mut c = Conversation::new();
        assert!(c.append_tool_call(ToolCallEntry::new("42".into(), "t".into(), None, json!({}))));
        assert!(!c.append_tool_call(ToolCallEntry::new("42".into(), "other".into(), None, json!({}))));
        assert_eq!(c.tool_call("42").unwrap().tool_name, "t");
        assert!(c.tool_call("missing").is_none());

        c.update_tool_call("42", |t| t.status = ToolCallStatus::InProgress);
        assert_eq!(c.tool_call("42").unwrap().status, ToolCallStatus::InProgress);
        assert!(c.update_tool_call("missing", |_| ()).is_none());
    }

    #[test]
    fn test_user_reconcile_and_discard() {
        let mut c = Conversation::new();
        let first = c.append_user("one", vec![]);
        let second = c.append_user("two", vec![]);
        c.append_system("info", "after");

        assert!(c.reconcile_user(&first));
        assert!(!c.user_message(&first).unwrap().provisional);
        assert_eq!(c.user_message(&first).unwrap().send_state, SendState::Sent);

        // Acknowledged entries are not discarded
        assert!(c.discard_user(&first).is_none());

        let removed = c.discard_user(&second).unwrap();
        assert_eq!(removed.text, "two");
        assert!(c.user_message(&second).is_none());
        assert_eq!(c.len(), 2);
        assert!(c.user_message(&first).is_some());
        assert!(!c.reconcile_user("unknown"));
    }

    #[test]
    fn test_discard_keeps_open_stream_index() {
        let mut c = Conversation::new();
        let id = c.append_user("hi", vec![]);
        c.begin_assistant_stream();
        c.discard_user(&id);
        assert_eq!(c.stream_phase(), StreamPhase::Open(0));
        assert!(c.append_stream_delta("ok"));
        assert_eq!(c.open_stream().unwrap().content, "ok");
    }

    #[test]
    fn test_from_entries_seals_streaming_and_indexes() {
        let mut c = Conversation::new();
        c.append_tool_call(ToolCallEntry::new("7".into(), "t".into(), None, json!({})));
        c.begin_assistant_stream();
        c.append_stream_delta("half");

        let resumed = Conversation::from_entries(c.entries().to_vec());
        assert_eq!(resumed.stream_phase(), StreamPhase::Idle);
        assert_eq!(assistant_contents(&resumed), vec![("half".to_string(), false)]);
        assert!(resumed.tool_call("7").is_some());
    }
}
