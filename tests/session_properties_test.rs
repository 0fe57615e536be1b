//! Behavioral properties of the session core, driven through raw frames.

mod common;

use std::time::Duration;

use common::*;
use serde_json::{json, Value};
use tokio::time::Instant;

use tether::error::OperationError;
use tether::models::{ApprovalStatus, ConversationEntry, ElicitationOutcome, ToolCallStatus};
use tether::state::Conversation;
use tether::traits::SendOutcome;
use tether::websocket::messages::OutgoingFrame;

#[test]
fn test_scenario_user_message_then_streamed_reply() {
    let mut t = TestSession::new();
    let (_, outcome) = t.session.send_user_message("Hello", Vec::new());
    assert_eq!(outcome, SendOutcome::Sent);

    t.frames([
        stream_start(),
        stream_delta("Hi"),
        stream_delta(" there"),
        stream_complete(),
    ]);

    let entries = t.session.conversation().entries();
    assert_eq!(entries.len(), 2);
    match (&entries[0], &entries[1]) {
        (ConversationEntry::User(user), ConversationEntry::Assistant(assistant)) => {
            assert_eq!(user.text, "Hello");
            assert_eq!(assistant.content, "Hi there");
            assert!(!assistant.streaming);
        }
        other => panic!("unexpected entries {:?}", other),
    }

    let sent = t.sent_json();
    assert_eq!(sent[0]["type"], "user_message");
    assert_eq!(sent[0]["text"], "Hello");
}

#[test]
fn test_scenario_tool_call_lifecycle() {
    let mut t = TestSession::new();
    t.frame(tool_start(json!(42), "search"));
    assert_eq!(
        t.session.conversation().tool_call("42").unwrap().status,
        ToolCallStatus::Calling
    );

    t.frame(tool_progress(json!(42), 50.0));
    let entry = t.session.conversation().tool_call("42").unwrap();
    assert_eq!(entry.status, ToolCallStatus::InProgress);
    assert_eq!(entry.progress.and_then(|p| p.as_percent()), Some(50.0));

    t.frame(tool_result(json!(42), true, json!({"x": 1})));
    let entry = t.session.conversation().tool_call("42").unwrap();
    assert_eq!(entry.tool_call_id, "42");
    assert_eq!(entry.status, ToolCallStatus::Completed);
    assert_eq!(entry.result, Some(json!({"x": 1})));
}

#[test]
fn test_idempotent_stream_start() {
    let mut conversation = Conversation::new();
    assert!(conversation.begin_assistant_stream());
    assert!(!conversation.begin_assistant_stream());

    let open = conversation
        .entries()
        .iter()
        .filter_map(|e| e.as_assistant())
        .filter(|a| a.streaming)
        .count();
    assert_eq!(open, 1);
    assert_eq!(conversation.len(), 1);
}

#[test]
fn test_delta_ordering() {
    let mut conversation = Conversation::new();
    conversation.begin_assistant_stream();
    conversation.append_stream_delta("Hel");
    conversation.append_stream_delta("lo");
    conversation.complete_assistant_stream();

    let assistant = conversation.entries()[0].as_assistant().unwrap();
    assert_eq!(assistant.content, "Hello");
    assert!(!assistant.streaming);

    // Late delta after completion is dropped
    assert!(!conversation.append_stream_delta("!"));
    assert_eq!(conversation.entries()[0].as_assistant().unwrap().content, "Hello");
}

#[test]
fn test_terminal_immutability() {
    let mut t = TestSession::new();
    t.frames([
        tool_start(json!("t1"), "build"),
        tool_result(json!("t1"), true, json!({"ok": true})),
    ]);
    let before = t.session.conversation().tool_call("t1").unwrap().clone();

    t.frames([
        tool_progress(json!("t1"), 10.0),
        tool_result(json!("t1"), false, json!("boom")),
        tool_result(json!("t1"), true, json!({"ok": false})),
    ]);

    let after = t.session.conversation().tool_call("t1").unwrap();
    assert_eq!(after.result, before.result);
    assert_eq!(after.status, ToolCallStatus::Completed);
    assert_eq!(after.progress, before.progress);
}

#[test]
fn test_failed_result_stored_as_error_detail() {
    let mut t = TestSession::new();
    t.frames([
        tool_start(json!("t1"), "build"),
        tool_result(json!("t1"), false, json!("compiler exploded")),
    ]);
    let entry = t.session.conversation().tool_call("t1").unwrap();
    assert_eq!(entry.status, ToolCallStatus::Failed);
    assert_eq!(entry.result, Some(json!({"error": "compiler exploded"})));
}

#[test]
fn test_frames_for_unknown_tool_ignored() {
    let mut t = TestSession::new();
    t.frames([
        tool_progress(json!("ghost"), 10.0),
        tool_result(json!("ghost"), true, Value::Null),
    ]);
    assert!(t.session.conversation().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_auto_approve_exemption_for_admin_required() {
    for auto_approve in [false, true] {
        let mut t = TestSession::builder().auto_approve(auto_approve).build();
        t.frame(approval_request("admin", true));

        tokio::time::advance(Duration::from_secs(10)).await;
        t.session.fire_due(Instant::now());
        // Flip the setting mid-session as well
        t.toggle.set(!auto_approve);
        tokio::time::advance(Duration::from_secs(10)).await;
        t.session.fire_due(Instant::now());

        let approval = t.session.conversation().approval("admin").unwrap();
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert!(t.sink.sent().is_empty());

        // Explicit user action still works
        assert_eq!(t.session.approve("admin"), Ok(SendOutcome::Sent));
        assert_eq!(
            t.session.conversation().approval("admin").unwrap().status,
            ApprovalStatus::Approved
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_auto_approval_retried_after_reconnect() {
    let mut t = TestSession::builder().auto_approve(true).disconnected().build();
    t.frame(approval_request("a1", false));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(t.session.fire_due(Instant::now()), 1);
    assert_eq!(
        t.session.conversation().approval("a1").unwrap().status,
        ApprovalStatus::Pending
    );
    assert!(t.session.next_deadline().is_none());

    t.sink.set_status(tether::websocket::ConnectionStatus::Connected);
    t.session.handle_event(tether::websocket::TransportEvent::Opened);
    assert!(t.session.next_deadline().is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    t.session.fire_due(Instant::now());
    let approval = t.session.conversation().approval("a1").unwrap();
    assert_eq!(approval.status, ApprovalStatus::Approved);
    assert!(approval.auto_approved);
    assert_eq!(t.sent_json()[0]["type"], "tool_approval_response");
}

#[tokio::test(start_paused = true)]
async fn test_auto_approve_reads_policy_when_timer_fires() {
    let mut t = TestSession::builder().auto_approve(true).build();
    t.frame(approval_request("a1", false));
    t.toggle.set(false);

    tokio::time::advance(Duration::from_secs(1)).await;
    t.session.fire_due(Instant::now());
    assert_eq!(
        t.session.conversation().approval("a1").unwrap().status,
        ApprovalStatus::Pending
    );

    // Policy applies to the next request once turned back on
    t.toggle.set(true);
    t.frame(approval_request("a2", false));
    tokio::time::advance(Duration::from_secs(1)).await;
    t.session.fire_due(Instant::now());
    let approval = t.session.conversation().approval("a2").unwrap();
    assert_eq!(approval.status, ApprovalStatus::Approved);
    assert!(approval.auto_approved);
}

#[test]
fn test_edit_then_approve_sends_edited_arguments() {
    let mut t = TestSession::new();
    t.frame(approval_request("w1", false));
    t.session
        .edit_arguments("w1", json!({"path": "/tmp/safe.txt"}))
        .unwrap();

    let approval = t.session.conversation().approval("w1").unwrap();
    assert_eq!(approval.original_arguments, Some(json!({"path": "/tmp/out.txt"})));

    t.session.approve("w1").unwrap();
    let sent = t.sent_json();
    assert_eq!(sent[0]["type"], "tool_approval_response");
    assert_eq!(sent[0]["approved"], true);
    assert_eq!(sent[0]["arguments"]["path"], "/tmp/safe.txt");

    assert_eq!(
        t.session.approve("w1"),
        Err(OperationError::NoPendingApproval("w1".to_string()))
    );
    assert!(t.session.edit_arguments("w1", json!({})).is_err());
}

#[test]
fn test_reject_uses_default_reason() {
    let mut t = TestSession::new();
    t.frame(approval_request("r1", false));
    t.session.reject("r1", "  ").unwrap();

    let approval = t.session.conversation().approval("r1").unwrap();
    assert_eq!(approval.status, ApprovalStatus::Rejected);
    assert_eq!(approval.rejection_reason.as_deref(), Some("Rejected by user"));
    assert_eq!(t.sent_json()[0]["reason"], "Rejected by user");
}

#[test]
fn test_approval_while_disconnected_stays_pending() {
    let mut t = TestSession::builder().disconnected().build();
    t.frame(approval_request("d1", false));
    assert_eq!(t.session.approve("d1"), Ok(SendOutcome::NotConnected));
    assert_eq!(
        t.session.conversation().approval("d1").unwrap().status,
        ApprovalStatus::Pending
    );
    assert_eq!(t.sink.dropped(), 1);
}

#[test]
fn test_elicitation_single_flight() {
    let mut t = TestSession::new();
    let schema = json!({"type": "object", "properties": {}});
    t.frames([
        elicitation_request("E1", schema.clone()),
        elicitation_request("E2", schema),
    ]);

    assert_eq!(t.session.elicitation().active().unwrap().elicitation_id, "E1");
    assert!(t.session.conversation().elicitation("E2").is_none());

    t.session.accept_elicitation().unwrap();
    assert_eq!(t.session.elicitation().active().unwrap().elicitation_id, "E2");
    assert_eq!(
        t.session.conversation().elicitation("E1").unwrap().outcome,
        ElicitationOutcome::Accepted
    );

    t.session.decline_elicitation().unwrap();
    assert!(t.session.elicitation().active().is_none());

    let sent = t.sent_json();
    assert_eq!(sent[0]["elicitation_id"], "E1");
    assert_eq!(sent[0]["action"], "accept");
    assert_eq!(sent[0]["data"], Value::Null);
    assert_eq!(sent[1]["elicitation_id"], "E2");
    assert_eq!(sent[1]["action"], "decline");
}

#[test]
fn test_elicitation_typed_fields() {
    let mut t = TestSession::new();
    t.frame(elicitation_request(
        "E1",
        json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer"},
                "label": {"type": "string", "default": "none"}
            },
            "required": ["count"]
        }),
    ));

    assert_eq!(
        t.session.accept_elicitation(),
        Err(OperationError::MissingRequiredFields(vec!["count".to_string()]))
    );
    assert!(matches!(
        t.session.set_elicitation_field("count", "lots"),
        Err(OperationError::InvalidFieldValue { .. })
    ));
    t.session.set_elicitation_field("count", "3").unwrap();
    t.session.accept_elicitation().unwrap();

    assert_eq!(t.sent_json()[0]["data"], json!({"count": 3, "label": "none"}));
}

#[test]
fn test_cancel_is_distinct_from_decline() {
    let mut t = TestSession::new();
    t.frame(elicitation_request("E1", json!({"properties": {}})));
    t.session.cancel_elicitation().unwrap();
    assert_eq!(t.sent_json()[0]["action"], "cancel");
    assert_eq!(
        t.session.conversation().elicitation("E1").unwrap().outcome,
        ElicitationOutcome::Cancelled
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_stream_discards_late_frames() {
    let mut t = TestSession::builder()
        .stop_grace(Duration::from_secs(2))
        .build();
    t.frames([
        json!({"type": "agent_run_started", "run_id": "run-9"}),
        stream_start(),
        stream_delta("Working on"),
        tool_start(json!("slow"), "long_task"),
    ]);

    t.session.stop().unwrap();
    assert!(!t.session.conversation().is_streaming());
    assert!(!t.session.agent().is_running());
    match t.last_sent() {
        Some(OutgoingFrame::AgentStop(stop)) => assert_eq!(stop.run_id.as_deref(), Some("run-9")),
        other => panic!("expected agent_stop, got {:?}", other),
    }

    // Late stream frames do not grow the log
    let len = t.session.conversation().len();
    t.frames([stream_delta(" it"), stream_complete()]);
    assert_eq!(t.session.conversation().len(), len);

    // Tool call still running until the grace period passes
    tokio::time::advance(Duration::from_secs(1)).await;
    t.session.fire_due(Instant::now());
    assert_eq!(
        t.session.conversation().tool_call("slow").unwrap().status,
        ToolCallStatus::Calling
    );
    tokio::time::advance(Duration::from_secs(2)).await;
    t.session.fire_due(Instant::now());
    let tool = t.session.conversation().tool_call("slow").unwrap();
    assert_eq!(tool.status, ToolCallStatus::Failed);
    assert_eq!(tool.result, Some(json!({"error": "cancelled: agent stopped"})));
}

#[tokio::test(start_paused = true)]
async fn test_stop_grace_keeps_tools_that_finish_in_time() {
    let mut t = TestSession::new();
    t.frames([
        json!({"type": "agent_run_started"}),
        tool_start(json!("quick"), "ls"),
    ]);
    t.session.stop().unwrap();
    t.frame(tool_result(json!("quick"), true, json!(["a", "b"])));

    tokio::time::advance(Duration::from_secs(10)).await;
    t.session.fire_due(Instant::now());
    let tool = t.session.conversation().tool_call("quick").unwrap();
    assert_eq!(tool.status, ToolCallStatus::Completed);
    assert_eq!(tool.result, Some(json!(["a", "b"])));
}

#[test]
fn test_agent_question_answer_and_stop() {
    let mut t = TestSession::new();
    assert_eq!(t.session.stop(), Err(OperationError::NothingToStop));

    t.frame(json!({"type": "agent_question", "question": "Deploy now?"}));
    assert_eq!(t.session.agent().pending_question(), Some("Deploy now?"));
    t.session.answer("yes").unwrap();
    assert!(t.session.agent().pending_question().is_none());
    assert_eq!(t.sent_json()[0], json!({"type": "agent_answer", "answer": "yes"}));

    t.frame(json!({"type": "agent_question", "question": "Really?"}));
    t.session.stop().unwrap();
    assert!(t.session.agent().pending_question().is_none());
}

#[test]
fn test_router_survives_garbage() {
    let mut t = TestSession::new();
    t.session.handle_frame("not json at all");
    t.session.handle_frame(r#"{"type":"stream_delta"}"#);
    t.session.handle_frame(r#"{"no_type":true}"#);
    t.frames([stream_start(), stream_delta("still fine"), stream_complete()]);
    assert_eq!(
        t.session.conversation().entries()[0]
            .as_assistant()
            .unwrap()
            .content,
        "still fine"
    );
}

#[test]
fn test_user_message_mid_stream_keeps_reply_in_one_entry() {
    let mut t = TestSession::new();
    t.frames([stream_start(), stream_delta("Hi")]);
    t.session.send_user_message("wait", Vec::new());
    assert!(t.session.conversation().entries()[0]
        .as_assistant()
        .unwrap()
        .streaming);

    t.frames([stream_delta(" there"), stream_complete()]);

    let entries = t.session.conversation().entries();
    assert_eq!(entries.len(), 2);
    let reply = entries[0].as_assistant().unwrap();
    assert_eq!(reply.content, "Hi there");
    assert!(!reply.streaming);
    assert_eq!(entries[1].as_user().unwrap().text, "wait");
}

#[test]
fn test_interleaved_entries_seal_stream_segment() {
    let mut t = TestSession::new();
    t.frames([
        stream_start(),
        stream_delta("Let me check. "),
        tool_start(json!("t1"), "search"),
        tool_start(json!("t2"), "read"),
        stream_delta("Found it."),
        stream_complete(),
    ]);

    let kinds: Vec<&str> = t
        .session
        .conversation()
        .entries()
        .iter()
        .map(|e| e.kind())
        .collect();
    assert_eq!(kinds, vec!["assistant", "tool_call", "tool_call", "assistant"]);
    let first = t.session.conversation().entries()[0].as_assistant().unwrap();
    assert_eq!(first.content, "Let me check. ");
    assert!(!first.streaming);
    let last = t.session.conversation().entries()[3].as_assistant().unwrap();
    assert_eq!(last.content, "Found it.");
    assert!(!last.streaming);
    assert!(!t.session.conversation().is_streaming());
}
