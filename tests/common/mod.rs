//! Common test utilities for integration tests.
//!
//! A [`TestSession`] wraps a [`Session`] wired to a [`MockFrameSink`] and an
//! [`AutoApproveToggle`], plus helpers that build raw wire frames.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use tether::adapters::MockFrameSink;
use tether::config::SessionConfig;
use tether::session::Session;
use tether::traits::AutoApproveToggle;
use tether::websocket::messages::OutgoingFrame;

pub struct TestSession {
    pub session: Session,
    pub sink: MockFrameSink,
    pub toggle: AutoApproveToggle,
}

impl TestSession {
    pub fn new() -> Self {
        TestSessionBuilder::default().build()
    }

    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::default()
    }

    /// Feed one frame built with the helpers below.
    pub fn frame(&mut self, frame: Value) {
        self.session.handle_frame(&frame.to_string());
    }

    pub fn frames(&mut self, frames: impl IntoIterator<Item = Value>) {
        for frame in frames {
            self.frame(frame);
        }
    }

    /// Frames sent so far, serialized as they would go on the wire
    pub fn sent_json(&self) -> Vec<Value> {
        self.sink
            .sent()
            .iter()
            .map(|f| serde_json::to_value(f).unwrap())
            .collect()
    }

    pub fn last_sent(&self) -> Option<OutgoingFrame> {
        self.sink.sent().last().cloned()
    }
}

/// Builder for test sessions with various configurations.
#[derive(Default)]
pub struct TestSessionBuilder {
    auto_approve: bool,
    disconnected: bool,
    stop_grace: Option<Duration>,
}

impl TestSessionBuilder {
    pub fn auto_approve(mut self, enabled: bool) -> Self {
        self.auto_approve = enabled;
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.disconnected = true;
        self
    }

    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = Some(grace);
        self
    }

    pub fn build(self) -> TestSession {
        let sink = if self.disconnected {
            MockFrameSink::disconnected()
        } else {
            MockFrameSink::new()
        };
        let toggle = AutoApproveToggle::new(self.auto_approve);
        let mut config = SessionConfig::default();
        if let Some(grace) = self.stop_grace {
            config = config.with_stop_grace(grace);
        }
        let session = Session::new(&config, Arc::new(sink.clone()), Arc::new(toggle.clone()));
        TestSession {
            session,
            sink,
            toggle,
        }
    }
}

pub fn stream_start() -> Value {
    json!({"type": "stream_start"})
}

pub fn stream_delta(text: &str) -> Value {
    json!({"type": "stream_delta", "text": text})
}

pub fn stream_complete() -> Value {
    json!({"type": "stream_complete"})
}

pub fn tool_start(id: Value, name: &str) -> Value {
    json!({"type": "tool_call_start", "tool_call_id": id, "tool_name": name, "arguments": {}})
}

pub fn tool_progress(id: Value, progress: f64) -> Value {
    json!({"type": "tool_call_progress", "tool_call_id": id, "progress": progress})
}

pub fn tool_result(id: Value, success: bool, result: Value) -> Value {
    json!({"type": "tool_call_result", "tool_call_id": id, "success": success, "result": result})
}

pub fn approval_request(id: &str, admin_required: bool) -> Value {
    json!({
        "type": "tool_approval_request",
        "tool_call_id": id,
        "tool_name": "write_file",
        "arguments": {"path": "/tmp/out.txt"},
        "admin_required": admin_required
    })
}

pub fn elicitation_request(id: &str, schema: Value) -> Value {
    json!({
        "type": "elicitation_request",
        "elicitation_id": id,
        "message": format!("Need input for {}", id),
        "requested_schema": schema
    })
}
