//! Outbound message preparation.
//!
//! File references are resolved here, off the inbound path, before a user
//! message is handed to the session. A reference that fails to resolve
//! becomes an inline marker and never blocks the send.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{Attachment, AttachmentContent};
use crate::traits::FileResolver;

/// A file the user attached by reference
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRequest {
    pub file_id: String,
    /// Display name; defaults to the file id
    pub name: Option<String>,
    pub mime_type: Option<String>,
}

impl AttachmentRequest {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            name: None,
            mime_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// User message with all attachments resolved, ready for
/// [`crate::session::Session::send_user_message`]
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMessage {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// Marker sent in place of a file that could not be resolved
pub fn unavailable_marker(file_id: &str, reason: &str) -> String {
    format!("[attachment {} unavailable: {}]", file_id, reason)
}

/// Resolve attachments in order. Never fails; unresolved files become
/// [`AttachmentContent::Unavailable`].
pub async fn resolve_attachments(
    resolver: &dyn FileResolver,
    requests: Vec<AttachmentRequest>,
) -> Vec<Attachment> {
    let mut attachments = Vec::with_capacity(requests.len());
    for request in requests {
        let content = match resolver.resolve_file(&request.file_id).await {
            Ok(bytes) => {
                debug!("Resolved {} ({} bytes)", request.file_id, bytes.len());
                AttachmentContent::Inline {
                    data: BASE64.encode(&bytes),
                }
            }
            Err(e) => {
                warn!("Failed to resolve attachment {}: {}", request.file_id, e);
                AttachmentContent::Unavailable {
                    marker: unavailable_marker(&request.file_id, &e.to_string()),
                }
            }
        };
        attachments.push(Attachment {
            name: request.name.unwrap_or_else(|| request.file_id.clone()),
            mime_type: request.mime_type,
            content,
        });
    }
    attachments
}

pub async fn prepare_message(
    resolver: &dyn FileResolver,
    text: impl Into<String>,
    requests: Vec<AttachmentRequest>,
) -> PreparedMessage {
    PreparedMessage {
        text: text.into(),
        attachments: resolve_attachments(resolver, requests).await,
    }
}

/// Resolve in a background task and deliver the result on `tx`, so the
/// session loop keeps applying inbound frames meanwhile.
pub fn spawn_prepare(
    resolver: Arc<dyn FileResolver>,
    text: String,
    requests: Vec<AttachmentRequest>,
    tx: mpsc::Sender<PreparedMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let prepared = prepare_message(resolver.as_ref(), text, requests).await;
        if tx.send(prepared).await.is_err() {
            debug!("Session gone before message preparation finished");
        }
    })
}
