//! Frame router.
//!
//! Parses each raw frame once and fans it out to the handlers registered
//! for its `type` tag, in registration order. Handlers receive the
//! session's mutable state as `&mut C`, so all mutation happens inside the
//! dispatch call and never in parallel.
//!
//! A handler that returns an error or panics is logged and skipped; the
//! remaining handlers still see the frame. Frames that fail to parse are
//! dropped with a logged error.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::error::{ProtocolAnomaly, TetherResult};
use crate::websocket::messages::IncomingFrame;

type Handler<C> = Box<dyn FnMut(&mut C, &IncomingFrame) -> TetherResult<()> + Send>;

/// Token returned by [`FrameRouter::register`]; pass it back to
/// [`FrameRouter::unregister`] to remove the handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[must_use = "dropping the subscription leaves no way to unregister the handler"]
pub struct Subscription {
    tag: String,
    id: u64,
}

impl Subscription {
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// Result of dispatching one raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Parsed and offered to this many handlers (possibly zero)
    Delivered(usize),
    /// Could not be parsed; dropped
    Malformed,
}

pub struct FrameRouter<C> {
    handlers: HashMap<String, Vec<(u64, Handler<C>)>>,
    next_id: u64,
}

impl<C> Default for FrameRouter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> FrameRouter<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Register a handler for frames tagged `tag`. Several handlers may
    /// share a tag; they run in registration order.
    pub fn register<F>(&mut self, tag: &str, handler: F) -> Subscription
    where
        F: FnMut(&mut C, &IncomingFrame) -> TetherResult<()> + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers
            .entry(tag.to_string())
            .or_default()
            .push((id, Box::new(handler)));
        debug!("Registered handler {} for '{}'", id, tag);
        Subscription {
            tag: tag.to_string(),
            id,
        }
    }

    /// Remove a handler. Returns false if it was already removed.
    pub fn unregister(&mut self, subscription: Subscription) -> bool {
        let Some(handlers) = self.handlers.get_mut(&subscription.tag) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.handlers.remove(&subscription.tag);
        }
        removed
    }

    pub fn handler_count(&self, tag: &str) -> usize {
        self.handlers.get(tag).map_or(0, Vec::len)
    }

    /// Parse one raw text frame and deliver it.
    pub fn dispatch(&mut self, ctx: &mut C, raw: &str) -> Dispatch {
        match IncomingFrame::parse(raw) {
            Ok(frame) => Dispatch::Delivered(self.dispatch_frame(ctx, &frame)),
            Err(e) => {
                let message = match peek_tag(raw) {
                    Some(tag) => format!("'{}': {}", tag, e),
                    None => e.to_string(),
                };
                ProtocolAnomaly::MalformedFrame {
                    message,
                    raw: raw.to_string(),
                }
                .report();
                Dispatch::Malformed
            }
        }
    }

    /// Deliver an already-parsed frame. Returns the number of handlers it
    /// was offered to.
    pub fn dispatch_frame(&mut self, ctx: &mut C, frame: &IncomingFrame) -> usize {
        let tag = frame.tag();
        let Some(handlers) = self.handlers.get_mut(tag) else {
            debug!("No handler for '{}' frame", tag);
            return 0;
        };

        for (id, handler) in handlers.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| handler(ctx, frame))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(code = e.error_code(), "Handler {} for '{}' failed: {}", id, tag, e);
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Handler {} for '{}' panicked: {}", id, tag, reason);
                }
            }
        }
        handlers.len()
    }
}

/// Best-effort read of the `type` field of a frame that failed to parse
fn peek_tag(raw: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Tagged {
        #[serde(rename = "type")]
        kind: String,
    }
    serde_json::from_str::<Tagged>(raw).ok().map(|t| t.kind)
}
