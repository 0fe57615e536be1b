//! Auto-approve policy source.
//!
//! Read every time an approval decision is made, never cached, so a user
//! can flip the setting mid-session and have it apply to the next request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Trait for reading the auto-approve setting.
pub trait AutoApproveSource: Send + Sync {
    fn auto_approve_enabled(&self) -> bool;
}

/// Shared toggle backed by an atomic flag.
///
/// Clones share the same flag, so the session and whatever UI flips the
/// switch see the same value.
#[derive(Debug, Clone, Default)]
pub struct AutoApproveToggle {
    enabled: Arc<AtomicBool>,
}

impl AutoApproveToggle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl AutoApproveSource for AutoApproveToggle {
    fn auto_approve_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
