//! Session configuration.
//!
//! Use the builder methods to customize, or [`SessionConfig::from_env`] to
//! read the `TETHER_*` environment variables on top of the defaults.
//!
//! ```ignore
//! use tether::config::SessionConfig;
//!
//! let config = SessionConfig::default()
//!     .with_url("wss://chat.example.com")
//!     .with_auto_approve(true);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::error::TetherError;
use crate::websocket::{BackoffPolicy, TransportConfig};

pub const ENV_URL: &str = "TETHER_URL";
pub const ENV_AUTO_APPROVE: &str = "TETHER_AUTO_APPROVE";
pub const ENV_DATA_DIR: &str = "TETHER_DATA_DIR";
pub const ENV_CONVERSATION: &str = "TETHER_CONVERSATION";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend URL; ws(s), http(s) or bare host:port
    pub url: String,
    /// Initial auto-approve setting (the live value is an `AutoApproveSource`)
    pub auto_approve: bool,
    /// Pending approvals stay visible at least this long before auto-approval
    pub auto_approve_debounce: Duration,
    /// In-flight tool calls are failed locally this long after a stop
    pub stop_grace: Duration,
    pub transport: TransportConfig,
    /// Where conversations are saved; platform data dir when unset
    pub data_dir: Option<PathBuf>,
    /// Conversation to resume on start and save on exit
    pub conversation_id: Option<String>,
    /// Root directory for `/attach` file ids
    pub files_root: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:3000".to_string(),
            auto_approve: false,
            auto_approve_debounce: Duration::from_millis(150),
            stop_grace: Duration::from_secs(5),
            transport: TransportConfig::default(),
            data_dir: None,
            conversation_id: None,
            files_root: PathBuf::from("."),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_auto_approve(mut self, enabled: bool) -> Self {
        self.auto_approve = enabled;
        self
    }

    pub fn with_auto_approve_debounce(mut self, debounce: Duration) -> Self {
        self.auto_approve_debounce = debounce;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Set backoff base delay and cap.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.transport.backoff = BackoffPolicy::new(base, max);
        self
    }

    pub fn with_grace_window(mut self, grace: Duration) -> Self {
        self.transport.grace_window = grace;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.transport.probe_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = timeout;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_files_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.files_root = root.into();
        self
    }

    /// Defaults overridden by `TETHER_URL`, `TETHER_AUTO_APPROVE`,
    /// `TETHER_DATA_DIR` and `TETHER_CONVERSATION`.
    pub fn from_env() -> Result<Self, TetherError> {
        let mut config = Self::default();

        if let Some(url) = non_empty_var(ENV_URL) {
            config = config.with_url(url);
        }
        if let Some(value) = non_empty_var(ENV_AUTO_APPROVE) {
            let enabled = parse_flag(&value).ok_or_else(|| TetherError::Config {
                message: format!("{} must be a boolean, got '{}'", ENV_AUTO_APPROVE, value),
            })?;
            config = config.with_auto_approve(enabled);
        }
        if let Some(dir) = non_empty_var(ENV_DATA_DIR) {
            config = config.with_data_dir(dir);
        }
        if let Some(id) = non_empty_var(ENV_CONVERSATION) {
            config = config.with_conversation_id(id);
        }
        Ok(config)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts 1/0, true/false, yes/no, on/off
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
