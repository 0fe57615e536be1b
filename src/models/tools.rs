use serde::{Deserialize, Serialize};

/// Lifecycle status of a tool call.
///
/// Totally ordered: `Calling → InProgress → {Completed | Failed}`.
/// The only skip allowed is straight to a terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Tool call announced by the backend
    #[default]
    Calling,
    /// At least one progress update received
    InProgress,
    /// Tool finished successfully
    Completed,
    /// Tool finished with an error, or was failed locally after a stop
    Failed,
}

impl ToolCallStatus {
    /// Completed and failed are immutable once set
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolCallStatus::Completed | ToolCallStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCallStatus::Calling => "calling",
            ToolCallStatus::InProgress => "in_progress",
            ToolCallStatus::Completed => "completed",
            ToolCallStatus::Failed => "failed",
        }
    }
}

/// Progress of a running tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Progress {
    /// Percentage in [0, 100]
    Percent(f64),
    /// Tool is working but cannot say how far along it is
    Indeterminate,
}

impl Progress {
    /// Build a progress value from the wire fields.
    ///
    /// With `total`, `progress` is a count out of `total`. Without it,
    /// `progress` is already a percentage. Neither means indeterminate.
    pub fn from_wire(progress: Option<f64>, total: Option<f64>) -> Self {
        match (progress, total) {
            (Some(p), Some(t)) if t > 0.0 => Progress::percent(p / t * 100.0),
            (Some(p), _) => Progress::percent(p),
            (None, _) => Progress::Indeterminate,
        }
    }

    /// Clamped percentage. NaN is treated as indeterminate.
    pub fn percent(value: f64) -> Self {
        if value.is_nan() {
            Progress::Indeterminate
        } else {
            Progress::Percent(value.clamp(0.0, 100.0))
        }
    }

    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Progress::Percent(p) => Some(*p),
            Progress::Indeterminate => None,
        }
    }
}

/// Decision state of a tool approval. Terminal once resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}
