//! Session state controllers.
//!
//! The conversation log is owned by [`Conversation`]; the other controllers
//! hold only their own bookkeeping and go through its append/update methods
//! to touch entries.

pub mod agent;
pub mod conversation;
pub mod elicitation;
pub mod timers;
pub mod tools;

pub use agent::{AgentController, StopSignal};
pub use conversation::{Conversation, StreamPhase};
pub use elicitation::ElicitationController;
pub use timers::{TimerEvent, TimerQueue};
pub use tools::{ToolLifecycle, CANCELLED_ERROR, DEFAULT_REJECTION_REASON};
