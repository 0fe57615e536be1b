//! Errors returned from user-initiated session operations.
//!
//! These are the only errors a presentation layer has to handle: the user
//! asked for something that cannot be done right now (approve an approval
//! that is already resolved, accept an elicitation with required fields
//! missing, answer when no question is pending).

use thiserror::Error;

/// Failure of a user-initiated operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    /// No approval with this tool call id is waiting for a decision.
    #[error("No pending approval for tool call {0}")]
    NoPendingApproval(String),

    /// No elicitation request is active.
    #[error("No elicitation request is active")]
    NoActiveElicitation,

    /// The elicitation has no field with this name.
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// A field value could not be converted to the field's kind.
    #[error("Invalid value for '{field}': {message}")]
    InvalidFieldValue { field: String, message: String },

    /// Required fields are still empty.
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    /// The agent has not asked anything.
    #[error("The agent has no pending question")]
    NoPendingQuestion,

    /// The agent is not running and nothing is pending.
    #[error("No agent run to stop")]
    NothingToStop,

    /// No user message with this client id exists.
    #[error("No user message {0}")]
    UnknownMessage(String),
}

impl OperationError {
    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            OperationError::NoPendingApproval(_) => "E_OP_NO_APPROVAL",
            OperationError::NoActiveElicitation => "E_OP_NO_ELICITATION",
            OperationError::UnknownField(_) => "E_OP_UNKNOWN_FIELD",
            OperationError::InvalidFieldValue { .. } => "E_OP_INVALID_FIELD",
            OperationError::MissingRequiredFields(_) => "E_OP_MISSING_FIELDS",
            OperationError::NoPendingQuestion => "E_OP_NO_QUESTION",
            OperationError::NothingToStop => "E_OP_NOTHING_TO_STOP",
            OperationError::UnknownMessage(_) => "E_OP_UNKNOWN_MESSAGE",
        }
    }
}
