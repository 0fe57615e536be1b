//! Result type alias for session operations.

use super::tether_error::TetherError;

/// Type alias for Results using TetherError.
pub type TetherResult<T> = Result<T, TetherError>;
