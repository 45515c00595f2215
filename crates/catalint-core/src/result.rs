//! Result type alias for catalint operations

use crate::error::CatalintError;

/// Standard Result type for catalint operations
pub type Result<T> = std::result::Result<T, CatalintError>;

/// Extension trait for Result to provide additional convenience methods
pub trait ResultExt<T> {
    /// Turn a recoverable error into `Ok(None)`, logging it
    fn recoverable(self) -> Result<Option<T>>;

    /// Log the error and continue with None
    fn log_and_continue(self) -> Option<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn recoverable(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                tracing::warn!("Recoverable error: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn log_and_continue(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                if err.is_recoverable() {
                    tracing::warn!("Continuing after error: {}", err);
                } else {
                    tracing::error!("{}", err);
                }
                None
            }
        }
    }
}
