use thiserror::Error;
use tracing::{error, warn};

use crate::sdk::SdkError;

/// Domain-specific errors for the push bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("invalid argument at position {position}: expected {expected}")]
    InvalidArgument {
        position: usize,
        expected: &'static str,
    },

    #[error("missing string resource: {0}")]
    MissingResource(String),

    #[error(transparent)]
    Sdk(#[from] SdkError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the caller doesn't need the
/// error. Offered to host integrations; the bridge's own handlers propagate
/// everything into reply channels instead.
#[allow(dead_code)]
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_message_names_position_and_type() {
        let err = BridgeError::InvalidArgument {
            position: 1,
            expected: "object",
        };
        assert_eq!(
            err.to_string(),
            "invalid argument at position 1: expected object"
        );
    }

    #[test]
    fn sdk_error_passes_through_transparently() {
        let err: BridgeError = SdkError("installation save failed".to_string()).into();
        assert_eq!(err.to_string(), "installation save failed");
    }

    #[test]
    fn log_err_maps_result_to_option() {
        let ok: std::result::Result<i32, &str> = Ok(7);
        assert_eq!(ok.log_err(), Some(7));

        let err: std::result::Result<i32, &str> = Err("boom");
        assert_eq!(err.log_err(), None);
    }
}
