use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NoSelection,
    NoMoreItems,
    NotFound,
    Internal,
}

/// Wire-serializable error returned on the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors raised by controller command handlers. All are recoverable and
/// leave the meeting state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no agenda item is selected")]
    NoSelection,
    #[error("no more agenda items")]
    NoMoreItems,
}

impl CommandError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CommandError::Validation(_) => ErrorCode::Validation,
            CommandError::NoSelection => ErrorCode::NoSelection,
            CommandError::NoMoreItems => ErrorCode::NoMoreItems,
        }
    }
}

impl From<CommandError> for ApiError {
    fn from(value: CommandError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
