use thiserror::Error;

/// Centralized error types for the platform core
///
/// All errors in the conversation core are converted to this enum for
/// consistent handling. Uses `thiserror` for display formatting.
///
/// Validation and policy errors (`Validation`, `BotBlocked`, `UserBlocked`,
/// `SessionExpired`) are handled inside the router/guard and never escalate
/// past the conversation boundary. `StoreUnavailable` is an infra failure
/// and must never be conflated with `NotFound` (absent key).
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed user input (token, keyboard, name); recoverable, re-prompt
    #[error("Validation error: {0}")]
    Validation(String),

    /// No state/template/session for the requested key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backing store connectivity failure; transition aborted
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    /// Target bot record is inactive or blocked
    #[error("бот заблокирован")]
    BotBlocked,

    /// ConversationState carries the poison `is_blocked` flag
    #[error("пользователь заблокирован")]
    UserBlocked,

    /// Auth session is past `expires_at` (or was never created)
    #[error("сессия истекла")]
    SessionExpired,

    /// Auth sub-protocol failure (send-code / verify-code / timeout); retryable
    #[error("External protocol error: {0}")]
    ExternalProtocol(String),

    /// Record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}
