use thiserror::Error;

pub type CommandResult<T> = Result<T, CommandError>;

/// Why a room command was not applied.
///
/// A failed command never changes room state, and is only ever reported back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command or the content it references is malformed or unresolvable
    #[error("{0}")]
    Validation(String),
    /// The content is valid, but not permitted in this room
    #[error("{0}")]
    PolicyViolation(String),
    /// The room, track, or session doesn't exist
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    /// The requester lacks the privilege required by the command
    #[error("{0}")]
    Unauthorized(String),
    /// An external collaborator timed out or is unavailable, retrying is safe
    #[error("{0}")]
    Transient(String),
}

impl CommandError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    /// A stable machine readable code, sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "BAD_REQUEST",
            Self::PolicyViolation(_) => "POLICY_VIOLATION",
            Self::NotFound { resource: "room" } => "ROOM_NOT_FOUND",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Transient(_) => "TRANSIENT",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
