//! Error types for scheduler operations.

use thiserror::Error;

/// Errors reported synchronously to the caller of a scheduler operation.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start()` was called on a task that is already starting or running.
    #[error("task {0} is already running")]
    AlreadyRunning(String),
    /// `start()` was called on a task that has already stopped.
    #[error("task {0} has already stopped")]
    AlreadyStopped(String),
    /// A focus operation named a contender the arbitrator does not know.
    #[error("focus contender {0} is not registered")]
    UnregisteredContender(String),
    /// A lifecycle hook failed while it was run synchronously for the caller.
    #[error("{hook} hook failed: {reason}")]
    HookFailed {
        /// Name of the hook (`start`, `stop`, ...).
        hook: &'static str,
        /// Error description.
        reason: String,
    },
    /// Host configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A scheduled wait was cancelled before it fired.
    #[error("scheduled wait was cancelled")]
    Cancelled,
    /// The dispatcher has been torn down.
    #[error("dispatcher has shut down")]
    ShutDown,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Result returned by every job callback and lifecycle hook.
pub type CallbackResult = anyhow::Result<()>;
