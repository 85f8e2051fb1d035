//! Unified error taxonomy for the dispatch engine.
//!
//! `CommandError` is the funnel every command execution failure flows
//! through; `Command::run` converts each variant into exactly one
//! user-facing (or silent) outcome. `DispatchError` covers registration
//! misuse at the dispatcher boundary.

use crate::check::Check;
use crate::transport::TransportError;
use std::sync::Arc;
use thiserror::Error;

/// Failures arising while executing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A pre-condition attached to the command failed. Carries the
    /// specific check so its message can be reported.
    #[error("failed check: {}", .0.name)]
    FailedCheck(Arc<Check>),

    /// Cooperative cancellation raised by the handler itself, with an
    /// optional user-facing message.
    #[error("safe cancellation: {0:?}")]
    Cancelled(Option<String>),

    /// An external deadline expired.
    #[error("operation timed out")]
    Timeout,

    /// The triggering message was edited mid-execution and the run was
    /// cancelled by the dispatcher. Resolved silently.
    #[error("superseded by message edit")]
    Superseded,

    /// The context does not carry what the operation needs (e.g. a reply
    /// without a channel).
    #[error("invalid context: {0}")]
    InvalidContext(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Anything unexpected. The full chain is logged; the user sees only
    /// the single-line rendering.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommandError {
    /// Cancellation with the stock user-cancelled message.
    pub fn user_cancelled() -> Self {
        Self::Cancelled(Some("User cancelled the session!".to_string()))
    }

    /// Cancellation with the stock response-timeout message.
    pub fn response_timed_out() -> Self {
        Self::Cancelled(Some(
            "Session timed out waiting for user response!".to_string(),
        ))
    }
}

/// Result type for command handlers and hooks.
pub type CommandResult = Result<(), CommandError>;

/// Errors at the dispatcher registration boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("a module named '{0}' is already registered")]
    DuplicateModule(String),

    #[error("no module named '{0}' is registered")]
    UnknownModule(String),
}
