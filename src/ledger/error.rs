//! Error types for redemption processing.

use thiserror::Error;

use crate::amount::Credits;
use crate::model::UserId;

/// Top-level error returned by [`Ledger::apply`](super::Ledger::apply).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("balance sync failed: {0}")]
    Sync(#[from] AuthorityError),

    #[error("redemption failed: {0}")]
    Redemption(#[from] RedemptionError),
}

/// Error during a single redemption attempt.
#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("invalid amount '{0}': expected a positive whole number of credits")]
    InvalidAmount(String),

    #[error("amount {requested} is below the minimum of {minimum} credits")]
    BelowMinimum { requested: Credits, minimum: Credits },

    #[error("insufficient credits: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Credits,
        requested: Credits,
    },

    #[error("redemption rejected: {0}")]
    Rejected(#[from] AuthorityError),

    #[error("a redemption for user {0} is already being submitted")]
    AttemptInFlight(UserId),
}

impl RedemptionError {
    /// Whether the error was raised before anything was sent to the authority.
    pub fn is_local(&self) -> bool {
        !matches!(self, RedemptionError::Rejected(_))
    }
}

/// Failure talking to the remote credits authority.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error(
        "authority returned status {status}: {}",
        .reason.as_deref().unwrap_or("no reason given")
    )]
    Status { status: u16, reason: Option<String> },

    #[error("{0}")]
    Rejected(String),

    #[error("unknown user {0}")]
    UnknownUser(UserId),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl AuthorityError {
    /// Human-readable reason supplied by the authority, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            AuthorityError::Status { reason, .. } => reason.as_deref(),
            AuthorityError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthorityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthorityError::Timeout
        } else if err.is_decode() {
            AuthorityError::Decode(err.to_string())
        } else {
            AuthorityError::Transport(err.to_string())
        }
    }
}
