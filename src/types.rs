//! Shared domain types, error taxonomy, and result alias.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::RevertReason;

/// Number of curriculum modules tracked per token
pub const MODULE_COUNT: usize = 10;

/// Ledger-side view of a progress token.
///
/// Mutated only through signed ledger transactions. Completion flags
/// transition false to true exactly once; a completed module's score is
/// frozen; `is_certified` never reverts once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: u64,
    pub owner: String,
    /// Gateway prefix recorded at mint time; `base_uri + cid` is the
    /// durable metadata pointer once a snapshot is uploaded
    pub base_uri: String,
    pub module_scores: [u64; MODULE_COUNT],
    pub completed: [bool; MODULE_COUNT],
    pub num_completed_modules: u8,
    pub is_certified: bool,
}

/// Talmid error taxonomy.
///
/// Per-item failures inside batch operations are captured in outcome
/// lists, not propagated; the variants here describe a single failed
/// operation. Only `Transient`, retryable HTTP failures, and 5xx/429
/// server responses are eligible for retry.
#[derive(Debug, Error)]
pub enum TalmidError {
    /// Malformed caller input; fails fast with no side effects
    #[error("validation error: {0}")]
    Validation(String),

    /// On-chain rejection, classified once at the ledger boundary
    #[error("ledger revert: {reason}")]
    Revert { reason: RevertReason },

    /// Certification attempted before all modules are complete
    #[error("not eligible for certification: {completed}/{required} modules completed")]
    NotEligible { completed: u8, required: u8 },

    /// Network failure that may succeed on retry
    #[error("transient network error: {0}")]
    Transient(String),

    /// Requested pin, CID, or token is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Retrieved content does not match the canonical document shape
    #[error("schema parse error: {0}")]
    SchemaParse(String),

    /// Missing or invalid startup configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote service returned an error status
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Remote service answered with something unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TalmidError {
    /// Whether a bounded retry with backoff is worthwhile.
    ///
    /// Reverts, validation failures, and schema mismatches are permanent;
    /// retrying them only repeats the rejection.
    pub fn is_transient(&self) -> bool {
        match self {
            TalmidError::Transient(_) => true,
            TalmidError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            TalmidError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for talmid operations
pub type Result<T> = std::result::Result<T, TalmidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TalmidError::Transient("connection reset".into()).is_transient());
        assert!(TalmidError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(TalmidError::Server {
            status: 429,
            message: "rate limited".into()
        }
        .is_transient());
    }

    #[test]
    fn permanent_classification() {
        assert!(!TalmidError::Validation("bad count".into()).is_transient());
        assert!(!TalmidError::NotFound("pin".into()).is_transient());
        assert!(!TalmidError::SchemaParse("label".into()).is_transient());
        assert!(!TalmidError::Server {
            status: 404,
            message: "missing".into()
        }
        .is_transient());
        assert!(!TalmidError::Revert {
            reason: RevertReason::TokenExists
        }
        .is_transient());
    }
}
