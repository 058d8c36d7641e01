//! Ledger boundary: chain client trait and revert classification.
//!
//! Transaction signing, nonce ordering, and gas pricing live behind the
//! signing agent. This module owns the call surface consumed by the
//! progress services and maps raw revert reason strings into structured
//! variants exactly once; callers branch on [`RevertReason`] variants
//! and never re-parse strings.

pub mod agent;
pub mod memory;

pub use agent::{AgentClient, AgentConfig};
pub use memory::MemoryLedger;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Result;

/// Context for a state-changing transaction
#[derive(Debug, Clone)]
pub struct TxOptions {
    /// Account the agent signs from
    pub from: String,
    /// Gas limit, normally the preceding estimate
    pub gas: u64,
}

/// Receipt for a mined transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub gas_used: u64,
}

/// Client surface for the progress contract.
///
/// Transactions from one signing account are ordered by nonce; callers
/// must keep submissions sequential. Reads may run concurrently with
/// writes.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read-only contract call
    async fn call(&self, method: &str, args: &[Value]) -> Result<Value>;

    /// Estimate gas for a state-changing call; reverts surface here too
    async fn estimate_gas(&self, method: &str, args: &[Value], from: &str) -> Result<u64>;

    /// Sign and submit a transaction, waiting for the receipt
    async fn send(&self, method: &str, args: &[Value], opts: &TxOptions) -> Result<TxReceipt>;
}

/// Structured classification of contract revert reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    /// Token id is already minted
    TokenExists,
    /// Token id was never minted
    TokenUnknown,
    /// Module is already completed; its score is frozen
    ModuleCompleted,
    /// Certification requires all modules completed first
    ModulesIncomplete,
    /// Token is already certified
    AlreadyCertified,
    /// Unrecognized revert, raw reason preserved
    Other(String),
}

/// Map a raw revert reason string into the structured taxonomy.
///
/// Reason strings are matched here and nowhere else.
pub fn classify_revert(reason: &str) -> RevertReason {
    if reason.contains("Token already exists") {
        RevertReason::TokenExists
    } else if reason.contains("Token does not exist") {
        RevertReason::TokenUnknown
    } else if reason.contains("Module already completed") {
        RevertReason::ModuleCompleted
    } else if reason.contains("All modules must be completed") {
        RevertReason::ModulesIncomplete
    } else if reason.contains("Token already certified") {
        RevertReason::AlreadyCertified
    } else {
        RevertReason::Other(reason.to_string())
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertReason::TokenExists => write!(f, "token already exists"),
            RevertReason::TokenUnknown => write!(f, "token does not exist"),
            RevertReason::ModuleCompleted => write!(f, "module already completed"),
            RevertReason::ModulesIncomplete => write!(f, "all modules must be completed"),
            RevertReason::AlreadyCertified => write!(f, "token already certified"),
            RevertReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_reasons() {
        assert_eq!(
            classify_revert("Token already exists"),
            RevertReason::TokenExists
        );
        assert_eq!(
            classify_revert("revert: Token does not exist"),
            RevertReason::TokenUnknown
        );
        assert_eq!(
            classify_revert("Module already completed"),
            RevertReason::ModuleCompleted
        );
        assert_eq!(
            classify_revert("All modules must be completed"),
            RevertReason::ModulesIncomplete
        );
        assert_eq!(
            classify_revert("Token already certified"),
            RevertReason::AlreadyCertified
        );
    }

    #[test]
    fn preserves_unknown_reasons() {
        let reason = classify_revert("Ownable: caller is not the owner");
        assert_eq!(
            reason,
            RevertReason::Other("Ownable: caller is not the owner".to_string())
        );
    }
}
