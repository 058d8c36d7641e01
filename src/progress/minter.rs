//! Token batch minting with per-item outcome classification.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::ledger::{ChainClient, RevertReason, TxOptions};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{Result, TalmidError};

/// Upper bound on tokens minted in one batch
pub const MAX_BATCH: u64 = 10;

/// Per-token result of a mint batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintOutcome {
    pub token_id: u64,
    pub status: MintStatus,
}

/// What happened to one token id in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintStatus {
    /// Mint transaction mined
    Minted { gas_used: u64 },
    /// Ledger already holds this id; expected on re-runs, not a failure
    AlreadyExists,
    /// Estimation or submission failed for this id only
    Failed(String),
}

/// Issues bounded batches of mint transactions
pub struct TokenMinter {
    chain: Arc<dyn ChainClient>,
    signer: String,
    retry: RetryPolicy,
}

impl TokenMinter {
    /// Create a minter signing from the given account
    pub fn new(chain: Arc<dyn ChainClient>, signer: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            chain,
            signer: signer.into(),
            retry,
        }
    }

    /// Mint token ids `1..=count`, strictly sequentially.
    ///
    /// Sequential submission keeps nonce ordering on the single signing
    /// account. The batch never aborts early: every id is attempted and
    /// the full outcome list is returned.
    pub async fn mint_batch(&self, count: u64, base_uri: &str) -> Result<Vec<MintOutcome>> {
        if count < 1 || count > MAX_BATCH {
            return Err(TalmidError::Validation(format!(
                "batch count must be between 1 and {MAX_BATCH}, got {count}"
            )));
        }
        if base_uri.is_empty() {
            return Err(TalmidError::Validation("base URI must not be empty".into()));
        }

        let mut outcomes = Vec::with_capacity(count as usize);
        for token_id in 1..=count {
            let status = self.mint_one(token_id, base_uri).await;
            match &status {
                MintStatus::Minted { gas_used } => {
                    info!(token_id, gas_used, "token minted");
                }
                MintStatus::AlreadyExists => {
                    info!(token_id, "token already exists, skipping");
                }
                MintStatus::Failed(reason) => {
                    warn!(token_id, reason = %reason, "mint failed");
                }
            }
            outcomes.push(MintOutcome { token_id, status });
        }
        Ok(outcomes)
    }

    async fn mint_one(&self, token_id: u64, base_uri: &str) -> MintStatus {
        let args = [json!(self.signer), json!(token_id), json!(base_uri)];

        let gas = match with_retry(&self.retry, "estimate_gas(mintNFT)", || {
            self.chain.estimate_gas("mintNFT", &args, &self.signer)
        })
        .await
        {
            Ok(gas) => gas,
            Err(TalmidError::Revert {
                reason: RevertReason::TokenExists,
            }) => return MintStatus::AlreadyExists,
            Err(e) => return MintStatus::Failed(e.to_string()),
        };
        debug!(token_id, gas, "minting token");

        let opts = TxOptions {
            from: self.signer.clone(),
            gas,
        };
        match with_retry(&self.retry, "send(mintNFT)", || {
            self.chain.send("mintNFT", &args, &opts)
        })
        .await
        {
            Ok(receipt) => MintStatus::Minted {
                gas_used: receipt.gas_used,
            },
            Err(TalmidError::Revert {
                reason: RevertReason::TokenExists,
            }) => MintStatus::AlreadyExists,
            Err(e) => MintStatus::Failed(e.to_string()),
        }
    }
}
