//! Per-module score tracking against the ledger.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::ledger::{ChainClient, RevertReason, TxOptions};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{Result, TalmidError, Token, MODULE_COUNT};

/// Per-module result of a score update pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleUpdateOutcome {
    /// Module number, 1-based
    pub module: u8,
    pub status: ModuleUpdateStatus,
}

/// What happened to one module in an update pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleUpdateStatus {
    /// Score written and the module marked completed
    Updated { gas_used: u64 },
    /// Module was already completed; its score is frozen
    Skipped,
    /// Estimation or submission failed for this module only
    Failed(String),
}

/// Contract view of `getProgress`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressView {
    pub module_scores: [u64; MODULE_COUNT],
    pub is_completed: [bool; MODULE_COUNT],
    pub num_completed_modules: u8,
    pub is_certified: bool,
}

/// Read the raw progress view for a token
pub(crate) async fn read_progress(
    chain: &dyn ChainClient,
    retry: &RetryPolicy,
    token_id: u64,
) -> Result<ProgressView> {
    let args = [json!(token_id)];
    let raw = with_retry(retry, "call(getProgress)", || {
        chain.call("getProgress", &args)
    })
    .await?;
    Ok(serde_json::from_value(raw)?)
}

/// Reads and updates per-module scores and completion flags
pub struct ProgressTracker {
    chain: Arc<dyn ChainClient>,
    signer: String,
    retry: RetryPolicy,
}

impl ProgressTracker {
    /// Create a tracker signing from the given account
    pub fn new(chain: Arc<dyn ChainClient>, signer: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            chain,
            signer: signer.into(),
            retry,
        }
    }

    /// Read-only mirror of the token's ledger state
    pub async fn get_progress(&self, token_id: u64) -> Result<Token> {
        let view = read_progress(self.chain.as_ref(), &self.retry, token_id).await?;

        let args = [json!(token_id)];
        let owner = with_retry(&self.retry, "call(ownerOf)", || {
            self.chain.call("ownerOf", &args)
        })
        .await?;
        let base_uri = with_retry(&self.retry, "call(getBaseURI)", || {
            self.chain.call("getBaseURI", &args)
        })
        .await?;

        Ok(Token {
            token_id,
            owner: as_string(owner)?,
            base_uri: as_string(base_uri)?,
            module_scores: view.module_scores,
            completed: view.is_completed,
            num_completed_modules: view.num_completed_modules,
            is_certified: view.is_certified,
        })
    }

    /// The token's durable metadata pointer, `base_uri + cid`
    pub async fn token_uri(&self, token_id: u64) -> Result<String> {
        let args = [json!(token_id)];
        let uri = with_retry(&self.retry, "call(getTokenURI)", || {
            self.chain.call("getTokenURI", &args)
        })
        .await?;
        as_string(uri)
    }

    /// Update scores for modules 1..=10 in ascending order.
    ///
    /// Completed modules are skipped from a fresh progress read, so
    /// re-running with the same scores is a no-op pass. Failures are
    /// recorded per module and the pass continues; modules are
    /// independent and ordering only makes the report deterministic.
    pub async fn update_scores(
        &self,
        token_id: u64,
        scores: &[u64; MODULE_COUNT],
    ) -> Result<Vec<ModuleUpdateOutcome>> {
        let view = read_progress(self.chain.as_ref(), &self.retry, token_id).await?;

        let mut outcomes = Vec::with_capacity(MODULE_COUNT);
        for module in 1..=MODULE_COUNT as u8 {
            let idx = (module - 1) as usize;
            let status = if view.is_completed[idx] {
                debug!(token_id, module, "module already completed, skipping");
                ModuleUpdateStatus::Skipped
            } else {
                self.update_one(token_id, module, scores[idx]).await
            };
            match &status {
                ModuleUpdateStatus::Updated { gas_used } => {
                    info!(token_id, module, score = scores[idx], gas_used, "module score updated");
                }
                ModuleUpdateStatus::Skipped => {}
                ModuleUpdateStatus::Failed(reason) => {
                    warn!(token_id, module, reason = %reason, "module score update failed");
                }
            }
            outcomes.push(ModuleUpdateOutcome { module, status });
        }
        Ok(outcomes)
    }

    async fn update_one(&self, token_id: u64, module: u8, score: u64) -> ModuleUpdateStatus {
        let args = [json!(token_id), json!(module), json!(score)];

        let gas = match with_retry(&self.retry, "estimate_gas(updateModuleScore)", || {
            self.chain.estimate_gas("updateModuleScore", &args, &self.signer)
        })
        .await
        {
            Ok(gas) => gas,
            // Lost race: completed between our read and the estimate
            Err(TalmidError::Revert {
                reason: RevertReason::ModuleCompleted,
            }) => return ModuleUpdateStatus::Skipped,
            Err(e) => return ModuleUpdateStatus::Failed(e.to_string()),
        };

        let opts = TxOptions {
            from: self.signer.clone(),
            gas,
        };
        match with_retry(&self.retry, "send(updateModuleScore)", || {
            self.chain.send("updateModuleScore", &args, &opts)
        })
        .await
        {
            Ok(receipt) => ModuleUpdateStatus::Updated {
                gas_used: receipt.gas_used,
            },
            Err(TalmidError::Revert {
                reason: RevertReason::ModuleCompleted,
            }) => ModuleUpdateStatus::Skipped,
            Err(e) => ModuleUpdateStatus::Failed(e.to_string()),
        }
    }
}

fn as_string(value: serde_json::Value) -> Result<String> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| TalmidError::InvalidResponse(format!("expected string, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::progress::{MintStatus, TokenMinter};

    async fn minted_ledger() -> Arc<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new());
        let minter = TokenMinter::new(Arc::clone(&ledger) as Arc<dyn ChainClient>, "0xdeployer", RetryPolicy::default());
        let outcomes = minter.mint_batch(1, "https://gw/").await.unwrap();
        assert!(matches!(outcomes[0].status, MintStatus::Minted { .. }));
        ledger
    }

    fn tracker(ledger: Arc<MemoryLedger>) -> ProgressTracker {
        ProgressTracker::new(ledger, "0xdeployer", RetryPolicy::default())
    }

    #[tokio::test]
    async fn fresh_token_has_no_progress() {
        let ledger = minted_ledger().await;
        let tracker = tracker(ledger);

        let token = tracker.get_progress(1).await.unwrap();
        assert_eq!(token.owner, "0xdeployer");
        assert_eq!(token.base_uri, "https://gw/");
        assert_eq!(token.num_completed_modules, 0);
        assert_eq!(token.module_scores, [0; MODULE_COUNT]);
        assert!(!token.is_certified);
    }

    #[tokio::test]
    async fn second_pass_skips_every_module() {
        let ledger = minted_ledger().await;
        let tracker = tracker(ledger);
        let scores = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

        let first = tracker.update_scores(1, &scores).await.unwrap();
        assert!(first
            .iter()
            .all(|o| matches!(o.status, ModuleUpdateStatus::Updated { .. })));

        let second = tracker.update_scores(1, &scores).await.unwrap();
        assert!(second
            .iter()
            .all(|o| o.status == ModuleUpdateStatus::Skipped));

        let token = tracker.get_progress(1).await.unwrap();
        assert_eq!(token.module_scores, scores);
        assert_eq!(token.num_completed_modules, MODULE_COUNT as u8);
    }
}
