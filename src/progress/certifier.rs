//! Certification gating.
//!
//! Certification is terminal: once the transaction lands, the flag never
//! reverts. The evaluator checks eligibility against a fresh progress
//! read so an ineligible token costs no gas, and absorbs the
//! already-certified revert so re-runs stay quiet.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use super::tracker::read_progress;
use crate::ledger::{ChainClient, RevertReason, TxOptions};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{Result, TalmidError, MODULE_COUNT};

/// Result of a certification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertifyOutcome {
    /// Certification transaction mined
    Certified { gas_used: u64 },
    /// Token was certified before this call; nothing submitted
    AlreadyCertified,
}

/// Gates the certification transaction on full module completion
pub struct CertificationEvaluator {
    chain: Arc<dyn ChainClient>,
    signer: String,
    retry: RetryPolicy,
}

impl CertificationEvaluator {
    /// Create an evaluator signing from the given account
    pub fn new(chain: Arc<dyn ChainClient>, signer: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            chain,
            signer: signer.into(),
            retry,
        }
    }

    /// Certify a token once all ten modules are complete.
    ///
    /// Ineligible tokens fail with [`TalmidError::NotEligible`] before
    /// any transaction is issued; the call is safe to retry after more
    /// modules complete. Re-certifying is a no-op, not an error.
    pub async fn certify(&self, token_id: u64) -> Result<CertifyOutcome> {
        let view = read_progress(self.chain.as_ref(), &self.retry, token_id).await?;

        if view.is_certified {
            debug!(token_id, "token already certified, nothing to do");
            return Ok(CertifyOutcome::AlreadyCertified);
        }
        if view.num_completed_modules < MODULE_COUNT as u8 {
            return Err(TalmidError::NotEligible {
                completed: view.num_completed_modules,
                required: MODULE_COUNT as u8,
            });
        }

        let args = [json!(token_id)];
        let gas = match with_retry(&self.retry, "estimate_gas(certify)", || {
            self.chain.estimate_gas("certify", &args, &self.signer)
        })
        .await
        {
            Ok(gas) => gas,
            // Lost race: certified between our read and the estimate
            Err(TalmidError::Revert {
                reason: RevertReason::AlreadyCertified,
            }) => return Ok(CertifyOutcome::AlreadyCertified),
            Err(e) => return Err(e),
        };

        let opts = TxOptions {
            from: self.signer.clone(),
            gas,
        };
        match with_retry(&self.retry, "send(certify)", || {
            self.chain.send("certify", &args, &opts)
        })
        .await
        {
            Ok(receipt) => {
                info!(token_id, gas_used = receipt.gas_used, "token certified");
                Ok(CertifyOutcome::Certified {
                    gas_used: receipt.gas_used,
                })
            }
            Err(TalmidError::Revert {
                reason: RevertReason::AlreadyCertified,
            }) => Ok(CertifyOutcome::AlreadyCertified),
            Err(e) => Err(e),
        }
    }
}
