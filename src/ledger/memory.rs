//! In-process ledger emulator for dev mode and tests.
//!
//! Implements the progress contract's methods and revert vocabulary
//! against in-memory state. Gas estimation dry-runs the same validation
//! a submission would, so eligibility reverts surface at estimate time
//! exactly as they do on a real ledger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::{classify_revert, ChainClient, TxOptions, TxReceipt};
use crate::types::{Result, TalmidError, MODULE_COUNT};

const BASE_GAS: u64 = 21_000;

#[derive(Debug, Clone)]
struct TokenState {
    owner: String,
    base_uri: String,
    token_uri: String,
    module_scores: [u64; MODULE_COUNT],
    completed: [bool; MODULE_COUNT],
    is_certified: bool,
}

/// In-memory [`ChainClient`] with contract semantics
#[derive(Default)]
pub struct MemoryLedger {
    tokens: Mutex<HashMap<u64, TokenState>>,
    nonce: AtomicU64,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of minted tokens (test observability)
    pub fn token_count(&self) -> usize {
        self.tokens.lock().expect("ledger lock poisoned").len()
    }

    fn revert(reason: &str) -> TalmidError {
        TalmidError::Revert {
            reason: classify_revert(reason),
        }
    }

    /// Execute a contract method. `commit = false` dry-runs validation
    /// without mutating state (gas estimation path).
    fn execute(&self, method: &str, args: &[Value], commit: bool) -> Result<Value> {
        let mut tokens = self.tokens.lock().expect("ledger lock poisoned");
        match method {
            "mintNFT" => {
                let owner = arg_str(args, 0)?;
                let token_id = arg_u64(args, 1)?;
                let base_uri = arg_str(args, 2)?;
                if tokens.contains_key(&token_id) {
                    return Err(Self::revert("Token already exists"));
                }
                if commit {
                    tokens.insert(
                        token_id,
                        TokenState {
                            owner: owner.to_string(),
                            base_uri: base_uri.to_string(),
                            token_uri: String::new(),
                            module_scores: [0; MODULE_COUNT],
                            completed: [false; MODULE_COUNT],
                            is_certified: false,
                        },
                    );
                }
                Ok(Value::Null)
            }
            "updateModuleScore" => {
                let token_id = arg_u64(args, 0)?;
                let module = arg_u64(args, 1)?;
                let score = arg_u64(args, 2)?;
                let token = tokens
                    .get_mut(&token_id)
                    .ok_or_else(|| Self::revert("Token does not exist"))?;
                if module < 1 || module > MODULE_COUNT as u64 {
                    return Err(Self::revert("Module index out of range"));
                }
                let idx = (module - 1) as usize;
                if token.completed[idx] {
                    return Err(Self::revert("Module already completed"));
                }
                if commit {
                    token.module_scores[idx] = score;
                    token.completed[idx] = true;
                }
                Ok(Value::Null)
            }
            "certify" => {
                let token_id = arg_u64(args, 0)?;
                let token = tokens
                    .get_mut(&token_id)
                    .ok_or_else(|| Self::revert("Token does not exist"))?;
                if token.is_certified {
                    return Err(Self::revert("Token already certified"));
                }
                if !token.completed.iter().all(|c| *c) {
                    return Err(Self::revert("All modules must be completed"));
                }
                if commit {
                    token.is_certified = true;
                }
                Ok(Value::Null)
            }
            "setTokenURI" => {
                let token_id = arg_u64(args, 0)?;
                let uri = arg_str(args, 1)?;
                let token = tokens
                    .get_mut(&token_id)
                    .ok_or_else(|| Self::revert("Token does not exist"))?;
                if commit {
                    token.token_uri = uri.to_string();
                }
                Ok(Value::Null)
            }
            "getProgress" => {
                let token_id = arg_u64(args, 0)?;
                let token = tokens
                    .get(&token_id)
                    .ok_or_else(|| Self::revert("Token does not exist"))?;
                let completed = token.completed.iter().filter(|c| **c).count() as u64;
                Ok(json!({
                    "moduleScores": token.module_scores,
                    "isCompleted": token.completed,
                    "numCompletedModules": completed,
                    "isCertified": token.is_certified,
                }))
            }
            "ownerOf" => {
                let token_id = arg_u64(args, 0)?;
                let token = tokens
                    .get(&token_id)
                    .ok_or_else(|| Self::revert("Token does not exist"))?;
                Ok(json!(token.owner))
            }
            "getBaseURI" => {
                let token_id = arg_u64(args, 0)?;
                let token = tokens
                    .get(&token_id)
                    .ok_or_else(|| Self::revert("Token does not exist"))?;
                Ok(json!(token.base_uri))
            }
            "getTokenURI" => {
                let token_id = arg_u64(args, 0)?;
                let token = tokens
                    .get(&token_id)
                    .ok_or_else(|| Self::revert("Token does not exist"))?;
                Ok(json!(format!("{}{}", token.base_uri, token.token_uri)))
            }
            other => Err(TalmidError::Validation(format!(
                "unknown contract method: {other}"
            ))),
        }
    }
}

fn arg_u64(args: &[Value], index: usize) -> Result<u64> {
    args.get(index)
        .and_then(Value::as_u64)
        .ok_or_else(|| TalmidError::Validation(format!("argument {index} must be an integer")))
}

fn arg_str(args: &[Value], index: usize) -> Result<&str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| TalmidError::Validation(format!("argument {index} must be a string")))
}

#[async_trait]
impl ChainClient for MemoryLedger {
    async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.execute(method, args, false)
    }

    async fn estimate_gas(&self, method: &str, args: &[Value], _from: &str) -> Result<u64> {
        self.execute(method, args, false)?;
        Ok(BASE_GAS + 1_000 * method.len() as u64)
    }

    async fn send(&self, method: &str, args: &[Value], opts: &TxOptions) -> Result<TxReceipt> {
        self.execute(method, args, true)?;
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(nonce.to_be_bytes());
        hasher.update(method.as_bytes());
        hasher.update(Value::Array(args.to_vec()).to_string().as_bytes());
        Ok(TxReceipt {
            tx_hash: format!("0x{}", hex::encode(hasher.finalize())),
            gas_used: opts.gas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RevertReason;

    fn opts() -> TxOptions {
        TxOptions {
            from: "0xdeployer".into(),
            gas: BASE_GAS,
        }
    }

    #[tokio::test]
    async fn mint_then_duplicate_reverts() {
        let ledger = MemoryLedger::new();
        let args = [json!("0xdeployer"), json!(1), json!("https://gw/")];
        ledger.send("mintNFT", &args, &opts()).await.unwrap();

        let err = ledger.send("mintNFT", &args, &opts()).await.unwrap_err();
        assert!(matches!(
            err,
            TalmidError::Revert {
                reason: RevertReason::TokenExists
            }
        ));
        assert_eq!(ledger.token_count(), 1);
    }

    #[tokio::test]
    async fn estimate_does_not_commit() {
        let ledger = MemoryLedger::new();
        let args = [json!("0xdeployer"), json!(1), json!("https://gw/")];
        ledger
            .estimate_gas("mintNFT", &args, "0xdeployer")
            .await
            .unwrap();
        assert_eq!(ledger.token_count(), 0);
    }

    #[tokio::test]
    async fn score_update_marks_module_completed() {
        let ledger = MemoryLedger::new();
        let mint = [json!("0xdeployer"), json!(1), json!("https://gw/")];
        ledger.send("mintNFT", &mint, &opts()).await.unwrap();

        let update = [json!(1), json!(3), json!(88)];
        ledger.send("updateModuleScore", &update, &opts()).await.unwrap();

        let progress = ledger.call("getProgress", &[json!(1)]).await.unwrap();
        assert_eq!(progress["moduleScores"][2], json!(88));
        assert_eq!(progress["isCompleted"][2], json!(true));
        assert_eq!(progress["numCompletedModules"], json!(1));

        let err = ledger
            .send("updateModuleScore", &update, &opts())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TalmidError::Revert {
                reason: RevertReason::ModuleCompleted
            }
        ));
    }

    #[tokio::test]
    async fn certify_requires_all_modules() {
        let ledger = MemoryLedger::new();
        let mint = [json!("0xdeployer"), json!(1), json!("https://gw/")];
        ledger.send("mintNFT", &mint, &opts()).await.unwrap();

        let err = ledger.send("certify", &[json!(1)], &opts()).await.unwrap_err();
        assert!(matches!(
            err,
            TalmidError::Revert {
                reason: RevertReason::ModulesIncomplete
            }
        ));

        for module in 1..=MODULE_COUNT as u64 {
            let update = [json!(1), json!(module), json!(15)];
            ledger.send("updateModuleScore", &update, &opts()).await.unwrap();
        }
        ledger.send("certify", &[json!(1)], &opts()).await.unwrap();

        let progress = ledger.call("getProgress", &[json!(1)]).await.unwrap();
        assert_eq!(progress["isCertified"], json!(true));

        let err = ledger.send("certify", &[json!(1)], &opts()).await.unwrap_err();
        assert!(matches!(
            err,
            TalmidError::Revert {
                reason: RevertReason::AlreadyCertified
            }
        ));
    }

    #[tokio::test]
    async fn token_uri_concatenates_base_and_cid() {
        let ledger = MemoryLedger::new();
        let mint = [json!("0xdeployer"), json!(1), json!("https://example.com/")];
        ledger.send("mintNFT", &mint, &opts()).await.unwrap();
        ledger
            .send("setTokenURI", &[json!(1), json!("metadata.json")], &opts())
            .await
            .unwrap();

        let uri = ledger.call("getTokenURI", &[json!(1)]).await.unwrap();
        assert_eq!(uri, json!("https://example.com/metadata.json"));
    }

    #[tokio::test]
    async fn unknown_token_reverts() {
        let ledger = MemoryLedger::new();
        let err = ledger.call("getProgress", &[json!(7)]).await.unwrap_err();
        assert!(matches!(
            err,
            TalmidError::Revert {
                reason: RevertReason::TokenUnknown
            }
        ));
    }
}
