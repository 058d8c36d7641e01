//! Metadata synchronization between the ledger and the content store.
//!
//! Write path: snapshot, canonical bytes, pin, then token-URI update so
//! `base_uri + cid` is the durable pointer. Read path: keyed pin lookup
//! by name, newest pin wins, fetch, decode. The two stores are only
//! eventually consistent; [`MetadataSynchronizer::await_pin`] covers the
//! listing lag after a fresh upload.

use std::str::FromStr;
use std::sync::Arc;

use cid::Cid;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::ledger::{ChainClient, RevertReason, TxOptions};
use crate::metadata::snapshot::MetadataSnapshot;
use crate::pinning::{ContentStore, PinRecord};
use crate::progress::ProgressTracker;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{Result, TalmidError, Token};

/// Per-token result of a bulk snapshot-and-upload pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub token_id: u64,
    pub status: SyncStatus,
}

/// What happened to one token in a bulk sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Snapshot pinned and the token URI updated
    Synced { cid: String },
    /// Token is not minted; nothing to snapshot
    Missing,
    /// Snapshot, pin, or URI update failed for this token only
    Failed(String),
}

/// Keeps the content store's view of a token in step with the ledger
pub struct MetadataSynchronizer {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn ContentStore>,
    signer: String,
    gateway_base_uri: String,
    retry: RetryPolicy,
}

impl MetadataSynchronizer {
    /// Create a synchronizer signing URI updates from the given account
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn ContentStore>,
        signer: impl Into<String>,
        gateway_base_uri: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            store,
            signer: signer.into(),
            gateway_base_uri: gateway_base_uri.into(),
            retry,
        }
    }

    /// Deterministic snapshot of a ledger token
    pub fn snapshot(&self, token: &Token) -> MetadataSnapshot {
        MetadataSnapshot::of(token)
    }

    /// Upload a snapshot, pin it, and point the token's URI at the CID.
    ///
    /// Re-uploading never overwrites: each call pins a new object under
    /// the same name, and retrieval picks the newest. The returned CID
    /// resolves through the gateway as `base_uri + cid`.
    pub async fn upload(&self, snapshot: &MetadataSnapshot) -> Result<String> {
        let bytes = snapshot.encode()?;
        let name = MetadataSnapshot::pin_name(snapshot.token_id);

        let cid = with_retry(&self.retry, "pin", || self.store.pin(&bytes, &name)).await?;
        Cid::from_str(&cid).map_err(|e| {
            TalmidError::InvalidResponse(format!("pinned under unparseable CID {cid}: {e}"))
        })?;

        let args = [json!(snapshot.token_id), json!(cid)];
        let gas = with_retry(&self.retry, "estimate_gas(setTokenURI)", || {
            self.chain.estimate_gas("setTokenURI", &args, &self.signer)
        })
        .await?;
        let opts = TxOptions {
            from: self.signer.clone(),
            gas,
        };
        with_retry(&self.retry, "send(setTokenURI)", || {
            self.chain.send("setTokenURI", &args, &opts)
        })
        .await?;

        info!(
            token_id = snapshot.token_id,
            cid = %cid,
            url = %format!("{}{}", self.gateway_base_uri, cid),
            "snapshot pinned and token URI updated"
        );
        Ok(cid)
    }

    /// Retrieve the current snapshot for a token.
    ///
    /// Multiple pins may share the token's name (re-uploads are not
    /// deduplicated); selection is deterministic: the most recent pin
    /// timestamp wins, ties broken by greatest CID.
    pub async fn retrieve(&self, token_id: u64) -> Result<MetadataSnapshot> {
        let name = MetadataSnapshot::pin_name(token_id);

        let pins = with_retry(&self.retry, "list_pins", || {
            self.store.list_pins(Some(&name))
        })
        .await?;
        let chosen = select_pin(&pins)
            .ok_or_else(|| TalmidError::NotFound(format!("no pin named {name}")))?;
        if pins.len() > 1 {
            debug!(
                token_id,
                candidates = pins.len(),
                cid = %chosen.cid,
                "multiple pins share this name; newest wins"
            );
        }

        let cid = chosen.cid.clone();
        let bytes = with_retry(&self.retry, "fetch", || self.store.fetch(&cid)).await?;
        MetadataSnapshot::decode(token_id, &bytes)
    }

    /// Wait for a freshly pinned CID to become visible in the listing.
    ///
    /// Pin listings lag uploads; polls on the retry policy's backoff
    /// schedule and surfaces `NotFound` once attempts are exhausted.
    pub async fn await_pin(&self, token_id: u64, cid: &str) -> Result<()> {
        let name = MetadataSnapshot::pin_name(token_id);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let pins = self.store.list_pins(Some(&name)).await?;
            if pins.iter().any(|pin| pin.cid == cid) {
                return Ok(());
            }
            if attempts >= self.retry.max_attempts {
                return Err(TalmidError::NotFound(format!(
                    "pin {cid} not visible after {attempts} attempts"
                )));
            }
            debug!(token_id, cid, attempt = attempts, "pin not yet listed, polling");
            tokio::time::sleep(self.retry.delay(attempts)).await;
        }
    }

    /// Snapshot and upload every minted token in the standard id range.
    ///
    /// Unminted ids are reported `Missing`; per-token failures never
    /// abort the pass.
    pub async fn sync_all(&self, tracker: &ProgressTracker) -> Result<Vec<SyncOutcome>> {
        let mut outcomes = Vec::with_capacity(crate::progress::MAX_BATCH as usize);
        for token_id in 1..=crate::progress::MAX_BATCH {
            let status = match tracker.get_progress(token_id).await {
                Ok(token) => match self.upload(&self.snapshot(&token)).await {
                    Ok(cid) => SyncStatus::Synced { cid },
                    Err(e) => {
                        warn!(token_id, error = %e, "snapshot upload failed");
                        SyncStatus::Failed(e.to_string())
                    }
                },
                Err(TalmidError::Revert {
                    reason: RevertReason::TokenUnknown,
                }) => SyncStatus::Missing,
                Err(e) => {
                    warn!(token_id, error = %e, "progress read failed");
                    SyncStatus::Failed(e.to_string())
                }
            };
            outcomes.push(SyncOutcome { token_id, status });
        }
        Ok(outcomes)
    }
}

/// Deterministic choice among pins sharing a name
fn select_pin(pins: &[PinRecord]) -> Option<&PinRecord> {
    pins.iter().max_by(|a, b| {
        a.pinned_at
            .cmp(&b.pinned_at)
            .then_with(|| a.cid.cmp(&b.cid))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn pin(cid: &str, secs: i64) -> PinRecord {
        PinRecord {
            cid: cid.to_string(),
            name: "Token_1.json".to_string(),
            pinned_at: Utc.timestamp_opt(secs, 0).unwrap(),
            size: 64,
        }
    }

    #[test]
    fn newest_pin_wins() {
        let pins = vec![pin("bafyold", 100), pin("bafynew", 300), pin("bafymid", 200)];
        assert_eq!(select_pin(&pins).unwrap().cid, "bafynew");
    }

    #[test]
    fn timestamp_ties_break_by_greatest_cid() {
        let pins = vec![pin("bafyaaa", 100), pin("bafyzzz", 100)];
        assert_eq!(select_pin(&pins).unwrap().cid, "bafyzzz");
    }

    #[test]
    fn empty_listing_selects_nothing() {
        assert!(select_pin(&[]).is_none());
    }
}
