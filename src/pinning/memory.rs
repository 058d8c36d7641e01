//! In-memory content store.
//!
//! Computes real CIDv1 identifiers over the pinned bytes so dev mode and
//! tests exercise the same content addressing as the pinning service.
//! Pin timestamps are strictly increasing so the newest-pin selection
//! policy stays deterministic under rapid re-uploads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

use super::{ContentStore, PinRecord};
use crate::types::{Result, TalmidError};

/// Raw binary multicodec
const RAW_CODEC: u64 = 0x55;

/// In-memory [`ContentStore`] with real CIDs
pub struct MemoryStore {
    pins: Mutex<Vec<PinRecord>>,
    blobs: Mutex<HashMap<String, Bytes>>,
    epoch: DateTime<Utc>,
    ticks: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            pins: Mutex::new(Vec::new()),
            blobs: Mutex::new(HashMap::new()),
            epoch: Utc::now(),
            ticks: AtomicI64::new(0),
        }
    }

    /// CID for a byte slice, the same construction the gateway uses
    pub fn cid_for(content: &[u8]) -> String {
        let hash = Code::Sha2_256.digest(content);
        Cid::new_v1(RAW_CODEC, hash).to_string()
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.epoch + Duration::milliseconds(tick)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn pin(&self, content: &[u8], name: &str) -> Result<String> {
        let cid = Self::cid_for(content);

        self.blobs
            .lock()
            .expect("blob lock poisoned")
            .insert(cid.clone(), Bytes::copy_from_slice(content));

        // Re-uploads are not deduplicated: every pin gets its own record
        self.pins.lock().expect("pin lock poisoned").push(PinRecord {
            cid: cid.clone(),
            name: name.to_string(),
            pinned_at: self.next_timestamp(),
            size: content.len() as u64,
        });

        Ok(cid)
    }

    async fn list_pins(&self, name: Option<&str>) -> Result<Vec<PinRecord>> {
        let pins = self.pins.lock().expect("pin lock poisoned");
        Ok(pins
            .iter()
            .filter(|pin| name.map_or(true, |n| pin.name == n))
            .cloned()
            .collect())
    }

    async fn fetch(&self, cid: &str) -> Result<Bytes> {
        self.blobs
            .lock()
            .expect("blob lock poisoned")
            .get(cid)
            .cloned()
            .ok_or_else(|| TalmidError::NotFound(format!("CID {cid}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pin_and_fetch_round_trip() {
        let store = MemoryStore::new();
        let cid = store.pin(b"hello", "greeting.json").await.unwrap();
        assert!(cid.starts_with("baf"));

        let fetched = store.fetch(&cid).await.unwrap();
        assert_eq!(&fetched[..], b"hello");
    }

    #[tokio::test]
    async fn cids_are_content_derived() {
        let store = MemoryStore::new();
        let a = store.pin(b"alpha", "a.json").await.unwrap();
        let b = store.pin(b"beta", "b.json").await.unwrap();
        let a_again = store.pin(b"alpha", "c.json").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[tokio::test]
    async fn listing_filters_by_exact_name() {
        let store = MemoryStore::new();
        store.pin(b"one", "Token_1.json").await.unwrap();
        store.pin(b"two", "Token_2.json").await.unwrap();
        store.pin(b"one again", "Token_1.json").await.unwrap();

        let all = store.list_pins(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let token_1 = store.list_pins(Some("Token_1.json")).await.unwrap();
        assert_eq!(token_1.len(), 2);
        assert!(token_1.iter().all(|p| p.name == "Token_1.json"));
    }

    #[tokio::test]
    async fn pin_timestamps_strictly_increase() {
        let store = MemoryStore::new();
        store.pin(b"first", "x.json").await.unwrap();
        store.pin(b"second", "x.json").await.unwrap();

        let pins = store.list_pins(Some("x.json")).await.unwrap();
        assert!(pins[0].pinned_at < pins[1].pinned_at);
    }

    #[tokio::test]
    async fn missing_cid_is_not_found() {
        let store = MemoryStore::new();
        let err = store.fetch("bafybeigdyrztmissing").await.unwrap_err();
        assert!(matches!(err, TalmidError::NotFound(_)));
    }
}
