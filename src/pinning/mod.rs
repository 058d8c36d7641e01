//! Content-store boundary: pinning trait and pin records.
//!
//! Pins are append-only: re-pinning a name creates another record, and
//! nothing here deletes or mutates pinned content. Staleness is handled
//! by the retrieval selection policy, not by cleanup.

pub mod memory;
pub mod pinata;

pub use memory::MemoryStore;
pub use pinata::{PinataConfig, PinataStore};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Result;

/// A named, retained entry pointing at immutable content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRecord {
    /// Content identifier of the pinned bytes
    pub cid: String,
    /// Pin name; multiple records may share one name
    pub name: String,
    /// When the service registered the pin
    pub pinned_at: DateTime<Utc>,
    /// Pinned size in bytes
    pub size: u64,
}

/// Content-addressed storage surface
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Pin bytes under a name, returning the content identifier
    async fn pin(&self, content: &[u8], name: &str) -> Result<String>;

    /// List pins, optionally filtered by exact name
    async fn list_pins(&self, name: Option<&str>) -> Result<Vec<PinRecord>>;

    /// Fetch pinned content by CID
    async fn fetch(&self, cid: &str) -> Result<Bytes>;
}
