//! Pinata pinning-service client.
//!
//! Authenticates with the api-key/secret header pair from environment
//! configuration and talks to the documented endpoints: multipart
//! `pinFileToIPFS` for uploads, `pinList` filtered by metadata name for
//! listings, and the gateway for content fetches.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use cid::Cid;
use reqwest::{header, multipart, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ContentStore, PinRecord};
use crate::types::{Result, TalmidError};

/// Configuration for the Pinata client
#[derive(Debug, Clone)]
pub struct PinataConfig {
    /// API base URL (default `https://api.pinata.cloud`)
    pub api_url: String,
    /// Gateway prefix for content fetches, ending in `/ipfs/`
    pub gateway_url: String,
    /// API key, from environment configuration
    pub api_key: String,
    /// API secret, from environment configuration
    pub api_secret: String,
    /// Request timeout for every call
    pub timeout: Duration,
}

/// [`ContentStore`] backed by the Pinata pinning service
pub struct PinataStore {
    config: PinataConfig,
    client: Client,
}

#[derive(Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Deserialize)]
struct PinListResponse {
    rows: Vec<PinRow>,
}

#[derive(Deserialize)]
struct PinRow {
    ipfs_pin_hash: String,
    size: u64,
    date_pinned: DateTime<Utc>,
    metadata: PinRowMetadata,
}

#[derive(Deserialize)]
struct PinRowMetadata {
    name: Option<String>,
}

impl PinataStore {
    /// Create a new Pinata client
    pub fn new(config: PinataConfig) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::HeaderName::from_static("pinata_api_key"),
            header::HeaderValue::from_str(&config.api_key).expect("Invalid API key"),
        );
        headers.insert(
            header::HeaderName::from_static("pinata_secret_api_key"),
            header::HeaderValue::from_str(&config.api_secret).expect("Invalid API secret"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TalmidError::NotFound("resource not found".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TalmidError::Server {
                status,
                message: body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn pin(&self, content: &[u8], name: &str) -> Result<String> {
        let url = format!("{}/pinning/pinFileToIPFS", self.config.api_url);

        // The pin name is carried as the uploaded file name; listings
        // report it back under metadata.name
        let part = multipart::Part::bytes(content.to_vec())
            .file_name(name.to_string())
            .mime_str("application/json")?;
        let form = multipart::Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let pinned: PinFileResponse = self.handle_response(response).await?;

        Cid::from_str(&pinned.ipfs_hash).map_err(|e| {
            TalmidError::InvalidResponse(format!(
                "pinning service returned unparseable CID {}: {e}",
                pinned.ipfs_hash
            ))
        })?;

        debug!(name, cid = %pinned.ipfs_hash, size = content.len(), "content pinned");
        Ok(pinned.ipfs_hash)
    }

    async fn list_pins(&self, name: Option<&str>) -> Result<Vec<PinRecord>> {
        let url = format!("{}/data/pinList", self.config.api_url);

        let mut request = self.client.get(&url).query(&[("status", "pinned")]);
        if let Some(name) = name {
            request = request.query(&[("metadata[name]", name)]);
        }

        let response = request.send().await?;
        let listing: PinListResponse = self.handle_response(response).await?;

        Ok(listing
            .rows
            .into_iter()
            .map(|row| PinRecord {
                cid: row.ipfs_pin_hash,
                name: row.metadata.name.unwrap_or_default(),
                pinned_at: row.date_pinned,
                size: row.size,
            })
            .collect())
    }

    async fn fetch(&self, cid: &str) -> Result<Bytes> {
        let url = format!("{}{}", self.config.gateway_url, cid);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(TalmidError::NotFound(format!("CID {cid}")));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TalmidError::Server {
                status,
                message: body,
            });
        }

        Ok(response.bytes().await?)
    }
}
