//! HTTP client for the contract signing agent.
//!
//! The agent owns the private key, nonce ordering, and gas pricing; this
//! client sends method-plus-args envelopes and maps responses into the
//! error taxonomy. Contract reverts come back as 422 responses carrying
//! the raw reason, which is classified here at the boundary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{classify_revert, ChainClient, TxOptions, TxReceipt};
use crate::types::{Result, TalmidError};

/// Configuration for the agent client
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent RPC base URL
    pub base_url: String,
    /// Deployed progress contract address
    pub contract_address: String,
    /// Request timeout for every call
    pub timeout: Duration,
}

/// HTTP-backed [`ChainClient`]
pub struct AgentClient {
    config: AgentConfig,
    client: Client,
}

#[derive(Serialize)]
struct CallEnvelope<'a> {
    contract: &'a str,
    method: &'a str,
    args: &'a [Value],
}

#[derive(Serialize)]
struct EstimateEnvelope<'a> {
    contract: &'a str,
    method: &'a str,
    args: &'a [Value],
    from: &'a str,
}

#[derive(Serialize)]
struct SendEnvelope<'a> {
    contract: &'a str,
    method: &'a str,
    args: &'a [Value],
    from: &'a str,
    gas: u64,
}

#[derive(Deserialize)]
struct CallResult {
    result: Value,
}

#[derive(Deserialize)]
struct EstimateResult {
    gas: u64,
}

#[derive(Deserialize)]
struct RevertBody {
    revert: String,
}

impl AgentClient {
    /// Create a new agent client
    pub fn new(config: AgentConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { config, client }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self.client.post(&url).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        // The agent reports contract reverts as 422 with the raw reason
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body: RevertBody = response.json().await?;
            return Err(TalmidError::Revert {
                reason: classify_revert(&body.revert),
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(TalmidError::NotFound("agent resource not found".into()));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TalmidError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChainClient for AgentClient {
    async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        debug!(method, "contract call");
        let out: CallResult = self
            .post(
                "/contract/call",
                &CallEnvelope {
                    contract: &self.config.contract_address,
                    method,
                    args,
                },
            )
            .await?;
        Ok(out.result)
    }

    async fn estimate_gas(&self, method: &str, args: &[Value], from: &str) -> Result<u64> {
        debug!(method, from, "gas estimate");
        let out: EstimateResult = self
            .post(
                "/contract/estimate",
                &EstimateEnvelope {
                    contract: &self.config.contract_address,
                    method,
                    args,
                    from,
                },
            )
            .await?;
        Ok(out.gas)
    }

    async fn send(&self, method: &str, args: &[Value], opts: &TxOptions) -> Result<TxReceipt> {
        debug!(method, from = %opts.from, gas = opts.gas, "submitting transaction");
        self.post(
            "/contract/send",
            &SendEnvelope {
                contract: &self.config.contract_address,
                method,
                args,
                from: &opts.from,
                gas: opts.gas,
            },
        )
        .await
    }
}
