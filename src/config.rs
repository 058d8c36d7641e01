//! Configuration for talmid
//!
//! CLI arguments and environment variable handling using clap. Required
//! credentials come from the environment and are checked once at
//! startup; a missing secret outside dev mode is a fatal configuration
//! error, never a runtime retry.

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::retry::RetryPolicy;
use crate::types::MODULE_COUNT;

/// Talmid - learning-progress tokens with content-addressed snapshots
#[derive(Parser, Debug, Clone)]
#[command(name = "talmid")]
#[command(about = "Progress-token pipeline against a ledger agent and pinning service")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Signing agent RPC endpoint (owns keys, nonces, and gas pricing)
    #[arg(long, env = "AGENT_URL", default_value = "http://localhost:8545")]
    pub agent_url: String,

    /// Deployed progress contract address (required outside dev mode)
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract_address: Option<String>,

    /// Account the agent signs transactions from (required outside dev mode)
    #[arg(long, env = "SIGNER_ADDRESS")]
    pub signer_address: Option<String>,

    /// Pinning service API base URL
    #[arg(long, env = "PIN_API_URL", default_value = "https://api.pinata.cloud")]
    pub pin_api_url: String,

    /// Pinning service API key (required outside dev mode)
    #[arg(long, env = "PIN_API_KEY")]
    pub pin_api_key: Option<String>,

    /// Pinning service API secret (required outside dev mode)
    #[arg(long, env = "PIN_API_SECRET")]
    pub pin_api_secret: Option<String>,

    /// IPFS gateway prefix used to build token URIs
    #[arg(
        long,
        env = "GATEWAY_BASE_URI",
        default_value = "https://gateway.pinata.cloud/ipfs/"
    )]
    pub gateway_base_uri: String,

    /// Development mode: in-memory ledger and content store, no
    /// credentials needed; state lasts one invocation
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in milliseconds for agent and pinning calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Attempt budget for transient network failures (including the first)
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value = "3")]
    pub retry_max_attempts: u32,

    /// Base backoff delay in milliseconds; doubles per attempt
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "200")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value = "5000")]
    pub retry_max_delay_ms: u64,
}

/// Pipeline operations
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Mint a batch of progress tokens (ids 1..=count)
    Mint {
        /// Number of tokens to mint (1..=10)
        #[arg(long)]
        count: u64,
        /// Gateway prefix recorded on each token; defaults to the
        /// configured gateway base URI
        #[arg(long)]
        base_uri: Option<String>,
    },
    /// Show ledger progress for a token
    Progress { token_id: u64 },
    /// Update module scores (ten comma-separated values, modules 1..=10)
    Scores { token_id: u64, scores: String },
    /// Certify a fully completed token
    Certify { token_id: u64 },
    /// Snapshot current progress, pin it, and update the token URI
    Upload { token_id: u64 },
    /// Retrieve the latest pinned snapshot
    Retrieve { token_id: u64 },
    /// Snapshot and upload every minted token in the standard range
    SyncAll,
}

impl Args {
    /// Retry policy from the configured knobs
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    /// Request timeout for every network-bound call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.contract_address.is_none() {
                return Err("CONTRACT_ADDRESS is required outside dev mode".to_string());
            }
            if self.signer_address.is_none() {
                return Err("SIGNER_ADDRESS is required outside dev mode".to_string());
            }
            if self.pin_api_key.is_none() || self.pin_api_secret.is_none() {
                return Err(
                    "PIN_API_KEY and PIN_API_SECRET are required outside dev mode".to_string()
                );
            }
        }
        if self.gateway_base_uri.is_empty() {
            return Err("GATEWAY_BASE_URI must not be empty".to_string());
        }
        if self.retry_max_attempts == 0 {
            return Err("RETRY_MAX_ATTEMPTS must be at least 1".to_string());
        }
        Ok(())
    }

    /// Effective signing account (dev mode uses a fixed local account)
    pub fn signer(&self) -> String {
        if self.dev_mode {
            self.signer_address
                .clone()
                .unwrap_or_else(|| "0xdev".to_string())
        } else {
            self.signer_address
                .clone()
                .expect("SIGNER_ADDRESS is required outside dev mode")
        }
    }
}

/// Parse a comma-separated list of exactly ten module scores
pub fn parse_scores(input: &str) -> Result<[u64; MODULE_COUNT], String> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() != MODULE_COUNT {
        return Err(format!(
            "expected {MODULE_COUNT} comma-separated scores, got {}",
            parts.len()
        ));
    }
    let mut scores = [0u64; MODULE_COUNT];
    for (idx, part) in parts.iter().enumerate() {
        scores[idx] = part
            .parse()
            .map_err(|_| format!("score {} is not an integer: {part:?}", idx + 1))?;
    }
    Ok(scores)
}
