//! talmid CLI - drives the progress-token pipeline end to end

use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use talmid::config::{parse_scores, Args, Command};
use talmid::ledger::{AgentClient, AgentConfig, ChainClient, MemoryLedger};
use talmid::metadata::{MetadataSynchronizer, SyncStatus};
use talmid::pinning::{ContentStore, MemoryStore, PinataConfig, PinataStore};
use talmid::progress::{
    CertificationEvaluator, CertifyOutcome, MintStatus, ModuleUpdateStatus, ProgressTracker,
    TokenMinter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("talmid={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let signer = args.signer();
    let retry = args.retry_policy();

    let (chain, store): (Arc<dyn ChainClient>, Arc<dyn ContentStore>) = if args.dev_mode {
        info!("Dev mode: in-memory ledger and content store, state lasts one invocation");
        (Arc::new(MemoryLedger::new()), Arc::new(MemoryStore::new()))
    } else {
        info!(agent_url = %args.agent_url, pin_api_url = %args.pin_api_url, "connecting clients");
        let chain = AgentClient::new(AgentConfig {
            base_url: args.agent_url.clone(),
            contract_address: args
                .contract_address
                .clone()
                .expect("CONTRACT_ADDRESS is required outside dev mode"),
            timeout: args.request_timeout(),
        });
        let store = PinataStore::new(PinataConfig {
            api_url: args.pin_api_url.clone(),
            gateway_url: args.gateway_base_uri.clone(),
            api_key: args
                .pin_api_key
                .clone()
                .expect("PIN_API_KEY is required outside dev mode"),
            api_secret: args
                .pin_api_secret
                .clone()
                .expect("PIN_API_SECRET is required outside dev mode"),
            timeout: args.request_timeout(),
        });
        (Arc::new(chain), Arc::new(store))
    };

    let minter = TokenMinter::new(Arc::clone(&chain), signer.clone(), retry);
    let tracker = ProgressTracker::new(Arc::clone(&chain), signer.clone(), retry);
    let certifier = CertificationEvaluator::new(Arc::clone(&chain), signer.clone(), retry);
    let synchronizer = MetadataSynchronizer::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        signer,
        args.gateway_base_uri.clone(),
        retry,
    );

    match &args.command {
        Command::Mint { count, base_uri } => {
            let base_uri = base_uri
                .clone()
                .unwrap_or_else(|| args.gateway_base_uri.clone());
            let outcomes = minter.mint_batch(*count, &base_uri).await?;
            for outcome in &outcomes {
                match &outcome.status {
                    MintStatus::Minted { gas_used } => {
                        println!("token {}: minted (gas {})", outcome.token_id, gas_used)
                    }
                    MintStatus::AlreadyExists => {
                        println!("token {}: already exists", outcome.token_id)
                    }
                    MintStatus::Failed(reason) => {
                        println!("token {}: failed - {}", outcome.token_id, reason)
                    }
                }
            }
        }
        Command::Progress { token_id } => {
            let token = tracker.get_progress(*token_id).await?;
            println!("token {} owned by {}", token.token_id, token.owner);
            println!(
                "completed modules: {}/{}",
                token.num_completed_modules,
                talmid::MODULE_COUNT
            );
            println!(
                "certified: {}",
                if token.is_certified { "yes" } else { "no" }
            );
            for (idx, score) in token.module_scores.iter().enumerate() {
                let marker = if token.completed[idx] { "done" } else { "open" };
                println!("  module {:>2} [{marker}]: {score}", idx + 1);
            }
            match tracker.token_uri(*token_id).await {
                Ok(uri) if !uri.is_empty() => println!("token URI: {uri}"),
                _ => {}
            }
        }
        Command::Scores { token_id, scores } => {
            let scores = parse_scores(scores).map_err(|e| anyhow!(e))?;
            let outcomes = tracker.update_scores(*token_id, &scores).await?;
            for outcome in &outcomes {
                match &outcome.status {
                    ModuleUpdateStatus::Updated { gas_used } => {
                        println!("module {}: updated (gas {})", outcome.module, gas_used)
                    }
                    ModuleUpdateStatus::Skipped => {
                        println!("module {}: already completed, skipped", outcome.module)
                    }
                    ModuleUpdateStatus::Failed(reason) => {
                        println!("module {}: failed - {}", outcome.module, reason)
                    }
                }
            }
        }
        Command::Certify { token_id } => match certifier.certify(*token_id).await? {
            CertifyOutcome::Certified { gas_used } => {
                println!("token {token_id}: certified (gas {gas_used})")
            }
            CertifyOutcome::AlreadyCertified => {
                println!("token {token_id}: already certified")
            }
        },
        Command::Upload { token_id } => {
            let token = tracker.get_progress(*token_id).await?;
            let cid = synchronizer.upload(&synchronizer.snapshot(&token)).await?;
            synchronizer.await_pin(*token_id, &cid).await?;
            println!("token {token_id}: pinned as {cid}");
            println!("resolves at {}{}", args.gateway_base_uri, cid);
        }
        Command::Retrieve { token_id } => {
            let snapshot = synchronizer.retrieve(*token_id).await?;
            println!(
                "token {}: {}/{} modules completed, {}",
                snapshot.token_id,
                snapshot.completed_modules,
                talmid::MODULE_COUNT,
                if snapshot.certified {
                    "certified"
                } else {
                    "not certified"
                }
            );
            for (idx, score) in snapshot.module_scores.iter().enumerate() {
                println!("  module {:>2}: {score}", idx + 1);
            }
        }
        Command::SyncAll => {
            let outcomes = synchronizer.sync_all(&tracker).await?;
            for outcome in &outcomes {
                match &outcome.status {
                    SyncStatus::Synced { cid } => {
                        println!("token {}: synced as {}", outcome.token_id, cid)
                    }
                    SyncStatus::Missing => {
                        println!("token {}: not minted", outcome.token_id)
                    }
                    SyncStatus::Failed(reason) => {
                        println!("token {}: failed - {}", outcome.token_id, reason)
                    }
                }
            }
        }
    }

    Ok(())
}
