// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use null_access_vault::{
    api,
    blockchain::{
        signing, GrantSigner, InMemoryLedger, NetworkConfig, RegistryLedger, VaultClient,
    },
    config::{SignerSource, VaultConfig},
    crypto::{ContentId, FileKey},
    fhe::{ConfidentialCompute, DecryptDomain, MockCompute, RelayerClient},
    handshake::GrantPolicy,
    logging,
    models::{FileRecordResponse, RevealedFileResponse, StoredFileResponse},
    session::{RegistrySession, SessionContext},
    state::AppState,
};

type LiveSession = RegistrySession<VaultClient, RelayerClient, PrivateKeySigner>;

#[derive(Debug, Parser)]
#[command(
    name = "null-access-vault",
    version,
    about = "Encrypted file registry client"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the local HTTP API.
    Serve {
        /// Use an in-process ledger and compute network.
        #[arg(long)]
        in_memory: bool,
    },
    /// Print the network, registry and principal addresses.
    Address,
    /// Append a record under an explicit key.
    AddFile {
        #[arg(long)]
        name: String,
        #[arg(long)]
        hash: String,
        #[arg(long)]
        key: u32,
    },
    /// Read one record of any owner.
    GetFile {
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        index: u64,
    },
    /// Store a record under a freshly generated key.
    Store {
        #[arg(long)]
        name: String,
        /// Existing content identifier.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        hash: Option<String>,
        /// Local file; its content identifier is derived from the bytes.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List the principal's records, newest first.
    List,
    /// Reveal one record, or every record with a single signature.
    Reveal {
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        index: Option<u64>,
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init()?;
    let config = VaultConfig::from_env()?;

    match cli.command {
        Command::Serve { in_memory: true } => serve_in_memory(&config).await,
        Command::Serve { in_memory: false } => {
            let signer = load_signer(&config)?;
            let context = context_for(&config, &signer);
            let session = live_session(&config, signer)?;
            serve(AppState::new(session, context, config.network.clone()), &config).await
        }
        Command::Address => {
            let principal = match config.signer {
                Some(_) => Some(load_signer(&config)?.address().to_checksum(None)),
                None => None,
            };
            print_json(&serde_json::json!({
                "network": config.network.name,
                "chain_id": config.network.chain_id,
                "registry": config.contract_address.to_checksum(None),
                "principal": principal,
            }))
        }
        Command::AddFile { name, hash, key } => {
            let signer = load_signer(&config)?;
            let context = context_for(&config, &signer);
            let session = live_session(&config, signer)?;
            let prepared = session
                .prepare_with_key(&context, &name, &ContentId::new(hash)?, FileKey::new(key)?)
                .await?;
            let stored = session.append_prepared(&context, prepared).await?;
            print_json(&StoredFileResponse::new(stored, config.network.explorer_url))
        }
        Command::GetFile { owner, index } => {
            let signer = load_signer(&config)?;
            let session = live_session(&config, signer)?;
            let record = session.ledger().get(owner, index).await?;
            print_json(&record)
        }
        Command::Store { name, hash, file } => {
            let signer = load_signer(&config)?;
            let context = context_for(&config, &signer);
            let session = live_session(&config, signer)?;
            let stored = match (hash, file) {
                (Some(hash), _) => session.store(&context, &name, ContentId::new(hash)?).await?,
                (None, Some(path)) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    session.store_bytes(&context, &name, bytes).await?
                }
                (None, None) => anyhow::bail!("either --hash or --file is required"),
            };
            print_json(&StoredFileResponse::new(stored, config.network.explorer_url))
        }
        Command::List => {
            let signer = load_signer(&config)?;
            let context = context_for(&config, &signer);
            let session = live_session(&config, signer)?;
            let records = session.list_files(&context).await?;
            let mut response = Vec::with_capacity(records.len());
            for record in records {
                let state = session.reveal_state(&context, record.index).await?;
                response.push(FileRecordResponse::new(record, state));
            }
            print_json(&response)
        }
        Command::Reveal { index, all } => {
            let signer = load_signer(&config)?;
            let context = context_for(&config, &signer);
            let session = live_session(&config, signer)?;
            let files = match index {
                Some(index) if !all => vec![session.reveal(&context, index).await?],
                _ => session.reveal_all(&context).await?,
            };
            let response: Vec<RevealedFileResponse> = files.into_iter().map(Into::into).collect();
            print_json(&response)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_signer(config: &VaultConfig) -> Result<PrivateKeySigner> {
    let signer = match config.require_signer()? {
        SignerSource::Hex(hex) => signing::signer_from_hex(hex)?,
        SignerSource::PemFile(path) => signing::signer_from_pem_file(path)?,
    };
    Ok(signer)
}

fn decrypt_domain(network: &NetworkConfig) -> Result<DecryptDomain> {
    let verifying_contract: Address = network
        .decryption_verifier
        .parse()
        .context("invalid decryption verifier address")?;
    Ok(DecryptDomain {
        chain_id: network.gateway_chain_id,
        verifying_contract,
    })
}

fn grant_policy(config: &VaultConfig) -> GrantPolicy {
    GrantPolicy {
        duration_days: config.decrypt_duration_days,
        ..GrantPolicy::default()
    }
}

fn context_for(config: &VaultConfig, signer: &PrivateKeySigner) -> SessionContext {
    SessionContext::new(config.contract_address)
        .with_principal(signer.address())
        .with_compute_ready(true)
}

fn live_session(config: &VaultConfig, signer: PrivateKeySigner) -> Result<LiveSession> {
    let ledger = VaultClient::new(
        config.network.clone(),
        &config.rpc_url,
        config.contract_address,
        signer.clone(),
    )?;
    let compute = RelayerClient::new(
        &config.relayer_url,
        decrypt_domain(&config.network)?,
        config.network.chain_id,
    )?;
    info!(
        network = config.network.name,
        registry = %config.contract_address,
        relayer = %compute.base_url(),
        "Connected to registry"
    );
    Ok(RegistrySession::new(ledger, compute, signer).with_policy(grant_policy(config)))
}

async fn serve_in_memory(config: &VaultConfig) -> Result<()> {
    let signer = match config.signer {
        Some(_) => load_signer(config)?,
        None => {
            warn!("No signer configured, using a throwaway key for the in-memory registry");
            PrivateKeySigner::random()
        }
    };
    let context = context_for(config, &signer);
    let compute = MockCompute::new(decrypt_domain(&config.network)?);
    let session = RegistrySession::new(InMemoryLedger::new(), compute, signer)
        .with_policy(grant_policy(config));
    serve(AppState::new(session, context, config.network.clone()), config).await
}

async fn serve<L, C, S>(state: AppState<L, C, S>, config: &VaultConfig) -> Result<()>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let shutdown = CancellationToken::new();
    let app = api::router(state.with_shutdown(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Null Access Vault API listening (OpenAPI at /api-doc/openapi.json)");

    tokio::spawn(shutdown_signal(shutdown.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
    }
}
