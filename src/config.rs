// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `VAULT_NETWORK` | `sepolia` or `localhost` | `sepolia` |
//! | `VAULT_RPC_URL` | Ledger RPC endpoint | Network preset |
//! | `VAULT_CONTRACT_ADDRESS` | Registry contract address | Required |
//! | `VAULT_RELAYER_URL` | Confidential-compute relayer | Network preset |
//! | `VAULT_SIGNER_KEY` | Principal private key (hex) | One of key / PEM |
//! | `VAULT_SIGNER_PEM` | Path to principal key PEM (SEC1 or PKCS#8) | One of key / PEM |
//! | `VAULT_DECRYPT_DURATION_DAYS` | Validity of a decrypt grant | `7` |
//! | `HOST` | Local API bind address | `127.0.0.1` |
//! | `PORT` | Local API bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use alloy::primitives::Address;

use crate::blockchain::{network_by_name, NetworkConfig};
use crate::handshake::DEFAULT_GRANT_DAYS;

pub const NETWORK_ENV: &str = "VAULT_NETWORK";
pub const RPC_URL_ENV: &str = "VAULT_RPC_URL";
pub const CONTRACT_ADDRESS_ENV: &str = "VAULT_CONTRACT_ADDRESS";
pub const RELAYER_URL_ENV: &str = "VAULT_RELAYER_URL";
pub const SIGNER_KEY_ENV: &str = "VAULT_SIGNER_KEY";
pub const SIGNER_PEM_ENV: &str = "VAULT_SIGNER_PEM";
pub const DECRYPT_DURATION_ENV: &str = "VAULT_DECRYPT_DURATION_DAYS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Longest grant the relayer accepts.
pub const MAX_GRANT_DAYS: u32 = 365;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where the principal's signing key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum SignerSource {
    Hex(String),
    PemFile(PathBuf),
}

impl std::fmt::Debug for SignerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerSource::Hex(_) => f.write_str("Hex(<redacted>)"),
            SignerSource::PemFile(path) => f.debug_tuple("PemFile").field(path).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub network: NetworkConfig,
    pub rpc_url: String,
    pub contract_address: Address,
    pub relayer_url: String,
    pub signer: Option<SignerSource>,
    pub decrypt_duration_days: u32,
    pub bind_addr: SocketAddr,
}

impl VaultConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let network = network_by_name(get(NETWORK_ENV).as_deref()).map_err(|reason| {
            ConfigError::Invalid {
                name: NETWORK_ENV,
                reason,
            }
        })?;

        let rpc_url = get(RPC_URL_ENV).unwrap_or_else(|| network.rpc_url.to_string());
        let relayer_url = get(RELAYER_URL_ENV).unwrap_or_else(|| network.relayer_url.to_string());

        let contract_address = get(CONTRACT_ADDRESS_ENV)
            .ok_or(ConfigError::Missing(CONTRACT_ADDRESS_ENV))?
            .parse::<Address>()
            .map_err(|e| ConfigError::Invalid {
                name: CONTRACT_ADDRESS_ENV,
                reason: e.to_string(),
            })?;
        if contract_address.is_zero() {
            return Err(ConfigError::Invalid {
                name: CONTRACT_ADDRESS_ENV,
                reason: "zero address".to_string(),
            });
        }

        let signer = match (get(SIGNER_KEY_ENV), get(SIGNER_PEM_ENV)) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid {
                    name: SIGNER_KEY_ENV,
                    reason: format!("set only one of {SIGNER_KEY_ENV} and {SIGNER_PEM_ENV}"),
                })
            }
            (Some(hex), None) => Some(SignerSource::Hex(hex)),
            (None, Some(path)) => Some(SignerSource::PemFile(PathBuf::from(path))),
            (None, None) => None,
        };

        let decrypt_duration_days = match get(DECRYPT_DURATION_ENV) {
            None => DEFAULT_GRANT_DAYS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(days) if (1..=MAX_GRANT_DAYS).contains(&days) => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: DECRYPT_DURATION_ENV,
                        reason: format!("expected 1..={MAX_GRANT_DAYS} days, got `{raw}`"),
                    })
                }
            },
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        Ok(Self {
            network,
            rpc_url,
            contract_address,
            relayer_url,
            signer,
            decrypt_duration_days,
            bind_addr,
        })
    }

    pub fn require_signer(&self) -> Result<&SignerSource, ConfigError> {
        self.signer
            .as_ref()
            .ok_or(ConfigError::Missing("VAULT_SIGNER_KEY or VAULT_SIGNER_PEM"))
    }
}
