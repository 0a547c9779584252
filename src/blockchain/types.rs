// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and network presets.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::MaskedHash;
use crate::error::VaultError;
use crate::fhe::EncryptedInput;

/// EVM network and confidential-compute configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID of the ledger holding the registry
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL (empty for local chains)
    pub explorer_url: &'static str,
    /// Confidential-compute relayer URL
    pub relayer_url: &'static str,
    /// Chain ID used in the decrypt-request EIP-712 domain
    pub gateway_chain_id: u64,
    /// `verifyingContract` of the decrypt-request EIP-712 domain
    pub decryption_verifier: &'static str,
}

/// Ethereum Sepolia with the Zama testnet relayer.
pub const SEPOLIA: NetworkConfig = NetworkConfig {
    name: "Sepolia",
    chain_id: 11_155_111,
    rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
    explorer_url: "https://sepolia.etherscan.io",
    relayer_url: "https://relayer.testnet.zama.cloud",
    gateway_chain_id: 55_815,
    decryption_verifier: "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1",
};

/// Local hardhat node running the mock coprocessor.
pub const LOCALHOST: NetworkConfig = NetworkConfig {
    name: "Localhost",
    chain_id: 31_337,
    rpc_url: "http://127.0.0.1:8545",
    explorer_url: "",
    relayer_url: "http://127.0.0.1:3000",
    gateway_chain_id: 55_815,
    decryption_verifier: "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1",
};

pub const NETWORK_SEPOLIA: &str = "sepolia";
pub const NETWORK_LOCALHOST: &str = "localhost";

/// Resolve a network preset by name.
pub fn network_by_name(raw: Option<&str>) -> Result<NetworkConfig, String> {
    let value = raw.unwrap_or(NETWORK_SEPOLIA).trim().to_ascii_lowercase();
    match value.as_str() {
        NETWORK_SEPOLIA => Ok(SEPOLIA),
        NETWORK_LOCALHOST => Ok(LOCALHOST),
        other => Err(format!(
            "Unknown network `{other}` (expected `{NETWORK_SEPOLIA}` or `{NETWORK_LOCALHOST}`)"
        )),
    }
}

/// Opaque reference to a ciphertext held by the confidential-compute network.
///
/// Not secret, but useless without an authorization grant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct KeyHandle(pub B256);

impl KeyHandle {
    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&alloy::hex::encode_prefixed(self.0))
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHandle({self})")
    }
}

impl FromStr for KeyHandle {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(KeyHandle)
            .map_err(|e| VaultError::input(format!("Invalid key handle `{s}`: {e}")))
    }
}

impl TryFrom<String> for KeyHandle {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyHandle> for String {
    fn from(handle: KeyHandle) -> Self {
        handle.to_string()
    }
}

/// A record as stored on the ledger. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Position in the owner's list, assigned by the ledger
    pub index: u64,
    /// Plaintext label chosen by the caller
    pub file_name: String,
    /// Masked content identifier
    pub masked_hash: MaskedHash,
    /// Handle of the FHE-encrypted file key
    pub key_handle: KeyHandle,
    /// Block timestamp of the write (unix seconds)
    pub created_at: u64,
}

impl FileRecord {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.created_at)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Fields supplied by the client for a new record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub file_name: String,
    pub masked_hash: MaskedHash,
    pub input: EncryptedInput,
}

/// Confirmation that an append was included on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Transaction hash
    pub tx_hash: String,
    /// Block number where the write was included
    pub block_number: Option<u64>,
    /// Index assigned by the ledger, when the receipt carries it
    pub index: Option<u64>,
}
