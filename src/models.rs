// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the local API. All types derive
//! `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Session**: wallet connection, compute readiness, randomness quality
//! - **Files**: ledger records and store requests
//! - **Reveal**: recovered keys and content identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::FileRecord;
use crate::crypto::EntropyQuality;
use crate::session::{RevealState, RevealedFile, StoredFile};

// =============================================================================
// Session Models
// =============================================================================

/// Quality of the randomness new file keys are drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Randomness {
    /// Operating system CSPRNG.
    Secure,
    /// Best-effort fallback; keys are weaker than usual.
    Degraded,
}

impl From<EntropyQuality> for Randomness {
    fn from(value: EntropyQuality) -> Self {
        match value {
            EntropyQuality::Secure => Randomness::Secure,
            EntropyQuality::Degraded => Randomness::Degraded,
        }
    }
}

/// Current session inputs and capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SessionStatusResponse {
    /// Network name.
    pub network: String,
    /// Chain ID of the ledger.
    pub chain_id: u64,
    /// Registry contract address.
    pub registry: String,
    /// Connected principal, if any.
    pub principal: Option<String>,
    pub wallet_connected: bool,
    /// Whether the confidential-compute client is initialised.
    pub compute_ready: bool,
    pub randomness: Randomness,
    /// Validity of a decrypt grant, in days.
    pub grant_duration_days: u32,
    /// Number of records currently revealed in this session.
    pub revealed: usize,
    /// Always false: keys and revealed hashes are never written to disk.
    pub local_storage: bool,
}

// =============================================================================
// File Models
// =============================================================================

/// Display state of a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevealStatus {
    Hidden,
    Requesting,
    Revealed,
}

impl From<RevealState> for RevealStatus {
    fn from(value: RevealState) -> Self {
        match value {
            RevealState::Hidden => RevealStatus::Hidden,
            RevealState::Requesting => RevealStatus::Requesting,
            RevealState::Revealed => RevealStatus::Revealed,
        }
    }
}

/// A record as stored on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FileRecordResponse {
    /// Position in the owner's list.
    pub index: u64,
    pub file_name: String,
    /// Masked content identifier (Base64).
    pub masked_hash: String,
    /// Handle of the encrypted file key.
    pub key_handle: String,
    /// Block timestamp of the write (unix seconds).
    pub created_at: u64,
    pub created_at_utc: Option<DateTime<Utc>>,
    pub reveal_state: RevealStatus,
}

impl FileRecordResponse {
    pub fn new(record: FileRecord, reveal_state: RevealState) -> Self {
        Self {
            created_at_utc: record.created_at_utc(),
            index: record.index,
            file_name: record.file_name,
            masked_hash: record.masked_hash.into_string(),
            key_handle: record.key_handle.to_string(),
            created_at: record.created_at,
            reveal_state: reveal_state.into(),
        }
    }
}

/// Request to store a new record.
///
/// Supply either `content_id` (an existing identifier, treated as opaque) or
/// `content_base64` (file bytes; the identifier is derived locally).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoreFileRequest {
    pub file_name: String,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub content_base64: Option<String>,
}

/// A record confirmed on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredFileResponse {
    pub index: u64,
    pub file_name: String,
    pub masked_hash: String,
    pub key_handle: String,
    pub tx_hash: String,
    pub block_number: Option<u64>,
    /// Block explorer link, when the network has an explorer.
    pub explorer_url: Option<String>,
    /// Absent when the caller supplied the key.
    pub randomness: Option<Randomness>,
}

impl StoredFileResponse {
    pub fn new(stored: StoredFile, explorer_base: &str) -> Self {
        let explorer_url = if explorer_base.is_empty() {
            None
        } else {
            Some(format!("{explorer_base}/tx/{}", stored.tx_hash))
        };
        Self {
            index: stored.index,
            file_name: stored.file_name,
            masked_hash: stored.masked_hash.into_string(),
            key_handle: stored.key_handle.to_string(),
            tx_hash: stored.tx_hash,
            block_number: stored.block_number,
            explorer_url,
            randomness: stored.randomness.map(Randomness::from),
        }
    }
}

// =============================================================================
// Reveal Models
// =============================================================================

/// A record whose key and content identifier were recovered.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RevealedFileResponse {
    pub index: u64,
    pub file_name: String,
    /// Plaintext file key.
    pub key: u32,
    /// Unmasked content identifier.
    pub content_id: String,
    pub key_handle: String,
    pub created_at: u64,
}

impl From<RevealedFile> for RevealedFileResponse {
    fn from(file: RevealedFile) -> Self {
        Self {
            index: file.index,
            file_name: file.file_name,
            key: file.key.value(),
            content_id: file.content_id.as_str().to_string(),
            key_handle: file.key_handle.to_string(),
            created_at: file.created_at,
        }
    }
}
