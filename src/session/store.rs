// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Store flow state machine.
//!
//! `Idle -> FileSelected -> HashGenerated -> KeyCommitted -> Stored`
//!
//! Each transition is an explicit method. While a transition waits on the
//! network the operation status is `Pending`; it settles to `Confirmed` or
//! `Failed` with the error kept for display. A failed transition leaves the
//! flow in the state it started from, except a failed ledger write, which
//! discards the committed key and falls back to `HashGenerated` so the retry
//! starts from key generation.

use serde::Serialize;
use tracing::{debug, warn};

use super::{RegistrySession, SessionContext};
use crate::blockchain::{GrantSigner, KeyHandle, RegistryLedger};
use crate::crypto::{ContentId, EntropyQuality, MaskedHash};
use crate::error::VaultError;
use crate::fhe::{ConfidentialCompute, EncryptedInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Idle,
    FileSelected,
    HashGenerated,
    KeyCommitted,
    Stored,
}

/// Outcome of the last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Idle,
    Pending,
    Confirmed,
    Failed,
}

/// Masked hash and key ciphertext, ready for the ledger write.
#[derive(Debug, Clone)]
pub struct PreparedRecord {
    pub file_name: String,
    pub masked_hash: MaskedHash,
    pub input: EncryptedInput,
    /// `None` when the caller supplied the key.
    pub randomness: Option<EntropyQuality>,
}

/// A record confirmed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub index: u64,
    pub file_name: String,
    pub masked_hash: MaskedHash,
    pub key_handle: KeyHandle,
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub randomness: Option<EntropyQuality>,
}

#[derive(Debug)]
pub struct StoreFlow {
    state: StoreState,
    status: OpStatus,
    file_name: String,
    file_bytes: Option<Vec<u8>>,
    content_id: Option<ContentId>,
    prepared: Option<PreparedRecord>,
    stored: Option<StoredFile>,
    last_error: Option<VaultError>,
}

impl Default for StoreFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreFlow {
    pub fn new() -> Self {
        Self {
            state: StoreState::Idle,
            status: OpStatus::Idle,
            file_name: String::new(),
            file_bytes: None,
            content_id: None,
            prepared: None,
            stored: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn status(&self) -> OpStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&VaultError> {
        self.last_error.as_ref()
    }

    pub fn content_id(&self) -> Option<&ContentId> {
        self.content_id.as_ref()
    }

    pub fn stored(&self) -> Option<&StoredFile> {
        self.stored.as_ref()
    }

    /// Record awaiting its ledger write, if a key has been committed.
    pub fn pending_record(&self) -> Option<&PreparedRecord> {
        self.prepared.as_ref()
    }

    /// Choose a local file. Restarts the flow.
    pub fn select_file(&mut self, file_name: impl Into<String>, bytes: Vec<u8>) {
        *self = Self::new();
        self.file_name = file_name.into();
        self.file_bytes = Some(bytes);
        self.state = StoreState::FileSelected;
    }

    /// Use an identifier computed elsewhere. Restarts the flow.
    pub fn use_content_id(&mut self, file_name: impl Into<String>, content_id: ContentId) {
        *self = Self::new();
        self.file_name = file_name.into();
        self.content_id = Some(content_id);
        self.state = StoreState::HashGenerated;
    }

    /// Rename before the key is committed.
    pub fn set_file_name(&mut self, file_name: impl Into<String>) -> Result<(), VaultError> {
        if matches!(self.state, StoreState::KeyCommitted | StoreState::Stored) {
            return Err(VaultError::input("file name is fixed once the key is committed"));
        }
        self.file_name = file_name.into();
        Ok(())
    }

    /// `FileSelected -> HashGenerated`
    pub fn generate_hash(&mut self) -> Result<&ContentId, VaultError> {
        if self.state != StoreState::FileSelected {
            return self.fail(VaultError::input("select a file before generating its hash"));
        }
        let Some(bytes) = self.file_bytes.take() else {
            return self.fail(VaultError::input("no file selected"));
        };

        self.state = StoreState::HashGenerated;
        self.status = OpStatus::Confirmed;
        self.last_error = None;
        debug!("Content identifier generated");
        Ok(self.content_id.insert(ContentId::from_bytes(&bytes)))
    }

    /// `HashGenerated -> KeyCommitted`: draw a key, mask the hash and submit
    /// the key ciphertext.
    pub async fn commit_key<L, C, S>(
        &mut self,
        session: &RegistrySession<L, C, S>,
        ctx: &SessionContext,
    ) -> Result<(), VaultError>
    where
        L: RegistryLedger,
        C: ConfidentialCompute,
        S: GrantSigner,
    {
        if self.file_name.trim().is_empty() {
            return self.fail(VaultError::input("file name is required"));
        }
        let content_id = match self.content_id.clone() {
            Some(content_id) if self.state == StoreState::HashGenerated => content_id,
            _ => return self.fail(VaultError::input("generate the file hash first")),
        };

        self.status = OpStatus::Pending;
        match session.prepare(ctx, &self.file_name, &content_id).await {
            Ok(prepared) => {
                self.prepared = Some(prepared);
                self.state = StoreState::KeyCommitted;
                self.status = OpStatus::Confirmed;
                self.last_error = None;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// `KeyCommitted -> Stored`, once the ledger confirms the append.
    pub async fn finalize<L, C, S>(
        &mut self,
        session: &RegistrySession<L, C, S>,
        ctx: &SessionContext,
    ) -> Result<&StoredFile, VaultError>
    where
        L: RegistryLedger,
        C: ConfidentialCompute,
        S: GrantSigner,
    {
        if self.state != StoreState::KeyCommitted {
            return self.fail(VaultError::input("commit a key before storing"));
        }
        let Some(prepared) = self.prepared.take() else {
            return self.fail(VaultError::input("no committed key"));
        };

        self.status = OpStatus::Pending;
        match session.append_prepared(ctx, prepared).await {
            Ok(stored) => {
                self.state = StoreState::Stored;
                self.status = OpStatus::Confirmed;
                self.last_error = None;
                Ok(self.stored.insert(stored))
            }
            Err(e) => {
                warn!(error = %e, "Ledger write failed, committed key discarded");
                self.state = StoreState::HashGenerated;
                self.fail(e)
            }
        }
    }

    /// Drive the flow from its current state to `Stored`.
    pub async fn run<L, C, S>(
        &mut self,
        session: &RegistrySession<L, C, S>,
        ctx: &SessionContext,
    ) -> Result<StoredFile, VaultError>
    where
        L: RegistryLedger,
        C: ConfidentialCompute,
        S: GrantSigner,
    {
        if self.state == StoreState::Idle {
            return self.fail(VaultError::input("select a file first"));
        }
        if self.state == StoreState::FileSelected {
            self.generate_hash()?;
        }
        if self.state == StoreState::HashGenerated {
            self.commit_key(session, ctx).await?;
        }
        if self.state == StoreState::KeyCommitted {
            self.finalize(session, ctx).await?;
        }
        self.stored
            .clone()
            .ok_or_else(|| VaultError::input("store flow did not complete"))
    }

    fn fail<T>(&mut self, error: VaultError) -> Result<T, VaultError> {
        self.status = OpStatus::Failed;
        self.last_error = Some(error.clone());
        Err(error)
    }
}
