// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process registry ledger.
//!
//! Keeps one append-only list per owner. Used by the mock network mode and
//! by tests; writes can be forced to revert to exercise failure paths.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use alloy::primitives::{keccak256, Address};
use chrono::Utc;

use super::ledger::RegistryLedger;
use super::types::{AppendReceipt, FileRecord, KeyHandle, NewFileRecord};
use crate::error::VaultError;

#[derive(Default)]
pub struct InMemoryLedger {
    files: RwLock<HashMap<Address, Vec<FileRecord>>>,
    block: AtomicU64,
    revert_writes: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following append revert (or stop doing so).
    pub fn set_revert_writes(&self, revert: bool) {
        self.revert_writes.store(revert, Ordering::SeqCst);
    }

    /// Total number of records across all owners.
    pub fn total_records(&self) -> usize {
        self.files
            .read()
            .map(|files| files.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn append_sync(
        &self,
        principal: Address,
        record: NewFileRecord,
    ) -> Result<AppendReceipt, VaultError> {
        if self.revert_writes.load(Ordering::SeqCst) {
            return Err(VaultError::ledger("execution reverted"));
        }
        if record.input.proof.is_empty() {
            return Err(VaultError::ledger("execution reverted: empty input proof"));
        }

        let mut files = self
            .files
            .write()
            .map_err(|_| VaultError::ledger("ledger lock poisoned"))?;
        let list = files.entry(principal).or_default();
        let index = list.len() as u64;
        let block = self.block.fetch_add(1, Ordering::SeqCst) + 1;

        list.push(FileRecord {
            index,
            file_name: record.file_name,
            masked_hash: record.masked_hash,
            key_handle: KeyHandle(record.input.handle.as_b256()),
            created_at: Utc::now().timestamp().max(1) as u64,
        });

        let mut preimage = principal.to_vec();
        preimage.extend_from_slice(&index.to_be_bytes());
        preimage.extend_from_slice(&block.to_be_bytes());
        let tx_hash = format!("{:?}", keccak256(&preimage));

        Ok(AppendReceipt {
            tx_hash,
            block_number: Some(block),
            index: Some(index),
        })
    }

    fn count_sync(&self, owner: Address) -> Result<u64, VaultError> {
        let files = self
            .files
            .read()
            .map_err(|_| VaultError::ledger("ledger lock poisoned"))?;
        Ok(files.get(&owner).map(|list| list.len() as u64).unwrap_or(0))
    }

    fn get_sync(&self, owner: Address, index: u64) -> Result<FileRecord, VaultError> {
        let files = self
            .files
            .read()
            .map_err(|_| VaultError::ledger("ledger lock poisoned"))?;
        files
            .get(&owner)
            .and_then(|list| list.get(usize::try_from(index).ok()?))
            .cloned()
            .ok_or_else(|| VaultError::input(format!("No record {index} for {owner}")))
    }
}

impl RegistryLedger for InMemoryLedger {
    fn append(
        &self,
        principal: Address,
        record: NewFileRecord,
    ) -> impl Future<Output = Result<AppendReceipt, VaultError>> + Send {
        std::future::ready(self.append_sync(principal, record))
    }

    fn count(&self, owner: Address) -> impl Future<Output = Result<u64, VaultError>> + Send {
        std::future::ready(self.count_sync(owner))
    }

    fn get(
        &self,
        owner: Address,
        index: u64,
    ) -> impl Future<Output = Result<FileRecord, VaultError>> + Send {
        std::future::ready(self.get_sync(owner, index))
    }
}
