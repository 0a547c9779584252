// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry ledger surface.
//!
//! Each principal owns an append-only list of [`FileRecord`]s. An append is a
//! single atomic write: it either yields a confirmed [`AppendReceipt`] or an
//! error, never a partial record.

use std::future::Future;
use std::sync::Arc;

use alloy::primitives::Address;

use super::types::{AppendReceipt, FileRecord, NewFileRecord};
use crate::error::VaultError;

pub trait RegistryLedger: Send + Sync + 'static {
    /// Append a record on behalf of `principal` and wait for inclusion.
    fn append(
        &self,
        principal: Address,
        record: NewFileRecord,
    ) -> impl Future<Output = Result<AppendReceipt, VaultError>> + Send;

    /// Number of records owned by `owner`.
    fn count(&self, owner: Address) -> impl Future<Output = Result<u64, VaultError>> + Send;

    /// Record at `index` in `owner`'s list.
    fn get(
        &self,
        owner: Address,
        index: u64,
    ) -> impl Future<Output = Result<FileRecord, VaultError>> + Send;

    /// All of `owner`'s records, newest first. Indices are untouched.
    fn list(&self, owner: Address) -> impl Future<Output = Result<Vec<FileRecord>, VaultError>> + Send {
        async move {
            let count = self.count(owner).await?;
            let mut records = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
            for index in 0..count {
                records.push(self.get(owner, index).await?);
            }
            records.reverse();
            Ok(records)
        }
    }
}

impl<T: RegistryLedger> RegistryLedger for Arc<T> {
    fn append(
        &self,
        principal: Address,
        record: NewFileRecord,
    ) -> impl Future<Output = Result<AppendReceipt, VaultError>> + Send {
        (**self).append(principal, record)
    }

    fn count(&self, owner: Address) -> impl Future<Output = Result<u64, VaultError>> + Send {
        (**self).count(owner)
    }

    fn get(
        &self,
        owner: Address,
        index: u64,
    ) -> impl Future<Output = Result<FileRecord, VaultError>> + Send {
        (**self).get(owner, index)
    }

    fn list(&self, owner: Address) -> impl Future<Output = Result<Vec<FileRecord>, VaultError>> + Send {
        (**self).list(owner)
    }
}
