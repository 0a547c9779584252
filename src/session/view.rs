// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-local cache of revealed records.
//!
//! Written only by the session, read by the display layer. Each write
//! replaces entries whole under one lock, so readers never see a partially
//! revealed record. Entries belong to one principal; writing for another
//! principal clears the cache first.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::blockchain::KeyHandle;
use crate::crypto::{ContentId, FileKey};

/// A record whose key and content identifier have been recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealedFile {
    pub index: u64,
    pub file_name: String,
    pub key: FileKey,
    pub content_id: ContentId,
    pub key_handle: KeyHandle,
    pub created_at: u64,
}

#[derive(Default)]
struct ViewState {
    owner: Option<Address>,
    entries: BTreeMap<u64, RevealedFile>,
}

impl ViewState {
    fn switch_owner(&mut self, owner: Address) {
        if self.owner != Some(owner) {
            self.entries.clear();
            self.owner = Some(owner);
        }
    }

    fn owned_by(&self, owner: Address) -> bool {
        self.owner == Some(owner)
    }
}

#[derive(Default)]
pub struct DecryptedView {
    state: RwLock<ViewState>,
}

impl DecryptedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, owner: Address, file: RevealedFile) {
        let mut state = self.state.write().await;
        state.switch_owner(owner);
        state.entries.insert(file.index, file);
    }

    /// Insert a batch in one write.
    pub async fn insert_all(&self, owner: Address, files: Vec<RevealedFile>) {
        let mut state = self.state.write().await;
        state.switch_owner(owner);
        for file in files {
            state.entries.insert(file.index, file);
        }
    }

    /// Drop one entry. Returns whether it was present.
    pub async fn remove(&self, owner: Address, index: u64) -> bool {
        let mut state = self.state.write().await;
        state.owned_by(owner) && state.entries.remove(&index).is_some()
    }

    pub async fn get(&self, owner: Address, index: u64) -> Option<RevealedFile> {
        let state = self.state.read().await;
        if !state.owned_by(owner) {
            return None;
        }
        state.entries.get(&index).cloned()
    }

    pub async fn contains(&self, owner: Address, index: u64) -> bool {
        let state = self.state.read().await;
        state.owned_by(owner) && state.entries.contains_key(&index)
    }

    /// Revealed entries, newest first.
    pub async fn entries(&self, owner: Address) -> Vec<RevealedFile> {
        let state = self.state.read().await;
        if !state.owned_by(owner) {
            return Vec::new();
        }
        state.entries.values().rev().cloned().collect()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.owner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn revealed(index: u64) -> RevealedFile {
        RevealedFile {
            index,
            file_name: format!("file-{index}"),
            key: FileKey::new(12_345_678).unwrap(),
            content_id: ContentId::new("QmExampleHash").unwrap(),
            key_handle: KeyHandle(B256::repeat_byte(index as u8)),
            created_at: 1,
        }
    }

    #[tokio::test]
    async fn entries_are_newest_first() {
        let view = DecryptedView::new();
        let alice = Address::repeat_byte(0xa1);
        view.insert_all(alice, vec![revealed(0), revealed(2), revealed(1)])
            .await;

        let indices: Vec<_> = view.entries(alice).await.iter().map(|f| f.index).collect();
        assert_eq!(indices, [2, 1, 0]);
    }

    #[tokio::test]
    async fn remove_only_touches_one_entry() {
        let view = DecryptedView::new();
        let alice = Address::repeat_byte(0xa1);
        view.insert(alice, revealed(0)).await;
        view.insert(alice, revealed(1)).await;

        assert!(view.remove(alice, 0).await);
        assert!(!view.remove(alice, 0).await);
        assert!(!view.contains(alice, 0).await);
        assert!(view.contains(alice, 1).await);
    }

    #[tokio::test]
    async fn switching_principal_clears_entries() {
        let view = DecryptedView::new();
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        view.insert(alice, revealed(0)).await;

        assert!(view.get(bob, 0).await.is_none());
        view.insert(bob, revealed(3)).await;
        assert!(view.entries(alice).await.is_empty());
        assert_eq!(view.entries(bob).await.len(), 1);
    }
}
