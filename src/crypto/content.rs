// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content identifiers.
//!
//! The registry treats a content identifier as opaque printable text. The only
//! structure this crate produces itself is a CIDv0-shaped identifier for a
//! local file: base58 of the sha2-256 multihash, 46 characters starting `Qm`.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VaultError;

/// Multihash code for sha2-256.
const SHA2_256_CODE: u8 = 0x12;

/// Digest length prefix for a 32-byte sha2-256 multihash.
const SHA2_256_LEN: u8 = 0x20;

/// Opaque pointer into content-addressed storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Wrap a caller-supplied identifier. Only emptiness is checked.
    pub fn new(value: impl Into<String>) -> Result<Self, VaultError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(VaultError::input("content identifier is empty"));
        }
        Ok(Self(value))
    }

    /// Derive the identifier for a file's bytes.
    pub fn from_bytes(contents: &[u8]) -> Self {
        let digest = Sha256::digest(contents);
        let mut multihash = Vec::with_capacity(2 + digest.len());
        multihash.push(SHA2_256_CODE);
        multihash.push(SHA2_256_LEN);
        multihash.extend_from_slice(&digest);
        Self(bs58::encode(multihash).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
