// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confidential-compute network integration.
//!
//! The network issues FHE ciphertexts for plaintext keys (returning an opaque
//! handle plus an input proof) and performs user decryption of handles under
//! a signed, time-boxed grant. The FHE scheme itself stays on the network
//! side; this module only speaks its interface.
//!
//! - [`submit_key`]: ciphertext submission for a file key
//! - [`eip712`]: typed decrypt request the principal signs
//! - [`keypair`]: ephemeral keypair scoped to one reveal attempt
//! - [`relayer`]: HTTP client for a hosted relayer
//! - [`mock`]: in-process network for local runs and tests

pub mod eip712;
pub mod keypair;
pub mod mock;
pub mod relayer;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, Signature};
use chrono::{DateTime, Utc};

use crate::blockchain::KeyHandle;
use crate::crypto::FileKey;
use crate::error::VaultError;

pub use eip712::{DecryptDomain, TypedDecryptRequest};
pub use keypair::EphemeralKeypair;
pub use mock::MockCompute;
pub use relayer::RelayerClient;

const SECONDS_PER_DAY: u64 = 86_400;

/// Ciphertext handle and proof of well-formedness for one encrypted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: KeyHandle,
    pub proof: Bytes,
}

/// Contracts and validity window an authorization grant covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantScope {
    pub contracts: Vec<Address>,
    /// Unix seconds
    pub start_timestamp: u64,
    pub duration_days: u32,
}

impl GrantScope {
    pub fn new(contracts: Vec<Address>, start: DateTime<Utc>, duration_days: u32) -> Self {
        Self {
            contracts,
            start_timestamp: u64::try_from(start.timestamp()).unwrap_or(0),
            duration_days,
        }
    }

    /// Unix second at which the grant stops being valid.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(u64::from(self.duration_days) * SECONDS_PER_DAY)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let now = u64::try_from(now.timestamp()).unwrap_or(0);
        self.start_timestamp <= now && now < self.expires_at()
    }

    pub fn covers(&self, contract: Address) -> bool {
        self.contracts.contains(&contract)
    }
}

/// Everything the network needs to decrypt handles for a principal.
pub struct UserDecryptRequest<'a> {
    pub handles: &'a [KeyHandle],
    pub keypair: &'a EphemeralKeypair,
    pub scope: &'a GrantScope,
    pub signature: &'a Signature,
    pub principal: Address,
}

/// Raw clear values keyed by handle, before range validation.
pub type ClearValues = HashMap<KeyHandle, serde_json::Value>;

pub trait ConfidentialCompute: Send + Sync + 'static {
    /// Deterministically derive the structure the principal signs.
    fn typed_request(&self, public_key: &[u8], scope: &GrantScope) -> TypedDecryptRequest;

    /// Encrypt a 32-bit value for `contract`, callable by `principal`.
    fn encrypt_u32(
        &self,
        value: u32,
        contract: Address,
        principal: Address,
    ) -> impl Future<Output = Result<EncryptedInput, VaultError>> + Send;

    /// Decrypt handles under a signed grant.
    fn user_decrypt<'a>(
        &'a self,
        request: UserDecryptRequest<'a>,
    ) -> impl Future<Output = Result<ClearValues, VaultError>> + Send + 'a;
}

impl<T: ConfidentialCompute> ConfidentialCompute for Arc<T> {
    fn typed_request(&self, public_key: &[u8], scope: &GrantScope) -> TypedDecryptRequest {
        (**self).typed_request(public_key, scope)
    }

    fn encrypt_u32(
        &self,
        value: u32,
        contract: Address,
        principal: Address,
    ) -> impl Future<Output = Result<EncryptedInput, VaultError>> + Send {
        (**self).encrypt_u32(value, contract, principal)
    }

    fn user_decrypt<'a>(
        &'a self,
        request: UserDecryptRequest<'a>,
    ) -> impl Future<Output = Result<ClearValues, VaultError>> + Send + 'a {
        (**self).user_decrypt(request)
    }
}

/// Submit a file key to the network, scoped to `registry` and `principal`.
///
/// Malformed identifiers fail before any network call. Every call yields a
/// fresh, independent handle and proof.
pub async fn submit_key<C: ConfidentialCompute>(
    compute: &C,
    registry: Address,
    principal: Address,
    key: FileKey,
) -> Result<EncryptedInput, VaultError> {
    if registry.is_zero() {
        return Err(VaultError::input("Registry address is the zero address"));
    }
    if principal.is_zero() {
        return Err(VaultError::input("Principal address is the zero address"));
    }

    let input = compute.encrypt_u32(key.value(), registry, principal).await?;
    if input.proof.is_empty() {
        return Err(VaultError::compute_unavailable(
            "Network returned an empty input proof",
        ));
    }

    tracing::debug!(handle = %input.handle, %registry, "File key submitted for encryption");
    Ok(input)
}
