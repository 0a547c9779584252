// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process confidential-compute network.
//!
//! Stands in for the coprocessor and relayer on a local chain. Clear values
//! are kept in memory next to an access list: a handle can only be decrypted
//! by the principal that submitted it, for the contract it was submitted to,
//! under a grant whose EIP-712 signature recovers to that principal and
//! whose window covers the current time.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, Bytes};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::eip712::{DecryptDomain, TypedDecryptRequest};
use super::{ClearValues, ConfidentialCompute, EncryptedInput, GrantScope, UserDecryptRequest};
use crate::blockchain::KeyHandle;
use crate::error::VaultError;

struct StoredCiphertext {
    clear: Value,
    contract: Address,
    owner: Address,
}

#[derive(Default)]
struct MockState {
    ciphertexts: HashMap<KeyHandle, StoredCiphertext>,
    nonce: u64,
}

pub struct MockCompute {
    domain: DecryptDomain,
    state: Mutex<MockState>,
    available: AtomicBool,
    clock_skew_secs: AtomicI64,
}

impl MockCompute {
    pub fn new(domain: DecryptDomain) -> Self {
        Self {
            domain,
            state: Mutex::new(MockState::default()),
            available: AtomicBool::new(true),
            clock_skew_secs: AtomicI64::new(0),
        }
    }

    /// Mock with the local hardhat chain's decryption domain.
    pub fn localhost() -> Self {
        use crate::blockchain::LOCALHOST;
        let verifying_contract = LOCALHOST
            .decryption_verifier
            .parse()
            .unwrap_or(Address::ZERO);
        Self::new(DecryptDomain {
            chain_id: LOCALHOST.gateway_chain_id,
            verifying_contract,
        })
    }

    pub fn domain(&self) -> DecryptDomain {
        self.domain
    }

    /// Simulate the network going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Move the network's clock forward.
    pub fn advance_clock(&self, by: Duration) {
        self.clock_skew_secs
            .fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    /// Replace the clear value behind a handle, as a corrupted store would.
    pub fn overwrite_clear_value(&self, handle: KeyHandle, value: Value) -> bool {
        match self.state.lock() {
            Ok(mut state) => match state.ciphertexts.get_mut(&handle) {
                Some(ct) => {
                    ct.clear = value;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Number of ciphertexts issued so far.
    pub fn issued(&self) -> usize {
        self.state.lock().map(|s| s.ciphertexts.len()).unwrap_or(0)
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.clock_skew_secs.load(Ordering::SeqCst))
    }

    fn ensure_available(&self) -> Result<(), VaultError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VaultError::compute_unavailable("mock network is offline"))
        }
    }

    fn encrypt_sync(
        &self,
        value: u32,
        contract: Address,
        principal: Address,
    ) -> Result<EncryptedInput, VaultError> {
        self.ensure_available()?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| VaultError::compute_unavailable("mock state poisoned"))?;
        state.nonce += 1;

        let mut preimage = state.nonce.to_be_bytes().to_vec();
        preimage.extend_from_slice(contract.as_slice());
        preimage.extend_from_slice(principal.as_slice());
        let handle = KeyHandle(keccak256(&preimage));

        let mut proof = vec![0x01];
        proof.extend_from_slice(handle.as_b256().as_slice());
        proof.extend_from_slice(keccak256(&preimage[8..]).as_slice());

        state.ciphertexts.insert(
            handle,
            StoredCiphertext {
                clear: Value::from(value),
                contract,
                owner: principal,
            },
        );

        Ok(EncryptedInput {
            handle,
            proof: Bytes::from(proof),
        })
    }

    fn decrypt_sync(&self, request: &UserDecryptRequest<'_>) -> Result<ClearValues, VaultError> {
        self.ensure_available()?;

        if !request.scope.is_active(self.now()) {
            return Err(VaultError::denied("grant is outside its validity window"));
        }

        let typed = self.typed_request(request.keypair.public_key(), request.scope);
        let signer = request
            .signature
            .recover_address_from_prehash(&typed.signing_hash())
            .map_err(|e| VaultError::denied(format!("unrecoverable signature: {e}")))?;
        if signer != request.principal {
            return Err(VaultError::denied("signature does not match principal"));
        }

        let state = self
            .state
            .lock()
            .map_err(|_| VaultError::compute_unavailable("mock state poisoned"))?;

        let mut values = HashMap::with_capacity(request.handles.len());
        for handle in request.handles {
            let ct = state
                .ciphertexts
                .get(handle)
                .ok_or_else(|| VaultError::denied(format!("unknown handle {handle}")))?;
            if ct.owner != request.principal || !request.scope.covers(ct.contract) {
                return Err(VaultError::denied(format!(
                    "principal is not allowed to decrypt {handle}"
                )));
            }
            values.insert(*handle, ct.clear.clone());
        }
        Ok(values)
    }
}

impl ConfidentialCompute for MockCompute {
    fn typed_request(&self, public_key: &[u8], scope: &GrantScope) -> TypedDecryptRequest {
        TypedDecryptRequest::build(&self.domain, public_key, scope)
    }

    fn encrypt_u32(
        &self,
        value: u32,
        contract: Address,
        principal: Address,
    ) -> impl Future<Output = Result<EncryptedInput, VaultError>> + Send {
        std::future::ready(self.encrypt_sync(value, contract, principal))
    }

    fn user_decrypt<'a>(
        &'a self,
        request: UserDecryptRequest<'a>,
    ) -> impl Future<Output = Result<ClearValues, VaultError>> + Send + 'a {
        std::future::ready(self.decrypt_sync(&request))
    }
}
