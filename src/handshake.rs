// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Decrypt-Authorization Handshake
//!
//! Exchanges a principal's signature for the plaintext keys behind a set of
//! handles. The steps run strictly in order:
//!
//! 1. generate a fresh [`EphemeralKeypair`] for this attempt only
//! 2. fix the grant scope (`{registry}`, start = now, policy duration) and
//!    derive the typed request from it
//! 3. ask the signing provider to sign that exact request
//! 4. submit handles, keypair, signature and scope to the network
//! 5. validate every returned value before it becomes a [`FileKey`]
//!
//! A failure at any step ends the attempt. Nothing is persisted: the keypair
//! and the grant live only as long as the values returned here.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use alloy::primitives::{Address, Signature};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::blockchain::{GrantSigner, KeyHandle};
use crate::crypto::FileKey;
use crate::error::VaultError;
use crate::fhe::{ConfidentialCompute, EphemeralKeypair, GrantScope, UserDecryptRequest};

/// Validity of a decrypt grant, in days.
pub const DEFAULT_GRANT_DAYS: u32 = 7;

/// How long the signing provider gets before the attempt is abandoned.
pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantPolicy {
    pub duration_days: u32,
    pub sign_timeout: Duration,
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            duration_days: DEFAULT_GRANT_DAYS,
            sign_timeout: DEFAULT_SIGN_TIMEOUT,
        }
    }
}

/// Step of a reveal attempt, reported with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealStage {
    Prepare,
    LoadRecord,
    Authorize,
    Sign,
    Decrypt,
    Validate,
    Unmask,
}

impl fmt::Display for RevealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RevealStage::Prepare => "prepare",
            RevealStage::LoadRecord => "load_record",
            RevealStage::Authorize => "authorize",
            RevealStage::Sign => "sign",
            RevealStage::Decrypt => "decrypt",
            RevealStage::Validate => "validate",
            RevealStage::Unmask => "unmask",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("reveal failed at {stage}: {error}")]
pub struct RevealError {
    pub stage: RevealStage,
    #[source]
    pub error: VaultError,
}

impl RevealError {
    pub fn new(stage: RevealStage, error: VaultError) -> Self {
        Self { stage, error }
    }

    /// Adapter for `map_err`.
    pub fn at(stage: RevealStage) -> impl FnOnce(VaultError) -> Self {
        move |error| Self::new(stage, error)
    }
}

/// A signed, time-boxed permission to decrypt handles under one scope.
///
/// Owns the ephemeral keypair; dropping the grant discards it.
#[derive(Debug)]
pub struct AuthorizationGrant {
    keypair: EphemeralKeypair,
    scope: GrantScope,
    signature: Signature,
    principal: Address,
}

impl AuthorizationGrant {
    pub fn scope(&self) -> &GrantScope {
        &self.scope
    }

    pub fn principal(&self) -> Address {
        self.principal
    }

    pub fn keypair_fingerprint(&self) -> String {
        self.keypair.fingerprint()
    }

    pub fn expires_at(&self) -> u64 {
        self.scope.expires_at()
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.scope.is_active(now)
    }
}

/// Validated plaintext keys by handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealedKeys(BTreeMap<KeyHandle, FileKey>);

impl RevealedKeys {
    pub fn get(&self, handle: &KeyHandle) -> Option<FileKey> {
        self.0.get(handle).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyHandle, &FileKey)> {
        self.0.iter()
    }
}

/// Check one decrypted value and turn it into a key.
///
/// Accepts a JSON integer or a decimal string in the key range. Negative,
/// fractional, oversized or non-numeric values are a `RangeViolation`.
pub fn validate_clear_value(handle: &KeyHandle, value: &Value) -> Result<FileKey, VaultError> {
    let violation = || VaultError::RangeViolation {
        handle: handle.to_string(),
        value: value.to_string(),
    };

    let raw = match value {
        Value::Number(n) => n.as_u64().ok_or_else(violation)?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(violation());
            }
            s.parse::<u64>().map_err(|_| violation())?
        }
        _ => return Err(violation()),
    };

    u32::try_from(raw)
        .ok()
        .and_then(|v| FileKey::new(v).ok())
        .ok_or_else(violation)
}

/// Steps 1-3: keypair, scope and the principal's signature.
pub async fn authorize<C, S>(
    compute: &C,
    signer: &S,
    registry: Address,
    principal: Address,
    policy: &GrantPolicy,
) -> Result<AuthorizationGrant, RevealError>
where
    C: ConfidentialCompute,
    S: GrantSigner,
{
    if registry.is_zero() {
        return Err(RevealError::new(
            RevealStage::Authorize,
            VaultError::input("Registry address is the zero address"),
        ));
    }
    if signer.address() != principal {
        return Err(RevealError::new(
            RevealStage::Authorize,
            VaultError::input(format!(
                "Signing provider controls {} but the records belong to {}",
                signer.address(),
                principal
            )),
        ));
    }

    let keypair = EphemeralKeypair::generate();
    let scope = GrantScope::new(vec![registry], Utc::now(), policy.duration_days);
    let typed = compute.typed_request(keypair.public_key(), &scope);
    debug!(
        keypair = %keypair.fingerprint(),
        start = scope.start_timestamp,
        duration_days = scope.duration_days,
        "Decrypt request prepared"
    );

    let signing = tokio::time::timeout(policy.sign_timeout, signer.sign_request(&typed));
    let signature = match signing.await {
        Ok(result) => result.map_err(RevealError::at(RevealStage::Sign))?,
        Err(_) => {
            warn!(timeout_secs = policy.sign_timeout.as_secs(), "Signing provider timed out");
            return Err(RevealError::new(
                RevealStage::Sign,
                VaultError::signer_unavailable("signature request timed out"),
            ));
        }
    };

    let recovered = signature
        .recover_address_from_prehash(&typed.signing_hash())
        .map_err(|e| {
            RevealError::new(
                RevealStage::Sign,
                VaultError::denied(format!("signature does not recover: {e}")),
            )
        })?;
    if recovered != principal {
        return Err(RevealError::new(
            RevealStage::Sign,
            VaultError::denied("signature was not made by the principal"),
        ));
    }

    Ok(AuthorizationGrant {
        keypair,
        scope,
        signature,
        principal,
    })
}

/// Steps 4-5: decrypt `handles` under `grant` and validate the results.
///
/// Every requested handle must come back with an in-range value; a missing
/// handle counts as a `RangeViolation` for that handle.
pub async fn decrypt_with_grant<C: ConfidentialCompute>(
    compute: &C,
    grant: &AuthorizationGrant,
    handles: &[KeyHandle],
) -> Result<RevealedKeys, RevealError> {
    if handles.is_empty() {
        return Ok(RevealedKeys::default());
    }
    if !grant.is_active(Utc::now()) {
        return Err(RevealError::new(
            RevealStage::Decrypt,
            VaultError::denied("authorization grant has expired"),
        ));
    }

    let values = compute
        .user_decrypt(UserDecryptRequest {
            handles,
            keypair: &grant.keypair,
            scope: &grant.scope,
            signature: &grant.signature,
            principal: grant.principal,
        })
        .await
        .map_err(RevealError::at(RevealStage::Decrypt))?;

    let mut keys = BTreeMap::new();
    for handle in handles {
        let key = match values.get(handle) {
            Some(value) => validate_clear_value(handle, value),
            None => Err(VaultError::RangeViolation {
                handle: handle.to_string(),
                value: "missing".to_string(),
            }),
        }
        .map_err(RevealError::at(RevealStage::Validate))?;
        keys.insert(*handle, key);
    }

    info!(
        handles = handles.len(),
        keypair = %grant.keypair_fingerprint(),
        "Handles decrypted"
    );
    Ok(RevealedKeys(keys))
}

/// Run the full handshake for `handles` with a fresh keypair and grant.
pub async fn reveal_keys<C, S>(
    compute: &C,
    signer: &S,
    registry: Address,
    principal: Address,
    handles: &[KeyHandle],
    policy: &GrantPolicy,
) -> Result<RevealedKeys, RevealError>
where
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let grant = authorize(compute, signer, registry, principal, policy).await?;
    decrypt_with_grant(compute, &grant, handles).await
}
