// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ephemeral keypair for one reveal attempt.
//!
//! The private half is zeroised when the keypair is dropped (k256 clears
//! `SecretKey` on drop) and is never written anywhere.

use std::fmt;

use alloy::primitives::keccak256;
use k256::{elliptic_curve::rand_core::OsRng, SecretKey};

pub struct EphemeralKeypair {
    secret: SecretKey,
    public: Vec<u8>,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_sec1_bytes().into_vec();
        Self { secret, public }
    }

    /// SEC1-encoded public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    pub fn public_key_hex(&self) -> String {
        alloy::hex::encode(&self.public)
    }

    /// Raw private scalar, hex encoded. Only handed to the decrypting network.
    pub fn private_key_hex(&self) -> String {
        alloy::hex::encode(self.secret.to_bytes())
    }

    /// Short identifier safe to log.
    pub fn fingerprint(&self) -> String {
        alloy::hex::encode(&keccak256(&self.public)[..6])
    }
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypairs_are_fresh() {
        let a = EphemeralKeypair::generate();
        let b = EphemeralKeypair::generate();
        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(a.private_key_hex(), b.private_key_hex());
        assert_eq!(a.private_key_hex().len(), 64);
    }

    #[test]
    fn debug_hides_private_key() {
        let keypair = EphemeralKeypair::generate();
        let rendered = format!("{keypair:?}");
        assert!(!rendered.contains(&keypair.private_key_hex()));
        assert!(rendered.contains(&keypair.fingerprint()));
    }
}
