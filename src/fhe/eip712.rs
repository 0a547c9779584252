// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed data for user-decrypt authorization.
//!
//! The principal signs an EIP-712 `UserDecryptRequestVerification` binding
//! the ephemeral public key, the contracts in scope and the validity window.
//! The same inputs always produce the same signing hash, which is what lets
//! the network check the signature against the request it receives.

use std::borrow::Cow;
use std::fmt;

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};

use super::GrantScope;

/// EIP-712 domain name of the decryption verifier.
pub const DOMAIN_NAME: &str = "Decryption";

/// EIP-712 domain version of the decryption verifier.
pub const DOMAIN_VERSION: &str = "1";

/// `extraData` sent with every request.
pub const EXTRA_DATA: [u8; 1] = [0x00];

sol! {
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
        bytes extraData;
    }
}

/// Where decrypt-request signatures are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl DecryptDomain {
    pub fn eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed(DOMAIN_NAME)),
            Some(Cow::Borrowed(DOMAIN_VERSION)),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }
}

/// The exact structure presented to the signing provider.
pub struct TypedDecryptRequest {
    pub domain: Eip712Domain,
    pub message: UserDecryptRequestVerification,
}

impl TypedDecryptRequest {
    pub fn build(domain: &DecryptDomain, public_key: &[u8], scope: &GrantScope) -> Self {
        Self {
            domain: domain.eip712(),
            message: UserDecryptRequestVerification {
                publicKey: Bytes::copy_from_slice(public_key),
                contractAddresses: scope.contracts.clone(),
                startTimestamp: U256::from(scope.start_timestamp),
                durationDays: U256::from(scope.duration_days),
                extraData: Bytes::copy_from_slice(&EXTRA_DATA),
            },
        }
    }

    /// Hash the principal signs.
    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }
}

impl fmt::Debug for TypedDecryptRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedDecryptRequest")
            .field("contracts", &self.message.contractAddresses)
            .field("start_timestamp", &self.message.startTimestamp)
            .field("duration_days", &self.message.durationDays)
            .field("signing_hash", &self.signing_hash())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn domain() -> DecryptDomain {
        DecryptDomain {
            chain_id: 55_815,
            verifying_contract: Address::repeat_byte(0xdd),
        }
    }

    fn scope(days: u32) -> GrantScope {
        GrantScope::new(
            vec![Address::repeat_byte(1)],
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            days,
        )
    }

    #[test]
    fn type_string_matches_verifier() {
        assert_eq!(
            UserDecryptRequestVerification::eip712_encode_type(),
            "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 startTimestamp,uint256 durationDays,bytes extraData)"
        );
    }

    #[test]
    fn signing_hash_is_deterministic() {
        let a = TypedDecryptRequest::build(&domain(), &[2; 33], &scope(7));
        let b = TypedDecryptRequest::build(&domain(), &[2; 33], &scope(7));
        assert_eq!(a.signing_hash(), b.signing_hash());
    }

    #[test]
    fn signing_hash_binds_every_input() {
        let base = TypedDecryptRequest::build(&domain(), &[2; 33], &scope(7)).signing_hash();

        let other_key = TypedDecryptRequest::build(&domain(), &[3; 33], &scope(7));
        assert_ne!(base, other_key.signing_hash());

        let other_window = TypedDecryptRequest::build(&domain(), &[2; 33], &scope(8));
        assert_ne!(base, other_window.signing_hash());

        let mut wider = scope(7);
        wider.contracts.push(Address::repeat_byte(2));
        let other_scope = TypedDecryptRequest::build(&domain(), &[2; 33], &wider);
        assert_ne!(base, other_scope.signing_hash());

        let other_domain = DecryptDomain {
            chain_id: 1,
            ..domain()
        };
        let other_chain = TypedDecryptRequest::build(&other_domain, &[2; 33], &scope(7));
        assert_ne!(base, other_chain.signing_hash());
    }
}
