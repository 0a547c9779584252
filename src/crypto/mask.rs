// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Masking of content identifiers.
//!
//! The plaintext is XORed byte-for-byte against the repeating decimal digits
//! of the file key, then Base64 encoded so it fits a ledger string field.
//! This is obfuscation, not encryption: confidentiality rests on the key,
//! which only ever leaves the client as an FHE ciphertext.

use std::fmt;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use super::keygen::FileKey;

/// Base64 text produced by [`mask`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskedHash(String);

impl MaskedHash {
    /// Wrap text read back from the ledger. Decoding is deferred to [`unmask`].
    pub fn from_stored(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MaskedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaskError {
    #[error("masked hash is not valid Base64")]
    InvalidEncoding,

    #[error("unmasked bytes are not UTF-8")]
    NotUtf8,
}

fn xor_with_key(data: &[u8], key: FileKey) -> Vec<u8> {
    let digits = key.digits();
    data.iter()
        .zip(digits.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

pub fn mask(plaintext: &[u8], key: FileKey) -> MaskedHash {
    MaskedHash(Base64::encode_string(&xor_with_key(plaintext, key)))
}

pub fn unmask(masked: &MaskedHash, key: FileKey) -> Result<Vec<u8>, MaskError> {
    let data = Base64::decode_vec(masked.as_str()).map_err(|_| MaskError::InvalidEncoding)?;
    Ok(xor_with_key(&data, key))
}

/// [`unmask`] for identifiers that were text to begin with.
pub fn unmask_text(masked: &MaskedHash, key: FileKey) -> Result<String, MaskError> {
    String::from_utf8(unmask(masked, key)?).map_err(|_| MaskError::NotUtf8)
}
