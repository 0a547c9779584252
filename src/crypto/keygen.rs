// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-file key generation.
//!
//! Keys are 8-digit integers drawn uniformly from
//! `[FILE_KEY_MIN, FILE_KEY_MAX]` by a `StdRng` seeded from the primary
//! source (the operating system CSPRNG). If that source fails or repeats
//! itself, a best-effort seeded `StdRng` takes over and the result is tagged
//! [`EntropyQuality::Degraded`] so the caller can surface the weaker
//! guarantee.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng, TryRngCore};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Smallest valid file key.
pub const FILE_KEY_MIN: u32 = 10_000_000;

/// Largest valid file key.
pub const FILE_KEY_MAX: u32 = 99_999_999;

type Seed = <StdRng as SeedableRng>::Seed;

/// A plaintext file key, guaranteed to lie in the valid range.
///
/// Held only in process memory. The `Debug` impl redacts the value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FileKey(u32);

impl FileKey {
    pub fn new(value: u32) -> Result<Self, VaultError> {
        if (FILE_KEY_MIN..=FILE_KEY_MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(VaultError::input(format!(
                "key {value} is outside [{FILE_KEY_MIN}, {FILE_KEY_MAX}]"
            )))
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Decimal ASCII digits of the key, the byte pattern used for masking.
    pub fn digits(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(********)")
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for FileKey {
    type Error = VaultError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FileKey> for u32 {
    fn from(key: FileKey) -> Self {
        key.0
    }
}

impl FromStr for FileKey {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| VaultError::input(format!("key `{s}` is not an integer")))?;
        Self::new(value)
    }
}

/// Quality of the randomness behind a generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyQuality {
    /// Drawn from the operating system CSPRNG.
    Secure,
    /// The secure source failed; drawn from the best-effort fallback.
    Degraded,
}

/// Error returned by an entropy source that cannot produce bytes.
#[derive(Debug, thiserror::Error)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(pub String);

/// A source of random bytes.
pub trait EntropySource: Send + Sync {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

impl EntropySource for Box<dyn EntropySource> {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
        (**self).try_fill(dest)
    }
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError(e.to_string()))
    }
}

/// A freshly drawn key and the quality of its randomness.
#[derive(Debug, Clone, Copy)]
pub struct GeneratedKey {
    pub key: FileKey,
    pub quality: EntropyQuality,
}

/// Draws per-file keys.
pub struct KeyGenerator<E = OsEntropy> {
    primary: E,
    fallback_draws: AtomicU64,
}

impl KeyGenerator<OsEntropy> {
    pub fn new() -> Self {
        Self::with_source(OsEntropy)
    }
}

impl Default for KeyGenerator<OsEntropy> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntropySource> KeyGenerator<E> {
    pub fn with_source(primary: E) -> Self {
        Self {
            primary,
            fallback_draws: AtomicU64::new(0),
        }
    }

    /// Whether the primary source currently produces usable bytes.
    pub fn probe(&self) -> EntropyQuality {
        match seed_from(&self.primary) {
            Ok(_) => EntropyQuality::Secure,
            Err(_) => EntropyQuality::Degraded,
        }
    }

    /// Draw a key uniformly from the valid range.
    pub fn next_key(&self) -> GeneratedKey {
        match seed_from(&self.primary) {
            Ok(seed) => GeneratedKey {
                key: sample(&mut StdRng::from_seed(seed)),
                quality: EntropyQuality::Secure,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Secure randomness unavailable, using fallback generator");
                GeneratedKey {
                    key: sample(&mut self.fallback_rng()),
                    quality: EntropyQuality::Degraded,
                }
            }
        }
    }

    /// Best-effort generator seeded from wall-clock time, process id and a
    /// per-generator counter. Not suitable for secrets on its own.
    fn fallback_rng(&self) -> StdRng {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let count = self.fallback_draws.fetch_add(1, Ordering::Relaxed);
        let pid = u64::from(std::process::id());
        StdRng::seed_from_u64(nanos ^ pid.rotate_left(32) ^ count.wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }
}

/// Read a seed from `source`, checking it against a second read.
///
/// A healthy source never returns the same 32 bytes twice in a row; one that
/// does is stuck and counts as failed.
fn seed_from<E: EntropySource + ?Sized>(source: &E) -> Result<Seed, EntropyError> {
    let mut seed = Seed::default();
    let mut check = Seed::default();
    source.try_fill(&mut seed)?;
    source.try_fill(&mut check)?;
    if seed == check {
        return Err(EntropyError("source repeated its output".to_string()));
    }
    Ok(seed)
}

fn sample<R: Rng>(rng: &mut R) -> FileKey {
    FileKey(rng.random_range(FILE_KEY_MIN..=FILE_KEY_MAX))
}
