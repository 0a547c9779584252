// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side primitives: key generation, hash masking and content
//! identifiers. Nothing here performs I/O.

pub mod content;
pub mod keygen;
pub mod mask;

pub use content::ContentId;
pub use keygen::{
    EntropyError, EntropyQuality, EntropySource, FileKey, GeneratedKey, KeyGenerator, OsEntropy,
    FILE_KEY_MAX, FILE_KEY_MIN,
};
pub use mask::{mask, unmask, unmask_text, MaskError, MaskedHash};
