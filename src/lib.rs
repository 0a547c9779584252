// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Null Access Vault - Encrypted File Registry Client
//!
//! Stores a masked content identifier per file on an EVM ledger. The
//! per-file key that unmasks it exists on-chain only as an FHE ciphertext
//! handle; recovering it takes a signed, time-boxed user-decrypt handshake
//! with the confidential-compute network.
//!
//! ## Modules
//!
//! - `crypto` - Masking cipher, file key generation, content identifiers
//! - `fhe` - Confidential-compute network client, typed decrypt request
//! - `blockchain` - Registry ledger (alloy) and signing keys
//! - `handshake` - Decrypt authorization handshake
//! - `session` - Store and reveal flows, decrypted view
//! - `api` - Local HTTP API handlers (Axum)

pub mod api;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fhe;
pub mod handshake;
pub mod logging;
pub mod models;
pub mod session;
pub mod state;
