// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry ledger integration.
//!
//! This module provides functionality for:
//! - Appending and reading file records on the registry contract
//! - An in-process ledger for local runs and tests
//! - Loading the principal's signing key

pub mod client;
pub mod ledger;
pub mod memory;
pub mod signing;
pub mod types;
pub mod vault;

pub use client::VaultClient;
pub use ledger::RegistryLedger;
pub use memory::InMemoryLedger;
pub use signing::GrantSigner;
pub use types::*;
