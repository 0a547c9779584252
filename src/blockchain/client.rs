// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM client for the registry contract.

use std::future::Future;

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};

use super::ledger::RegistryLedger;
use super::types::{AppendReceipt, FileRecord, NetworkConfig, NewFileRecord};
use super::vault::VaultContract;
use crate::error::VaultError;

/// Registry client bound to one signing principal.
pub struct VaultClient {
    /// Network configuration
    network: NetworkConfig,
    /// Alloy HTTP provider with the principal's wallet attached
    provider: DynProvider,
    /// Registry contract
    vault: VaultContract<DynProvider>,
    /// Address every append is sent from
    sender: Address,
}

impl VaultClient {
    /// Create a client for `vault_address`, signing writes with `signer`.
    pub fn new(
        network: NetworkConfig,
        rpc_url: &str,
        vault_address: Address,
        signer: PrivateKeySigner,
    ) -> Result<Self, VaultError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| VaultError::input(format!("Invalid RPC URL: {e}")))?;

        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        let vault = VaultContract::new(&provider, vault_address);

        Ok(Self {
            network,
            provider,
            vault,
            sender,
        })
    }

    /// Registry contract address.
    pub fn vault_address(&self) -> Address {
        self.vault.address()
    }

    /// Address writes are sent from.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Get the current block number.
    pub async fn block_number(&self) -> Result<u64, VaultError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| VaultError::ledger(format!("RPC error: {e}")))
    }

    /// Explorer link for a transaction, when the network has an explorer.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        if self.network.explorer_url.is_empty() {
            None
        } else {
            Some(format!("{}/tx/{}", self.network.explorer_url, tx_hash))
        }
    }
}

impl RegistryLedger for VaultClient {
    fn append(
        &self,
        principal: Address,
        record: NewFileRecord,
    ) -> impl Future<Output = Result<AppendReceipt, VaultError>> + Send {
        async move {
            if principal != self.sender {
                return Err(VaultError::input(format!(
                    "Client signs as {} but the record belongs to {}",
                    self.sender, principal
                )));
            }
            let receipt = self.vault.add_file(principal, record).await?;
            tracing::info!(
                tx_hash = %receipt.tx_hash,
                block = ?receipt.block_number,
                index = ?receipt.index,
                network = %self.network.name,
                "Registry append confirmed"
            );
            Ok(receipt)
        }
    }

    fn count(&self, owner: Address) -> impl Future<Output = Result<u64, VaultError>> + Send {
        self.vault.file_count(owner)
    }

    fn get(
        &self,
        owner: Address,
        index: u64,
    ) -> impl Future<Output = Result<FileRecord, VaultError>> + Send {
        self.vault.file(owner, index)
    }
}
