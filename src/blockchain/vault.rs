// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NullAccessVault registry contract interactions.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    rpc::types::TransactionReceipt,
    sol,
};

use super::types::{AppendReceipt, FileRecord, KeyHandle, NewFileRecord};
use crate::crypto::MaskedHash;
use crate::error::VaultError;

// `externalEuint32` and `euint32` are both bytes32 at the ABI level.
sol! {
    #[sol(rpc)]
    interface INullAccessVault {
        event FileAdded(address indexed owner, uint256 indexed index, string fileName);

        function addFile(
            string fileName,
            string encryptedIpfsHash,
            bytes32 encryptedKey,
            bytes inputProof
        ) external;

        function getFileCount(address owner) external view returns (uint256);

        function getFile(address owner, uint256 index)
            external
            view
            returns (string fileName, string encryptedIpfsHash, bytes32 encryptedKey, uint256 uploadedAt);
    }
}

/// Registry contract wrapper.
pub struct VaultContract<P> {
    contract: INullAccessVault::INullAccessVaultInstance<P>,
    address: Address,
}

impl<P: Provider + Clone> VaultContract<P> {
    pub fn new(provider: &P, address: Address) -> Self {
        let contract = INullAccessVault::new(address, provider.clone());
        Self { contract, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Submit `addFile` and wait for the receipt.
    ///
    /// A send error (including a revert during gas estimation) and a receipt
    /// with failed status both map to `LedgerFailure`.
    pub async fn add_file(
        &self,
        owner: Address,
        record: NewFileRecord,
    ) -> Result<AppendReceipt, VaultError> {
        let pending = self
            .contract
            .addFile(
                record.file_name,
                record.masked_hash.into_string(),
                record.input.handle.as_b256(),
                record.input.proof,
            )
            .send()
            .await
            .map_err(|e| VaultError::ledger(format!("Failed to send addFile: {e}")))?;

        let tx_hash = format!("{:?}", pending.tx_hash());
        tracing::debug!(tx_hash = %tx_hash, "addFile submitted, waiting for receipt");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| VaultError::ledger(format!("Failed to get receipt for {tx_hash}: {e}")))?;

        if !receipt.status() {
            return Err(VaultError::ledger(format!("Transaction {tx_hash} reverted")));
        }

        Ok(AppendReceipt {
            tx_hash,
            block_number: receipt.block_number,
            index: self.added_index(&receipt, owner),
        })
    }

    /// Index announced by the `FileAdded` event in a receipt, if present.
    fn added_index(&self, receipt: &TransactionReceipt, owner: Address) -> Option<u64> {
        receipt.inner.logs().iter().find_map(|log| {
            if log.address() != self.address {
                return None;
            }
            let decoded = log.log_decode::<INullAccessVault::FileAdded>().ok()?;
            let event = decoded.inner.data;
            if event.owner != owner {
                return None;
            }
            u64::try_from(event.index).ok()
        })
    }

    pub async fn file_count(&self, owner: Address) -> Result<u64, VaultError> {
        let count: U256 = self
            .contract
            .getFileCount(owner)
            .call()
            .await
            .map_err(|e| VaultError::ledger(format!("getFileCount failed: {e}")))?;
        u64::try_from(count).map_err(|_| VaultError::ledger("file count overflows u64"))
    }

    pub async fn file(&self, owner: Address, index: u64) -> Result<FileRecord, VaultError> {
        let result = self
            .contract
            .getFile(owner, U256::from(index))
            .call()
            .await
            .map_err(|e| VaultError::ledger(format!("getFile({index}) failed: {e}")))?;

        Ok(FileRecord {
            index,
            file_name: result.fileName,
            masked_hash: MaskedHash::from_stored(result.encryptedIpfsHash),
            key_handle: KeyHandle(result.encryptedKey),
            created_at: u64::try_from(result.uploadedAt).unwrap_or(u64::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, B256};
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn add_file_selector_matches_bytes32_abi() {
        assert_eq!(
            INullAccessVault::addFileCall::SIGNATURE,
            "addFile(string,string,bytes32,bytes)"
        );
    }

    #[test]
    fn add_file_call_round_trips() {
        let call = INullAccessVault::addFileCall {
            fileName: "report.pdf".to_string(),
            encryptedIpfsHash: "YF8=".to_string(),
            encryptedKey: B256::repeat_byte(7),
            inputProof: Bytes::from(vec![1, 2, 3]),
        };
        let decoded = INullAccessVault::addFileCall::abi_decode(&call.abi_encode()).unwrap();
        assert_eq!(decoded.fileName, "report.pdf");
        assert_eq!(decoded.encryptedKey, B256::repeat_byte(7));
    }

    #[test]
    fn file_added_event_signature() {
        assert_eq!(
            INullAccessVault::FileAdded::SIGNATURE,
            "FileAdded(address,uint256,string)"
        );
    }
}
