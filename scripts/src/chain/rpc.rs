//! A chain client backed by a JSON-RPC node

use alloy::{
    eips::BlockId,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, B256, U256},
    providers::{ext::AnvilApi, DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::{http::reqwest::Url, TransportError},
};
use async_trait::async_trait;
use tracing::debug;

use super::{ChainClient, ChainError, SnapshotChain, TxReceipt};
use crate::errors::ScriptError;

/// A chain client talking to a node over HTTP.
///
/// Transactions are signed locally with the signer handed to each call; the
/// client itself holds no key material.
#[derive(Clone)]
pub struct RpcClient {
    /// The underlying provider
    provider: DynProvider,
}

impl RpcClient {
    /// Connect to the node at the given URL
    pub fn connect(rpc_url: &str) -> Result<Self, ScriptError> {
        let url =
            Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            provider: DynProvider::new(provider),
        })
    }

    /// The underlying provider
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

/// Extract revert data from a node error response, if it carries any
fn map_rpc_error(e: TransportError) -> ChainError {
    match e.as_error_resp().and_then(|payload| payload.as_revert_data()) {
        Some(data) => ChainError::Reverted(data),
        None => ChainError::Transport(e.to_string()),
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider.get_chain_id().await.map_err(map_rpc_error)
    }

    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        tx: TransactionRequest,
    ) -> Result<TxHash, ChainError> {
        let from = signer.address();
        let tx = tx.with_from(from);

        let chain_id = self.provider.get_chain_id().await.map_err(map_rpc_error)?;
        let nonce = self
            .provider
            .get_transaction_count(from)
            .pending()
            .await
            .map_err(map_rpc_error)?;

        // Gas estimation executes the transaction, so reverts surface here
        let gas_limit = self
            .provider
            .estimate_gas(tx.clone())
            .await
            .map_err(map_rpc_error)?;
        let fees = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(map_rpc_error)?;

        let tx = tx
            .with_chain_id(chain_id)
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let wallet = EthereumWallet::from(signer.clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let pending = self
            .provider
            .send_tx_envelope(envelope)
            .await
            .map_err(map_rpc_error)?;
        let tx_hash = *pending.tx_hash();
        debug!("Submitted transaction {tx_hash:#x} from {from:#x} with nonce {nonce}");

        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, ChainError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(map_rpc_error)?;

        Ok(receipt.map(|receipt| TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            status: receipt.status(),
            gas_used: receipt.gas_used,
        }))
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, ChainError> {
        self.provider.call(tx).await.map_err(map_rpc_error)
    }

    async fn call_at(
        &self,
        tx: TransactionRequest,
        block_number: u64,
    ) -> Result<Bytes, ChainError> {
        self.provider
            .call(tx)
            .block(BlockId::number(block_number))
            .await
            .map_err(map_rpc_error)
    }

    async fn storage_at(&self, address: Address, slot: B256) -> Result<U256, ChainError> {
        self.provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await
            .map_err(map_rpc_error)
    }
}

#[async_trait]
impl SnapshotChain for RpcClient {
    async fn snapshot(&self) -> Result<U256, ChainError> {
        self.provider.anvil_snapshot().await.map_err(map_rpc_error)
    }

    async fn revert(&self, id: U256) -> Result<bool, ChainError> {
        self.provider.anvil_revert(id).await.map_err(map_rpc_error)
    }
}
