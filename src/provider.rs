// src/provider.rs
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tracing::debug;

use crate::error::{PaymasterError, SimulationError};
use crate::rpc::{CallRequest, EthApiClient};
use crate::types::TransactionDraft;

/// Everything the SDK needs from a rollup node.
#[async_trait]
pub trait ZkProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64, PaymasterError>;

    async fn gas_price(&self) -> Result<U256, PaymasterError>;

    async fn nonce(&self, address: Address) -> Result<U256, PaymasterError>;

    /// Simulates `draft` sent by `from`, including paymaster validation when
    /// params are attached.
    async fn estimate_gas(
        &self,
        draft: &TransactionDraft,
        from: Address,
    ) -> Result<U256, SimulationError>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, PaymasterError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, PaymasterError>;
}

/// [`ZkProvider`] over a JSON-RPC HTTP endpoint.
pub struct HttpZkProvider {
    client: HttpClient,
    url: String,
}

impl HttpZkProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, PaymasterError> {
        let url = url.into();
        let client = HttpClientBuilder::default()
            .build(&url)
            .map_err(|e| PaymasterError::EthereumProviderError(e.to_string()))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ZkProvider for HttpZkProvider {
    async fn chain_id(&self) -> Result<u64, PaymasterError> {
        let chain_id = self
            .client
            .chain_id()
            .await
            .map_err(|e| PaymasterError::EthereumProviderError(e.to_string()))?;
        Ok(chain_id.as_u64())
    }

    async fn gas_price(&self) -> Result<U256, PaymasterError> {
        self.client
            .gas_price()
            .await
            .map_err(|e| PaymasterError::EthereumProviderError(e.to_string()))
    }

    async fn nonce(&self, address: Address) -> Result<U256, PaymasterError> {
        self.client
            .transaction_count(address, "latest".to_string())
            .await
            .map_err(|e| PaymasterError::EthereumProviderError(e.to_string()))
    }

    async fn estimate_gas(
        &self,
        draft: &TransactionDraft,
        from: Address,
    ) -> Result<U256, SimulationError> {
        let request = CallRequest::from_draft(draft, from);
        debug!("eth_estimateGas from {} (eip712: {})", from, request.eip712_meta.is_some());
        self.client
            .estimate_gas(request)
            .await
            .map_err(|e| SimulationError::classify(e.to_string()))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, PaymasterError> {
        self.client
            .call(CallRequest::contract_call(to, data), "latest".to_string())
            .await
            .map_err(|e| PaymasterError::EthereumProviderError(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, PaymasterError> {
        self.client
            .send_raw_transaction(raw)
            .await
            .map_err(|e| PaymasterError::SubmissionFailed(e.to_string()))
    }
}
