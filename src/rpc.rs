// src/rpc.rs
use ethers::types::{Address, Bytes, H256, U256, U64};
use jsonrpsee::proc_macros::rpc;
use serde::{Deserialize, Serialize};

use crate::types::{Eip712Meta, PaymasterParams, TransactionDraft};

/// EIP-712 transaction type id on zkSync.
pub const EIP712_TX_TYPE: u8 = 0x71;

// Subset of the `eth` namespace the SDK talks to.
#[rpc(client, namespace = "eth")]
pub trait EthApi {
    #[method(name = "chainId")]
    async fn chain_id(&self) -> jsonrpsee::core::RpcResult<U64>;

    #[method(name = "gasPrice")]
    async fn gas_price(&self) -> jsonrpsee::core::RpcResult<U256>;

    #[method(name = "getTransactionCount")]
    async fn transaction_count(&self, address: Address, block: String) -> jsonrpsee::core::RpcResult<U256>;

    /// zkSync accepts `eip712Meta` here so paymaster validation is simulated too.
    #[method(name = "estimateGas")]
    async fn estimate_gas(&self, request: CallRequest) -> jsonrpsee::core::RpcResult<U256>;

    #[method(name = "call")]
    async fn call(&self, request: CallRequest, block: String) -> jsonrpsee::core::RpcResult<Bytes>;

    #[method(name = "sendRawTransaction")]
    async fn send_raw_transaction(&self, raw: Bytes) -> jsonrpsee::core::RpcResult<H256>;
}

/// Paymaster params as the node expects them: input as a plain byte array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcPaymasterParams {
    pub paymaster: Address,
    pub paymaster_input: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEip712Meta {
    pub gas_per_pubdata: U256,
    pub factory_deps: Vec<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_signature: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_params: Option<RpcPaymasterParams>,
}

impl From<&PaymasterParams> for RpcPaymasterParams {
    fn from(params: &PaymasterParams) -> Self {
        Self {
            paymaster: params.paymaster,
            paymaster_input: params.paymaster_input.to_vec(),
        }
    }
}

impl From<&Eip712Meta> for RpcEip712Meta {
    fn from(meta: &Eip712Meta) -> Self {
        Self {
            gas_per_pubdata: meta.gas_per_pubdata,
            factory_deps: meta.factory_deps.iter().map(|d| d.to_vec()).collect(),
            custom_signature: meta.custom_signature.as_ref().map(|s| s.to_vec()),
            paymaster_params: meta.paymaster_params.as_ref().map(RpcPaymasterParams::from),
        }
    }
}

/// Request body for `eth_estimateGas` / `eth_call`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eip712_meta: Option<RpcEip712Meta>,
}

impl CallRequest {
    /// Read-only contract call.
    pub fn contract_call(to: Address, data: Bytes) -> Self {
        Self {
            to: Some(to),
            data: Some(data),
            ..Self::default()
        }
    }

    /// Simulation request for a draft sent by `from`. Drafts carrying
    /// metadata are sent as EIP-712 transactions.
    pub fn from_draft(draft: &TransactionDraft, from: Address) -> Self {
        let eip712_meta = draft.custom_data.as_ref().map(RpcEip712Meta::from);
        Self {
            from: Some(from),
            to: draft.to,
            data: Some(draft.data.clone()),
            value: Some(draft.value),
            transaction_type: eip712_meta.as_ref().map(|_| U64::from(EIP712_TX_TYPE)),
            eip712_meta,
        }
    }
}
