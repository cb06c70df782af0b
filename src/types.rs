// src/types.rs
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::config::{Network, DEFAULT_GAS_PER_PUBDATA_LIMIT};
use crate::error::PaymasterError;

/// Paymaster address plus the encoded `general` / `approvalBased` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterParams {
    pub paymaster: Address,
    pub paymaster_input: Bytes,
}

/// zkSync extended transaction metadata (`customData`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Meta {
    pub gas_per_pubdata: U256,
    pub factory_deps: Vec<Bytes>,
    pub custom_signature: Option<Bytes>,
    pub paymaster_params: Option<PaymasterParams>,
}

impl Default for Eip712Meta {
    fn default() -> Self {
        Self {
            gas_per_pubdata: U256::from(DEFAULT_GAS_PER_PUBDATA_LIMIT),
            factory_deps: Vec::new(),
            custom_signature: None,
            paymaster_params: None,
        }
    }
}

/// Unsigned call supplied by the caller. Every stage returns a new draft
/// instead of editing the one it was given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub custom_data: Option<Eip712Meta>,
}

impl TransactionDraft {
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            to: Some(to),
            data,
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Replaces whatever paymaster params were attached before.
    pub fn with_paymaster_params(&self, params: PaymasterParams, gas_per_pubdata: U256) -> Self {
        let mut next = self.clone();
        let meta = next.custom_data.get_or_insert_with(Eip712Meta::default);
        meta.gas_per_pubdata = gas_per_pubdata;
        meta.paymaster_params = Some(params);
        next
    }

    /// Drops the extended metadata entirely, leaving a plain call.
    pub fn without_paymaster_params(&self) -> Self {
        Self {
            custom_data: None,
            ..self.clone()
        }
    }

    pub fn paymaster_params(&self) -> Option<&PaymasterParams> {
        self.custom_data.as_ref().and_then(|m| m.paymaster_params.as_ref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NftType(u8);

impl NftType {
    pub const MAX: u8 = 3;

    pub fn new(value: u8) -> Result<Self, PaymasterError> {
        if value > Self::MAX {
            return Err(PaymasterError::InvalidParameters(format!(
                "nft type must be between 0 and {}, got {value}",
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// How the fee of a transaction gets paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMode {
    /// The paymaster covers the fee outright.
    Sponsor,
    /// The payer settles the fee in an ERC-20 token.
    Erc20 { token: Address },
    /// An NFT entitlement covers the fee; `token` pays the remainder when the
    /// NFT's sponsorship cap is not enough.
    Nft {
        nft_type: NftType,
        token: Option<Address>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    Sponsor,
    Erc20,
    Nft,
}

impl PaymentMode {
    /// Builds a mode from loosely typed inputs, checking that the fields the
    /// mode needs are present.
    pub fn from_parts(
        kind: PaymentKind,
        token: Option<Address>,
        nft_type: Option<u8>,
    ) -> Result<Self, PaymasterError> {
        match kind {
            PaymentKind::Sponsor => Ok(PaymentMode::Sponsor),
            PaymentKind::Erc20 => {
                let token = token.ok_or(PaymasterError::MissingRequiredField("payment_token"))?;
                Ok(PaymentMode::Erc20 { token })
            }
            PaymentKind::Nft => {
                let nft_type = nft_type.ok_or(PaymasterError::MissingRequiredField("nft_type"))?;
                Ok(PaymentMode::Nft {
                    nft_type: NftType::new(nft_type)?,
                    token,
                })
            }
        }
    }
}

/// One payment call. Built once and read by every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub network: Network,
    pub transaction: TransactionDraft,
    pub paymaster_address: Option<Address>,
    pub inner_input: Option<Bytes>,
    pub gas_limit_override: Option<U256>,
    pub minimum_gas_limit: Option<U256>,
    pub gas_buffer_percent: Option<u64>,
}

impl PaymentRequest {
    pub fn new(network: Network, transaction: TransactionDraft) -> Self {
        Self {
            network,
            transaction,
            paymaster_address: None,
            inner_input: None,
            gas_limit_override: None,
            minimum_gas_limit: None,
            gas_buffer_percent: None,
        }
    }

    pub fn with_paymaster_address(mut self, paymaster: Address) -> Self {
        self.paymaster_address = Some(paymaster);
        self
    }

    pub fn with_inner_input(mut self, inner_input: Bytes) -> Self {
        self.inner_input = Some(inner_input);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit_override = Some(gas_limit);
        self
    }

    pub fn with_minimum_gas_limit(mut self, gas_limit: U256) -> Self {
        self.minimum_gas_limit = Some(gas_limit);
        self
    }

    pub fn with_gas_buffer_percent(mut self, percent: u64) -> Self {
        self.gas_buffer_percent = Some(percent);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub gas_limit: U256,
    pub gas_price: U256,
}

impl FeeQuote {
    /// `gas_limit * gas_price`, the fee in wei.
    pub fn eth_fee(&self) -> Result<U256, PaymasterError> {
        self.gas_limit
            .checked_mul(self.gas_price)
            .ok_or_else(|| PaymasterError::InvalidParameters("Fee calculation overflow".to_string()))
    }
}

/// A draft with its final paymaster params attached, plus the fee it was sized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderOutput {
    pub transaction: TransactionDraft,
    pub gas_limit: U256,
    pub gas_price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNftEntitlement {
    pub id: U256,
    pub balance: U256,
    pub metadata_uri: String,
    pub max_sponsored_gas: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(byte: u8) -> PaymasterParams {
        PaymasterParams {
            paymaster: Address::repeat_byte(byte),
            paymaster_input: Bytes::from(vec![byte; 4]),
        }
    }

    #[test]
    fn attaching_params_replaces_previous_ones() {
        let draft = TransactionDraft::call(Address::repeat_byte(1), Bytes::from(vec![0xab]));
        let gas = U256::from(DEFAULT_GAS_PER_PUBDATA_LIMIT);
        let first = draft.with_paymaster_params(params(2), gas);
        let second = first.with_paymaster_params(params(3), gas);

        assert!(draft.custom_data.is_none());
        assert_eq!(first.paymaster_params(), Some(&params(2)));
        assert_eq!(second.paymaster_params(), Some(&params(3)));
        assert_eq!(second.with_paymaster_params(params(3), gas), second);
        assert!(second.without_paymaster_params().custom_data.is_none());
    }

    #[test]
    fn mode_requires_its_fields() {
        assert!(matches!(
            PaymentMode::from_parts(PaymentKind::Erc20, None, None),
            Err(PaymasterError::MissingRequiredField("payment_token"))
        ));
        assert!(matches!(
            PaymentMode::from_parts(PaymentKind::Nft, None, None),
            Err(PaymasterError::MissingRequiredField("nft_type"))
        ));
        assert!(matches!(
            PaymentMode::from_parts(PaymentKind::Nft, None, Some(4)),
            Err(PaymasterError::InvalidParameters(_))
        ));
        assert_eq!(
            PaymentMode::from_parts(PaymentKind::Sponsor, Some(Address::zero()), None).unwrap(),
            PaymentMode::Sponsor
        );
    }
}
