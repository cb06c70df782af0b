// src/paymaster.rs
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use crate::error::PaymasterError;
use crate::types::{NftType, PaymasterParams};

const GENERAL_FLOW: &str = "general(bytes)";
const APPROVAL_BASED_FLOW: &str = "approvalBased(address,uint256,bytes)";

/// The two paymaster flows understood by the rollup's bootloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymasterInput {
    General {
        inner_input: Bytes,
    },
    ApprovalBased {
        token: Address,
        minimal_allowance: U256,
        inner_input: Bytes,
    },
}

impl PaymasterInput {
    /// ABI-encodes the flow call the paymaster receives as `paymasterInput`.
    pub fn encode(&self) -> Bytes {
        let (signature, tokens) = match self {
            PaymasterInput::General { inner_input } => {
                (GENERAL_FLOW, vec![Token::Bytes(inner_input.to_vec())])
            }
            PaymasterInput::ApprovalBased {
                token,
                minimal_allowance,
                inner_input,
            } => (
                APPROVAL_BASED_FLOW,
                vec![
                    Token::Address(*token),
                    Token::Uint(*minimal_allowance),
                    Token::Bytes(inner_input.to_vec()),
                ],
            ),
        };

        let mut data = id(signature).to_vec();
        data.extend_from_slice(&encode(&tokens));
        Bytes::from(data)
    }
}

/// How much allowance an `ApprovalBased` flow grants the paymaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowancePolicy {
    /// Unbounded allowance, only ever used while simulating.
    Simulation,
    /// The oracle's fee plus a percentage margin.
    Margin(u64),
}

impl AllowancePolicy {
    pub fn allowance(&self, token_fee: U256) -> Result<U256, PaymasterError> {
        match self {
            AllowancePolicy::Simulation => Ok(U256::MAX),
            AllowancePolicy::Margin(percent) => apply_percent(token_fee, *percent),
        }
    }
}

/// `value * (100 + percent) / 100`, truncating.
pub fn apply_percent(value: U256, percent: u64) -> Result<U256, PaymasterError> {
    let factor = U256::from(100u64)
        .checked_add(U256::from(percent))
        .ok_or_else(|| PaymasterError::InvalidParameters("percentage overflow".to_string()))?;
    value
        .checked_mul(factor)
        .map(|scaled| scaled / U256::from(100u64))
        .ok_or_else(|| PaymasterError::InvalidParameters("amount overflow".to_string()))
}

/// Produces [`PaymasterParams`] for one paymaster contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymasterParamBuilder {
    paymaster: Address,
}

impl PaymasterParamBuilder {
    pub fn new(paymaster: Address) -> Self {
        Self { paymaster }
    }

    pub fn paymaster(&self) -> Address {
        self.paymaster
    }

    pub fn build(&self, input: &PaymasterInput) -> PaymasterParams {
        PaymasterParams {
            paymaster: self.paymaster,
            paymaster_input: input.encode(),
        }
    }

    pub fn general(&self, inner_input: &Bytes) -> PaymasterParams {
        self.build(&PaymasterInput::General {
            inner_input: inner_input.clone(),
        })
    }

    pub fn approval_based(
        &self,
        token: Address,
        minimal_allowance: U256,
        inner_input: &Bytes,
    ) -> PaymasterParams {
        self.build(&PaymasterInput::ApprovalBased {
            token,
            minimal_allowance,
            inner_input: inner_input.clone(),
        })
    }
}

/// Inner input used when the caller gives none. The canonical paymaster reads
/// the zero address as "no partner"; a caller-chosen paymaster gets nothing.
pub fn default_inner_input(custom_paymaster: bool) -> Bytes {
    if custom_paymaster {
        Bytes::default()
    } else {
        Bytes::from(encode(&[Token::Address(Address::zero())]))
    }
}

/// `abi.encode(uint8 nftType)`.
pub fn nft_inner_input(nft_type: NftType) -> Bytes {
    Bytes::from(encode(&[Token::Uint(U256::from(nft_type.value()))]))
}

/// Encodes a partner name as a right-padded `bytes32` string.
pub fn encode_partner_code(name: &str) -> Result<Bytes, PaymasterError> {
    let raw = name.as_bytes();
    // one byte is kept for the null terminator
    if raw.len() > 31 {
        return Err(PaymasterError::InvalidParameters(format!(
            "partner code `{name}` is longer than 31 bytes"
        )));
    }
    let mut word = [0u8; 32];
    word[..raw.len()].copy_from_slice(raw);
    Ok(Bytes::from(word.to_vec()))
}
