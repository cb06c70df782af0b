// src/config.rs
use std::fmt;
use std::str::FromStr;

use ethers::types::{Address, H160, U256};
use serde::{Deserialize, Serialize};

use crate::error::PaymasterError;

/// Default gas limit used as the floor of the fallback estimate.
pub const DEFAULT_GAS_LIMIT: u64 = 1_500_000;

/// Default `gasPerPubdata` attached to every EIP-712 transaction.
pub const DEFAULT_GAS_PER_PUBDATA_LIMIT: u64 = 50_000;

const INTERNAL_PAYMASTER_TESTNET: Address = H160([
    0xe1, 0x51, 0xd8, 0x5e, 0xa1, 0xbc, 0x32, 0xfb, 0x48, 0x63, 0xa4, 0x84, 0xf5, 0x90, 0x98, 0x3f,
    0x11, 0xbd, 0x68, 0x8a,
]);
const INTERNAL_PAYMASTER_MAINNET: Address = H160([
    0x40, 0x81, 0xe0, 0x92, 0xf9, 0x48, 0xcf, 0xfd, 0x94, 0x6a, 0x75, 0xe1, 0xf5, 0x56, 0xc1, 0x3c,
    0x37, 0x23, 0x04, 0xbc,
]);
const PARTNER_PAYMASTER_TESTNET: Address = H160([
    0xd2, 0x4a, 0xeb, 0x2f, 0xf2, 0x10, 0x51, 0x08, 0x27, 0xef, 0x1f, 0x43, 0xfa, 0x89, 0x84, 0x69,
    0xc1, 0x7a, 0x7e, 0x65,
]);
const PARTNER_PAYMASTER_MAINNET: Address = H160([
    0x06, 0x92, 0x46, 0xdf, 0xec, 0xb9, 0x5a, 0x64, 0x09, 0x18, 0x0b, 0x52, 0xc0, 0x71, 0x00, 0x35,
    0x37, 0xb2, 0x3c, 0x27,
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://sepolia.era.zksync.dev",
            Network::Mainnet => "https://mainnet.era.zksync.io",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Testnet => 300,
            Network::Mainnet => 324,
        }
    }

    /// Paymaster used by the SDK's own (non-partner) flows.
    pub fn internal_paymaster(&self) -> Address {
        match self {
            Network::Testnet => INTERNAL_PAYMASTER_TESTNET,
            Network::Mainnet => INTERNAL_PAYMASTER_MAINNET,
        }
    }

    /// Paymaster that reads a partner code from its inner input.
    pub fn partner_paymaster(&self) -> Address {
        match self {
            Network::Testnet => PARTNER_PAYMASTER_TESTNET,
            Network::Mainnet => PARTNER_PAYMASTER_MAINNET,
        }
    }

    /// Paymaster exposing `nftAsset()` and the per-NFT-type token fee oracle.
    pub fn nft_paymaster(&self) -> Address {
        self.partner_paymaster()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Testnet => write!(f, "testnet"),
            Network::Mainnet => write!(f, "mainnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(format!("unknown network `{other}`")),
        }
    }
}

/// Tunables shared by every payment flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterConfig {
    pub default_gas_limit: U256,
    pub gas_per_pubdata: U256,
    /// Inflation applied to the metadata-free estimate when the paymaster
    /// simulation fails.
    pub fallback_inflation_percent: u64,
    /// Margin added on top of the oracle's token fee when granting allowance.
    pub allowance_margin_percent: u64,
    /// Extra gas added to the limit at submission time.
    pub submission_buffer_percent: u64,
}

impl Default for PaymasterConfig {
    fn default() -> Self {
        Self {
            default_gas_limit: U256::from(DEFAULT_GAS_LIMIT),
            gas_per_pubdata: U256::from(DEFAULT_GAS_PER_PUBDATA_LIMIT),
            fallback_inflation_percent: 50,
            allowance_margin_percent: 5,
            submission_buffer_percent: 0,
        }
    }
}

impl PaymasterConfig {
    /// Defaults overridden by `PAYMASTER_*` environment variables.
    pub fn from_env() -> Result<Self, PaymasterError> {
        let mut config = Self::default();
        if let Some(v) = env_u64("PAYMASTER_DEFAULT_GAS_LIMIT")? {
            config.default_gas_limit = U256::from(v);
        }
        if let Some(v) = env_u64("PAYMASTER_GAS_PER_PUBDATA")? {
            config.gas_per_pubdata = U256::from(v);
        }
        if let Some(v) = env_u64("PAYMASTER_FALLBACK_INFLATION_PERCENT")? {
            config.fallback_inflation_percent = v;
        }
        if let Some(v) = env_u64("PAYMASTER_ALLOWANCE_MARGIN_PERCENT")? {
            config.allowance_margin_percent = v;
        }
        if let Some(v) = env_u64("PAYMASTER_SUBMISSION_BUFFER_PERCENT")? {
            config.submission_buffer_percent = v;
        }
        Ok(config)
    }
}

fn env_u64(key: &'static str) -> Result<Option<u64>, PaymasterError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| PaymasterError::InvalidParameters(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}
