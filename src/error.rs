// src/error.rs
use ethers::types::U256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymasterError {
    #[error("Insufficient token balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Invalid signing credential: {0}")]
    InvalidCredential(String),

    #[error("Extension not found")]
    ExtensionNotFound,

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Gas simulation failed: {0}")]
    SimulationFailed(#[source] SimulationError),

    #[error("Estimated fee {fee} exceeds sponsored gas cap {cap}")]
    SponsorshipExceeded { fee: U256, cap: U256 },

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Ethereum provider error: {0}")]
    EthereumProviderError(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Why a gas simulation was rejected by the node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("paymaster validation failed: {0}")]
    PaymasterValidation(String),

    #[error("sponsored gas cap exceeded: {0}")]
    SponsoredGasExceeded(String),

    #[error("{0}")]
    Other(String),
}

impl SimulationError {
    /// Classifies a raw node error message. Only the RPC boundary looks at
    /// the message text; everything above it matches on the variant.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("exceed_gas_fee") {
            Self::SponsoredGasExceeded(message)
        } else if lowered.contains("paymaster validation") || lowered.contains("failed to validate") {
            Self::PaymasterValidation(message)
        } else {
            Self::Other(message)
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::PaymasterValidation(m) | Self::SponsoredGasExceeded(m) | Self::Other(m) => m,
        }
    }
}
