// src/lib.rs
//! Client for zkSync paymasters: fee sponsorship, ERC-20 fee payment and
//! NFT-backed sponsorship for EOAs and smart accounts.

pub mod builders;
pub mod client;
pub mod config;
pub mod contracts;
pub mod eip712;
pub mod error;
pub mod estimator;
pub mod guard;
pub mod paymaster;
pub mod provider;
pub mod rpc;
pub mod signer;
pub mod transaction;
pub mod types;

#[cfg(test)]
mod mock;

pub use client::{PaymasterClient, Program};
pub use config::{Network, PaymasterConfig};
pub use error::{PaymasterError, SimulationError};
pub use provider::{HttpZkProvider, ZkProvider};
pub use signer::{PaymasterSigner, SigningCredential, WalletSigner};
pub use types::{NftType, PaymentKind, PaymentMode, PaymentRequest, TransactionDraft};
