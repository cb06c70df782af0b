// src/guard.rs
use ethers::types::{Address, U256};
use tracing::debug;

use crate::contracts::Erc20Contract;
use crate::error::PaymasterError;
use crate::provider::ZkProvider;

/// Refuses to go further when the payer cannot cover the token fee.
pub struct BalanceGuard<'a> {
    provider: &'a dyn ZkProvider,
}

impl<'a> BalanceGuard<'a> {
    pub fn new(provider: &'a dyn ZkProvider) -> Self {
        Self { provider }
    }

    pub async fn ensure_sufficient(
        &self,
        owner: Address,
        token: Address,
        required: U256,
    ) -> Result<(), PaymasterError> {
        let balance = Erc20Contract::new(token, self.provider)
            .balance_of(owner)
            .await?;

        if balance < required {
            return Err(PaymasterError::InsufficientBalance {
                required,
                available: balance,
            });
        }

        debug!("Balance of {} in {} covers {}", owner, token, required);
        Ok(())
    }
}
