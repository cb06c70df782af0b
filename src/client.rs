// src/client.rs
use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use tracing::debug;

use crate::builders;
use crate::config::{Network, PaymasterConfig};
use crate::error::PaymasterError;
use crate::provider::{HttpZkProvider, ZkProvider};
use crate::signer::{resolve, Backend, PaymasterSigner, SigningCredential};
use crate::transaction::{
    execute_by_signer, execute_by_smart_account, execute_by_wallet, Controller,
};
use crate::types::{NftType, PaymentMode, PaymentRequest, UserNftEntitlement};

/// Which paymaster deployment a client talks to by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Program {
    #[default]
    Internal,
    /// Partner deployment; every request must carry the partner code as
    /// inner input.
    Partner,
}

pub struct PaymasterClient {
    config: PaymasterConfig,
    program: Program,
    provider: Option<Arc<dyn ZkProvider>>,
    injected: Option<Arc<dyn PaymasterSigner>>,
}

impl PaymasterClient {
    pub fn new(config: PaymasterConfig) -> Self {
        Self {
            config,
            program: Program::default(),
            provider: None,
            injected: None,
        }
    }

    pub fn program(mut self, program: Program) -> Self {
        self.program = program;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn ZkProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Wallet used when a call is made without any credential.
    pub fn with_injected_signer(mut self, signer: Arc<dyn PaymasterSigner>) -> Self {
        self.injected = Some(signer);
        self
    }

    pub fn config(&self) -> &PaymasterConfig {
        &self.config
    }

    fn provider_for(&self, network: Network) -> Result<Arc<dyn ZkProvider>, PaymasterError> {
        match &self.provider {
            Some(provider) => Ok(provider.clone()),
            None => Ok(Arc::new(HttpZkProvider::new(network.rpc_url())?)),
        }
    }

    fn prepare(&self, request: &PaymentRequest) -> Result<PaymentRequest, PaymasterError> {
        match self.program {
            Program::Internal => Ok(request.clone()),
            Program::Partner => {
                if request.inner_input.is_none() {
                    return Err(PaymasterError::MissingRequiredField("inner_input"));
                }
                let mut prepared = request.clone();
                prepared
                    .paymaster_address
                    .get_or_insert_with(|| request.network.partner_paymaster());
                Ok(prepared)
            }
        }
    }

    /// Builds, signs and submits `request`, paying the fee as `mode` says.
    pub async fn execute(
        &self,
        request: &PaymentRequest,
        mode: &PaymentMode,
        credential: impl Into<SigningCredential>,
    ) -> Result<H256, PaymasterError> {
        let request = self.prepare(request)?;
        match resolve(credential.into(), self.injected.as_ref())? {
            Backend::Wallet(wallet) => {
                let provider = self.provider_for(request.network)?;
                execute_by_wallet(&request, mode, provider.as_ref(), &wallet, &self.config).await
            }
            Backend::Signer(signer) => {
                execute_by_signer(&request, mode, signer.as_ref(), &self.config).await
            }
        }
    }

    pub async fn sponsor(
        &self,
        request: &PaymentRequest,
        credential: impl Into<SigningCredential>,
    ) -> Result<H256, PaymasterError> {
        self.execute(request, &PaymentMode::Sponsor, credential).await
    }

    /// Same as [`execute`](Self::execute), sent from the smart account
    /// `account` with `credential` acting as its controller.
    pub async fn execute_smart_account(
        &self,
        request: &PaymentRequest,
        mode: &PaymentMode,
        credential: impl Into<SigningCredential>,
        account: Address,
    ) -> Result<H256, PaymasterError> {
        let request = self.prepare(request)?;
        debug!("Executing for smart account {}", account);
        match resolve(credential.into(), self.injected.as_ref())? {
            Backend::Wallet(wallet) => {
                let provider = self.provider_for(request.network)?;
                execute_by_smart_account(
                    &request,
                    mode,
                    provider.as_ref(),
                    Controller::Wallet(&wallet),
                    account,
                    &self.config,
                )
                .await
            }
            Backend::Signer(signer) => {
                let provider = signer.provider();
                execute_by_smart_account(
                    &request,
                    mode,
                    provider.as_ref(),
                    Controller::Signer(signer.as_ref()),
                    account,
                    &self.config,
                )
                .await
            }
        }
    }

    pub async fn sponsor_smart_account(
        &self,
        request: &PaymentRequest,
        credential: impl Into<SigningCredential>,
        account: Address,
    ) -> Result<H256, PaymasterError> {
        self.execute_smart_account(request, &PaymentMode::Sponsor, credential, account)
            .await
    }

    /// NFTs `user` holds in the network's NFT paymaster collection.
    pub async fn user_nfts(
        &self,
        network: Network,
        user: Address,
    ) -> Result<Vec<UserNftEntitlement>, PaymasterError> {
        let provider = self.provider_for(network)?;
        builders::user_nfts(provider.as_ref(), network.nft_paymaster(), user).await
    }

    pub async fn find_best_nft_type(
        &self,
        network: Network,
        user: Address,
        eth_fee: U256,
    ) -> Result<NftType, PaymasterError> {
        let provider = self.provider_for(network)?;
        builders::find_best_nft_type(provider.as_ref(), network.nft_paymaster(), user, eth_fee)
            .await
    }
}
