// src/mock.rs
//! In-memory provider and signer used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::abi::{decode, encode, ParamType, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Signature, H256, U256};
use ethers::utils::{id, keccak256};

use crate::contracts::{
    BALANCE_OF, GET_ALL_NFTS, GET_NFT_TOKEN_FEE, GET_TOKEN_FEE, MAX_SPONSOR_GAS, NFT_ASSET,
};
use crate::eip712::Eip712Transaction;
use crate::error::{PaymasterError, SimulationError};
use crate::provider::ZkProvider;
use crate::signer::{sign_with_wallet, PaymasterSigner};
use crate::types::{TransactionDraft, UserNftEntitlement};

pub const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Provider with canned answers that records what it was asked.
pub struct MockProvider {
    pub chain_id: u64,
    pub gas_price: U256,
    pub nonce: U256,
    pub nft_asset: Address,
    token_fee: (U256, U256),
    nft_token_fee: (U256, U256),
    max_sponsor_gas: HashMap<u8, U256>,
    nfts: Vec<UserNftEntitlement>,
    balance: U256,
    send_error: Option<String>,
    estimates: Mutex<VecDeque<Result<U256, SimulationError>>>,
    estimated: Mutex<Vec<(TransactionDraft, Address)>>,
    calls: Mutex<Vec<(Address, [u8; 4])>>,
    nft_fee_queries: Mutex<Vec<U256>>,
    sent: Mutex<Vec<Bytes>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            chain_id: 300,
            gas_price: U256::one(),
            nonce: U256::from(3u64),
            nft_asset: Address::repeat_byte(0x5f),
            token_fee: (U256::zero(), U256::zero()),
            nft_token_fee: (U256::zero(), U256::zero()),
            max_sponsor_gas: HashMap::new(),
            nfts: Vec::new(),
            balance: U256::zero(),
            send_error: None,
            estimates: Mutex::new(VecDeque::new()),
            estimated: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            nft_fee_queries: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MockProvider {
    /// Answers for successive `estimate_gas` calls; 100k once exhausted.
    pub fn with_estimates(self, estimates: Vec<Result<U256, SimulationError>>) -> Self {
        *self.estimates.lock().unwrap() = estimates.into();
        self
    }

    pub fn with_token_fee(mut self, after_discount: u64, min_amount: u64) -> Self {
        self.token_fee = (U256::from(after_discount), U256::from(min_amount));
        self
    }

    pub fn with_nft_token_fee(mut self, after_discount: u64, erc20_fee: u64) -> Self {
        self.nft_token_fee = (U256::from(after_discount), U256::from(erc20_fee));
        self
    }

    pub fn with_max_sponsor_gas(mut self, nft_type: u8, cap: u64) -> Self {
        self.max_sponsor_gas.insert(nft_type, U256::from(cap));
        self
    }

    pub fn with_nfts(mut self, nfts: Vec<UserNftEntitlement>) -> Self {
        self.nfts = nfts;
        self
    }

    pub fn with_balance(mut self, balance: u64) -> Self {
        self.balance = U256::from(balance);
        self
    }

    pub fn with_send_error(mut self, message: &str) -> Self {
        self.send_error = Some(message.to_string());
        self
    }

    pub fn estimated_drafts(&self) -> Vec<TransactionDraft> {
        self.estimated.lock().unwrap().iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn estimated_senders(&self) -> Vec<Address> {
        self.estimated.lock().unwrap().iter().map(|(_, from)| *from).collect()
    }

    pub fn contract_calls(&self) -> Vec<(Address, [u8; 4])> {
        self.calls.lock().unwrap().clone()
    }

    pub fn balance_queries(&self) -> usize {
        let selector = id(BALANCE_OF);
        self.contract_calls()
            .iter()
            .filter(|(_, s)| *s == selector)
            .count()
    }

    pub fn nft_fee_queries(&self) -> Vec<U256> {
        self.nft_fee_queries.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    fn answer(&self, selector: [u8; 4], args: &[u8]) -> Result<Vec<Token>, PaymasterError> {
        let tokens = if selector == id(GET_TOKEN_FEE) {
            vec![Token::Uint(self.token_fee.0), Token::Uint(self.token_fee.1)]
        } else if selector == id(GET_NFT_TOKEN_FEE) {
            let decoded = decode(&[ParamType::Address, ParamType::Uint(8), ParamType::Uint(256)], args)
                .map_err(|e| PaymasterError::Abi(e.to_string()))?;
            if let Some(fee) = decoded.into_iter().nth(2).and_then(Token::into_uint) {
                self.nft_fee_queries.lock().unwrap().push(fee);
            }
            vec![Token::Uint(self.nft_token_fee.0), Token::Uint(self.nft_token_fee.1)]
        } else if selector == id(NFT_ASSET) {
            vec![Token::Address(self.nft_asset)]
        } else if selector == id(MAX_SPONSOR_GAS) {
            let nft_type = decode(&[ParamType::Uint(8)], args)
                .map_err(|e| PaymasterError::Abi(e.to_string()))?
                .into_iter()
                .next()
                .and_then(Token::into_uint)
                .unwrap_or_default();
            let cap = self
                .max_sponsor_gas
                .get(&(nft_type.low_u32() as u8))
                .copied()
                .unwrap_or_default();
            vec![Token::Uint(cap)]
        } else if selector == id(GET_ALL_NFTS) {
            vec![Token::Array(
                self.nfts
                    .iter()
                    .map(|nft| {
                        Token::Tuple(vec![
                            Token::Uint(nft.id),
                            Token::Uint(nft.balance),
                            Token::String(nft.metadata_uri.clone()),
                            Token::Uint(nft.max_sponsored_gas),
                        ])
                    })
                    .collect(),
            )]
        } else if selector == id(BALANCE_OF) {
            vec![Token::Uint(self.balance)]
        } else {
            return Err(PaymasterError::EthereumProviderError(format!(
                "execution reverted: unknown selector 0x{}",
                hex::encode(selector)
            )));
        };
        Ok(tokens)
    }
}

#[async_trait]
impl ZkProvider for MockProvider {
    async fn chain_id(&self) -> Result<u64, PaymasterError> {
        Ok(self.chain_id)
    }

    async fn gas_price(&self) -> Result<U256, PaymasterError> {
        Ok(self.gas_price)
    }

    async fn nonce(&self, _address: Address) -> Result<U256, PaymasterError> {
        Ok(self.nonce)
    }

    async fn estimate_gas(
        &self,
        draft: &TransactionDraft,
        from: Address,
    ) -> Result<U256, SimulationError> {
        self.estimated.lock().unwrap().push((draft.clone(), from));
        self.estimates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(U256::from(100_000u64)))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, PaymasterError> {
        if data.len() < 4 {
            return Err(PaymasterError::EthereumProviderError("missing selector".to_string()));
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        self.calls.lock().unwrap().push((to, selector));
        let tokens = self.answer(selector, &data[4..])?;
        Ok(Bytes::from(encode(&tokens)))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, PaymasterError> {
        if let Some(message) = &self.send_error {
            return Err(PaymasterError::SubmissionFailed(message.clone()));
        }
        let hash = H256(keccak256(&raw));
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }
}

/// Abstract signer wrapping a local key, counting the broadcasts it performs.
pub struct MockSigner {
    wallet: LocalWallet,
    provider: Arc<MockProvider>,
    pub sends: Mutex<usize>,
}

impl MockSigner {
    pub fn new(provider: Arc<MockProvider>) -> Self {
        Self {
            wallet: TEST_KEY.parse().unwrap(),
            provider,
            sends: Mutex::new(0),
        }
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet.address()
    }
}

#[async_trait]
impl PaymasterSigner for MockSigner {
    async fn address(&self) -> Result<Address, PaymasterError> {
        Ok(self.wallet.address())
    }

    fn provider(&self) -> Arc<dyn ZkProvider> {
        self.provider.clone()
    }

    async fn sign_typed_transaction(
        &self,
        tx: &Eip712Transaction,
    ) -> Result<Signature, PaymasterError> {
        sign_with_wallet(&self.wallet, tx)
    }

    async fn send_transaction(&self, tx: Eip712Transaction) -> Result<H256, PaymasterError> {
        *self.sends.lock().unwrap() += 1;
        let signature = self.sign_typed_transaction(&tx).await?;
        let raw = tx
            .with_custom_signature(Bytes::from(signature.to_vec()))
            .serialize()?;
        self.provider.send_raw_transaction(raw).await
    }
}
