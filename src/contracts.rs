// src/contracts.rs
//! Read-only bindings for the paymaster, NFT and ERC-20 contracts.

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use crate::error::PaymasterError;
use crate::provider::ZkProvider;
use crate::types::{NftType, UserNftEntitlement};

pub const GET_TOKEN_FEE: &str = "getTokenFee(address,uint256)";
pub const GET_NFT_TOKEN_FEE: &str = "getTokenFee(address,uint8,uint256)";
pub const NFT_ASSET: &str = "nftAsset()";
pub const MAX_SPONSOR_GAS: &str = "maxSponsorGas(uint8)";
pub const GET_ALL_NFTS: &str = "getAllNfts(address)";
pub const BALANCE_OF: &str = "balanceOf(address)";

/// Selector followed by the ABI-encoded arguments.
pub fn call_data(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend_from_slice(&encode(args));
    Bytes::from(data)
}

async fn read(
    provider: &dyn ZkProvider,
    to: Address,
    signature: &str,
    args: &[Token],
    outputs: &[ParamType],
) -> Result<Vec<Token>, PaymasterError> {
    let raw = provider.call(to, call_data(signature, args)).await?;
    decode(outputs, &raw).map_err(|e| PaymasterError::Abi(format!("{signature}: {e}")))
}

fn next_uint(tokens: &mut impl Iterator<Item = Token>, what: &str) -> Result<U256, PaymasterError> {
    tokens
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| PaymasterError::Abi(format!("expected uint for {what}")))
}

/// `(after_discount, amount)` pair returned by the fee oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFee {
    /// What the payer must hold.
    pub after_discount: U256,
    /// What the allowance is sized from.
    pub amount: U256,
}

pub struct PaymasterContract<'a> {
    address: Address,
    provider: &'a dyn ZkProvider,
}

impl<'a> PaymasterContract<'a> {
    pub fn new(address: Address, provider: &'a dyn ZkProvider) -> Self {
        Self { address, provider }
    }

    /// Converts an ETH fee into `(afterDiscount, minAmount)` of `token`.
    pub async fn get_token_fee(&self, token: Address, eth_fee: U256) -> Result<TokenFee, PaymasterError> {
        let tokens = read(
            self.provider,
            self.address,
            GET_TOKEN_FEE,
            &[Token::Address(token), Token::Uint(eth_fee)],
            &[ParamType::Uint(256), ParamType::Uint(256)],
        )
        .await?;
        let mut tokens = tokens.into_iter();
        Ok(TokenFee {
            after_discount: next_uint(&mut tokens, "afterDiscount")?,
            amount: next_uint(&mut tokens, "minAmount")?,
        })
    }
}

pub struct NftPaymasterContract<'a> {
    address: Address,
    provider: &'a dyn ZkProvider,
}

impl<'a> NftPaymasterContract<'a> {
    pub fn new(address: Address, provider: &'a dyn ZkProvider) -> Self {
        Self { address, provider }
    }

    pub async fn nft_asset(&self) -> Result<Address, PaymasterError> {
        let tokens = read(self.provider, self.address, NFT_ASSET, &[], &[ParamType::Address]).await?;
        tokens
            .into_iter()
            .next()
            .and_then(Token::into_address)
            .ok_or_else(|| PaymasterError::Abi("expected address for nftAsset".to_string()))
    }

    /// Converts an ETH fee into `(afterDiscount, erc20Fee)` for holders of `nft_type`.
    pub async fn get_token_fee(
        &self,
        token: Address,
        nft_type: NftType,
        eth_fee: U256,
    ) -> Result<TokenFee, PaymasterError> {
        let tokens = read(
            self.provider,
            self.address,
            GET_NFT_TOKEN_FEE,
            &[
                Token::Address(token),
                Token::Uint(U256::from(nft_type.value())),
                Token::Uint(eth_fee),
            ],
            &[ParamType::Uint(256), ParamType::Uint(256)],
        )
        .await?;
        let mut tokens = tokens.into_iter();
        Ok(TokenFee {
            after_discount: next_uint(&mut tokens, "afterDiscount")?,
            amount: next_uint(&mut tokens, "erc20Fee")?,
        })
    }
}

pub struct NftContract<'a> {
    address: Address,
    provider: &'a dyn ZkProvider,
}

impl<'a> NftContract<'a> {
    pub fn new(address: Address, provider: &'a dyn ZkProvider) -> Self {
        Self { address, provider }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn max_sponsor_gas(&self, nft_type: NftType) -> Result<U256, PaymasterError> {
        let tokens = read(
            self.provider,
            self.address,
            MAX_SPONSOR_GAS,
            &[Token::Uint(U256::from(nft_type.value()))],
            &[ParamType::Uint(256)],
        )
        .await?;
        next_uint(&mut tokens.into_iter(), "maxSponsorGas")
    }

    pub async fn get_all_nfts(&self, user: Address) -> Result<Vec<UserNftEntitlement>, PaymasterError> {
        let entry = ParamType::Tuple(vec![
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::String,
            ParamType::Uint(256),
        ]);
        let tokens = read(
            self.provider,
            self.address,
            GET_ALL_NFTS,
            &[Token::Address(user)],
            &[ParamType::Array(Box::new(entry))],
        )
        .await?;

        let entries = tokens
            .into_iter()
            .next()
            .and_then(Token::into_array)
            .ok_or_else(|| PaymasterError::Abi("expected array for getAllNfts".to_string()))?;

        entries
            .into_iter()
            .map(|entry| {
                let mut fields = entry
                    .into_tuple()
                    .ok_or_else(|| PaymasterError::Abi("expected tuple in getAllNfts".to_string()))?
                    .into_iter();
                let id = next_uint(&mut fields, "id")?;
                let balance = next_uint(&mut fields, "balance")?;
                let metadata_uri = fields
                    .next()
                    .and_then(Token::into_string)
                    .ok_or_else(|| PaymasterError::Abi("expected string for uri".to_string()))?;
                let max_sponsored_gas = next_uint(&mut fields, "maxSponsor")?;
                Ok(UserNftEntitlement {
                    id,
                    balance,
                    metadata_uri,
                    max_sponsored_gas,
                })
            })
            .collect()
    }
}

pub struct Erc20Contract<'a> {
    address: Address,
    provider: &'a dyn ZkProvider,
}

impl<'a> Erc20Contract<'a> {
    pub fn new(address: Address, provider: &'a dyn ZkProvider) -> Self {
        Self { address, provider }
    }

    pub async fn balance_of(&self, account: Address) -> Result<U256, PaymasterError> {
        let tokens = read(
            self.provider,
            self.address,
            BALANCE_OF,
            &[Token::Address(account)],
            &[ParamType::Uint(256)],
        )
        .await?;
        next_uint(&mut tokens.into_iter(), "balanceOf")
    }
}
