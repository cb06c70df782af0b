// src/builders.rs
//! Fee estimation and paymaster-parameter assembly for each payment mode.

use ethers::types::{Address, Bytes, U256};
use tracing::{debug, info};

use crate::config::PaymasterConfig;
use crate::contracts::{NftContract, NftPaymasterContract, PaymasterContract};
use crate::error::PaymasterError;
use crate::estimator::FeeEstimator;
use crate::guard::BalanceGuard;
use crate::paymaster::{default_inner_input, nft_inner_input, AllowancePolicy, PaymasterParamBuilder};
use crate::provider::ZkProvider;
use crate::types::{
    BuilderOutput, FeeQuote, NftType, PaymasterParams, PaymentMode, PaymentRequest,
    UserNftEntitlement,
};

/// Builds the draft for `mode`, with its final paymaster params attached.
pub async fn build_payment_params(
    request: &PaymentRequest,
    mode: &PaymentMode,
    provider: &dyn ZkProvider,
    from: Address,
    config: &PaymasterConfig,
) -> Result<BuilderOutput, PaymasterError> {
    match mode {
        PaymentMode::Sponsor => build_general_payment_params(request, provider, from, config).await,
        PaymentMode::Erc20 { token } => {
            build_erc20_payment_params(request, provider, from, *token, config).await
        }
        PaymentMode::Nft { nft_type, token } => {
            build_nft_payment_params(request, provider, from, *nft_type, *token, config).await
        }
    }
}

fn token_paymaster(request: &PaymentRequest) -> Address {
    request
        .paymaster_address
        .unwrap_or_else(|| request.network.internal_paymaster())
}

fn nft_paymaster(request: &PaymentRequest) -> Address {
    request
        .paymaster_address
        .unwrap_or_else(|| request.network.nft_paymaster())
}

fn inner_input(request: &PaymentRequest) -> Bytes {
    request
        .inner_input
        .clone()
        .unwrap_or_else(|| default_inner_input(request.paymaster_address.is_some()))
}

fn finish(
    request: &PaymentRequest,
    params: PaymasterParams,
    quote: FeeQuote,
    config: &PaymasterConfig,
) -> BuilderOutput {
    BuilderOutput {
        transaction: request
            .transaction
            .with_paymaster_params(params, config.gas_per_pubdata),
        gas_limit: quote.gas_limit,
        gas_price: quote.gas_price,
    }
}

/// Fully sponsored transaction: `General` flow, no token involved.
pub async fn build_general_payment_params(
    request: &PaymentRequest,
    provider: &dyn ZkProvider,
    from: Address,
    config: &PaymasterConfig,
) -> Result<BuilderOutput, PaymasterError> {
    let builder = PaymasterParamBuilder::new(token_paymaster(request));
    let params = builder.general(&inner_input(request));

    let quote = FeeEstimator::new(provider, config)
        .estimate(request, from, &params)
        .await?;

    debug!("Sponsored payment via {} for {}", builder.paymaster(), from);
    Ok(finish(request, params, quote, config))
}

/// Gas estimate for an ERC-20 payment, simulated with an unbounded allowance.
pub async fn estimate_gas_erc20_payment(
    request: &PaymentRequest,
    provider: &dyn ZkProvider,
    from: Address,
    token: Address,
    config: &PaymasterConfig,
) -> Result<FeeQuote, PaymasterError> {
    let builder = PaymasterParamBuilder::new(token_paymaster(request));
    let simulation = builder.approval_based(
        token,
        AllowancePolicy::Simulation.allowance(U256::zero())?,
        &inner_input(request),
    );
    FeeEstimator::new(provider, config)
        .estimate(request, from, &simulation)
        .await
}

/// Token-paid transaction: estimate, price the fee in `token`, check the
/// payer's balance and grant a tight allowance.
pub async fn build_erc20_payment_params(
    request: &PaymentRequest,
    provider: &dyn ZkProvider,
    from: Address,
    token: Address,
    config: &PaymasterConfig,
) -> Result<BuilderOutput, PaymasterError> {
    let paymaster = token_paymaster(request);
    let builder = PaymasterParamBuilder::new(paymaster);

    let quote = estimate_gas_erc20_payment(request, provider, from, token, config).await?;
    let eth_fee = quote.eth_fee()?;

    let fee = PaymasterContract::new(paymaster, provider)
        .get_token_fee(token, eth_fee)
        .await?;
    debug!(
        "Token fee for {} wei: {} after discount, {} minimum",
        eth_fee, fee.after_discount, fee.amount
    );

    BalanceGuard::new(provider)
        .ensure_sufficient(from, token, fee.after_discount)
        .await?;

    let allowance = AllowancePolicy::Margin(config.allowance_margin_percent).allowance(fee.amount)?;
    let params = builder.approval_based(token, allowance, &inner_input(request));

    Ok(finish(request, params, quote, config))
}

/// NFT-entitled transaction. Uses the `General` flow while the estimated fee
/// fits under the NFT's sponsorship cap, otherwise `token` pays the fee.
pub async fn build_nft_payment_params(
    request: &PaymentRequest,
    provider: &dyn ZkProvider,
    from: Address,
    nft_type: NftType,
    token: Option<Address>,
    config: &PaymasterConfig,
) -> Result<BuilderOutput, PaymasterError> {
    let paymaster = nft_paymaster(request);
    let builder = PaymasterParamBuilder::new(paymaster);
    let estimator = FeeEstimator::new(provider, config);
    let inner_input = request
        .inner_input
        .clone()
        .unwrap_or_else(|| nft_inner_input(nft_type));

    let sponsored = builder.general(&inner_input);
    let quote = estimator.estimate(request, from, &sponsored).await?;
    let eth_fee = quote.eth_fee()?;
    let cap = max_sponsor_gas_by_nft(provider, paymaster, nft_type).await?;

    if eth_fee <= cap {
        debug!("NFT type {} covers fee {} (cap {})", nft_type.value(), eth_fee, cap);
        return Ok(finish(request, sponsored, quote, config));
    }

    let token = token.ok_or(PaymasterError::SponsorshipExceeded { fee: eth_fee, cap })?;
    info!(
        "Fee {} exceeds NFT type {} cap {}, paying with token {}",
        eth_fee,
        nft_type.value(),
        cap,
        token
    );

    let simulation = builder.approval_based(
        token,
        AllowancePolicy::Simulation.allowance(U256::zero())?,
        &inner_input,
    );
    let quote = estimator.estimate(request, from, &simulation).await?;
    let eth_fee = quote.eth_fee()?;

    let fee = NftPaymasterContract::new(paymaster, provider)
        .get_token_fee(token, nft_type, eth_fee)
        .await?;

    BalanceGuard::new(provider)
        .ensure_sufficient(from, token, fee.after_discount)
        .await?;

    let allowance = AllowancePolicy::Margin(config.allowance_margin_percent).allowance(fee.amount)?;
    let params = builder.approval_based(token, allowance, &inner_input);

    Ok(finish(request, params, quote, config))
}

/// Token amount an NFT holder has to pay on top of the sponsorship, zero when
/// the NFT's cap covers the whole fee.
pub async fn erc20_must_be_paid(
    request: &PaymentRequest,
    provider: &dyn ZkProvider,
    from: Address,
    nft_type: NftType,
    token: Address,
    config: &PaymasterConfig,
) -> Result<U256, PaymasterError> {
    let paymaster = nft_paymaster(request);
    let inner_input = request
        .inner_input
        .clone()
        .unwrap_or_else(|| nft_inner_input(nft_type));
    let sponsored = PaymasterParamBuilder::new(paymaster).general(&inner_input);

    let quote = FeeEstimator::new(provider, config)
        .estimate(request, from, &sponsored)
        .await?;
    let eth_fee = quote.eth_fee()?;
    let cap = max_sponsor_gas_by_nft(provider, paymaster, nft_type).await?;
    if eth_fee <= cap {
        return Ok(U256::zero());
    }

    let fee = NftPaymasterContract::new(paymaster, provider)
        .get_token_fee(token, nft_type, eth_fee)
        .await?;
    Ok(fee.after_discount)
}

/// Sponsorship cap of `nft_type` on the NFT behind `paymaster`.
pub async fn max_sponsor_gas_by_nft(
    provider: &dyn ZkProvider,
    paymaster: Address,
    nft_type: NftType,
) -> Result<U256, PaymasterError> {
    let nft = NftPaymasterContract::new(paymaster, provider).nft_asset().await?;
    NftContract::new(nft, provider).max_sponsor_gas(nft_type).await
}

/// NFTs `user` holds in the collection behind `paymaster`.
pub async fn user_nfts(
    provider: &dyn ZkProvider,
    paymaster: Address,
    user: Address,
) -> Result<Vec<UserNftEntitlement>, PaymasterError> {
    let nft = NftPaymasterContract::new(paymaster, provider).nft_asset().await?;
    NftContract::new(nft, provider).get_all_nfts(user).await
}

/// Among the NFT types `user` owns, the one with the smallest cap that still
/// covers `eth_fee`; the lowest owned type when none does.
pub async fn find_best_nft_type(
    provider: &dyn ZkProvider,
    paymaster: Address,
    user: Address,
    eth_fee: U256,
) -> Result<NftType, PaymasterError> {
    let nfts = user_nfts(provider, paymaster, user).await?;
    Ok(select_nft_type(&nfts, eth_fee))
}

fn select_nft_type(nfts: &[UserNftEntitlement], eth_fee: U256) -> NftType {
    let owned: Vec<(NftType, U256)> = nfts
        .iter()
        .filter(|nft| !nft.balance.is_zero())
        .filter(|nft| nft.id <= U256::from(NftType::MAX))
        .filter_map(|nft| NftType::new(nft.id.low_u32() as u8).ok().map(|t| (t, nft.max_sponsored_gas)))
        .collect();

    owned
        .iter()
        .filter(|(_, cap)| *cap >= eth_fee)
        .min_by_key(|(nft_type, cap)| (*cap, *nft_type))
        .or_else(|| owned.iter().min_by_key(|(nft_type, _)| *nft_type))
        .map(|(nft_type, _)| *nft_type)
        .unwrap_or_default()
}
