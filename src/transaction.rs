// src/transaction.rs
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256};
use tracing::info;

use crate::builders::build_payment_params;
use crate::config::PaymasterConfig;
use crate::eip712::Eip712Transaction;
use crate::error::PaymasterError;
use crate::paymaster::apply_percent;
use crate::provider::ZkProvider;
use crate::signer::{sign_with_wallet, PaymasterSigner};
use crate::types::{BuilderOutput, PaymentMode, PaymentRequest};

/// Who signs for a smart account.
pub enum Controller<'a> {
    Wallet(&'a LocalWallet),
    Signer(&'a dyn PaymasterSigner),
}

/// Turns a builder output into a complete transaction sent by `from`.
pub async fn assemble(
    provider: &dyn ZkProvider,
    output: BuilderOutput,
    from: Address,
    config: &PaymasterConfig,
) -> Result<Eip712Transaction, PaymasterError> {
    let nonce = provider.nonce(from).await?;
    let chain_id = provider.chain_id().await?;
    let gas_limit = apply_percent(output.gas_limit, config.submission_buffer_percent)?;

    Eip712Transaction::from_draft(
        output.transaction,
        from,
        nonce,
        chain_id,
        gas_limit,
        output.gas_price,
    )
}

/// Local key path: the wallet signs, the network provider broadcasts.
pub async fn execute_by_wallet(
    request: &PaymentRequest,
    mode: &PaymentMode,
    provider: &dyn ZkProvider,
    wallet: &LocalWallet,
    config: &PaymasterConfig,
) -> Result<H256, PaymasterError> {
    let from = wallet.address();
    let output = build_payment_params(request, mode, provider, from, config).await?;
    let tx = assemble(provider, output, from, config).await?;

    let signature = sign_with_wallet(wallet, &tx)?;
    let raw = tx
        .with_custom_signature(Bytes::from(signature.to_vec()))
        .serialize()?;

    let hash = provider.send_raw_transaction(raw).await?;
    info!("Submitted paymaster transaction {:?} from {}", hash, from);
    Ok(hash)
}

/// Abstract signer path: params are built against the signer's own provider
/// and the signer broadcasts.
pub async fn execute_by_signer(
    request: &PaymentRequest,
    mode: &PaymentMode,
    signer: &dyn PaymasterSigner,
    config: &PaymasterConfig,
) -> Result<H256, PaymasterError> {
    let provider = signer.provider();
    let from = signer.address().await?;
    let output = build_payment_params(request, mode, provider.as_ref(), from, config).await?;
    let tx = assemble(provider.as_ref(), output, from, config).await?;

    let hash = signer.send_transaction(tx).await?;
    info!("Submitted paymaster transaction {:?} from {}", hash, from);
    Ok(hash)
}

/// Smart account path: the transaction is sent from `account`, the
/// controller's EIP-712 signature is carried as the custom signature and the
/// payload is broadcast straight through the provider.
pub async fn execute_by_smart_account(
    request: &PaymentRequest,
    mode: &PaymentMode,
    provider: &dyn ZkProvider,
    controller: Controller<'_>,
    account: Address,
    config: &PaymasterConfig,
) -> Result<H256, PaymasterError> {
    let output = build_payment_params(request, mode, provider, account, config).await?;
    let tx = assemble(provider, output, account, config).await?;

    let signature = match controller {
        Controller::Wallet(wallet) => sign_with_wallet(wallet, &tx)?,
        Controller::Signer(signer) => signer.sign_typed_transaction(&tx).await?,
    };
    let raw = tx
        .with_custom_signature(Bytes::from(signature.to_vec()))
        .serialize()?;

    let hash = provider.send_raw_transaction(raw).await?;
    info!("Submitted smart account transaction {:?} for {}", hash, account);
    Ok(hash)
}
