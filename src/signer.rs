// src/signer.rs
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Signature, H256};
use tracing::debug;

use crate::eip712::Eip712Transaction;
use crate::error::PaymasterError;
use crate::provider::ZkProvider;

/// A signer that is not a bare local key: a remote signer, a hardware
/// wallet, or the wallet extension injected by a browser host.
#[async_trait]
pub trait PaymasterSigner: Send + Sync {
    async fn address(&self) -> Result<Address, PaymasterError>;

    /// Provider the signer is connected to.
    fn provider(&self) -> Arc<dyn ZkProvider>;

    /// Signs the transaction's EIP-712 digest.
    async fn sign_typed_transaction(
        &self,
        tx: &Eip712Transaction,
    ) -> Result<Signature, PaymasterError>;

    /// Signs and broadcasts `tx`.
    async fn send_transaction(&self, tx: Eip712Transaction) -> Result<H256, PaymasterError> {
        let signature = self.sign_typed_transaction(&tx).await?;
        let raw = tx
            .with_custom_signature(Bytes::from(signature.to_vec()))
            .serialize()?;
        self.provider().send_raw_transaction(raw).await
    }
}

/// Signs the EIP-712 digest of `tx` with a local key.
pub fn sign_with_wallet(
    wallet: &LocalWallet,
    tx: &Eip712Transaction,
) -> Result<Signature, PaymasterError> {
    wallet
        .sign_hash(tx.digest())
        .map_err(|e| PaymasterError::SigningFailed(e.to_string()))
}

/// [`PaymasterSigner`] backed by a local wallet and a provider.
pub struct WalletSigner {
    wallet: LocalWallet,
    provider: Arc<dyn ZkProvider>,
}

impl WalletSigner {
    pub fn new(wallet: LocalWallet, provider: Arc<dyn ZkProvider>) -> Self {
        Self { wallet, provider }
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

#[async_trait]
impl PaymasterSigner for WalletSigner {
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
}

/// Whatever the caller handed over to sign with.
#[derive(Clone, Default)]
pub enum SigningCredential {
    /// Hex-encoded private key.
    PrivateKey(String),
    Wallet(LocalWallet),
    Signer(Arc<dyn PaymasterSigner>),
    /// Nothing supplied: use the injected browser wallet.
    #[default]
    Browser,
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningCredential::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
            SigningCredential::Wallet(wallet) => write!(f, "Wallet({:?})", wallet.address()),
            SigningCredential::Signer(_) => f.write_str("Signer"),
            SigningCredential::Browser => f.write_str("Browser"),
        }
    }
}

impl From<&str> for SigningCredential {
    fn from(key: &str) -> Self {
        SigningCredential::PrivateKey(key.to_string())
    }
}

impl From<String> for SigningCredential {
    fn from(key: String) -> Self {
        SigningCredential::PrivateKey(key)
    }
}

impl From<LocalWallet> for SigningCredential {
    fn from(wallet: LocalWallet) -> Self {
        SigningCredential::Wallet(wallet)
    }
}

impl From<Arc<dyn PaymasterSigner>> for SigningCredential {
    fn from(signer: Arc<dyn PaymasterSigner>) -> Self {
        SigningCredential::Signer(signer)
    }
}

impl<T: Into<SigningCredential>> From<Option<T>> for SigningCredential {
    fn from(credential: Option<T>) -> Self {
        credential.map(Into::into).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    RawKey,
    LocalWallet,
    AbstractSigner,
    InjectedBrowser,
}

/// Which submission path a credential takes. Pure.
pub fn classify(credential: &SigningCredential) -> CredentialKind {
    match credential {
        SigningCredential::PrivateKey(_) => CredentialKind::RawKey,
        SigningCredential::Wallet(_) => CredentialKind::LocalWallet,
        SigningCredential::Signer(_) => CredentialKind::AbstractSigner,
        SigningCredential::Browser => CredentialKind::InjectedBrowser,
    }
}

/// A credential turned into something that can sign.
pub enum Backend {
    /// Local key; the caller pairs it with the network's provider.
    Wallet(LocalWallet),
    Signer(Arc<dyn PaymasterSigner>),
}

/// Resolves `credential`, using `injected` for the browser path.
pub fn resolve(
    credential: SigningCredential,
    injected: Option<&Arc<dyn PaymasterSigner>>,
) -> Result<Backend, PaymasterError> {
    let kind = classify(&credential);
    debug!("Resolving {:?} credential", kind);
    match credential {
        SigningCredential::PrivateKey(key) => key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map(Backend::Wallet)
            .map_err(|_| PaymasterError::InvalidCredential("malformed private key".to_string())),
        SigningCredential::Wallet(wallet) => Ok(Backend::Wallet(wallet)),
        SigningCredential::Signer(signer) => Ok(Backend::Signer(signer)),
        SigningCredential::Browser => injected
            .cloned()
            .map(Backend::Signer)
            .ok_or(PaymasterError::ExtensionNotFound),
    }
}
