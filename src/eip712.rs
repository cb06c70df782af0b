// src/eip712.rs
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use ethers::utils::rlp::RlpStream;

use crate::error::PaymasterError;
use crate::rpc::EIP712_TX_TYPE;
use crate::types::{Eip712Meta, TransactionDraft};

const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId)";
const TRANSACTION_TYPE: &str = "Transaction(uint256 txType,uint256 from,uint256 to,uint256 gasLimit,uint256 gasPerPubdataByteLimit,uint256 maxFeePerGas,uint256 maxPriorityFeePerGas,uint256 paymaster,uint256 nonce,uint256 value,bytes data,bytes32[] factoryDeps,bytes paymasterInput)";
const DOMAIN_NAME: &str = "zkSync";
const DOMAIN_VERSION: &str = "2";

/// A fully assembled zkSync EIP-712 transaction, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Transaction {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub nonce: U256,
    pub chain_id: u64,
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub custom_data: Eip712Meta,
}

/// Deployments are out of scope: factory deps would have to be signed as zkSync
/// bytecode hashes.
fn ensure_no_factory_deps(meta: &Eip712Meta) -> Result<(), PaymasterError> {
    if meta.factory_deps.is_empty() {
        Ok(())
    } else {
        Err(PaymasterError::InvalidParameters(
            "factory deps are not supported".to_string(),
        ))
    }
}

impl Eip712Transaction {
    pub fn from_draft(
        draft: TransactionDraft,
        from: Address,
        nonce: U256,
        chain_id: u64,
        gas_limit: U256,
        gas_price: U256,
    ) -> Result<Self, PaymasterError> {
        let custom_data = draft.custom_data.unwrap_or_default();
        ensure_no_factory_deps(&custom_data)?;
        Ok(Self {
            from,
            to: draft.to,
            data: draft.data,
            value: draft.value,
            nonce,
            chain_id,
            gas_limit,
            max_fee_per_gas: gas_price,
            max_priority_fee_per_gas: U256::zero(),
            custom_data,
        })
    }

    pub fn with_custom_signature(mut self, signature: Bytes) -> Self {
        self.custom_data.custom_signature = Some(signature);
        self
    }

    pub fn domain_separator(&self) -> H256 {
        H256(keccak256(encode(&[
            Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
            Token::FixedBytes(keccak256(DOMAIN_NAME).to_vec()),
            Token::FixedBytes(keccak256(DOMAIN_VERSION).to_vec()),
            Token::Uint(U256::from(self.chain_id)),
        ])))
    }

    pub fn struct_hash(&self) -> H256 {
        let meta = &self.custom_data;
        let (paymaster, paymaster_input) = match &meta.paymaster_params {
            Some(params) => (params.paymaster, params.paymaster_input.to_vec()),
            None => (Address::zero(), Vec::new()),
        };
        H256(keccak256(encode(&[
            Token::FixedBytes(keccak256(TRANSACTION_TYPE).to_vec()),
            Token::Uint(U256::from(EIP712_TX_TYPE)),
            Token::Address(self.from),
            Token::Address(self.to.unwrap_or_default()),
            Token::Uint(self.gas_limit),
            Token::Uint(meta.gas_per_pubdata),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::Address(paymaster),
            Token::Uint(self.nonce),
            Token::Uint(self.value),
            Token::FixedBytes(keccak256(&self.data).to_vec()),
            // factory deps are always empty, see `ensure_no_factory_deps`
            Token::FixedBytes(keccak256(b"").to_vec()),
            Token::FixedBytes(keccak256(paymaster_input).to_vec()),
        ])))
    }

    /// The digest a signer authorizes: `keccak256(0x1901 ‖ domain ‖ struct)`.
    pub fn digest(&self) -> H256 {
        let mut message = Vec::with_capacity(66);
        message.extend_from_slice(&[0x19, 0x01]);
        message.extend_from_slice(self.domain_separator().as_bytes());
        message.extend_from_slice(self.struct_hash().as_bytes());
        H256(keccak256(message))
    }

    /// `0x71 ‖ rlp(fields)`, the payload accepted by `eth_sendRawTransaction`.
    pub fn serialize(&self) -> Result<Bytes, PaymasterError> {
        let meta = &self.custom_data;
        ensure_no_factory_deps(meta)?;
        let mut stream = RlpStream::new_list(16);
        stream.append(&self.nonce);
        stream.append(&self.max_priority_fee_per_gas);
        stream.append(&self.max_fee_per_gas);
        stream.append(&self.gas_limit);
        match self.to {
            Some(to) => stream.append(&to),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data.to_vec());
        // the signature slots stay empty, the signature lives in custom_signature
        stream.append(&self.chain_id);
        stream.append_empty_data();
        stream.append_empty_data();
        stream.append(&self.chain_id);
        stream.append(&self.from);
        stream.append(&meta.gas_per_pubdata);

        stream.begin_list(0);

        match &meta.custom_signature {
            Some(signature) if signature.is_empty() => {
                return Err(PaymasterError::InvalidParameters(
                    "Empty signatures are not supported".to_string(),
                ));
            }
            Some(signature) => stream.append(&signature.to_vec()),
            None => stream.append_empty_data(),
        };

        match &meta.paymaster_params {
            Some(params) => {
                stream.begin_list(2);
                stream.append(&params.paymaster);
                stream.append(&params.paymaster_input.to_vec());
            }
            None => {
                stream.begin_list(0);
            }
        }

        let mut raw = vec![EIP712_TX_TYPE];
        raw.extend_from_slice(&stream.out());
        Ok(Bytes::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymasterParams;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::utils::rlp::Rlp;

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn transaction() -> Eip712Transaction {
        let draft = TransactionDraft::call(Address::repeat_byte(0x33), Bytes::from(vec![0xca, 0xfe]))
            .with_paymaster_params(
                PaymasterParams {
                    paymaster: Address::repeat_byte(0xaa),
                    paymaster_input: Bytes::from(vec![0x8c, 0x5a, 0x34, 0x45]),
                },
                U256::from(50_000u64),
            );
        Eip712Transaction::from_draft(
            draft,
            Address::repeat_byte(0x11),
            U256::from(7u64),
            300,
            U256::from(1_000_000u64),
            U256::from(25_000_000u64),
        )
        .unwrap()
    }

    #[test]
    fn digest_commits_to_sender_and_chain() {
        let tx = transaction();
        assert_eq!(tx.digest(), transaction().digest());

        let mut other_sender = transaction();
        other_sender.from = Address::repeat_byte(0x12);
        assert_ne!(tx.digest(), other_sender.digest());

        let mut other_chain = transaction();
        other_chain.chain_id = 324;
        assert_ne!(tx.domain_separator(), other_chain.domain_separator());
    }

    #[test]
    fn custom_signature_does_not_change_digest() {
        let tx = transaction();
        let signed = tx.clone().with_custom_signature(Bytes::from(vec![1u8; 65]));
        assert_eq!(tx.digest(), signed.digest());
    }

    #[test]
    fn signed_digest_recovers_signer() {
        let wallet: LocalWallet = KEY.parse().unwrap();
        let tx = transaction();
        let signature = wallet.sign_hash(tx.digest()).unwrap();
        assert_eq!(signature.recover(tx.digest()).unwrap(), wallet.address());
    }

    #[test]
    fn serializes_as_type_0x71_with_sixteen_fields() {
        let raw = transaction()
            .with_custom_signature(Bytes::from(vec![9u8; 65]))
            .serialize()
            .unwrap();
        assert_eq!(raw[0], 0x71);

        let rlp = Rlp::new(&raw[1..]);
        assert_eq!(rlp.item_count().unwrap(), 16);
        assert_eq!(rlp.val_at::<u64>(10).unwrap(), 300);
        assert_eq!(rlp.val_at::<Vec<u8>>(14).unwrap(), vec![9u8; 65]);
        let paymaster = rlp.at(15).unwrap();
        assert_eq!(paymaster.item_count().unwrap(), 2);
        assert_eq!(
            paymaster.val_at::<Vec<u8>>(1).unwrap(),
            vec![0x8c, 0x5a, 0x34, 0x45]
        );
    }

    #[test]
    fn rejects_empty_custom_signature() {
        let err = transaction()
            .with_custom_signature(Bytes::default())
            .serialize()
            .unwrap_err();
        assert!(matches!(err, PaymasterError::InvalidParameters(_)));
    }

    #[test]
    fn factory_deps_are_rejected() {
        let mut draft = TransactionDraft::call(Address::repeat_byte(0x33), Bytes::default());
        draft.custom_data = Some(Eip712Meta {
            factory_deps: vec![Bytes::from(vec![0u8; 32])],
            ..Eip712Meta::default()
        });

        let err = Eip712Transaction::from_draft(
            draft,
            Address::repeat_byte(0x11),
            U256::zero(),
            300,
            U256::from(1_000_000u64),
            U256::one(),
        )
        .unwrap_err();
        assert!(matches!(err, PaymasterError::InvalidParameters(_)));

        let mut tx = transaction().with_custom_signature(Bytes::from(vec![9u8; 65]));
        tx.custom_data.factory_deps.push(Bytes::from(vec![0u8; 32]));
        assert!(matches!(tx.serialize(), Err(PaymasterError::InvalidParameters(_))));
    }
}
