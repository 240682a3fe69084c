//! Transaction builder for constructing and signing transactions

use crate::error::{ClientError, Result};
use cw_crypto::Signer;
use cw_types::{
    tx_hash, Addr, Binary, Fee, Hash, Message, PubKey, SignDoc, Tx, DEFAULT_MAX_TX_BYTES,
};
use tracing::debug;

/// Longest memo the builder accepts
pub const MAX_MEMO_LENGTH: usize = 256;

/// Account state a transaction is built against
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub address: Addr,
    pub sequence: u64,
    pub chain_id: String,
}

/// Signed transaction ready to broadcast
#[derive(Debug, Clone)]
pub struct SignedTx {
    pub tx: Tx,
    /// Canonical encoding, exactly what is broadcast
    pub bytes: Vec<u8>,
    pub hash: Hash,
}

/// Composes messages, fee and memo into a signed transaction
///
/// Building is pure: no network access, and the same inputs with a
/// deterministic signer yield the same bytes.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    messages: Vec<Message>,
    fee: Option<Fee>,
    memo: String,
    max_tx_bytes: usize,
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TxBuilder {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            fee: None,
            memo: String::new(),
            max_tx_bytes: DEFAULT_MAX_TX_BYTES,
        }
    }

    /// Add a message to the transaction
    pub fn add_message(mut self, msg: Message) -> Self {
        self.messages.push(msg);
        self
    }

    pub fn add_messages(mut self, msgs: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(msgs);
        self
    }

    pub fn fee(mut self, fee: Fee) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn max_tx_bytes(mut self, max_tx_bytes: usize) -> Self {
        self.max_tx_bytes = max_tx_bytes;
        self
    }

    /// Stateless checks on every message plus sender consistency
    pub fn validate(&self, sender: &Addr) -> Result<()> {
        if self.messages.is_empty() {
            return Err(ClientError::InvalidMessage(
                "transaction has no messages".to_string(),
            ));
        }
        if self.memo.len() > MAX_MEMO_LENGTH {
            return Err(ClientError::InvalidMessage(format!(
                "memo exceeds {MAX_MEMO_LENGTH} bytes"
            )));
        }
        for (idx, msg) in self.messages.iter().enumerate() {
            if msg.sender() != sender {
                return Err(ClientError::InvalidMessage(format!(
                    "message {idx} ({}) has sender {}, expected {sender}",
                    msg.kind(),
                    msg.sender()
                )));
            }
            msg.validate_basic()?;
        }
        Ok(())
    }

    /// Sign and encode
    pub fn build(&self, account: &AccountSnapshot, signer: &dyn Signer) -> Result<SignedTx> {
        self.validate(&account.address)?;
        let fee = self
            .fee
            .clone()
            .ok_or_else(|| ClientError::InvalidMessage("fee not set".to_string()))?;
        if fee.gas_limit == 0 {
            return Err(ClientError::InvalidMessage(
                "gas limit must be positive".to_string(),
            ));
        }

        let sign_doc = SignDoc {
            sender: account.address,
            msgs: self.messages.clone(),
            fee,
            memo: self.memo.clone(),
            chain_id: account.chain_id.clone(),
            sequence: account.sequence,
        };
        let sign_bytes = sign_doc.to_bytes()?;
        let (signature, public_key) = signer.sign(&sign_bytes)?;

        let tx = Tx {
            sender: sign_doc.sender,
            msgs: sign_doc.msgs,
            fee: sign_doc.fee,
            memo: sign_doc.memo,
            sequence: sign_doc.sequence,
            public_key: public_key.to_pubkey(),
            signature: Binary::new(signature),
        };
        let bytes = tx.to_bytes(self.max_tx_bytes)?;
        let hash = tx_hash(&bytes);

        debug!(
            hash = %hash,
            sender = %account.address,
            sequence = account.sequence,
            msgs = tx.msgs.len(),
            "Built transaction"
        );
        Ok(SignedTx { tx, bytes, hash })
    }

    /// Encode without a signature, for gas simulation. The fee is a
    /// placeholder with `gas_limit` and no coins.
    pub fn build_unsigned(
        &self,
        account: &AccountSnapshot,
        public_key: PubKey,
        gas_limit: u64,
    ) -> Result<Vec<u8>> {
        self.validate(&account.address)?;
        let tx = Tx {
            sender: account.address,
            msgs: self.messages.clone(),
            fee: Fee::new(Default::default(), gas_limit),
            memo: self.memo.clone(),
            sequence: account.sequence,
            public_key,
            signature: Binary::default(),
        };
        Ok(tx.to_bytes(self.max_tx_bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_crypto::{verify_signature, PublicKey, SigningKey};
    use cw_types::{Coins, EncodingError, GasPrice, KeyType};

    fn account(sequence: u64) -> AccountSnapshot {
        AccountSnapshot {
            address: Addr::from_array([1; 32]),
            sequence,
            chain_id: "dev-1".to_string(),
        }
    }

    fn fee() -> Fee {
        "0.025uatom"
            .parse::<GasPrice>()
            .unwrap()
            .fee_for(200_000)
            .unwrap()
    }

    fn transfer(from: Addr) -> Message {
        Message::transfer(
            from,
            Addr::from_array([2; 32]),
            "888uatom,999uosmo".parse::<Coins>().unwrap(),
        )
    }

    #[test]
    fn test_build_signs_canonical_sign_doc() {
        let key = SigningKey::generate(KeyType::Secp256k1);
        let acct = account(7);
        let signed = TxBuilder::new()
            .add_message(transfer(acct.address))
            .fee(fee())
            .memo("hello")
            .build(&acct, &key)
            .unwrap();

        assert_eq!(signed.tx.sequence, 7);
        assert_eq!(signed.hash, tx_hash(&signed.bytes));
        assert_eq!(Tx::from_bytes(&signed.bytes).unwrap(), signed.tx);

        let sign_bytes = signed.tx.sign_doc("dev-1").to_bytes().unwrap();
        let pubkey = PublicKey::from_pubkey(&signed.tx.public_key).unwrap();
        verify_signature(&pubkey, &sign_bytes, &signed.tx.signature).unwrap();

        // bound to the chain id
        let other_chain = signed.tx.sign_doc("dev-2").to_bytes().unwrap();
        assert!(verify_signature(&pubkey, &other_chain, &signed.tx.signature).is_err());
    }

    #[test]
    fn test_rejects_mixed_senders() {
        let key = SigningKey::generate(KeyType::Ed25519);
        let acct = account(0);
        let err = TxBuilder::new()
            .add_message(transfer(acct.address))
            .add_message(transfer(Addr::from_array([9; 32])))
            .fee(fee())
            .build(&acct, &key)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidMessage(_)));
    }

    #[test]
    fn test_rejects_empty_and_feeless() {
        let key = SigningKey::generate(KeyType::Ed25519);
        let acct = account(0);
        assert!(TxBuilder::new().fee(fee()).build(&acct, &key).is_err());
        assert!(TxBuilder::new()
            .add_message(transfer(acct.address))
            .build(&acct, &key)
            .is_err());
    }

    #[test]
    fn test_invalid_message_surfaces_encoding_error() {
        let key = SigningKey::generate(KeyType::Ed25519);
        let acct = account(0);
        let err = TxBuilder::new()
            .add_message(Message::store_code(acct.address, b"not wasm".to_vec()))
            .fee(fee())
            .build(&acct, &key)
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Encoding(EncodingError::InvalidField {
                field: "wasm_byte_code",
                ..
            })
        ));
    }

    #[test]
    fn test_oversized_tx() {
        let key = SigningKey::generate(KeyType::Ed25519);
        let acct = account(0);
        let mut wasm = b"\0asm".to_vec();
        wasm.resize(4096, 0);
        let err = TxBuilder::new()
            .add_message(Message::store_code(acct.address, wasm))
            .fee(fee())
            .max_tx_bytes(1024)
            .build(&acct, &key)
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Encoding(EncodingError::Oversized { .. })
        ));
    }

    #[test]
    fn test_long_memo_rejected() {
        let key = SigningKey::generate(KeyType::Ed25519);
        let acct = account(0);
        let err = TxBuilder::new()
            .add_message(transfer(acct.address))
            .fee(fee())
            .memo("x".repeat(MAX_MEMO_LENGTH + 1))
            .build(&acct, &key)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidMessage(_)));
    }

    #[test]
    fn test_unsigned_build_for_simulation() {
        let key = SigningKey::generate(KeyType::Secp256k1);
        let acct = account(3);
        let bytes = TxBuilder::new()
            .add_message(transfer(acct.address))
            .build_unsigned(&acct, key.public_key().to_pubkey(), 1_000_000)
            .unwrap();
        let tx = Tx::from_bytes(&bytes).unwrap();
        assert!(tx.signature.is_empty());
        assert_eq!(tx.fee.gas_limit, 1_000_000);
        assert_eq!(tx.sequence, 3);
    }
}
