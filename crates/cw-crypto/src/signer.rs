//! The signing capability handed to the transaction builder

use crate::keys::{PrivateKey, PublicKey};
use crate::signature::sign_message;
use crate::SigningError;
use cw_types::{Addr, KeyType};
use std::fmt;

/// Produces signatures over canonical bytes
///
/// Implementations have no network or encoding awareness. Hardware wallets
/// and remote signers plug in here.
pub trait Signer: Send + Sync {
    fn key_type(&self) -> KeyType;

    fn public_key(&self) -> PublicKey;

    /// Sign `payload`, returning the signature and the public key that
    /// verifies it
    fn sign(&self, payload: &[u8]) -> Result<(Vec<u8>, PublicKey), SigningError>;
}

/// In-process signer backed by a private key
#[derive(Clone)]
pub struct SigningKey {
    key: PrivateKey,
    public_key: PublicKey,
}

impl SigningKey {
    pub fn new(key: PrivateKey) -> Self {
        let public_key = key.public_key();
        Self { key, public_key }
    }

    pub fn generate(key_type: KeyType) -> Self {
        Self::new(PrivateKey::generate(key_type))
    }

    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, SigningError> {
        PrivateKey::from_bytes(key_type, bytes).map(Self::new)
    }

    /// Restore a key that must be of a particular algorithm
    pub fn from_bytes_expecting(
        expected: KeyType,
        actual: KeyType,
        bytes: &[u8],
    ) -> Result<Self, SigningError> {
        if expected != actual {
            return Err(SigningError::AlgorithmMismatch { expected, actual });
        }
        Self::from_bytes(actual, bytes)
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    /// Address derived from the public key
    pub fn address(&self) -> Addr {
        self.public_key.address()
    }
}

impl Signer for SigningKey {
    fn key_type(&self) -> KeyType {
        self.key.key_type()
    }

    fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    fn sign(&self, payload: &[u8]) -> Result<(Vec<u8>, PublicKey), SigningError> {
        let signature = sign_message(&self.key, payload)?;
        Ok((signature, self.public_key.clone()))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::verify_signature;
    use std::sync::Arc;

    #[test]
    fn test_signer_returns_matching_public_key() {
        let key = SigningKey::generate(KeyType::Secp256k1);
        let signer: Arc<dyn Signer> = Arc::new(key.clone());

        let (first, pk1) = signer.sign(b"sign doc").unwrap();
        let (second, pk2) = signer.sign(b"sign doc").unwrap();
        assert_eq!(pk1, pk2);
        assert_eq!(pk1, key.public_key);
        verify_signature(&pk1, b"sign doc", &first).unwrap();
        verify_signature(&pk2, b"sign doc", &second).unwrap();
    }

    #[test]
    fn test_algorithm_mismatch() {
        let secret = PrivateKey::generate(KeyType::Ed25519).to_secret_bytes();
        let err =
            SigningKey::from_bytes_expecting(KeyType::Secp256k1, KeyType::Ed25519, &secret)
                .unwrap_err();
        assert!(matches!(err, SigningError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let key = SigningKey::generate(KeyType::Ed25519);
        let debug = format!("{key:?}");
        assert!(debug.contains("SigningKey"));
        assert!(!debug.contains("PrivateKey"));
    }
}
