//! Signature operations

use crate::keys::{PrivateKey, PublicKey};
use crate::SigningError;
use ::signature::{Signer, Verifier};

/// Sign a message with a private key
///
/// secp256k1 signatures are RFC 6979 deterministic ECDSA over SHA-256 of the
/// message, encoded as 64-byte compact `r || s` with low S. ed25519 signs the
/// message directly.
pub fn sign_message(key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>, SigningError> {
    match key {
        PrivateKey::Secp256k1(k) => {
            let sig: k256::ecdsa::Signature = k
                .try_sign(message)
                .map_err(|e| SigningError::SigningFailed(e.to_string()))?;
            Ok(sig.to_bytes().to_vec())
        }
        PrivateKey::Ed25519(k) => {
            let sig: ed25519_dalek::Signature = k
                .try_sign(message)
                .map_err(|e| SigningError::SigningFailed(e.to_string()))?;
            Ok(sig.to_bytes().to_vec())
        }
    }
}

/// Verify a signature with a public key
pub fn verify_signature(
    key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SigningError> {
    match key {
        PublicKey::Secp256k1(k) => {
            let sig = k256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| SigningError::VerificationFailed)?;
            k.verify(message, &sig)
                .map_err(|_| SigningError::VerificationFailed)
        }
        PublicKey::Ed25519(k) => {
            let bytes: &[u8; 64] = signature
                .try_into()
                .map_err(|_| SigningError::VerificationFailed)?;
            let sig = ed25519_dalek::Signature::from_bytes(bytes);
            k.verify(message, &sig)
                .map_err(|_| SigningError::VerificationFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_types::KeyType;

    #[test]
    fn test_sign_and_verify_both_algorithms() {
        for key_type in [KeyType::Secp256k1, KeyType::Ed25519] {
            let key = PrivateKey::generate(key_type);
            let sig = sign_message(&key, b"payload").unwrap();
            assert_eq!(sig.len(), 64);
            verify_signature(&key.public_key(), b"payload", &sig).unwrap();
            assert!(verify_signature(&key.public_key(), b"tampered", &sig).is_err());
        }
    }

    #[test]
    fn test_signing_twice_verifies_against_same_key() {
        let key = PrivateKey::generate(KeyType::Secp256k1);
        let first = sign_message(&key, b"canonical bytes").unwrap();
        let second = sign_message(&key, b"canonical bytes").unwrap();
        let pubkey = key.public_key();
        verify_signature(&pubkey, b"canonical bytes", &first).unwrap();
        verify_signature(&pubkey, b"canonical bytes", &second).unwrap();
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = PrivateKey::generate(KeyType::Ed25519);
        let other = PrivateKey::generate(KeyType::Ed25519);
        let sig = sign_message(&key, b"payload").unwrap();
        assert!(matches!(
            verify_signature(&other.public_key(), b"payload", &sig),
            Err(SigningError::VerificationFailed)
        ));
    }
}
