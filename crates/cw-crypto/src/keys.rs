//! Key representations using static enum dispatch

use crate::SigningError;
use base64::{engine::general_purpose, Engine as _};
use cw_types::{Addr, Binary, Hash, KeyType, PubKey};
use ed25519_dalek::{SigningKey as Ed25519PrivKey, VerifyingKey as Ed25519PubKey};
use k256::ecdsa::{SigningKey as Secp256k1PrivKey, VerifyingKey as Secp256k1PubKey};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// All supported public key types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Secp256k1(Secp256k1PubKey),
    Ed25519(Ed25519PubKey),
}

/// All supported private key types
#[derive(Clone)]
pub enum PrivateKey {
    Secp256k1(Secp256k1PrivKey),
    Ed25519(Ed25519PrivKey),
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Secp256k1(_) => KeyType::Secp256k1,
            PublicKey::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// Convert to raw bytes (compressed SEC1 for secp256k1)
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Secp256k1(key) => key.to_encoded_point(true).as_bytes().to_vec(),
            PublicKey::Ed25519(key) => key.as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(key_type: KeyType, value: &[u8]) -> Result<Self, SigningError> {
        match key_type {
            KeyType::Secp256k1 => {
                let key = Secp256k1PubKey::from_sec1_bytes(value)
                    .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
                Ok(PublicKey::Secp256k1(key))
            }
            KeyType::Ed25519 => {
                let bytes: &[u8; 32] = value.try_into().map_err(|_| {
                    SigningError::InvalidKey("invalid ed25519 key length".to_string())
                })?;
                let key = Ed25519PubKey::from_bytes(bytes)
                    .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
                Ok(PublicKey::Ed25519(key))
            }
        }
    }

    /// Form carried inside a transaction
    pub fn to_pubkey(&self) -> PubKey {
        PubKey {
            key_type: self.key_type(),
            value: Binary::new(self.to_bytes()),
        }
    }

    pub fn from_pubkey(pubkey: &PubKey) -> Result<Self, SigningError> {
        Self::from_bytes(pubkey.key_type, &pubkey.value)
    }

    /// Default account address for this key: sha256 of the raw key bytes
    pub fn address(&self) -> Addr {
        Addr::from_array(*Hash::of(&self.to_bytes()).as_bytes())
    }
}

impl PrivateKey {
    pub fn generate(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Secp256k1 => PrivateKey::Secp256k1(Secp256k1PrivKey::random(&mut OsRng)),
            KeyType::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                OsRng.fill_bytes(&mut seed[..]);
                PrivateKey::Ed25519(Ed25519PrivKey::from_bytes(&seed))
            }
        }
    }

    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, SigningError> {
        match key_type {
            KeyType::Secp256k1 => Secp256k1PrivKey::from_slice(bytes)
                .map(PrivateKey::Secp256k1)
                .map_err(|_| SigningError::InvalidKey("malformed secp256k1 secret".to_string())),
            KeyType::Ed25519 => {
                let seed: &[u8; 32] = bytes.try_into().map_err(|_| {
                    SigningError::InvalidKey("ed25519 secret must be 32 bytes".to_string())
                })?;
                Ok(PrivateKey::Ed25519(Ed25519PrivKey::from_bytes(seed)))
            }
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Secp256k1(_) => KeyType::Secp256k1,
            PrivateKey::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Secp256k1(key) => PublicKey::Secp256k1(*key.verifying_key()),
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Raw secret, wiped on drop; only keystores should need this
    pub fn to_secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        match self {
            PrivateKey::Secp256k1(key) => Zeroizing::new(key.to_bytes().to_vec()),
            PrivateKey::Ed25519(key) => Zeroizing::new(key.to_bytes().to_vec()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey::{}(<redacted>)", self.key_type())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct PublicKeyData {
            #[serde(rename = "type")]
            key_type: KeyType,
            value: String,
        }

        PublicKeyData {
            key_type: self.key_type(),
            value: general_purpose::STANDARD.encode(self.to_bytes()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct PublicKeyData {
            #[serde(rename = "type")]
            key_type: KeyType,
            value: String,
        }

        let data = PublicKeyData::deserialize(deserializer)?;
        let bytes = general_purpose::STANDARD
            .decode(&data.value)
            .map_err(serde::de::Error::custom)?;

        PublicKey::from_bytes(data.key_type, &bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_serde_roundtrip() {
        for key_type in [KeyType::Secp256k1, KeyType::Ed25519] {
            let pubkey = PrivateKey::generate(key_type).public_key();
            let json = serde_json::to_string(&pubkey).unwrap();
            let parsed: PublicKey = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, pubkey);
            assert_eq!(PublicKey::from_pubkey(&pubkey.to_pubkey()).unwrap(), pubkey);
        }
    }

    #[test]
    fn test_secp256k1_pubkey_is_compressed() {
        let pubkey = PrivateKey::generate(KeyType::Secp256k1).public_key();
        assert_eq!(pubkey.to_bytes().len(), 33);
    }

    #[test]
    fn test_secret_roundtrip() {
        for key_type in [KeyType::Secp256k1, KeyType::Ed25519] {
            let key = PrivateKey::generate(key_type);
            let restored = PrivateKey::from_bytes(key_type, &key.to_secret_bytes()).unwrap();
            assert_eq!(restored.public_key(), key.public_key());
        }
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = PrivateKey::generate(KeyType::Ed25519);
        let secret_hex: String = key
            .to_secret_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let debug = format!("{key:?}");
        assert_eq!(debug, "PrivateKey::ed25519(<redacted>)");
        assert!(!debug.contains(&secret_hex));
    }

    #[test]
    fn test_address_is_stable_per_key() {
        let key = PrivateKey::generate(KeyType::Secp256k1);
        let other = PrivateKey::generate(KeyType::Secp256k1);
        assert_eq!(key.public_key().address(), key.public_key().address());
        assert_ne!(key.public_key().address(), other.public_key().address());
    }

    #[test]
    fn test_rejects_wrong_lengths() {
        assert!(PrivateKey::from_bytes(KeyType::Ed25519, &[1; 31]).is_err());
        assert!(PublicKey::from_bytes(KeyType::Secp256k1, &[1; 33]).is_err());
    }
}
