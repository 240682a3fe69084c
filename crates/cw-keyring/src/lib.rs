//! Password-protected key files
//!
//! A key file is JSON holding an AES-256-GCM encrypted secret. The cipher key
//! is derived from the password with Argon2 and a per-file salt. Loading
//! yields a [`SigningKey`] capability; the decrypted secret bytes are wiped
//! as soon as the key is reconstructed.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use base64::{engine::general_purpose, Engine as _};
use cw_crypto::{PublicKey, Signer, SigningKey};
use cw_types::{Addr, KeyType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};
use zeroize::Zeroizing;

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("incorrect password")]
    BadPassword,

    #[error("corrupt key file: {0}")]
    Corrupt(String),

    #[error("key file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("no home directory")]
    NoHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KeystoreError>;

/// On-disk layout
#[derive(Serialize, Deserialize)]
struct EncryptedKeyFile {
    key_type: KeyType,
    /// Encrypted secret (base64)
    encrypted_data: String,
    /// AES-GCM nonce (base64)
    nonce: String,
    /// Argon2 salt (PHC b64)
    salt: String,
    /// Stored in the clear for lookups without the password
    pubkey: PublicKey,
    address: Addr,
}

/// Loads and stores [`SigningKey`]s in encrypted JSON files
pub struct FileKeystore;

impl FileKeystore {
    /// `~/.cwcli/keys`
    pub fn default_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(KeystoreError::NoHomeDir)?;
        Ok(home.join(".cwcli").join("keys"))
    }

    pub async fn load(path: impl AsRef<Path>, password: &str) -> Result<SigningKey> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).await?;
        let file: EncryptedKeyFile =
            serde_json::from_str(&data).map_err(|e| KeystoreError::Corrupt(e.to_string()))?;

        let secret = decrypt(&file, password)?;
        let key = SigningKey::from_bytes_expecting(file.pubkey.key_type(), file.key_type, &secret)
            .map_err(|e| KeystoreError::Corrupt(e.to_string()))?;

        if key.public_key() != file.pubkey {
            return Err(KeystoreError::Corrupt(
                "public key does not match secret".to_string(),
            ));
        }

        debug!(path = %path.display(), address = %file.address, "Loaded key file");
        Ok(key)
    }

    /// Write `key` to `path`, refusing to overwrite an existing file
    pub async fn save(path: impl AsRef<Path>, key: &SigningKey, password: &str) -> Result<()> {
        let path = path.as_ref();
        if fs::try_exists(path).await? {
            return Err(KeystoreError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = encrypt(key, password)?;
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| KeystoreError::Corrupt(e.to_string()))?;
        fs::write(path, json).await?;

        info!(path = %path.display(), address = %file.address, "Saved key file");
        Ok(())
    }

    /// Read the address from a key file without decrypting it
    pub async fn address(path: impl AsRef<Path>) -> Result<Addr> {
        let data = fs::read_to_string(path).await?;
        let file: EncryptedKeyFile =
            serde_json::from_str(&data).map_err(|e| KeystoreError::Corrupt(e.to_string()))?;
        Ok(file.address)
    }
}

fn derive_cipher(password: &str, salt: &SaltString) -> Result<Aes256Gcm> {
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), salt)
        .map_err(|e| KeystoreError::Corrupt(format!("failed to hash password: {e}")))?;
    let hash = password_hash
        .hash
        .ok_or_else(|| KeystoreError::Corrupt("empty password hash".to_string()))?;
    let key_bytes = hash.as_bytes();
    if key_bytes.len() < 32 {
        return Err(KeystoreError::Corrupt("password hash too short".to_string()));
    }
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes[..32]);
    Ok(Aes256Gcm::new(key))
}

fn encrypt(key: &SigningKey, password: &str) -> Result<EncryptedKeyFile> {
    let salt = SaltString::generate(&mut OsRng);
    let cipher = derive_cipher(password, &salt)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let secret = key.private_key().to_secret_bytes();
    let ciphertext = cipher
        .encrypt(&nonce, secret.as_slice())
        .map_err(|e| KeystoreError::Corrupt(format!("failed to encrypt key: {e}")))?;

    Ok(EncryptedKeyFile {
        key_type: key.key_type(),
        encrypted_data: general_purpose::STANDARD.encode(&ciphertext),
        nonce: general_purpose::STANDARD.encode(nonce),
        salt: salt.to_string(),
        pubkey: key.public_key(),
        address: key.address(),
    })
}

fn decrypt(file: &EncryptedKeyFile, password: &str) -> Result<Zeroizing<Vec<u8>>> {
    let salt = SaltString::from_b64(&file.salt)
        .map_err(|e| KeystoreError::Corrupt(format!("invalid salt: {e}")))?;
    let cipher = derive_cipher(password, &salt)?;

    let nonce_bytes = general_purpose::STANDARD
        .decode(&file.nonce)
        .map_err(|e| KeystoreError::Corrupt(format!("invalid nonce: {e}")))?;
    if nonce_bytes.len() != 12 {
        return Err(KeystoreError::Corrupt("invalid nonce length".to_string()));
    }
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = general_purpose::STANDARD
        .decode(&file.encrypted_data)
        .map_err(|e| KeystoreError::Corrupt(format!("invalid encrypted data: {e}")))?;

    // GCM authentication failure is indistinguishable from a wrong password
    cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| KeystoreError::BadPassword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alice.json");

        for key_type in [KeyType::Secp256k1, KeyType::Ed25519] {
            let _ = std::fs::remove_file(&path);
            let key = SigningKey::generate(key_type);
            FileKeystore::save(&path, &key, "hunter2").await.unwrap();

            let loaded = FileKeystore::load(&path, "hunter2").await.unwrap();
            assert_eq!(loaded.public_key(), key.public_key());
            assert_eq!(FileKeystore::address(&path).await.unwrap(), key.address());
        }
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alice.json");
        let key = SigningKey::generate(KeyType::Secp256k1);
        FileKeystore::save(&path, &key, "correct").await.unwrap();

        let err = FileKeystore::load(&path, "wrong").await.unwrap_err();
        assert!(matches!(err, KeystoreError::BadPassword));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileKeystore::load(&path, "pw").await.unwrap_err();
        assert!(matches!(err, KeystoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_key_type_must_match_public_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alice.json");
        let key = SigningKey::generate(KeyType::Ed25519);
        FileKeystore::save(&path, &key, "pw").await.unwrap();

        let mut file: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        file["key_type"] = serde_json::to_value(KeyType::Secp256k1).unwrap();
        std::fs::write(&path, file.to_string()).unwrap();

        let err = FileKeystore::load(&path, "pw").await.unwrap_err();
        match err {
            KeystoreError::Corrupt(reason) => assert!(reason.contains("algorithm mismatch")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alice.json");
        let key = SigningKey::generate(KeyType::Ed25519);
        FileKeystore::save(&path, &key, "pw").await.unwrap();

        let err = FileKeystore::save(&path, &key, "pw").await.unwrap_err();
        assert!(matches!(err, KeystoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = FileKeystore::load(dir.path().join("nope.json"), "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, KeystoreError::Io(_)));
    }
}
