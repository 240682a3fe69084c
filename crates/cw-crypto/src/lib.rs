//! Signing capabilities for cw-sdk
//!
//! Key types wrap the RustCrypto implementations. Everything above this crate
//! only sees the [`Signer`] capability and never touches secret bytes.

pub mod keys;
pub mod signature;
pub mod signer;

pub use keys::{PrivateKey, PublicKey};
pub use self::signature::{sign_message, verify_signature};
pub use signer::{Signer, SigningKey};

use cw_types::KeyType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("algorithm mismatch: expected {expected}, got {actual}")]
    AlgorithmMismatch { expected: KeyType, actual: KeyType },

    #[error("signature verification failed")]
    VerificationFailed,
}
