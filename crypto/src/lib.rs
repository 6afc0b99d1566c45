#![forbid(unsafe_code)]

//! The cryptographic envelope: signing, verification, AEAD encryption and
//! session-key derivation layered over `zsm_packet::Packet` (§4.2).
//!
//! Nothing here touches a socket. `zsm-relay` calls [`verify`] against an
//! already-authenticated connection's identity; `zsm-client` calls the rest
//! of this module to turn plaintext into a signed [`zsm_packet::Packet`] and
//! back.

mod identity_keys;
mod message;
mod session;
mod sign;

pub use identity_keys::{IdentityKeys, PUBLIC_KEY_LEN, SECRET_KEY_LEN};
pub use message::{MessagePayload, MESSAGE_PAYLOAD_MIN_LEN, NONCE_LEN};
pub use session::{derive_or_cached, derive_session_keys, SessionKeyStore, SessionKeys};
pub use sign::{sign, verify};

use thiserror::Error;

/// The crypto-envelope error taxonomy (SPEC_FULL.md §7 `[NEW]`).
///
/// Every variant maps onto exactly one wire [`zsm_common::Status`] via
/// [`CryptoError::to_status`], so a caller can turn a cryptographic failure
/// straight into the courtesy/ERROR packet the protocol expects.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signature verification failed")]
    Integrity,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("malformed message payload: {0}")]
    MalformedPayload(&'static str),

    #[error("key exchange failed: {0}")]
    KeyExchange(&'static str),

    #[error("session-key store failed: {0}")]
    Store(String),
}

impl CryptoError {
    pub fn to_status(&self) -> zsm_common::Status {
        use zsm_common::Status;
        match self {
            CryptoError::Integrity => Status::ErrorIntegrity,
            CryptoError::Encrypt => Status::ErrorEncrypt,
            CryptoError::Decrypt => Status::ErrorDecrypt,
            CryptoError::MalformedPayload(_) => Status::InvalidLength,
            CryptoError::KeyExchange(_) => Status::ErrorAuthenticate,
            CryptoError::Store(_) => Status::MemoryAllocation,
        }
    }
}
