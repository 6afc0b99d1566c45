use crate::identity_keys::verify_detached;
use crate::{CryptoError, IdentityKeys};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, VerifyingKey};
use zsm_common::Identity;

type Blake2b256 = Blake2b<U32>;

fn digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hashes `data` with BLAKE2b-256 and signs the digest (§4.2).
///
/// Decouples signature cost from payload size and gives a uniform
/// domain-separated input, per the rationale in §4.2.
pub fn sign(data: &[u8], keys: &IdentityKeys) -> [u8; 64] {
    let d = digest(data);
    keys.sign_digest(&d).to_bytes()
}

/// Verifies `signature` over `data` against `identity`'s Ed25519 public key
/// (§4.2).
///
/// This is the generic primitive; callers that must additionally check the
/// sender field embedded in a MESSAGE payload against the connection's
/// authenticated identity do that comparison themselves before or after
/// calling this (§4.2, "A packet whose embedded sender does not match the
/// connection's authenticated identity is also `ErrorIntegrity`").
pub fn verify(data: &[u8], signature: &[u8; 64], identity: &Identity) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(identity.as_bytes()).map_err(|_| CryptoError::Integrity)?;
    let sig = Signature::from_bytes(signature);
    let d = digest(data);
    if verify_detached(&verifying_key, &d, &sig) {
        Ok(())
    } else {
        Err(CryptoError::Integrity)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let keys = IdentityKeys::generate();
        let data = b"hello world".to_vec();
        let signature = sign(&data, &keys);
        verify(&data, &signature, &keys.identity()).unwrap();
    }

    #[test]
    fn verify_fails_on_tampered_data() {
        let keys = IdentityKeys::generate();
        let data = b"hello world".to_vec();
        let signature = sign(&data, &keys);
        let mut tampered = data.clone();
        tampered[0] ^= 1;
        assert!(verify(&tampered, &signature, &keys.identity()).is_err());
    }

    #[test]
    fn verify_fails_under_wrong_identity() {
        let keys = IdentityKeys::generate();
        let other = IdentityKeys::generate();
        let data = b"hello world".to_vec();
        let signature = sign(&data, &keys);
        assert!(verify(&data, &signature, &other.identity()).is_err());
    }
}
