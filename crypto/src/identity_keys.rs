use crate::CryptoError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};
use zsm_common::Identity;

/// Length in bytes of a raw Ed25519 public key (§3).
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length in bytes of the conventional Ed25519 "expanded" secret key: a
/// 32-byte seed followed by the 32-byte public key it derives (SPEC_FULL.md
/// §3 parenthetical).
pub const SECRET_KEY_LEN: usize = 64;

/// One participant's long-term Ed25519 identity keypair, plus the X25519
/// conversion needed for session-key derivation (§4.2).
///
/// `IdentityKeys` never exposes the raw seed; callers sign, verify and
/// derive through its methods.
#[derive(Clone)]
pub struct IdentityKeys {
    signing_key: SigningKey,
}

impl IdentityKeys {
    /// Generates a fresh keypair (`zen create-key`, §6).
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        IdentityKeys { signing_key: SigningKey::from_bytes(&seed) }
    }

    /// Loads a keypair from the 64-byte expanded secret key format used in
    /// the client config file (`private_key`, 128 hex chars, §6).
    ///
    /// Validates that the embedded public-key half actually matches the
    /// seed's derived public key, catching a corrupted or hand-edited config
    /// entry before it is used for a single handshake.
    pub fn from_expanded_secret(bytes: &[u8; SECRET_KEY_LEN]) -> Result<Self, CryptoError> {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let signing_key = SigningKey::from_bytes(&seed);

        let mut embedded_public = [0u8; 32];
        embedded_public.copy_from_slice(&bytes[32..]);
        if signing_key.verifying_key().to_bytes() != embedded_public {
            return Err(CryptoError::KeyExchange("secret key's embedded public half does not match its seed"));
        }

        Ok(IdentityKeys { signing_key })
    }

    /// The 64-byte expanded secret key, for `zen create-key`'s stdout
    /// emission (§6).
    pub fn to_expanded_secret(&self) -> [u8; SECRET_KEY_LEN] {
        let mut out = [0u8; SECRET_KEY_LEN];
        out[..32].copy_from_slice(&self.signing_key.to_bytes());
        out[32..].copy_from_slice(&self.signing_key.verifying_key().to_bytes());
        out
    }

    pub fn identity(&self) -> Identity {
        Identity::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Detached Ed25519 signature over `digest` (the caller has already
    /// hashed its payload with BLAKE2b per [`crate::sign`]).
    pub(crate) fn sign_digest(&self, digest: &[u8; 32]) -> Signature {
        self.signing_key.sign(digest)
    }

    /// The X25519 secret scalar derived from this identity's Ed25519 seed,
    /// via SHA-512-then-clamp — the same scalar Ed25519 itself derives
    /// internally (SPEC_FULL.md §4.2 `[NEW]` library pinning).
    pub(crate) fn x25519_secret(&self) -> x25519_dalek::StaticSecret {
        let digest = Sha512::digest(self.signing_key.to_bytes());
        let mut scalar_bytes = [0u8; 32];
        scalar_bytes.copy_from_slice(&digest[..32]);
        x25519_dalek::StaticSecret::from(scalar_bytes)
    }
}

/// Converts an Ed25519 verifying key to its X25519 Montgomery form via the
/// standard birational map (SPEC_FULL.md §4.2 `[NEW]`).
pub(crate) fn ed25519_to_x25519_public(
    verifying_key: &VerifyingKey,
) -> Result<x25519_dalek::PublicKey, CryptoError> {
    let compressed = curve25519_dalek::edwards::CompressedEdwardsY(verifying_key.to_bytes());
    let point = compressed
        .decompress()
        .ok_or(CryptoError::KeyExchange("public key is not a valid Edwards point"))?;
    Ok(x25519_dalek::PublicKey::from(point.to_montgomery().to_bytes()))
}

pub(crate) fn verify_detached(
    verifying_key: &VerifyingKey,
    digest: &[u8; 32],
    signature: &Signature,
) -> bool {
    verifying_key.verify(digest, signature).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expanded_round_trip() {
        let keys = IdentityKeys::generate();
        let expanded = keys.to_expanded_secret();
        let reloaded = IdentityKeys::from_expanded_secret(&expanded).unwrap();
        assert_eq!(keys.identity(), reloaded.identity());
    }

    #[test]
    fn rejects_mismatched_public_half() {
        let keys = IdentityKeys::generate();
        let mut expanded = keys.to_expanded_secret();
        expanded[32] ^= 0xff;
        assert!(IdentityKeys::from_expanded_secret(&expanded).is_err());
    }
}
