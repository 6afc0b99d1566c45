use crate::identity_keys::ed25519_to_x25519_public;
use crate::{CryptoError, IdentityKeys};
use ed25519_dalek::VerifyingKey;
use hkdf::Hkdf;
use sha2::Sha256;
use zsm_common::Identity;

/// The two directional 32-byte symmetric keys produced by a session-key
/// derivation for one peer (§3 "Session-key cache entry").
#[derive(Clone, Eq, PartialEq)]
pub struct SessionKeys {
    pub send: [u8; 32],
    pub receive: [u8; 32],
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SessionKeys").field("send", &"[redacted]").field("receive", &"[redacted]").finish()
    }
}

/// The client's persistent per-peer key cache (§3, §4.4 "Key-cache
/// coherence").
///
/// `zsm-crypto` only derives keys; it never decides where they live. A
/// concrete store (e.g. the client's SQLite-backed store) implements this
/// trait so [`derive_or_cached`] can consult it before paying for an X25519
/// Diffie-Hellman.
pub trait SessionKeyStore {
    fn get_session_keys(&self, peer: &Identity) -> Result<Option<SessionKeys>, CryptoError>;
    fn put_session_keys(&self, peer: &Identity, keys: &SessionKeys) -> Result<(), CryptoError>;
}

/// Derives the session keys between `local` and `peer` from scratch (§4.2
/// steps 1-2), without consulting or updating any cache.
///
/// Role assignment is lexicographic on raw identity bytes: the
/// smaller-identity endpoint is the "client" and takes the first half of the
/// HKDF output as its send key (§4.2 `[NEW]` key-exchange construction,
/// §9 resolved question).
pub fn derive_session_keys(local: &IdentityKeys, peer: &Identity) -> Result<SessionKeys, CryptoError> {
    let peer_verifying = VerifyingKey::from_bytes(peer.as_bytes())
        .map_err(|_| CryptoError::KeyExchange("peer identity is not a valid Ed25519 public key"))?;
    let peer_x25519 = ed25519_to_x25519_public(&peer_verifying)?;

    let shared = local.x25519_secret().diffie_hellman(&peer_x25519);

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = [0u8; 64];
    hk.expand(&[], &mut okm).map_err(|_| CryptoError::KeyExchange("HKDF expand failed"))?;

    let (first, second) = okm.split_at(32);
    let mut first32 = [0u8; 32];
    let mut second32 = [0u8; 32];
    first32.copy_from_slice(first);
    second32.copy_from_slice(second);

    if local.identity().is_client_role_against(peer) {
        Ok(SessionKeys { send: first32, receive: second32 })
    } else {
        Ok(SessionKeys { send: second32, receive: first32 })
    }
}

/// Consults `store` for a cached entry before deriving one, persisting a
/// freshly-derived entry back to `store` (§4.4 send/receive path step 1,
/// S6).
pub fn derive_or_cached<S: SessionKeyStore>(
    local: &IdentityKeys,
    peer: &Identity,
    store: &S,
) -> Result<SessionKeys, CryptoError> {
    if let Some(cached) = store.get_session_keys(peer)? {
        return Ok(cached);
    }
    let derived = derive_session_keys(local, peer)?;
    store.put_session_keys(peer, &derived)?;
    Ok(derived)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[test]
    fn session_keys_agree_across_both_directions() {
        let a = IdentityKeys::generate();
        let b = IdentityKeys::generate();

        let from_a = derive_session_keys(&a, &b.identity()).unwrap();
        let from_b = derive_session_keys(&b, &a.identity()).unwrap();

        assert_eq!(from_a.send, from_b.receive);
        assert_eq!(from_a.receive, from_b.send);
    }

    struct MemStore {
        entries: RefCell<HashMap<Identity, SessionKeys>>,
        derivations: RefCell<usize>,
    }

    impl MemStore {
        fn new() -> Self {
            MemStore { entries: RefCell::new(HashMap::new()), derivations: RefCell::new(0) }
        }
    }

    impl SessionKeyStore for MemStore {
        fn get_session_keys(&self, peer: &Identity) -> Result<Option<SessionKeys>, CryptoError> {
            Ok(self.entries.borrow().get(peer).cloned())
        }
        fn put_session_keys(&self, peer: &Identity, keys: &SessionKeys) -> Result<(), CryptoError> {
            *self.derivations.borrow_mut() += 1;
            self.entries.borrow_mut().insert(*peer, keys.clone());
            Ok(())
        }
    }

    #[test]
    fn cache_avoids_rederiving_on_second_lookup() {
        let a = IdentityKeys::generate();
        let b = IdentityKeys::generate();
        let store = MemStore::new();

        let first = derive_or_cached(&a, &b.identity(), &store).unwrap();
        let second = derive_or_cached(&a, &b.identity(), &store).unwrap();

        assert_eq!(first, second);
        assert_eq!(*store.derivations.borrow(), 1);
    }
}
