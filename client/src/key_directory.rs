use crate::error::ClientError;
use crate::store::Store;
use std::sync::Arc;
use zsm_common::Identity;

/// Resolves a human-typed identifier (a nickname, or the hex identity
/// itself) to an [`Identity`] (§4.4 `[NEW]` external key directory).
///
/// `zsm-crypto` and `zsm-relay` never see nicknames — only `zen`'s UI layer
/// does, so this boundary is entirely client-side.
pub trait KeyDirectory {
    fn resolve(&self, identifier: &str) -> Result<Option<Identity>, ClientError>;
}

/// Default [`KeyDirectory`]: a bare hex identity always resolves to itself;
/// anything else is looked up as a nickname against the local store's
/// `Users` table (§6).
pub struct LocalKeyDirectory<S: Store> {
    store: Arc<S>,
}

impl<S: Store> LocalKeyDirectory<S> {
    pub fn new(store: Arc<S>) -> Self {
        LocalKeyDirectory { store }
    }
}

impl<S: Store> KeyDirectory for LocalKeyDirectory<S> {
    fn resolve(&self, identifier: &str) -> Result<Option<Identity>, ClientError> {
        if let Ok(identity) = identifier.parse::<Identity>() {
            return Ok(Some(identity));
        }
        self.store.resolve_nickname(identifier)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn hex_identifier_always_resolves() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let directory = LocalKeyDirectory::new(store);
        let identity = Identity::from_bytes([9u8; 32]);
        assert_eq!(directory.resolve(&identity.to_hex()).unwrap(), Some(identity));
    }

    #[test]
    fn nickname_resolves_via_the_store() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let identity = Identity::from_bytes([4u8; 32]);
        store.set_nickname(&identity, "bob").unwrap();

        let directory = LocalKeyDirectory::new(store);
        assert_eq!(directory.resolve("bob").unwrap(), Some(identity));
        assert_eq!(directory.resolve("nobody").unwrap(), None);
    }
}
