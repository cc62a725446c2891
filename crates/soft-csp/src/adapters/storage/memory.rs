use std::collections::BTreeMap;

use crate::domain::algorithms::KeySpec;
use crate::domain::entities::KeysetScope;
use crate::domain::errors::StoreError;
use crate::ports::outbound::{KeysetStore, StoredKeyset};

/// In-memory keyset store for tests and ephemeral providers.
///
/// Contents vanish with the store; each scope is an independent namespace.
#[derive(Debug, Default)]
pub struct InMemoryKeysetStore {
    keysets: BTreeMap<(KeysetScope, String), StoredKeyset>,
}

impl InMemoryKeysetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_key(scope: KeysetScope, name: &str) -> (KeysetScope, String) {
        (scope, name.to_string())
    }
}

impl KeysetStore for InMemoryKeysetStore {
    fn exists(&self, scope: KeysetScope, name: &str) -> Result<bool, StoreError> {
        Ok(self.keysets.contains_key(&Self::entry_key(scope, name)))
    }

    fn create(&mut self, scope: KeysetScope, name: &str) -> Result<(), StoreError> {
        let key = Self::entry_key(scope, name);
        if self.keysets.contains_key(&key) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        self.keysets.insert(key, StoredKeyset::default());
        Ok(())
    }

    fn load(&self, scope: KeysetScope, name: &str) -> Result<StoredKeyset, StoreError> {
        self.keysets
            .get(&Self::entry_key(scope, name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn save_key(
        &mut self,
        scope: KeysetScope,
        name: &str,
        spec: KeySpec,
        blob: &[u8],
    ) -> Result<(), StoreError> {
        self.keysets
            .entry(Self::entry_key(scope, name))
            .or_default()
            .set_key(spec, blob.to_vec());
        Ok(())
    }

    fn delete(&mut self, scope: KeysetScope, name: &str) -> Result<(), StoreError> {
        self.keysets
            .remove(&Self::entry_key(scope, name))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn list(&self, scope: KeysetScope) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keysets
            .keys()
            .filter(|(s, _)| *s == scope)
            .map(|(_, name)| name.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_load_delete() {
        let mut store = InMemoryKeysetStore::new();
        store.create(KeysetScope::User, "alice").unwrap();
        assert!(store.exists(KeysetScope::User, "alice").unwrap());
        assert!(!store.exists(KeysetScope::Machine, "alice").unwrap());
        assert_eq!(
            store.create(KeysetScope::User, "alice"),
            Err(StoreError::AlreadyExists("alice".into()))
        );
        assert_eq!(store.load(KeysetScope::User, "alice").unwrap(), StoredKeyset::default());

        store.delete(KeysetScope::User, "alice").unwrap();
        assert!(matches!(
            store.load(KeysetScope::User, "alice"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(KeysetScope::User, "alice"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_key_replaces_one_slot() {
        let mut store = InMemoryKeysetStore::new();
        store.save_key(KeysetScope::User, "k", KeySpec::Signature, &[1, 2]).unwrap();
        store.save_key(KeysetScope::User, "k", KeySpec::KeyExchange, &[3]).unwrap();
        store.save_key(KeysetScope::User, "k", KeySpec::Signature, &[4]).unwrap();
        let loaded = store.load(KeysetScope::User, "k").unwrap();
        assert_eq!(loaded.key(KeySpec::Signature), Some(&[4u8][..]));
        assert_eq!(loaded.key(KeySpec::KeyExchange), Some(&[3u8][..]));
    }

    #[test]
    fn test_list_is_sorted_and_scoped() {
        let mut store = InMemoryKeysetStore::new();
        store.create(KeysetScope::User, "b").unwrap();
        store.create(KeysetScope::User, "a").unwrap();
        store.create(KeysetScope::Machine, "m").unwrap();
        assert_eq!(store.list(KeysetScope::User).unwrap(), vec!["a", "b"]);
        assert_eq!(store.list(KeysetScope::Machine).unwrap(), vec!["m"]);
    }
}
