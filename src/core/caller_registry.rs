//! Caller registry for outstanding operations
//!
//! The purchasing service's callbacks do not say who started an operation.
//! `CallerRegistry` closes that gap: a caller is registered under a key
//! before the request reaches the service, and resolved or removed when the
//! service answers.
//!
//! # Keys
//!
//! - `Fetch(RequestId)` - one per product request
//! - `Purchase(ProductId)` - one per product with a purchase awaiting its
//!   transaction; taken by the first terminal delivery for the product
//! - `Restore` - the caller of the current restore request
//!
//! # Thread Safety
//!
//! Registration uses DashMap's entry API, so checking for an existing key and
//! inserting happen under the same shard lock. `unregister` removes and
//! returns the caller in one step, which is what guarantees a caller is
//! notified at most once per operation.
//!
//! # Leaked registrations
//!
//! A caller dropped by the application before its operation resolves stays
//! registered (the registry holds its own `Arc`). It is notified and released
//! when the operation resolves. Purchases that never see a terminal delivery
//! keep their product key occupied for the life of the process.

use std::fmt;

use crate::core::caller::Caller;
use crate::types::{ProductId, RequestId, StoreError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Key of an outstanding operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryKey {
    Fetch(RequestId),
    Purchase(ProductId),
    Restore,
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKey::Fetch(request) => write!(f, "fetch:{}", request),
            RegistryKey::Purchase(product) => write!(f, "purchase:{}", product),
            RegistryKey::Restore => f.write_str("restore"),
        }
    }
}

/// Thread-safe registry of callers keyed by operation
#[derive(Debug, Default)]
pub struct CallerRegistry {
    callers: DashMap<RegistryKey, Caller>,
}

impl CallerRegistry {
    /// Create a new empty CallerRegistry
    pub fn new() -> Self {
        Self {
            callers: DashMap::new(),
        }
    }

    /// Register `caller` under `key`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the key was free
    /// * `Err(StoreError::AlreadyPending)` - If the key already has a caller;
    ///   the existing registration is left untouched
    pub fn register(&self, key: RegistryKey, caller: Caller) -> Result<(), StoreError> {
        match self.callers.entry(key) {
            Entry::Occupied(entry) => Err(StoreError::already_pending(entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(caller);
                Ok(())
            }
        }
    }

    /// Look up the caller for `key` without removing it
    pub fn resolve(&self, key: &RegistryKey) -> Option<Caller> {
        self.callers.get(key).map(|entry| entry.value().clone())
    }

    /// Remove and return the caller for `key`
    ///
    /// Only one of any number of concurrent calls for the same key receives
    /// the caller.
    pub fn unregister(&self, key: &RegistryKey) -> Option<Caller> {
        self.callers.remove(key).map(|(_, caller)| caller)
    }

    /// Whether `key` has a registered caller
    pub fn contains(&self, key: &RegistryKey) -> bool {
        self.callers.contains_key(key)
    }

    /// Number of outstanding registrations
    pub fn len(&self) -> usize {
        self.callers.len()
    }

    /// Whether no operation is outstanding
    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::caller::Callbacks;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn caller() -> Caller {
        Callbacks::purchase(|_| {}, |_| {}).into()
    }

    #[rstest]
    #[case::fetch(RegistryKey::Fetch(7), "fetch:7")]
    #[case::purchase(RegistryKey::Purchase("gems.100".to_string()), "purchase:gems.100")]
    #[case::restore(RegistryKey::Restore, "restore")]
    fn test_key_display(#[case] key: RegistryKey, #[case] expected: &str) {
        assert_eq!(key.to_string(), expected);
    }

    #[test]
    fn test_register_resolve_unregister_cycle() {
        let registry = CallerRegistry::new();
        let key = RegistryKey::Purchase("gems.100".to_string());

        registry.register(key.clone(), caller()).unwrap();
        assert!(registry.resolve(&key).is_some());
        assert!(registry.contains(&key));

        assert!(registry.unregister(&key).is_some());
        assert!(registry.unregister(&key).is_none());
        assert!(registry.resolve(&key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = CallerRegistry::new();
        let key = RegistryKey::Purchase("gems.100".to_string());

        registry.register(key.clone(), caller()).unwrap();
        let result = registry.register(key.clone(), caller());

        assert_eq!(
            result,
            Err(StoreError::AlreadyPending {
                key: "purchase:gems.100".to_string()
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_keys_coexist() {
        let registry = CallerRegistry::new();

        registry.register(RegistryKey::Fetch(1), caller()).unwrap();
        registry.register(RegistryKey::Fetch(2), caller()).unwrap();
        registry
            .register(RegistryKey::Purchase("a".to_string()), caller())
            .unwrap();
        registry.register(RegistryKey::Restore, caller()).unwrap();

        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_concurrent_unregister_yields_caller_once() {
        use std::thread;

        let registry = Arc::new(CallerRegistry::new());
        let key = RegistryKey::Fetch(1);
        registry.register(key.clone(), caller()).unwrap();

        let winners = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let winners = Arc::clone(&winners);
            let key = key.clone();
            handles.push(thread::spawn(move || {
                if registry.unregister(&key).is_some() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
