//! Thread-safe in-memory product cache
//!
//! This module provides the `ProductCache` struct, which keeps fetched product
//! metadata keyed by product identifier.
//!
//! # Design
//!
//! The cache uses `DashMap` (a concurrent HashMap) so that fetch results can be
//! inserted while other threads look products up. Mutations on the same
//! identifier are serialized by the owning shard; readers always receive a
//! cloned `Product`, never a reference into the map, so a reader cannot
//! observe a partially replaced entry.
//!
//! # Lifetime
//!
//! One cache lives as long as its `StoreManager`. Entries stay until they are
//! evicted with `remove` or `clear`.

use crate::types::{Product, ProductId};
use dashmap::DashMap;

/// Thread-safe product cache
///
/// Holds at most one `Product` per identifier. Inserting a product whose
/// identifier is already cached replaces the previous entry.
#[derive(Debug, Default)]
pub struct ProductCache {
    /// Cached products by identifier
    products: DashMap<ProductId, Product>,
}

impl ProductCache {
    /// Create a new empty ProductCache
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
        }
    }

    /// Insert products, replacing entries with the same identifier
    pub fn put<'a, I>(&self, products: I)
    where
        I: IntoIterator<Item = &'a Product>,
    {
        for product in products {
            self.products.insert(product.identifier.clone(), product.clone());
        }
    }

    /// Look up a product by identifier
    ///
    /// # Returns
    ///
    /// * `Some(Product)` - A clone of the cached product
    /// * `None` - If nothing is cached for `identifier`
    pub fn get(&self, identifier: &str) -> Option<Product> {
        self.products.get(identifier).map(|entry| entry.value().clone())
    }

    /// Evict the given products
    ///
    /// Products are matched by identifier; identifiers that are not cached are
    /// ignored.
    pub fn remove<'a, I>(&self, products: I)
    where
        I: IntoIterator<Item = &'a Product>,
    {
        for product in products {
            self.products.remove(&product.identifier);
        }
    }

    /// Evict every cached product
    pub fn clear(&self) {
        self.products.clear();
    }

    /// Snapshot of all cached products, sorted by identifier
    pub fn products(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        products.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        products
    }

    /// Number of cached products
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn product(id: &str, cents: i64) -> Product {
        Product::new(id, id, Decimal::new(cents, 2), "USD")
    }

    #[test]
    fn test_put_and_get() {
        let cache = ProductCache::new();
        let gems = product("gems.100", 199);

        cache.put([&gems]);

        assert_eq!(cache.get("gems.100"), Some(gems));
        assert_eq!(cache.get("gems.500"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_replaces_same_identifier() {
        let cache = ProductCache::new();

        cache.put([&product("gems.100", 199)]);
        cache.put([&product("gems.100", 299)]);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("gems.100").unwrap().price, Decimal::new(299, 2));
    }

    #[test]
    fn test_remove_selected_products() {
        let cache = ProductCache::new();
        let a = product("a", 100);
        let b = product("b", 200);
        let never_cached = product("c", 300);
        cache.put([&a, &b]);

        cache.remove([&a, &never_cached]);

        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = ProductCache::new();
        cache.put([&product("a", 100), &product("b", 200)]);

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.products().is_empty());
    }

    #[test]
    fn test_products_snapshot_is_sorted() {
        let cache = ProductCache::new();
        cache.put([&product("c", 1), &product("a", 1), &product("b", 1)]);

        let ids: Vec<String> = cache.products().into_iter().map(|p| p.identifier).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        use std::thread;

        let cache = Arc::new(ProductCache::new());
        let mut handles = vec![];

        for i in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let id = format!("product.{}", i);
                cache.put([&product(&id, i)]);
                assert!(cache.get(&id).is_some());
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 10);
    }
}
