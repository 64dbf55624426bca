//! Product metadata fetches
//!
//! `FetchCoordinator` sends product requests to the purchasing service and
//! routes each asynchronous answer back to the caller that asked for it.
//!
//! # Flow
//!
//! ```text
//! fetch(ids, caller)
//!     ├── register caller under Fetch(request)   (before the service sees the request)
//!     ├── remember PendingFetch { ids, cache_result }
//!     └── service.request_products(request, ids)
//!
//! complete(request, result)
//!     ├── take PendingFetch + caller (both removed, so a repeat is ignored)
//!     ├── Ok  -> cache valid products (optional), products_fetched
//!     └── Err -> products_fetch_failed
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::caller::Caller;
use crate::core::caller_registry::{CallerRegistry, RegistryKey};
use crate::core::product_cache::ProductCache;
use crate::core::traits::PurchaseService;
use crate::types::{ProductId, ProductsResponse, RequestId, ServiceError, StoreError};
use dashmap::DashMap;

/// An outstanding product request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    /// Identifiers sent to the service
    pub identifiers: HashSet<ProductId>,

    /// Whether valid products go into the cache on success
    pub cache_result: bool,
}

/// Issues product requests and resolves their answers
pub struct FetchCoordinator {
    service: Arc<dyn PurchaseService>,
    cache: Arc<ProductCache>,
    registry: Arc<CallerRegistry>,
    pending: DashMap<RequestId, PendingFetch>,
    next_request: AtomicU64,
}

impl FetchCoordinator {
    pub fn new(
        service: Arc<dyn PurchaseService>,
        cache: Arc<ProductCache>,
        registry: Arc<CallerRegistry>,
    ) -> Self {
        Self {
            service,
            cache,
            registry,
            pending: DashMap::new(),
            next_request: AtomicU64::new(1),
        }
    }

    /// Request metadata for `identifiers`
    ///
    /// An empty set is answered immediately with an empty success and never
    /// reaches the service.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(request))` - The request was submitted
    /// * `Ok(None)` - The set was empty and the caller was already notified
    /// * `Err(StoreError::AlreadyPending)` - The request id was already taken
    pub fn fetch(
        &self,
        identifiers: HashSet<ProductId>,
        caller: Caller,
        cache_result: bool,
    ) -> Result<Option<RequestId>, StoreError> {
        if identifiers.is_empty() {
            tracing::debug!("empty product request answered locally");
            caller.products_fetched(&[], &[]);
            return Ok(None);
        }

        let request = self.next_request.fetch_add(1, Ordering::Relaxed);
        self.registry.register(RegistryKey::Fetch(request), caller)?;
        self.pending.insert(
            request,
            PendingFetch {
                identifiers: identifiers.clone(),
                cache_result,
            },
        );

        tracing::debug!(request, count = identifiers.len(), "requesting products");
        self.service.request_products(request, &identifiers);
        Ok(Some(request))
    }

    /// Resolve the answer for `request`
    ///
    /// # Returns
    ///
    /// `true` if a caller was notified, `false` if the request was unknown
    /// (already answered or never issued).
    pub fn complete(
        &self,
        request: RequestId,
        result: Result<ProductsResponse, ServiceError>,
    ) -> bool {
        let pending = self.pending.remove(&request).map(|(_, p)| p);
        let caller = self.registry.unregister(&RegistryKey::Fetch(request));

        let (Some(pending), Some(caller)) = (pending, caller) else {
            tracing::warn!(request, "products response for unknown request ignored");
            return false;
        };

        match result {
            Ok(response) => {
                if pending.cache_result {
                    let invalid: HashSet<&str> = response
                        .invalid_identifiers
                        .iter()
                        .map(String::as_str)
                        .collect();
                    self.cache.put(
                        response
                            .products
                            .iter()
                            .filter(|p| !invalid.contains(p.identifier.as_str())),
                    );
                }
                tracing::debug!(
                    request,
                    valid = response.products.len(),
                    invalid = response.invalid_identifiers.len(),
                    "products fetched"
                );
                caller.products_fetched(&response.products, &response.invalid_identifiers);
            }
            Err(error) => {
                tracing::warn!(request, %error, "product request failed");
                caller.products_fetch_failed(&StoreError::fetch_failed(&error));
            }
        }

        true
    }

    /// Identifiers and cache flag of an outstanding request
    pub fn pending(&self, request: RequestId) -> Option<PendingFetch> {
        self.pending.get(&request).map(|entry| entry.value().clone())
    }

    /// Number of unanswered requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
