//! Public entry points of the store manager
//!
//! `StoreManager` composes the product cache, caller registry, fetch
//! coordinator and transaction reconciler behind the calls an application
//! makes: fetch products, purchase, restore and verify.
//!
//! # Composition
//!
//! ```text
//! StoreManager
//!     ├── Arc<dyn PurchaseService>        (platform store)
//!     ├── Arc<ProductCache>               (fetched products)
//!     ├── Arc<CallerRegistry>             (who is waiting for what)
//!     ├── FetchCoordinator                (product requests)
//!     ├── Arc<TransactionReconciler>      (queue state machine)
//!     └── QueueDispatcher                 (concurrent batch reconciliation)
//! ```
//!
//! There is no global instance. The application builds one manager at its
//! composition root and shares it (typically in an `Arc`) for the life of the
//! process.
//!
//! # Inbound events
//!
//! Answers from the service arrive as [`StoreEvent`]s. They can be handed to
//! [`StoreManager::handle_event`] on whatever thread the service calls back on,
//! or sent into a channel consumed by [`StoreManager::run`].

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::StoreConfig;
use crate::core::caller::{Caller, Channel};
use crate::core::caller_registry::{CallerRegistry, RegistryKey};
use crate::core::dispatcher::{DispatchResult, QueueDispatcher};
use crate::core::fetch_coordinator::FetchCoordinator;
use crate::core::product_cache::ProductCache;
use crate::core::reconciler::{Reconciliation, TransactionReconciler};
use crate::core::traits::PurchaseService;
use crate::types::{
    Product, ProductId, ProductsResponse, RequestId, ServiceError, StoreError, Transaction,
};

/// Asynchronous answers from the purchasing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Answer to `request_products`
    ProductsResponse {
        request: RequestId,
        result: Result<ProductsResponse, ServiceError>,
    },

    /// One or more transaction-queue deliveries
    TransactionsUpdated(Vec<Transaction>),

    /// The service finished redelivering restored transactions
    RestoreCompleted(Result<(), ServiceError>),
}

/// Facade over the purchasing service
pub struct StoreManager {
    config: StoreConfig,
    service: Arc<dyn PurchaseService>,
    cache: Arc<ProductCache>,
    registry: Arc<CallerRegistry>,
    fetcher: FetchCoordinator,
    reconciler: Arc<TransactionReconciler>,
    dispatcher: QueueDispatcher,
}

impl StoreManager {
    /// Create a manager with its own cache and registry
    pub fn new(service: Arc<dyn PurchaseService>, config: StoreConfig) -> Self {
        Self::with_parts(
            service,
            Arc::new(ProductCache::new()),
            Arc::new(CallerRegistry::new()),
            config,
        )
    }

    /// Create a manager around an existing cache and registry
    pub fn with_parts(
        service: Arc<dyn PurchaseService>,
        cache: Arc<ProductCache>,
        registry: Arc<CallerRegistry>,
        config: StoreConfig,
    ) -> Self {
        let fetcher = FetchCoordinator::new(
            Arc::clone(&service),
            Arc::clone(&cache),
            Arc::clone(&registry),
        );
        let reconciler = Arc::new(TransactionReconciler::new(
            Arc::clone(&service),
            Arc::clone(&registry),
            config.finish_orphaned_transactions,
        ));
        let dispatcher =
            QueueDispatcher::new(Arc::clone(&reconciler), config.max_concurrent_updates);

        Self {
            config,
            service,
            cache,
            registry,
            fetcher,
            reconciler,
            dispatcher,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether the device may make payments; asks the service every time
    pub fn can_make_purchases(&self) -> bool {
        self.service.can_make_purchases()
    }

    /// Cached product for `identifier`, if any
    pub fn cached_product(&self, identifier: &str) -> Option<Product> {
        self.cache.get(identifier)
    }

    /// Snapshot of every cached product
    pub fn cached_products(&self) -> Vec<Product> {
        self.cache.products()
    }

    pub fn remove_products_from_cache(&self, products: &[Product]) {
        self.cache.remove(products);
    }

    pub fn remove_all_products_from_cache(&self) {
        self.cache.clear();
    }

    /// Fetch products, caching them according to the configuration
    pub fn fetch_products(
        &self,
        identifiers: HashSet<ProductId>,
        caller: impl Into<Caller>,
    ) -> Result<Option<RequestId>, StoreError> {
        self.fetch_products_with_cache(identifiers, caller, self.config.cache_fetched_products)
    }

    /// Fetch products, caching valid ones only if `cache_result`
    ///
    /// The caller receives exactly one of `products_fetched` or
    /// `products_fetch_failed`. An empty identifier set is answered
    /// immediately.
    pub fn fetch_products_with_cache(
        &self,
        identifiers: HashSet<ProductId>,
        caller: impl Into<Caller>,
        cache_result: bool,
    ) -> Result<Option<RequestId>, StoreError> {
        self.fetcher.fetch(identifiers, caller.into(), cache_result)
    }

    /// Purchase a previously cached product
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The product was cached and the purchase was submitted
    /// * `Ok(false)` - Nothing is cached for `identifier`; no purchase attempted
    /// * `Err(StoreError::AlreadyPending)` - A purchase of this product is outstanding
    pub fn purchase_product_with_identifier(
        &self,
        identifier: &str,
        caller: impl Into<Caller>,
    ) -> Result<bool, StoreError> {
        match self.cache.get(identifier) {
            Some(product) => self.purchase_product(&product, caller).map(|_| true),
            None => {
                tracing::debug!(product = identifier, "purchase requested for uncached product");
                Ok(false)
            }
        }
    }

    /// Purchase `product`
    ///
    /// The caller is registered before the payment reaches the service, so
    /// no queue delivery can arrive ahead of the registration. A purchase is
    /// outstanding until its transaction is finished, including while it
    /// waits on `verify`.
    pub fn purchase_product(
        &self,
        product: &Product,
        caller: impl Into<Caller>,
    ) -> Result<(), StoreError> {
        let key = RegistryKey::Purchase(product.identifier.clone());
        if self.reconciler.is_awaiting_product(&product.identifier) {
            return Err(StoreError::already_pending(key));
        }
        self.registry.register(key, caller.into())?;

        tracing::debug!(product = %product.identifier, "submitting payment");
        self.service.add_payment(product);
        Ok(())
    }

    /// Ask the service to redeliver completed purchases
    ///
    /// Restored transactions are routed to `caller` ahead of any per-product
    /// purchase caller. The registration ends with `StoreEvent::RestoreCompleted`.
    pub fn restore_completed_transactions(
        &self,
        caller: impl Into<Caller>,
    ) -> Result<(), StoreError> {
        self.registry.register(RegistryKey::Restore, caller.into())?;

        tracing::debug!("requesting restore of completed transactions");
        self.service.restore_completed_transactions();
        Ok(())
    }

    /// Record the caller's verification decision for `transaction`
    ///
    /// Valid: the caller is notified on its success (or restore) channel and
    /// the transaction is finished. Invalid: finished without notification.
    pub fn verify(
        &self,
        transaction: &Transaction,
        is_valid: bool,
    ) -> Result<Reconciliation, StoreError> {
        self.reconciler.verify(transaction, is_valid).inspect_err(|error| {
            tracing::warn!(%error, "verification call rejected");
        })
    }

    /// Transactions waiting on a `verify` call
    pub fn awaiting_verification(&self) -> Vec<Transaction> {
        self.reconciler.awaiting_verification()
    }

    /// Reconcile deliveries in order on the calling thread
    pub fn transactions_updated(&self, batch: Vec<Transaction>) -> Vec<DispatchResult> {
        self.dispatcher.process_transaction_updates(batch)
    }

    /// Process one inbound event on the calling thread
    pub fn handle_event(&self, event: StoreEvent) {
        match event {
            StoreEvent::ProductsResponse { request, result } => {
                self.fetcher.complete(request, result);
            }
            StoreEvent::TransactionsUpdated(batch) => {
                self.transactions_updated(batch);
            }
            StoreEvent::RestoreCompleted(result) => self.restore_completed(result),
        }
    }

    /// Consume events until every sender is dropped
    ///
    /// Events are handled one at a time in arrival order. Within a
    /// `TransactionsUpdated` batch, different transactions are reconciled
    /// concurrently, at most `max_concurrent_updates` at a time. Callers must
    /// not block a notification on another delivery of the same batch.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<StoreEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                StoreEvent::TransactionsUpdated(batch) => {
                    self.dispatcher.process_batch(batch).await;
                }
                other => self.handle_event(other),
            }
        }
        tracing::debug!("event channel closed");
    }

    fn restore_completed(&self, result: Result<(), ServiceError>) {
        let Some(caller) = self.registry.unregister(&RegistryKey::Restore) else {
            tracing::warn!("restore completion without a restore request");
            return;
        };

        match result {
            Ok(()) => tracing::debug!("restore completed"),
            Err(error) if caller.responds_to(Channel::RestoreFailed) => {
                caller.restore_failed(&error)
            }
            Err(error) => tracing::warn!(%error, "restore failed and caller has no handler"),
        }
    }
}
