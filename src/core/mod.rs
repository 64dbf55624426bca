//! Core store components
//!
//! - `traits` - The platform purchasing service and the delegate interface
//! - `caller` - Callers and their notification channels
//! - `product_cache` - Fetched product metadata
//! - `caller_registry` - Callers waiting on fetches, purchases and restores
//! - `fetch_coordinator` - Product requests and their answers
//! - `reconciler` - Transaction-queue state machine
//! - `dispatcher` - Concurrent reconciliation of queue batches
//! - `manager` - The `StoreManager` facade

pub mod caller;
pub mod caller_registry;
pub mod dispatcher;
pub mod fetch_coordinator;
pub mod manager;
pub mod product_cache;
pub mod reconciler;
pub mod traits;

pub use caller::{Callbacks, Caller, Channel};
pub use caller_registry::{CallerRegistry, RegistryKey};
pub use dispatcher::{DispatchResult, QueueDispatcher};
pub use fetch_coordinator::{FetchCoordinator, PendingFetch};
pub use manager::{StoreEvent, StoreManager};
pub use product_cache::ProductCache;
pub use reconciler::{Reconciliation, TransactionReconciler};
pub use traits::{PurchaseService, StoreDelegate};
