//! In-app purchase store manager
//! # Overview
//!
//! This library sits between an application and a platform purchasing
//! service. It fetches and caches product metadata, starts purchases and
//! restores, and reconciles the service's transaction queue so that every
//! completed transaction is routed to the caller that started it and finished
//! exactly once.
//!
//! # Architecture
//!
//! - [`types`] - Products, transactions and errors
//! - [`core`] - Business logic components:
//!   - [`core::manager`] - The `StoreManager` facade and inbound `StoreEvent`s
//!   - [`core::fetch_coordinator`] - Product requests and their answers
//!   - [`core::reconciler`] - Transaction-queue state machine
//!   - [`core::dispatcher`] - Concurrent reconciliation of queue batches
//!   - [`core::product_cache`] - Fetched product metadata
//!   - [`core::caller_registry`] - Callers waiting on an answer
//! - [`config`] - Manager configuration
//! - [`sandbox`] - In-memory purchasing service and recording delegate
//! - [`cli`], [`io`], [`replay`] - The queue replay tool
//!
//! # Transaction States
//!
//! - **Purchasing**: In flight, nothing to do yet
//! - **Deferred**: Waiting on an outside approval, nothing to do yet
//! - **Purchased**: Routed to the success (or verification) channel, then finished
//! - **Restored**: Routed to the restore channel, falling back to success
//! - **Failed**: Routed to the cancel channel for user cancellations,
//!   falling back to failure
//!
//! # Callers
//!
//! Every fetch, purchase and restore names a caller: either a
//! [`StoreDelegate`] object or a [`Callbacks`] set. Optional channels are
//! declared by `responds_to` on a delegate and by filled slots on callbacks.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod replay;
pub mod sandbox;
pub mod types;

pub use config::StoreConfig;
pub use core::{
    Callbacks, Caller, Channel, PurchaseService, Reconciliation, StoreDelegate, StoreEvent,
    StoreManager,
};
pub use types::{
    Product, ProductHandle, ProductId, ProductsResponse, RequestId, ServiceError, StoreError,
    Transaction, TransactionHandle, TransactionId, TransactionState,
};
