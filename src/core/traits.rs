//! Trait seams between the store manager and the outside world
//!
//! - [`PurchaseService`] is the platform purchasing service. Its results come
//!   back asynchronously as [`StoreEvent`](crate::core::StoreEvent)s.
//! - [`StoreDelegate`] is the delegate-style caller. Every notification
//!   method has an empty default body; a delegate advertises which optional
//!   channels it implements through [`StoreDelegate::responds_to`].

use std::collections::HashSet;

use crate::core::caller::Channel;
use crate::types::{Product, ProductId, RequestId, ServiceError, StoreError, Transaction};

/// Platform purchasing service
///
/// Implementations must not call back into the store manager synchronously
/// from these methods; responses are delivered later through
/// [`StoreManager::handle_event`](crate::core::StoreManager::handle_event) or
/// the event pump.
pub trait PurchaseService: Send + Sync {
    /// Whether the device is allowed to make payments
    fn can_make_purchases(&self) -> bool;

    /// Request metadata for `identifiers`
    ///
    /// The response must be delivered as `StoreEvent::ProductsResponse`
    /// carrying the same `request` id.
    fn request_products(&self, request: RequestId, identifiers: &HashSet<ProductId>);

    /// Submit a payment for `product`
    ///
    /// Progress is delivered through the transaction queue.
    fn add_payment(&self, product: &Product);

    /// Ask the service to redeliver previously completed purchases
    ///
    /// Restored transactions are delivered through the transaction queue,
    /// followed by `StoreEvent::RestoreCompleted`.
    fn restore_completed_transactions(&self);

    /// Remove a transaction from the service queue
    ///
    /// Called exactly once per terminal transaction.
    fn finish_transaction(&self, transaction: &Transaction);
}

/// Delegate-style caller
///
/// Only the channels for which `responds_to` returns true are treated as
/// implemented. The default set is the minimal pair required of every
/// caller: products fetched / fetch failed and transaction succeeded /
/// failed.
///
/// Notifications may run on dispatch tasks while other deliveries of the
/// same batch are in flight. A notification must not block waiting on
/// another delivery; with `max_concurrent_updates` permits, that many
/// blocked notifications stall the whole batch.
pub trait StoreDelegate: Send + Sync {
    /// Whether the delegate implements `channel`
    fn responds_to(&self, channel: Channel) -> bool {
        channel.is_required()
    }

    fn products_fetched(&self, _products: &[Product], _invalid_identifiers: &[ProductId]) {}

    fn products_fetch_failed(&self, _error: &StoreError) {}

    fn transaction_succeeded(&self, _transaction: &Transaction) {}

    /// Restored purchase. Delivered through `transaction_succeeded` when the
    /// delegate does not respond to `Channel::TransactionRestored`.
    fn transaction_restored(&self, _transaction: &Transaction) {}

    fn transaction_failed(&self, _transaction: &Transaction) {}

    /// User-canceled purchase. Delivered through `transaction_failed` when the
    /// delegate does not respond to `Channel::TransactionCanceled`.
    fn transaction_canceled(&self, _transaction: &Transaction) {}

    /// Completed or restored purchase awaiting the delegate's receipt check.
    ///
    /// A delegate that responds to this channel must eventually call
    /// [`StoreManager::verify`](crate::core::StoreManager::verify); until it
    /// does, the transaction stays in the service queue unfinished.
    fn transaction_needs_verification(&self, _transaction: &Transaction) {}

    /// A restore request failed as a whole
    fn restore_failed(&self, _error: &ServiceError) {}
}
