//! In-memory purchasing service and recording delegate
//!
//! `SandboxService` implements [`PurchaseService`] without a real store: every
//! call is appended to a shared [`Journal`] and nothing is delivered back on
//! its own. Tests and the replay tool drive responses explicitly through
//! `StoreManager::handle_event`.
//!
//! `RecordingDelegate` is a [`StoreDelegate`] that appends every notification
//! to the same journal, so the relative order of notifications and
//! `finish_transaction` calls can be asserted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{Channel, PurchaseService, StoreDelegate};
use crate::types::{
    Product, ProductId, RequestId, ServiceError, StoreError, Transaction, TransactionId,
};

/// One observed call or notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    /// `request_products` was called; identifiers are sorted
    ProductsRequested {
        request: RequestId,
        identifiers: Vec<ProductId>,
    },

    /// `add_payment` was called
    PaymentAdded { product: ProductId },

    /// `restore_completed_transactions` was called
    RestoreRequested,

    /// `finish_transaction` was called
    Finished {
        transaction: TransactionId,
        product: ProductId,
    },

    /// A transaction channel fired on a recording delegate
    Notified {
        channel: Channel,
        transaction: TransactionId,
        product: ProductId,
    },

    /// `products_fetched` fired on a recording delegate
    ProductsFetched {
        valid: Vec<ProductId>,
        invalid: Vec<ProductId>,
    },

    /// `products_fetch_failed` fired on a recording delegate
    FetchFailed { error: StoreError },

    /// `restore_failed` fired on a recording delegate
    RestoreFailed { error: ServiceError },
}

/// Append-only, thread-safe activity log
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<Activity>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Activity>> {
        // A panicking test thread must not hide the activity recorded so far
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, activity: Activity) {
        self.lock().push(activity);
    }

    /// Copy of all entries in recording order
    pub fn entries(&self) -> Vec<Activity> {
        self.lock().clone()
    }

    /// Number of `finish_transaction` calls for `transaction`
    pub fn finish_count(&self, transaction: &str) -> usize {
        self.lock()
            .iter()
            .filter(|a| matches!(a, Activity::Finished { transaction: t, .. } if t == transaction))
            .count()
    }

    /// Number of notifications on `channel` for `transaction`
    pub fn notification_count(&self, transaction: &str, channel: Channel) -> usize {
        self.lock()
            .iter()
            .filter(|a| {
                matches!(a, Activity::Notified { channel: c, transaction: t, .. }
                    if *c == channel && t == transaction)
            })
            .count()
    }

    /// All transaction notifications for `transaction`, in order
    pub fn channels_for(&self, transaction: &str) -> Vec<Channel> {
        self.lock()
            .iter()
            .filter_map(|a| match a {
                Activity::Notified {
                    channel,
                    transaction: t,
                    ..
                } if t == transaction => Some(*channel),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Purchasing service that records calls instead of talking to a store
#[derive(Debug)]
pub struct SandboxService {
    journal: Arc<Journal>,
    can_make_purchases: AtomicBool,
}

impl SandboxService {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            can_make_purchases: AtomicBool::new(true),
        }
    }

    /// Toggle the value reported by `can_make_purchases`
    pub fn set_can_make_purchases(&self, allowed: bool) {
        self.can_make_purchases.store(allowed, Ordering::SeqCst);
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }
}

impl PurchaseService for SandboxService {
    fn can_make_purchases(&self) -> bool {
        self.can_make_purchases.load(Ordering::SeqCst)
    }

    fn request_products(&self, request: RequestId, identifiers: &HashSet<ProductId>) {
        let mut identifiers: Vec<ProductId> = identifiers.iter().cloned().collect();
        identifiers.sort();
        self.journal.record(Activity::ProductsRequested {
            request,
            identifiers,
        });
    }

    fn add_payment(&self, product: &Product) {
        self.journal.record(Activity::PaymentAdded {
            product: product.identifier.clone(),
        });
    }

    fn restore_completed_transactions(&self) {
        self.journal.record(Activity::RestoreRequested);
    }

    fn finish_transaction(&self, transaction: &Transaction) {
        self.journal.record(Activity::Finished {
            transaction: transaction.id.clone(),
            product: transaction.product_id.clone(),
        });
    }
}

/// Delegate that records every notification into a journal
///
/// Responds to the required channels plus whatever was added with
/// [`RecordingDelegate::with_channel`].
#[derive(Debug)]
pub struct RecordingDelegate {
    journal: Arc<Journal>,
    optional: HashSet<Channel>,
}

impl RecordingDelegate {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            optional: HashSet::new(),
        }
    }

    /// Declare an optional channel as implemented
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.optional.insert(channel);
        self
    }

    fn notified(&self, channel: Channel, transaction: &Transaction) {
        self.journal.record(Activity::Notified {
            channel,
            transaction: transaction.id.clone(),
            product: transaction.product_id.clone(),
        });
    }
}

impl StoreDelegate for RecordingDelegate {
    fn responds_to(&self, channel: Channel) -> bool {
        channel.is_required() || self.optional.contains(&channel)
    }

    fn products_fetched(&self, products: &[Product], invalid_identifiers: &[ProductId]) {
        self.journal.record(Activity::ProductsFetched {
            valid: products.iter().map(|p| p.identifier.clone()).collect(),
            invalid: invalid_identifiers.to_vec(),
        });
    }

    fn products_fetch_failed(&self, error: &StoreError) {
        self.journal.record(Activity::FetchFailed {
            error: error.clone(),
        });
    }

    fn transaction_succeeded(&self, transaction: &Transaction) {
        self.notified(Channel::TransactionSucceeded, transaction);
    }

    fn transaction_restored(&self, transaction: &Transaction) {
        self.notified(Channel::TransactionRestored, transaction);
    }

    fn transaction_failed(&self, transaction: &Transaction) {
        self.notified(Channel::TransactionFailed, transaction);
    }

    fn transaction_canceled(&self, transaction: &Transaction) {
        self.notified(Channel::TransactionCanceled, transaction);
    }

    fn transaction_needs_verification(&self, transaction: &Transaction) {
        self.notified(Channel::TransactionNeedsVerification, transaction);
    }

    fn restore_failed(&self, error: &ServiceError) {
        self.journal.record(Activity::RestoreFailed {
            error: error.clone(),
        });
    }
}
