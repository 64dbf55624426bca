//! Callers: who gets notified about a fetch, purchase or restore
//!
//! A caller is either a [`StoreDelegate`] object or a [`Callbacks`] set. Both
//! are views over the same notification interface: a per-channel
//! "responds to" query plus one delivery method per channel shape. Routing
//! decisions (fallbacks, verification gate) are made by the reconciler
//! against this interface and never inspect which variant they hold.

use std::fmt;
use std::sync::Arc;

use crate::core::traits::StoreDelegate;
use crate::types::{Product, ProductId, ServiceError, StoreError, Transaction};

/// Notification channels a caller can implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    ProductsFetched,
    ProductsFetchFailed,
    TransactionSucceeded,
    TransactionRestored,
    TransactionFailed,
    TransactionCanceled,
    TransactionNeedsVerification,
    RestoreFailed,
}

impl Channel {
    /// Channels every caller is expected to implement
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Channel::ProductsFetched
                | Channel::ProductsFetchFailed
                | Channel::TransactionSucceeded
                | Channel::TransactionFailed
        )
    }

    /// Stable lowercase name, used in logs and replay output
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::ProductsFetched => "products_fetched",
            Channel::ProductsFetchFailed => "products_fetch_failed",
            Channel::TransactionSucceeded => "succeeded",
            Channel::TransactionRestored => "restored",
            Channel::TransactionFailed => "failed",
            Channel::TransactionCanceled => "canceled",
            Channel::TransactionNeedsVerification => "needs_verification",
            Channel::RestoreFailed => "restore_failed",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ProductsCallback = Arc<dyn Fn(&[Product], &[ProductId]) + Send + Sync>;
pub type FetchErrorCallback = Arc<dyn Fn(&StoreError) + Send + Sync>;
pub type TransactionCallback = Arc<dyn Fn(&Transaction) + Send + Sync>;
pub type RestoreErrorCallback = Arc<dyn Fn(&ServiceError) + Send + Sync>;

/// Callback-style caller
///
/// Built with [`Callbacks::fetch`] or [`Callbacks::purchase`], which take the
/// required success/failure pair, then extended with the optional channels.
#[derive(Clone, Default)]
pub struct Callbacks {
    products_fetched: Option<ProductsCallback>,
    products_fetch_failed: Option<FetchErrorCallback>,
    succeeded: Option<TransactionCallback>,
    restored: Option<TransactionCallback>,
    failed: Option<TransactionCallback>,
    canceled: Option<TransactionCallback>,
    needs_verification: Option<TransactionCallback>,
    restore_failed: Option<RestoreErrorCallback>,
}

impl Callbacks {
    /// Callbacks for a product fetch
    pub fn fetch<S, F>(on_success: S, on_failure: F) -> Self
    where
        S: Fn(&[Product], &[ProductId]) + Send + Sync + 'static,
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        Callbacks {
            products_fetched: Some(Arc::new(on_success)),
            products_fetch_failed: Some(Arc::new(on_failure)),
            ..Callbacks::default()
        }
    }

    /// Callbacks for a purchase or restore
    pub fn purchase<S, F>(on_success: S, on_failure: F) -> Self
    where
        S: Fn(&Transaction) + Send + Sync + 'static,
        F: Fn(&Transaction) + Send + Sync + 'static,
    {
        Callbacks {
            succeeded: Some(Arc::new(on_success)),
            failed: Some(Arc::new(on_failure)),
            ..Callbacks::default()
        }
    }

    pub fn on_restore(mut self, f: impl Fn(&Transaction) + Send + Sync + 'static) -> Self {
        self.restored = Some(Arc::new(f));
        self
    }

    pub fn on_cancel(mut self, f: impl Fn(&Transaction) + Send + Sync + 'static) -> Self {
        self.canceled = Some(Arc::new(f));
        self
    }

    pub fn on_verify(mut self, f: impl Fn(&Transaction) + Send + Sync + 'static) -> Self {
        self.needs_verification = Some(Arc::new(f));
        self
    }

    pub fn on_restore_failed(mut self, f: impl Fn(&ServiceError) + Send + Sync + 'static) -> Self {
        self.restore_failed = Some(Arc::new(f));
        self
    }

    fn transaction_slot(&self, channel: Channel) -> Option<&TransactionCallback> {
        match channel {
            Channel::TransactionSucceeded => self.succeeded.as_ref(),
            Channel::TransactionRestored => self.restored.as_ref(),
            Channel::TransactionFailed => self.failed.as_ref(),
            Channel::TransactionCanceled => self.canceled.as_ref(),
            Channel::TransactionNeedsVerification => self.needs_verification.as_ref(),
            _ => None,
        }
    }

    fn has(&self, channel: Channel) -> bool {
        match channel {
            Channel::ProductsFetched => self.products_fetched.is_some(),
            Channel::ProductsFetchFailed => self.products_fetch_failed.is_some(),
            Channel::RestoreFailed => self.restore_failed.is_some(),
            _ => self.transaction_slot(channel).is_some(),
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: Vec<&str> = [
            Channel::ProductsFetched,
            Channel::ProductsFetchFailed,
            Channel::TransactionSucceeded,
            Channel::TransactionRestored,
            Channel::TransactionFailed,
            Channel::TransactionCanceled,
            Channel::TransactionNeedsVerification,
            Channel::RestoreFailed,
        ]
        .into_iter()
        .filter(|c| self.has(*c))
        .map(Channel::as_str)
        .collect();

        f.debug_struct("Callbacks")
            .field("channels", &channels)
            .finish()
    }
}

/// The entity that initiated an operation and expects its notification
#[derive(Clone)]
pub enum Caller {
    Delegate(Arc<dyn StoreDelegate>),
    Callbacks(Callbacks),
}

impl Caller {
    /// Wrap a delegate object
    pub fn delegate<D: StoreDelegate + 'static>(delegate: Arc<D>) -> Self {
        Caller::Delegate(delegate)
    }

    /// Whether the caller implements `channel`
    pub fn responds_to(&self, channel: Channel) -> bool {
        match self {
            Caller::Delegate(d) => d.responds_to(channel),
            Caller::Callbacks(c) => c.has(channel),
        }
    }

    pub(crate) fn products_fetched(&self, products: &[Product], invalid: &[ProductId]) {
        match self {
            Caller::Delegate(d) => d.products_fetched(products, invalid),
            Caller::Callbacks(c) => {
                if let Some(f) = &c.products_fetched {
                    f(products, invalid);
                }
            }
        }
    }

    pub(crate) fn products_fetch_failed(&self, error: &StoreError) {
        match self {
            Caller::Delegate(d) => d.products_fetch_failed(error),
            Caller::Callbacks(c) => {
                if let Some(f) = &c.products_fetch_failed {
                    f(error);
                }
            }
        }
    }

    /// Deliver `transaction` on one of the transaction channels
    pub(crate) fn notify_transaction(&self, channel: Channel, transaction: &Transaction) {
        match self {
            Caller::Delegate(d) => match channel {
                Channel::TransactionSucceeded => d.transaction_succeeded(transaction),
                Channel::TransactionRestored => d.transaction_restored(transaction),
                Channel::TransactionFailed => d.transaction_failed(transaction),
                Channel::TransactionCanceled => d.transaction_canceled(transaction),
                Channel::TransactionNeedsVerification => {
                    d.transaction_needs_verification(transaction)
                }
                other => tracing::error!(channel = %other, "not a transaction channel"),
            },
            Caller::Callbacks(c) => match c.transaction_slot(channel) {
                Some(f) => f(transaction),
                None => tracing::debug!(
                    channel = %channel,
                    transaction = %transaction.id,
                    "callback slot empty, notification dropped"
                ),
            },
        }
    }

    pub(crate) fn restore_failed(&self, error: &ServiceError) {
        match self {
            Caller::Delegate(d) => d.restore_failed(error),
            Caller::Callbacks(c) => {
                if let Some(f) = &c.restore_failed {
                    f(error);
                }
            }
        }
    }
}

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::Delegate(_) => f.write_str("Caller::Delegate"),
            Caller::Callbacks(c) => f.debug_tuple("Caller::Callbacks").field(c).finish(),
        }
    }
}

impl From<Callbacks> for Caller {
    fn from(callbacks: Callbacks) -> Self {
        Caller::Callbacks(callbacks)
    }
}

impl<D: StoreDelegate + 'static> From<Arc<D>> for Caller {
    fn from(delegate: Arc<D>) -> Self {
        Caller::Delegate(delegate)
    }
}
