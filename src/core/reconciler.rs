//! Transaction reconciliation state machine
//!
//! `TransactionReconciler` turns transaction-queue deliveries into caller
//! notifications and `finish_transaction` calls.
//!
//! # Routing
//!
//! ```text
//! Purchasing, Deferred           -> nothing (the service redelivers later)
//! Purchased / Restored
//!     caller verifies            -> needs_verification, transaction left open
//!     Restored + restore channel -> restored, finish
//!     otherwise                  -> succeeded, finish
//! Failed
//!     canceled + cancel channel  -> canceled, finish
//!     otherwise                  -> failed, finish
//! verify(tx, true)               -> restored/succeeded as above, finish
//! verify(tx, false)              -> finish, no notification
//! ```
//!
//! # Exactly-once finish
//!
//! A terminal delivery first claims a slot in an arena keyed by transaction
//! id. The claim is a DashMap entry operation, so concurrent or repeated
//! deliveries of the same transaction see the slot and are dropped as
//! duplicates. Notifications and the finish call run after the entry lock is
//! released: a caller may call `verify` from inside its `needs_verification`
//! notification.
//!
//! Finished slots are kept as tombstones for the life of the reconciler so a
//! late redelivery can never cause a second finish.
//!
//! # One purchase, one transaction
//!
//! Only the delivery holding a claimed slot resolves a purchase caller, and it
//! takes the registration out of the registry in the same step. A purchase
//! caller is therefore attached to exactly one transaction. Another terminal
//! transaction for the same product (a stale redelivery, or the loser of a
//! concurrent race) finds no caller and is handled as an orphan. From then on
//! the caller lives in the slot: a verification decision never touches the
//! registry, so it cannot release a later purchase of the same product.
//!
//! The restore caller is shared by every restored transaction and is only
//! read here; it is released on restore completion.

use std::sync::Arc;

use crate::core::caller::{Caller, Channel};
use crate::core::caller_registry::{CallerRegistry, RegistryKey};
use crate::core::traits::PurchaseService;
use crate::types::{StoreError, Transaction, TransactionId, TransactionState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Result of reconciling one delivery or verification decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Non-terminal state; nothing done
    InFlight,

    /// The transaction was already claimed, awaiting verification or finished
    Duplicate,

    /// Caller notified on the channel, then the transaction was finished
    Finished(Channel),

    /// Verification requested; the transaction stays in the queue
    AwaitingVerification,

    /// Verification rejected; finished without notification
    Rejected,

    /// No caller registered; finished anyway
    OrphanFinished,

    /// No caller registered; left in the queue for a later launch
    OrphanRetained,
}

#[derive(Debug)]
enum Slot {
    /// Claimed by a delivery that is still resolving its caller
    Claimed,
    AwaitingVerification {
        transaction: Transaction,
        caller: Caller,
    },
    Finished,
}

/// Reconciles queue deliveries against registered callers
pub struct TransactionReconciler {
    service: Arc<dyn PurchaseService>,
    registry: Arc<CallerRegistry>,
    slots: DashMap<TransactionId, Slot>,
    finish_orphans: bool,
}

impl TransactionReconciler {
    /// Create a reconciler
    ///
    /// `finish_orphans` decides what happens to a purchased or restored
    /// transaction nobody is waiting for. Failed orphans are always finished.
    pub fn new(
        service: Arc<dyn PurchaseService>,
        registry: Arc<CallerRegistry>,
        finish_orphans: bool,
    ) -> Self {
        Self {
            service,
            registry,
            slots: DashMap::new(),
            finish_orphans,
        }
    }

    /// Reconcile one transaction-state delivery
    pub fn handle(&self, transaction: Transaction) -> Reconciliation {
        if !transaction.state.is_terminal() {
            tracing::debug!(
                transaction = %transaction.id,
                state = ?transaction.state,
                "non-terminal delivery"
            );
            return Reconciliation::InFlight;
        }

        if !self.claim(&transaction.id) {
            return self.duplicate(&transaction);
        }

        let Some(caller) = self.take_caller(&transaction) else {
            return self.handle_orphan(transaction);
        };

        match transaction.state {
            TransactionState::Failed => self.handle_failed(transaction, caller),
            _ => self.handle_completed(transaction, caller),
        }
    }

    /// Apply the caller's verification decision
    ///
    /// # Returns
    ///
    /// * `Ok(Reconciliation::Finished(channel))` - Valid; caller notified and transaction finished
    /// * `Ok(Reconciliation::Rejected)` - Invalid; transaction finished silently
    /// * `Err(StoreError::InvalidVerificationCall)` - The transaction is not awaiting
    ///   verification (never delivered, not gated, or already decided)
    pub fn verify(
        &self,
        transaction: &Transaction,
        is_valid: bool,
    ) -> Result<Reconciliation, StoreError> {
        let (transaction, caller) = {
            let mut entry = self.slots.get_mut(&transaction.id).ok_or_else(|| {
                StoreError::invalid_verification_call(
                    &transaction.id,
                    "transaction is not awaiting verification",
                )
            })?;

            match std::mem::replace(entry.value_mut(), Slot::Finished) {
                Slot::AwaitingVerification {
                    transaction,
                    caller,
                } => (transaction, caller),
                other => {
                    let reason = match other {
                        Slot::Finished => "transaction already finished",
                        _ => "transaction is not awaiting verification",
                    };
                    *entry.value_mut() = other;
                    return Err(StoreError::invalid_verification_call(
                        &transaction.id,
                        reason,
                    ));
                }
            }
        };

        if !is_valid {
            tracing::info!(transaction = %transaction.id, "verification rejected");
            self.finish(&transaction);
            return Ok(Reconciliation::Rejected);
        }

        let channel = completion_channel(&caller, &transaction);
        caller.notify_transaction(channel, &transaction);
        self.finish(&transaction);
        Ok(Reconciliation::Finished(channel))
    }

    /// Transactions currently waiting on a verification decision
    pub fn awaiting_verification(&self) -> Vec<Transaction> {
        let mut awaiting: Vec<Transaction> = self
            .slots
            .iter()
            .filter_map(|entry| match entry.value() {
                Slot::AwaitingVerification { transaction, .. } => Some(transaction.clone()),
                _ => None,
            })
            .collect();
        awaiting.sort_by(|a, b| a.id.cmp(&b.id));
        awaiting
    }

    /// Whether a transaction for `product` is waiting on a verification decision
    pub fn is_awaiting_product(&self, product: &str) -> bool {
        self.slots.iter().any(|entry| {
            matches!(entry.value(),
                Slot::AwaitingVerification { transaction, .. } if transaction.product_id == product)
        })
    }

    /// Whether `transaction` has been finished
    pub fn is_finished(&self, transaction: &str) -> bool {
        self.slots
            .get(transaction)
            .is_some_and(|entry| matches!(entry.value(), Slot::Finished))
    }

    /// Caller for a claimed delivery
    ///
    /// Restored deliveries prefer the shared restore caller. Otherwise the
    /// purchase registration for the product is taken, so no other
    /// transaction can resolve it.
    fn take_caller(&self, transaction: &Transaction) -> Option<Caller> {
        if transaction.state == TransactionState::Restored {
            if let Some(caller) = self.registry.resolve(&RegistryKey::Restore) {
                return Some(caller);
            }
        }

        self.registry
            .unregister(&RegistryKey::Purchase(transaction.product_id.clone()))
    }

    fn handle_completed(&self, transaction: Transaction, caller: Caller) -> Reconciliation {
        if caller.responds_to(Channel::TransactionNeedsVerification) {
            self.slots.insert(
                transaction.id.clone(),
                Slot::AwaitingVerification {
                    transaction: transaction.clone(),
                    caller: caller.clone(),
                },
            );

            tracing::debug!(transaction = %transaction.id, "awaiting verification");
            caller.notify_transaction(Channel::TransactionNeedsVerification, &transaction);
            return Reconciliation::AwaitingVerification;
        }

        self.slots.insert(transaction.id.clone(), Slot::Finished);

        let channel = completion_channel(&caller, &transaction);
        caller.notify_transaction(channel, &transaction);
        self.finish(&transaction);
        Reconciliation::Finished(channel)
    }

    fn handle_failed(&self, transaction: Transaction, caller: Caller) -> Reconciliation {
        self.slots.insert(transaction.id.clone(), Slot::Finished);

        if let Some(error) = transaction.failure() {
            tracing::info!(transaction = %transaction.id, %error, "purchase did not complete");
        }

        let channel = failure_channel(&caller, &transaction);
        caller.notify_transaction(channel, &transaction);
        self.finish(&transaction);
        Reconciliation::Finished(channel)
    }

    fn handle_orphan(&self, transaction: Transaction) -> Reconciliation {
        let finish = self.finish_orphans || transaction.state == TransactionState::Failed;

        if !finish {
            // Release the claim so a redelivery after a new registration is handled
            self.slots
                .remove_if(&transaction.id, |_, slot| matches!(slot, Slot::Claimed));
            tracing::warn!(
                transaction = %transaction.id,
                product = %transaction.product_id,
                "no caller registered, transaction left in queue"
            );
            return Reconciliation::OrphanRetained;
        }

        self.slots.insert(transaction.id.clone(), Slot::Finished);
        tracing::warn!(
            transaction = %transaction.id,
            product = %transaction.product_id,
            state = ?transaction.state,
            "no caller registered, finishing transaction"
        );
        self.finish(&transaction);
        Reconciliation::OrphanFinished
    }

    /// Claim the slot for `id` unless one exists; true if this call claimed it
    fn claim(&self, id: &TransactionId) -> bool {
        match self.slots.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Slot::Claimed);
                true
            }
        }
    }

    fn duplicate(&self, transaction: &Transaction) -> Reconciliation {
        tracing::debug!(
            transaction = %transaction.id,
            state = ?transaction.state,
            "duplicate delivery ignored"
        );
        Reconciliation::Duplicate
    }

    fn finish(&self, transaction: &Transaction) {
        tracing::debug!(transaction = %transaction.id, "finishing transaction");
        self.service.finish_transaction(transaction);
    }
}

/// Channel for a successful purchase or restore; restore falls back to success
fn completion_channel(caller: &Caller, transaction: &Transaction) -> Channel {
    if transaction.state == TransactionState::Restored
        && caller.responds_to(Channel::TransactionRestored)
    {
        Channel::TransactionRestored
    } else {
        Channel::TransactionSucceeded
    }
}

/// Channel for a failed purchase; cancellation falls back to failure
fn failure_channel(caller: &Caller, transaction: &Transaction) -> Channel {
    if transaction.is_cancellation() && caller.responds_to(Channel::TransactionCanceled) {
        Channel::TransactionCanceled
    } else {
        Channel::TransactionFailed
    }
}
