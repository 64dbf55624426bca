//! Transaction-related types for the store manager
//!
//! Transactions are owned by the purchasing service. The store manager only
//! reads delivered snapshots and asks the service to finish them; the
//! constructors here exist for services, the sandbox and tests.

use serde::{Deserialize, Serialize};

use super::error::{ServiceError, StoreError};
use super::product::ProductId;

/// Transaction identifier assigned by the purchasing service
pub type TransactionId = String;

/// Synthetic identifier for an outstanding product request
pub type RequestId = u64;

/// Opaque platform reference used to finish a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHandle(pub u64);

/// Lifecycle states reported by the purchasing service
///
/// `Purchasing → {Purchased, Restored, Failed}`. `Deferred` is non-terminal:
/// the service redelivers the transaction once it leaves that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Payment is being processed by the service
    Purchasing,

    /// Payment completed; content should be unlocked
    Purchased,

    /// A previous purchase was restored
    Restored,

    /// Payment failed or was canceled by the user
    Failed,

    /// Awaiting an external action (e.g. parental approval)
    Deferred,
}

impl TransactionState {
    /// Whether the state requires the transaction to be finished
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionState::Purchased | TransactionState::Restored | TransactionState::Failed
        )
    }
}

/// Snapshot of a transaction as delivered by the service queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Service-assigned transaction identifier
    pub id: TransactionId,

    /// Identifier of the purchased product
    pub product_id: ProductId,

    /// State at the time of delivery
    pub state: TransactionState,

    /// Error reported by the service; only set for `Failed`
    pub error: Option<ServiceError>,

    /// Platform handle passed back on finish
    pub handle: TransactionHandle,
}

impl Transaction {
    /// Create a transaction snapshot without an error
    pub fn new(
        id: impl Into<TransactionId>,
        product_id: impl Into<ProductId>,
        state: TransactionState,
    ) -> Self {
        Transaction {
            id: id.into(),
            product_id: product_id.into(),
            state,
            error: None,
            handle: TransactionHandle::default(),
        }
    }

    /// Create a `Failed` snapshot carrying the service error
    pub fn failed(
        id: impl Into<TransactionId>,
        product_id: impl Into<ProductId>,
        error: ServiceError,
    ) -> Self {
        Transaction {
            error: Some(error),
            ..Transaction::new(id, product_id, TransactionState::Failed)
        }
    }

    /// Whether this is a failure the user initiated
    pub fn is_cancellation(&self) -> bool {
        self.state == TransactionState::Failed
            && self.error.as_ref().is_some_and(ServiceError::is_cancellation)
    }

    /// Classify a failed transaction into a purchase error
    ///
    /// Returns `None` for every state other than `Failed`. A failed snapshot
    /// without an error is reported with `ServiceError::UNKNOWN`.
    pub fn failure(&self) -> Option<StoreError> {
        if self.state != TransactionState::Failed {
            return None;
        }

        if self.is_cancellation() {
            return Some(StoreError::purchase_canceled(&self.id));
        }

        let (code, message) = self
            .error
            .as_ref()
            .map(|e| (e.code, e.message.clone()))
            .unwrap_or((ServiceError::UNKNOWN, "unknown error".to_string()));

        Some(StoreError::purchase_failed(&self.id, code, &message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransactionState::Purchasing, false)]
    #[case(TransactionState::Purchased, true)]
    #[case(TransactionState::Restored, true)]
    #[case(TransactionState::Failed, true)]
    #[case(TransactionState::Deferred, false)]
    fn test_is_terminal(#[case] state: TransactionState, #[case] expected: bool) {
        assert_eq!(state.is_terminal(), expected);
    }

    #[test]
    fn test_cancellation_detected_from_error_code() {
        let tx = Transaction::failed(
            "t1",
            "gems.100",
            ServiceError::new(ServiceError::PAYMENT_CANCELLED, "user canceled"),
        );

        assert!(tx.is_cancellation());
        assert_eq!(tx.failure(), Some(StoreError::purchase_canceled("t1")));
    }

    #[test]
    fn test_genuine_failure_classified() {
        let tx = Transaction::failed(
            "t1",
            "gems.100",
            ServiceError::new(ServiceError::PAYMENT_NOT_ALLOWED, "not allowed"),
        );

        assert!(!tx.is_cancellation());
        assert_eq!(
            tx.failure(),
            Some(StoreError::purchase_failed(
                "t1",
                ServiceError::PAYMENT_NOT_ALLOWED,
                "not allowed"
            ))
        );
    }

    #[test]
    fn test_failed_without_error_is_unknown_failure() {
        let tx = Transaction::new("t1", "gems.100", TransactionState::Failed);

        assert!(!tx.is_cancellation());
        assert!(matches!(
            tx.failure(),
            Some(StoreError::PurchaseFailed { code: ServiceError::UNKNOWN, .. })
        ));
    }

    #[test]
    fn test_non_failed_state_has_no_failure() {
        let tx = Transaction::new("t1", "gems.100", TransactionState::Purchased);
        assert_eq!(tx.failure(), None);
    }
}
