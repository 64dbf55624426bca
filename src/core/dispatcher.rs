//! Concurrent dispatch of transaction-queue batches
//!
//! The purchasing service delivers queue updates in batches. `QueueDispatcher`
//! partitions a batch by transaction id so that different transactions are
//! reconciled concurrently on tokio tasks, while updates for the same
//! transaction run sequentially in delivery order.
//!
//! # Architecture
//!
//! ```text
//! QueueDispatcher
//!     ├── Arc<TransactionReconciler>  (shared state machine)
//!     └── Arc<Semaphore>              (bounds concurrently running transactions)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::core::reconciler::{Reconciliation, TransactionReconciler};
use crate::types::{Transaction, TransactionId};

/// Result of reconciling a single delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// The delivered snapshot
    pub transaction: Transaction,

    /// What the reconciler did with it
    pub outcome: Reconciliation,
}

/// Batch dispatcher with per-transaction partitioning
#[derive(Clone)]
pub struct QueueDispatcher {
    reconciler: Arc<TransactionReconciler>,
    permits: Arc<Semaphore>,
}

impl QueueDispatcher {
    /// Create a dispatcher running at most `max_concurrent` transactions at once
    pub fn new(reconciler: Arc<TransactionReconciler>, max_concurrent: usize) -> Self {
        Self {
            reconciler,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Partition a batch by transaction id
    ///
    /// Each delivery lands in exactly one partition and deliveries keep their
    /// batch order within a partition.
    pub fn partition_by_transaction(
        &self,
        batch: Vec<Transaction>,
    ) -> HashMap<TransactionId, Vec<Transaction>> {
        let mut partitions: HashMap<TransactionId, Vec<Transaction>> = HashMap::new();

        for transaction in batch {
            partitions
                .entry(transaction.id.clone())
                .or_default()
                .push(transaction);
        }

        partitions
    }

    /// Reconcile one transaction's deliveries in order
    pub fn process_transaction_updates(&self, updates: Vec<Transaction>) -> Vec<DispatchResult> {
        updates
            .into_iter()
            .map(|transaction| {
                let outcome = self.reconciler.handle(transaction.clone());
                DispatchResult {
                    transaction,
                    outcome,
                }
            })
            .collect()
    }

    /// Reconcile a batch, one tokio task per transaction
    ///
    /// Results are grouped per transaction; the order between transactions is
    /// unspecified.
    pub async fn process_batch(&self, batch: Vec<Transaction>) -> Vec<DispatchResult> {
        let partitions = self.partition_by_transaction(batch);

        let mut tasks = Vec::with_capacity(partitions.len());
        for (_id, updates) in partitions {
            let dispatcher = self.clone();
            tasks.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquire only fails on shutdown
                let _permit = dispatcher.permits.acquire().await.ok();
                dispatcher.process_transaction_updates(updates)
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(transaction_results) => results.extend(transaction_results),
                Err(e) => tracing::error!(error = ?e, "dispatch task panicked"),
            }
        }

        results
    }
}
