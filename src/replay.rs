//! Replay of recorded transaction queues
//!
//! Drives a `StoreManager` backed by a [`SandboxService`] through the steps of a
//! recorded queue and collects the resulting journal of notifications and
//! finish calls.
//!
//! # Design
//!
//! The replay focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Routing and finishing to `StoreManager`
//! - CSV output to `csv_format::write_journal_csv`
//!
//! One `RecordingDelegate` stands in for every caller, so every notification
//! lands in the same journal as the sandbox's finish calls.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::config::StoreConfig;
use crate::core::{Channel, StoreEvent, StoreManager};
use crate::io::csv_format::{write_journal_csv, ReplayStep};
use crate::io::sync_reader::SyncReader;
use crate::sandbox::{Activity, Journal, RecordingDelegate, SandboxService};
use crate::types::{Product, StoreError, Transaction, TransactionId, TransactionState};

/// Optional channels declared by the replay delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    pub verify: bool,
    pub restore_channel: bool,
    pub cancel_channel: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            verify: false,
            restore_channel: true,
            cancel_channel: true,
        }
    }
}

/// Replay session over one recorded queue
pub struct Replay {
    manager: StoreManager,
    journal: Arc<Journal>,
    delegate: Arc<RecordingDelegate>,
    seen: HashSet<TransactionId>,
    latest: HashMap<TransactionId, Transaction>,
    restore_outstanding: bool,
}

impl Replay {
    pub fn new(config: StoreConfig, options: ReplayOptions) -> Self {
        let journal = Arc::new(Journal::new());
        let service = Arc::new(SandboxService::new(Arc::clone(&journal)));

        let mut delegate =
            RecordingDelegate::new(Arc::clone(&journal)).with_channel(Channel::RestoreFailed);
        if options.verify {
            delegate = delegate.with_channel(Channel::TransactionNeedsVerification);
        }
        if options.restore_channel {
            delegate = delegate.with_channel(Channel::TransactionRestored);
        }
        if options.cancel_channel {
            delegate = delegate.with_channel(Channel::TransactionCanceled);
        }

        Self {
            manager: StoreManager::new(service, config),
            journal,
            delegate: Arc::new(delegate),
            seen: HashSet::new(),
            latest: HashMap::new(),
            restore_outstanding: false,
        }
    }

    /// Apply one step
    ///
    /// The first delivery of a transaction starts its purchase (or a restore,
    /// for restored deliveries) before the delivery itself is handed over.
    ///
    /// # Errors
    ///
    /// A verdict for a transaction that was never delivered, or one the
    /// manager rejects, returns `StoreError::InvalidVerificationCall`.
    pub fn apply(&mut self, step: ReplayStep) -> Result<(), StoreError> {
        match step {
            ReplayStep::Deliver(transaction) => {
                if self.seen.insert(transaction.id.clone()) {
                    self.initiate(&transaction);
                }
                self.latest.insert(transaction.id.clone(), transaction.clone());
                self.manager.transactions_updated(vec![transaction]);
                Ok(())
            }
            ReplayStep::Verdict {
                transaction,
                approved,
                ..
            } => {
                let delivered = self.latest.get(&transaction).ok_or_else(|| {
                    StoreError::invalid_verification_call(&transaction, "never delivered")
                })?;
                self.manager.verify(delivered, approved).map(|_| ())
            }
        }
    }

    /// Complete any outstanding restore and return the journal
    pub fn finish(self) -> Vec<Activity> {
        if self.restore_outstanding {
            self.manager.handle_event(StoreEvent::RestoreCompleted(Ok(())));
        }

        let pending = self.manager.awaiting_verification();
        if !pending.is_empty() {
            tracing::warn!(
                count = pending.len(),
                "replay ended with transactions awaiting verification"
            );
        }

        self.journal.entries()
    }

    fn initiate(&mut self, transaction: &Transaction) {
        let result = if transaction.state == TransactionState::Restored {
            if self.restore_outstanding {
                return;
            }
            self.restore_outstanding = true;
            self.manager.restore_completed_transactions(Arc::clone(&self.delegate))
        } else {
            let product = Product::new(
                transaction.product_id.as_str(),
                transaction.product_id.as_str(),
                Decimal::ZERO,
                "USD",
            );
            self.manager.purchase_product(&product, Arc::clone(&self.delegate))
        };

        if let Err(error) = result {
            tracing::warn!(transaction = %transaction.id, %error, "could not start request");
        }
    }
}

/// Replay the queue recorded at `input_path` and write the journal to `output`
///
/// # Errors
///
/// Fatal errors (file not found, output not writable) are returned.
/// Malformed rows and rejected verdicts are logged and skipped.
pub fn replay_file(
    input_path: &Path,
    config: StoreConfig,
    options: ReplayOptions,
    output: &mut dyn Write,
) -> Result<(), StoreError> {
    let reader = SyncReader::new(input_path)?;
    let mut replay = Replay::new(config, options);

    for result in reader {
        match result {
            Ok(step) => {
                let transaction = step.transaction_id().to_string();
                if let Err(error) = replay.apply(step) {
                    tracing::warn!(%transaction, %error, "replay step rejected");
                }
            }
            Err(error) => tracing::warn!(%error, "skipping malformed record"),
        }
    }

    let entries = replay.finish();
    write_journal_csv(&entries, output).map_err(|message| StoreError::IoError { message })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver(id: &str, product: &str, state: TransactionState) -> ReplayStep {
        ReplayStep::Deliver(Transaction::new(id, product, state))
    }

    fn verdict(id: &str, approved: bool) -> ReplayStep {
        ReplayStep::Verdict {
            transaction: id.to_string(),
            product: "gems".to_string(),
            approved,
        }
    }

    fn notified(entries: &[Activity]) -> Vec<(String, Channel)> {
        entries
            .iter()
            .filter_map(|a| match a {
                Activity::Notified {
                    channel,
                    transaction,
                    ..
                } => Some((transaction.clone(), *channel)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_delivery_starts_purchase() {
        let mut replay = Replay::new(StoreConfig::default(), ReplayOptions::default());

        replay
            .apply(deliver("t1", "gems", TransactionState::Purchasing))
            .unwrap();
        replay
            .apply(deliver("t1", "gems", TransactionState::Purchased))
            .unwrap();

        let entries = replay.finish();
        assert_eq!(
            entries[0],
            Activity::PaymentAdded {
                product: "gems".to_string()
            }
        );
        assert_eq!(
            notified(&entries),
            vec![("t1".to_string(), Channel::TransactionSucceeded)]
        );
    }

    #[test]
    fn test_restored_delivery_starts_single_restore() {
        let mut replay = Replay::new(StoreConfig::default(), ReplayOptions::default());

        replay
            .apply(deliver("r1", "gems", TransactionState::Restored))
            .unwrap();
        replay
            .apply(deliver("r2", "coins", TransactionState::Restored))
            .unwrap();

        let entries = replay.finish();
        let restores = entries
            .iter()
            .filter(|a| **a == Activity::RestoreRequested)
            .count();
        assert_eq!(restores, 1);
        assert_eq!(
            notified(&entries),
            vec![
                ("r1".to_string(), Channel::TransactionRestored),
                ("r2".to_string(), Channel::TransactionRestored),
            ]
        );
    }

    #[test]
    fn test_verdict_without_delivery_rejected() {
        let mut replay = Replay::new(StoreConfig::default(), ReplayOptions::default());
        assert!(matches!(
            replay.apply(verdict("t9", true)),
            Err(StoreError::InvalidVerificationCall { .. })
        ));
    }

    #[test]
    fn test_verification_flow() {
        let options = ReplayOptions {
            verify: true,
            ..ReplayOptions::default()
        };
        let mut replay = Replay::new(StoreConfig::default(), options);

        replay
            .apply(deliver("t1", "gems", TransactionState::Purchased))
            .unwrap();
        replay.apply(verdict("t1", true)).unwrap();
        assert!(replay.apply(verdict("t1", true)).is_err());

        let entries = replay.finish();
        assert_eq!(
            notified(&entries),
            vec![
                ("t1".to_string(), Channel::TransactionNeedsVerification),
                ("t1".to_string(), Channel::TransactionSucceeded),
            ]
        );
    }
}
