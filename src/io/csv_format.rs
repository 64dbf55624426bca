//! CSV format handling for recorded queues and journal output
//!
//! This module centralizes all CSV format concerns:
//! - `QueueRecord` structure for deserialization
//! - Conversion from queue records to replay steps
//! - Journal output serialization
//!
//! Conversion is pure (no I/O).

use crate::sandbox::Activity;
use crate::types::{ProductId, ServiceError, Transaction, TransactionId, TransactionState};
use serde::Deserialize;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: transaction, product, event,
/// error_code. The error code is optional and only read for `failed` rows.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct QueueRecord {
    pub transaction: TransactionId,
    pub product: ProductId,
    pub event: String,
    pub error_code: Option<String>,
}

/// One step of a recorded queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStep {
    /// The service delivers a transaction snapshot
    Deliver(Transaction),

    /// The application answers a verification request
    Verdict {
        transaction: TransactionId,
        product: ProductId,
        approved: bool,
    },
}

impl ReplayStep {
    pub fn transaction_id(&self) -> &str {
        match self {
            ReplayStep::Deliver(transaction) => &transaction.id,
            ReplayStep::Verdict { transaction, .. } => transaction,
        }
    }
}

/// Convert a QueueRecord to a ReplayStep
///
/// # Returns
///
/// * `Ok(ReplayStep)` - Successfully converted record
/// * `Err(String)` - Unknown event or unparsable error code
pub fn convert_queue_record(record: QueueRecord) -> Result<ReplayStep, String> {
    let state = match record.event.to_lowercase().as_str() {
        "purchasing" => TransactionState::Purchasing,
        "purchased" => TransactionState::Purchased,
        "restored" => TransactionState::Restored,
        "failed" => TransactionState::Failed,
        "deferred" => TransactionState::Deferred,
        verdict @ ("approve" | "reject") => {
            return Ok(ReplayStep::Verdict {
                approved: verdict == "approve",
                transaction: record.transaction,
                product: record.product,
            })
        }
        _ => {
            return Err(format!(
                "Invalid event: '{}' for transaction {}",
                record.event, record.transaction
            ))
        }
    };

    if state != TransactionState::Failed {
        return Ok(ReplayStep::Deliver(Transaction::new(
            record.transaction,
            record.product,
            state,
        )));
    }

    let code = match record.error_code {
        Some(code) if !code.trim().is_empty() => code.trim().parse::<i64>().map_err(|_| {
            format!(
                "Invalid error code '{}' for transaction {}",
                code, record.transaction
            )
        })?,
        _ => ServiceError::UNKNOWN,
    };

    let message = if code == ServiceError::PAYMENT_CANCELLED {
        "payment cancelled"
    } else {
        "payment failed"
    };

    Ok(ReplayStep::Deliver(Transaction::failed(
        record.transaction,
        record.product,
        ServiceError::new(code, message),
    )))
}

/// Write the transaction activity of a journal to CSV format
///
/// Writes columns transaction, product, activity in journal order. Activity is
/// a channel name for notifications and `finished` for finish calls; other
/// journal entries are not transaction-scoped and are skipped.
pub fn write_journal_csv(entries: &[Activity], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["transaction", "product", "activity"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for entry in entries {
        let (transaction, product, activity) = match entry {
            Activity::Notified {
                channel,
                transaction,
                product,
            } => (transaction, product, channel.as_str()),
            Activity::Finished {
                transaction,
                product,
            } => (transaction, product, "finished"),
            _ => continue,
        };

        writer
            .write_record([transaction.as_str(), product.as_str(), activity])
            .map_err(|e| format!("Failed to write journal record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Channel;
    use rstest::rstest;

    fn record(event: &str, error_code: Option<&str>) -> QueueRecord {
        QueueRecord {
            transaction: "t1".to_string(),
            product: "gems".to_string(),
            event: event.to_string(),
            error_code: error_code.map(str::to_string),
        }
    }

    #[rstest]
    #[case::purchasing("purchasing", TransactionState::Purchasing)]
    #[case::purchased("purchased", TransactionState::Purchased)]
    #[case::restored("restored", TransactionState::Restored)]
    #[case::deferred("deferred", TransactionState::Deferred)]
    #[case::uppercase("PURCHASED", TransactionState::Purchased)]
    fn test_convert_delivery(#[case] event: &str, #[case] expected: TransactionState) {
        let step = convert_queue_record(record(event, None)).unwrap();
        assert_eq!(
            step,
            ReplayStep::Deliver(Transaction::new("t1", "gems", expected))
        );
    }

    #[rstest]
    #[case::cancelled(Some("2"), true)]
    #[case::explicit_code(Some("5"), false)]
    #[case::missing_code(None, false)]
    #[case::blank_code(Some("  "), false)]
    fn test_convert_failed(#[case] code: Option<&str>, #[case] cancellation: bool) {
        let ReplayStep::Deliver(transaction) = convert_queue_record(record("failed", code)).unwrap()
        else {
            panic!("expected a delivery");
        };

        assert_eq!(transaction.state, TransactionState::Failed);
        assert_eq!(transaction.is_cancellation(), cancellation);
        assert!(transaction.error.is_some());
    }

    #[rstest]
    #[case::approve("approve", true)]
    #[case::reject("reject", false)]
    fn test_convert_verdict(#[case] event: &str, #[case] approved: bool) {
        let step = convert_queue_record(record(event, None)).unwrap();
        assert_eq!(
            step,
            ReplayStep::Verdict {
                transaction: "t1".to_string(),
                product: "gems".to_string(),
                approved,
            }
        );
        assert_eq!(step.transaction_id(), "t1");
    }

    #[rstest]
    #[case::unknown_event("refunded", None, "Invalid event")]
    #[case::bad_code("failed", Some("abc"), "Invalid error code")]
    fn test_convert_errors(
        #[case] event: &str,
        #[case] code: Option<&str>,
        #[case] expected: &str,
    ) {
        let err = convert_queue_record(record(event, code)).unwrap_err();
        assert!(err.contains(expected), "unexpected error: {}", err);
    }

    #[test]
    fn test_write_journal_skips_non_transaction_entries() {
        let entries = vec![
            Activity::PaymentAdded {
                product: "gems".to_string(),
            },
            Activity::Notified {
                channel: Channel::TransactionSucceeded,
                transaction: "t1".to_string(),
                product: "gems".to_string(),
            },
            Activity::Finished {
                transaction: "t1".to_string(),
                product: "gems".to_string(),
            },
        ];

        let mut output = Vec::new();
        write_journal_csv(&entries, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "transaction,product,activity\nt1,gems,succeeded\nt1,gems,finished\n"
        );
    }
}
