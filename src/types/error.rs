//! Error types for the store manager
//!
//! This module defines the errors surfaced to callers and the error shape
//! reported by the external purchasing service.
//!
//! # Error Categories
//!
//! - **Service Errors**: Fetch failures and failed/canceled purchases reported by the store
//! - **Caller Errors**: Misuse such as verifying a transaction twice or a duplicate purchase
//! - **Replay Errors**: File and CSV errors from the replay tool

use thiserror::Error;

/// Error reported by the external purchasing service
///
/// Carried on failed transactions and on failed product requests. The codes
/// follow the platform's numbering; only `PAYMENT_CANCELLED` changes how the
/// store manager routes a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store service error {code}: {message}")]
pub struct ServiceError {
    /// Platform error code
    pub code: i64,
    /// Human-readable description from the service
    pub message: String,
}

impl ServiceError {
    pub const UNKNOWN: i64 = 0;
    pub const CLIENT_INVALID: i64 = 1;
    pub const PAYMENT_CANCELLED: i64 = 2;
    pub const PAYMENT_INVALID: i64 = 3;
    pub const PAYMENT_NOT_ALLOWED: i64 = 4;
    pub const PRODUCT_NOT_AVAILABLE: i64 = 5;

    /// Create a service error
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        ServiceError {
            code,
            message: message.into(),
        }
    }

    /// Whether the error means the user canceled the payment
    pub fn is_cancellation(&self) -> bool {
        self.code == Self::PAYMENT_CANCELLED
    }
}

/// Main error type for the store manager
///
/// Each variant includes enough context to identify the request or
/// transaction it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A product request failed at the service (network, store unavailable)
    ///
    /// Reported through the caller's fetch-failure channel. Nothing is cached.
    #[error("Product fetch failed ({code}): {message}")]
    FetchFailed {
        /// Service error code
        code: i64,
        /// Service error description
        message: String,
    },

    /// The service reported a genuine purchase failure
    ///
    /// The transaction is finished after the caller is notified.
    #[error("Purchase failed for transaction {transaction} ({code}): {message}")]
    PurchaseFailed {
        /// Transaction identifier
        transaction: String,
        /// Service error code
        code: i64,
        /// Service error description
        message: String,
    },

    /// The user canceled the payment
    ///
    /// The transaction is finished after the caller is notified.
    #[error("Purchase canceled for transaction {transaction}")]
    PurchaseCanceled {
        /// Transaction identifier
        transaction: String,
    },

    /// `verify` was called for a transaction that is not awaiting verification
    ///
    /// This is a programmer error. It is rejected without touching any state.
    #[error("Invalid verification call for transaction {transaction}: {reason}")]
    InvalidVerificationCall {
        /// Transaction identifier
        transaction: String,
        /// Why the call was rejected
        reason: String,
    },

    /// An operation with the same key is already outstanding
    ///
    /// Raised when a purchase is requested for a product whose previous
    /// purchase has not been finished yet.
    #[error("Request already pending for {key}")]
    AlreadyPending {
        /// Registry key of the outstanding operation
        key: String,
    },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    ///
    /// This is a recoverable error - the malformed record is skipped
    /// and the replay continues with the next record.
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

// Conversion from io::Error to StoreError
impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to StoreError
impl From<csv::Error> for StoreError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        StoreError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl StoreError {
    /// Create a FetchFailed error from a service error
    pub fn fetch_failed(error: &ServiceError) -> Self {
        StoreError::FetchFailed {
            code: error.code,
            message: error.message.clone(),
        }
    }

    /// Create a PurchaseFailed error
    pub fn purchase_failed(transaction: &str, code: i64, message: &str) -> Self {
        StoreError::PurchaseFailed {
            transaction: transaction.to_string(),
            code,
            message: message.to_string(),
        }
    }

    /// Create a PurchaseCanceled error
    pub fn purchase_canceled(transaction: &str) -> Self {
        StoreError::PurchaseCanceled {
            transaction: transaction.to_string(),
        }
    }

    /// Create an InvalidVerificationCall error
    pub fn invalid_verification_call(transaction: &str, reason: &str) -> Self {
        StoreError::InvalidVerificationCall {
            transaction: transaction.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an AlreadyPending error
    pub fn already_pending(key: impl std::fmt::Display) -> Self {
        StoreError::AlreadyPending {
            key: key.to_string(),
        }
    }

    /// Create a ParseError
    pub fn parse_error(line: Option<u64>, message: &str) -> Self {
        StoreError::ParseError {
            line,
            message: message.to_string(),
        }
    }
}
