//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `product`: Product metadata as returned by the store
//! - `transaction`: Transaction snapshots and identifiers
//! - `error`: Error types for the store manager

pub mod error;
pub mod product;
pub mod transaction;

pub use error::{ServiceError, StoreError};
pub use product::{Product, ProductHandle, ProductId, ProductsResponse};
pub use transaction::{
    RequestId, Transaction, TransactionHandle, TransactionId, TransactionState,
};
