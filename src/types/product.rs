//! Product metadata returned by the purchasing service
//!
//! A `Product` is immutable once fetched. The store manager never edits one;
//! it only caches, looks up and hands products back to the service when a
//! payment is submitted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product identifier as registered with the store (e.g. `com.example.gems.100`)
pub type ProductId = String;

/// Opaque platform reference for a product
///
/// The store manager never interprets this value; it is carried so the
/// purchasing service can map a `Product` back to its own record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductHandle(pub u64);

/// Purchasable product metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier; the cache key
    pub identifier: ProductId,

    /// Localized display title
    pub title: String,

    /// Localized display description
    pub description: String,

    /// Price in `currency` units
    pub price: Decimal,

    /// ISO 4217 currency code
    pub currency: String,

    /// Platform handle used when submitting a payment
    pub handle: ProductHandle,
}

impl Product {
    /// Create a product with an empty description and a default handle
    pub fn new(
        identifier: impl Into<ProductId>,
        title: impl Into<String>,
        price: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Product {
            identifier: identifier.into(),
            title: title.into(),
            description: String::new(),
            price,
            currency: currency.into(),
            handle: ProductHandle::default(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the platform handle
    pub fn with_handle(mut self, handle: ProductHandle) -> Self {
        self.handle = handle;
        self
    }
}

/// Successful answer to a product request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductsResponse {
    /// Products the store knows about
    pub products: Vec<Product>,

    /// Requested identifiers the store did not recognize
    pub invalid_identifiers: Vec<ProductId>,
}

impl ProductsResponse {
    pub fn new(products: Vec<Product>, invalid_identifiers: Vec<ProductId>) -> Self {
        Self {
            products,
            invalid_identifiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_defaults() {
        let product = Product::new("gems.100", "100 Gems", Decimal::new(199, 2), "USD");

        assert_eq!(product.identifier, "gems.100");
        assert_eq!(product.title, "100 Gems");
        assert_eq!(product.price, Decimal::new(199, 2));
        assert_eq!(product.currency, "USD");
        assert!(product.description.is_empty());
        assert_eq!(product.handle, ProductHandle(0));
    }

    #[test]
    fn test_builder_methods() {
        let product = Product::new("gems.100", "100 Gems", Decimal::ONE, "EUR")
            .with_description("A pile of gems")
            .with_handle(ProductHandle(7));

        assert_eq!(product.description, "A pile of gems");
        assert_eq!(product.handle, ProductHandle(7));
    }
}
