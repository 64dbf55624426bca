//! Store manager configuration

/// Lowest default for `max_concurrent_updates`, whatever the core count
pub const MIN_CONCURRENT_UPDATES: usize = 2;

/// Configuration for a `StoreManager`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Default for `fetch_products`: put valid products into the cache
    pub cache_fetched_products: bool,

    /// Finish purchased/restored transactions that no caller is waiting for.
    /// When false they stay in the service queue and are redelivered on the
    /// next launch. Failed orphans are finished regardless.
    pub finish_orphaned_transactions: bool,

    /// Maximum number of transactions reconciled concurrently per batch.
    /// Defaults to the core count, but never below `MIN_CONCURRENT_UPDATES`.
    pub max_concurrent_updates: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_fetched_products: true,
            finish_orphaned_transactions: true,
            max_concurrent_updates: num_cpus::get().max(MIN_CONCURRENT_UPDATES),
        }
    }
}

impl StoreConfig {
    /// Create a StoreConfig with custom values
    pub fn new(
        cache_fetched_products: bool,
        finish_orphaned_transactions: bool,
        max_concurrent_updates: usize,
    ) -> Self {
        let default = Self::default();

        let max_concurrent_updates = if max_concurrent_updates == 0 {
            tracing::warn!(
                "Invalid max_concurrent_updates ({}), using default ({})",
                max_concurrent_updates,
                default.max_concurrent_updates
            );
            default.max_concurrent_updates
        } else {
            max_concurrent_updates
        };

        Self {
            cache_fetched_products,
            finish_orphaned_transactions,
            max_concurrent_updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(config.cache_fetched_products);
        assert!(config.finish_orphaned_transactions);
        assert_eq!(
            config.max_concurrent_updates,
            num_cpus::get().max(MIN_CONCURRENT_UPDATES)
        );
        assert!(config.max_concurrent_updates >= 2);
    }

    #[rstest]
    #[case::custom(8, 8)]
    #[case::single(1, 1)]
    #[case::zero_falls_back(0, num_cpus::get().max(MIN_CONCURRENT_UPDATES))]
    fn test_new_validates_concurrency(#[case] requested: usize, #[case] expected: usize) {
        let config = StoreConfig::new(false, false, requested);
        assert!(!config.cache_fetched_products);
        assert!(!config.finish_orphaned_transactions);
        assert_eq!(config.max_concurrent_updates, expected);
    }
}
