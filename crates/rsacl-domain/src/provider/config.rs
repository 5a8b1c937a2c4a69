//! Configuration for the ACL providers.

use std::sync::Arc;
use std::time::Duration;

use super::traits::AclCache;

/// Configuration for the ACL providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Maximum length of a resolved parent chain.
    pub max_depth: u32,
    /// Timeout for a single provider operation.
    pub timeout: Duration,
    /// Optional ACL cache.
    ///
    /// When set, `find_acl` returns a cached ACL for a known row without
    /// touching the entry table, and writes refresh or evict the affected
    /// cache entries.
    pub cache: Option<Arc<dyn AclCache>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_depth: 25,
            timeout: Duration::from_secs(30),
            cache: None,
        }
    }
}

impl ProviderConfig {
    /// Creates a new configuration with caching enabled.
    pub fn with_cache(mut self, cache: Arc<dyn AclCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Creates a new configuration with the specified max depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Creates a new configuration with the specified timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
