//! ACL caching with TTL-based eviction.
//!
//! [`MokaAclCache`] keeps ACLs (with their parent chain) in their encoded
//! form, keyed by object identity row id. A secondary index maps object
//! identities to row ids so eviction by identity does not scan the cache.
//!
//! # Cache Safety
//!
//! Caching is **disabled** by default. Writes through
//! [`crate::provider::MutableAclProvider`] refresh or evict the affected
//! entries, but writes that bypass the provider are only picked up once the
//! TTL expires.
//!
//! # Example
//!
//! ```rust,ignore
//! use rsacl_domain::cache::{AclCacheConfig, MokaAclCache};
//!
//! let cache = MokaAclCache::new(AclCacheConfig::default().with_enabled(true), codec);
//! let config = ProviderConfig::default().with_cache(Arc::new(cache));
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;

use crate::acl::{Acl, AclCodec};
use crate::error::{DomainError, DomainResult};
use crate::model::ObjectIdentity;
use crate::provider::AclCache;

/// Configuration for the ACL cache.
#[derive(Debug, Clone)]
pub struct AclCacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Maximum number of cached ACLs.
    pub max_capacity: u64,
    /// Time to live of a cached ACL.
    pub default_ttl: Duration,
}

impl Default for AclCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: 10_000,
            default_ttl: Duration::from_secs(300),
        }
    }
}

impl AclCacheConfig {
    /// Enables or disables caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Moka-backed [`AclCache`].
///
/// # Thread Safety
///
/// Fully thread-safe; share it behind an `Arc`.
#[derive(Clone)]
pub struct MokaAclCache {
    /// Encoded ACLs by row id.
    cache: Cache<i64, Arc<Vec<u8>>>,
    /// Secondary index: object identity -> row id.
    by_identity: DashMap<ObjectIdentity, i64>,
    codec: AclCodec,
    config: AclCacheConfig,
}

impl std::fmt::Debug for MokaAclCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaAclCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .field("identity_index_size", &self.by_identity.len())
            .finish()
    }
}

impl MokaAclCache {
    /// Creates a new ACL cache with the given configuration.
    pub fn new(config: AclCacheConfig, codec: AclCodec) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .build();

        Self {
            cache,
            by_identity: DashMap::new(),
            codec,
            config,
        }
    }

    pub fn config(&self) -> &AclCacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the approximate number of cached ACLs.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance tasks (evictions). Useful in tests.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl AclCache for MokaAclCache {
    /// # Metrics
    ///
    /// - `rsacl_acl_cache_hits_total`
    /// - `rsacl_acl_cache_misses_total`
    async fn get_by_id(&self, row_id: i64) -> DomainResult<Option<Acl>> {
        match self.cache.get(&row_id).await {
            Some(bytes) => {
                metrics::counter!("rsacl_acl_cache_hits_total").increment(1);
                self.codec.decode(&bytes).map(Some)
            }
            None => {
                metrics::counter!("rsacl_acl_cache_misses_total").increment(1);
                Ok(None)
            }
        }
    }

    async fn put(&self, acl: &Acl) -> DomainResult<()> {
        let row_id = acl.id().ok_or_else(|| DomainError::InvalidArgument {
            message: "The given ACL does not have an ID.".to_string(),
        })?;
        let bytes = self.codec.encode(acl)?;

        self.by_identity
            .insert(acl.object_identity().clone(), row_id);
        self.cache.insert(row_id, Arc::new(bytes)).await;
        Ok(())
    }

    async fn evict_by_id(&self, row_id: i64) {
        self.by_identity.retain(|_, id| *id != row_id);
        self.cache.invalidate(&row_id).await;
    }

    async fn evict_by_identity(&self, identity: &ObjectIdentity) {
        // Atomic remove so a concurrent put cannot slip in between
        if let Some((_, row_id)) = self.by_identity.remove(identity) {
            self.cache.invalidate(&row_id).await;
        }
    }

    async fn clear(&self) {
        self.by_identity.clear();
        self.cache.invalidate_all();
    }
}

/// Registers ACL cache metric descriptions.
///
/// Call once during startup, after installing a metrics recorder.
pub fn register_acl_cache_metrics() {
    metrics::describe_counter!(
        "rsacl_acl_cache_hits_total",
        "Total number of ACL cache hits"
    );
    metrics::describe_counter!(
        "rsacl_acl_cache_misses_total",
        "Total number of ACL cache misses"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::test_support::{parts, record};
    use crate::model::SecurityIdentity;
    use crate::provider::tests::mocks::RecordingStrategy;
    use crate::strategy::StrategyRegistry;

    fn cache_with(config: AclCacheConfig) -> MokaAclCache {
        let registry = StrategyRegistry::single(Arc::new(RecordingStrategy::new(true)));
        MokaAclCache::new(config, AclCodec::new(Arc::new(registry)))
    }

    fn cache() -> MokaAclCache {
        cache_with(AclCacheConfig::default().with_enabled(true))
    }

    fn sample_acl() -> Acl {
        Acl::new(parts(vec![record(
            7,
            Some(1),
            None,
            SecurityIdentity::role("ROLE_USER"),
            0,
            4,
        )]))
        .unwrap()
    }

    // ========== Section 1: Configuration ==========

    #[test]
    fn test_cache_is_disabled_by_default() {
        let config = AclCacheConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.max_capacity, 10_000);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_config_builders() {
        let config = AclCacheConfig::default()
            .with_enabled(true)
            .with_max_capacity(5)
            .with_ttl(Duration::from_secs(1));
        let cache = cache_with(config);

        assert!(cache.is_enabled());
        assert_eq!(cache.config().max_capacity, 5);
        assert_eq!(cache.config().default_ttl, Duration::from_secs(1));
    }

    // ========== Section 2: Put and Get ==========

    #[tokio::test]
    async fn test_put_then_get_returns_equal_acl() {
        let cache = cache();
        let acl = sample_acl();

        cache.put(&acl).await.unwrap();

        assert_eq!(cache.get_by_id(1).await.unwrap(), Some(acl));
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_miss() {
        assert_eq!(cache().get_by_id(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_without_id_fails() {
        let mut acl_parts = parts(vec![]);
        acl_parts.id = None;
        let acl = Acl::new(acl_parts).unwrap();

        let err = cache().put(&acl).await.unwrap_err();

        assert_eq!(
            err,
            DomainError::InvalidArgument {
                message: "The given ACL does not have an ID.".to_string(),
            }
        );
    }

    // ========== Section 3: Eviction ==========

    #[tokio::test]
    async fn test_evict_by_identity() {
        let cache = cache();
        let acl = sample_acl();
        cache.put(&acl).await.unwrap();

        cache.evict_by_identity(acl.object_identity()).await;

        assert_eq!(cache.get_by_id(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evict_by_id_also_drops_identity_index() {
        let cache = cache();
        cache.put(&sample_acl()).await.unwrap();

        cache.evict_by_id(1).await;

        assert_eq!(cache.get_by_id(1).await.unwrap(), None);
        assert!(cache.by_identity.is_empty());
    }

    #[tokio::test]
    async fn test_evicting_unknown_identity_is_noop() {
        let cache = cache();
        cache.put(&sample_acl()).await.unwrap();

        cache
            .evict_by_identity(&ObjectIdentity::new("Document", "other"))
            .await;

        assert!(cache.get_by_id(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let cache = cache();
        cache.put(&sample_acl()).await.unwrap();

        cache.clear().await;

        assert_eq!(cache.get_by_id(1).await.unwrap(), None);
        assert!(cache.by_identity.is_empty());
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache =
            cache_with(AclCacheConfig::default().with_ttl(Duration::from_millis(50)));
        cache.put(&sample_acl()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        cache.run_pending_tasks().await;

        assert_eq!(cache.get_by_id(1).await.unwrap(), None);
    }

    // ========== Section 4: Concurrency ==========

    #[tokio::test]
    async fn test_concurrent_puts_and_gets() {
        let cache = Arc::new(cache());

        let handles: Vec<_> = (1..=20)
            .map(|id| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let mut acl_parts = parts(vec![]);
                    acl_parts.id = Some(id);
                    acl_parts.object_identity = ObjectIdentity::new("Document", id.to_string());
                    cache.put(&Acl::new(acl_parts).unwrap()).await.unwrap();
                    cache.get_by_id(id).await.unwrap()
                })
            })
            .collect();

        let results = futures::future::join_all(handles).await;

        assert!(results.into_iter().all(|r| matches!(r, Ok(Some(_)))));
        assert_eq!(cache.by_identity.len(), 20);
    }
}
