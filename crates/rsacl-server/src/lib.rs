//! rsacl-server: Wiring of the ACL services
//!
//! This crate connects the domain providers to a storage backend:
//! - Adapter from `DataStore` to the domain `AclStore`
//! - Configuration management
//! - Logging and metric registration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsacl-server                   │
//! ├─────────────────────────────────────────────┤
//! │  config.rs      - Configuration management  │
//! │  adapters.rs    - DataStore -> AclStore     │
//! │  observability/ - Logging & metrics setup   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod observability;

use std::sync::Arc;

use tracing::{debug, info};

use rsacl_domain::cache::MokaAclCache;
use rsacl_domain::provider::{AclProvider, AuditableAclProvider, MutableAclProvider};
use rsacl_domain::{AclCodec, PermissionGrantingStrategy, StrategyRegistry};
use rsacl_storage::{DataStore, MemoryDataStore};

// Re-exports for convenience
pub use adapters::DataStoreAclStore;
pub use config::{ConfigLoadError, ServerConfig};

/// Read, mutable and auditable providers sharing one store and one cache.
pub struct AclServices<S: DataStore> {
    store: Arc<DataStoreAclStore<S>>,
    reader: AclProvider<DataStoreAclStore<S>>,
    mutable: MutableAclProvider<DataStoreAclStore<S>>,
    auditable: AuditableAclProvider<DataStoreAclStore<S>>,
    cache: Option<Arc<MokaAclCache>>,
}

impl AclServices<MemoryDataStore> {
    /// Process entry point: validates `config`, installs the global
    /// subscriber from its logging section and builds the services.
    ///
    /// An already installed global subscriber is kept.
    pub fn bootstrap(
        config: &ServerConfig,
        strategy: Arc<dyn PermissionGrantingStrategy>,
    ) -> Result<Self, ConfigLoadError> {
        config.validate()?;
        if !observability::init_logging(config.logging.to_logging_config()) {
            debug!("global subscriber already installed; keeping it");
        }
        Ok(Self::with_storage(
            config,
            Arc::new(MemoryDataStore::new()),
            strategy,
        ))
    }

    /// Validates `config` and builds the services over the configured
    /// storage backend. Logging is left to the caller.
    pub fn from_config(
        config: &ServerConfig,
        strategy: Arc<dyn PermissionGrantingStrategy>,
    ) -> Result<Self, ConfigLoadError> {
        config.validate()?;
        // `validate` only admits the in-memory backend
        Ok(Self::with_storage(
            config,
            Arc::new(MemoryDataStore::new()),
            strategy,
        ))
    }
}

impl<S: DataStore> AclServices<S> {
    /// Builds the services over an existing storage.
    pub fn with_storage(
        config: &ServerConfig,
        storage: Arc<S>,
        strategy: Arc<dyn PermissionGrantingStrategy>,
    ) -> Self {
        let store = Arc::new(DataStoreAclStore::new(storage));
        let mut provider_config = config.provider.to_provider_config();

        let cache = if config.cache.enabled {
            observability::register_metrics();
            let registry = StrategyRegistry::single(Arc::clone(&strategy));
            let codec = AclCodec::new(Arc::new(registry));
            let cache = Arc::new(MokaAclCache::new(config.cache.to_cache_config(), codec));
            provider_config = provider_config.with_cache(cache.clone());
            Some(cache)
        } else {
            None
        };

        info!(
            max_depth = provider_config.max_depth,
            timeout_secs = config.provider.timeout_secs,
            cache_enabled = cache.is_some(),
            backend = %config.storage.backend,
            "ACL services initialized"
        );

        Self {
            reader: AclProvider::with_config(
                Arc::clone(&store),
                Arc::clone(&strategy),
                provider_config.clone(),
            ),
            mutable: MutableAclProvider::new(
                Arc::clone(&store),
                Arc::clone(&strategy),
                provider_config.clone(),
            ),
            auditable: MutableAclProvider::auditable(
                Arc::clone(&store),
                strategy,
                provider_config,
            ),
            store,
            cache,
        }
    }

    /// Read-only provider.
    pub fn reader(&self) -> &AclProvider<DataStoreAclStore<S>> {
        &self.reader
    }

    /// Provider handing out persistable ACLs.
    pub fn mutable(&self) -> &MutableAclProvider<DataStoreAclStore<S>> {
        &self.mutable
    }

    /// Like [`AclServices::mutable`], with editable audit flags.
    pub fn auditable(&self) -> &AuditableAclProvider<DataStoreAclStore<S>> {
        &self.auditable
    }

    pub fn store(&self) -> &Arc<DataStoreAclStore<S>> {
        &self.store
    }

    /// The shared ACL cache, when enabled.
    pub fn cache(&self) -> Option<&Arc<MokaAclCache>> {
        self.cache.as_ref()
    }
}
