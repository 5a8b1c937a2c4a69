//! Read provider: assembles ACLs from the store, the cache and the parent
//! chain.
//!
//! # Resolution order
//!
//! For every level of the parent chain:
//!
//! 1. Resolve the backing row (absence is not an error).
//! 2. If a cache is configured and the row exists, return the cached ACL.
//! 3. Load the row's object-scope entries and the class-scope entries of its
//!    type. No entries means `NotFound`.
//! 4. Resolve the parent ACL. A parent without entries becomes `None`.
//!
//! - **Depth Limiting**: the parent chain is bounded by
//!   `ProviderConfig::max_depth` so a corrupted hierarchy fails fast
//!   instead of recursing forever.
//!
//! - **Timeout Handling**: every public operation is bounded by
//!   `ProviderConfig::timeout`.
//!
//! - **Cache Failures**: cache errors and slow cache calls are logged and
//!   treated as misses; they never fail a lookup.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::config::ProviderConfig;
use super::factory::{AclFactory, PlainAclFactory};
use super::traits::{AclCache, AclStore};
use crate::acl::{Acl, AclParts, AclView};
use crate::error::{DomainError, DomainResult};
use crate::hierarchy::HierarchyResolver;
use crate::model::{ObjectIdentity, ObjectIdentityRow, SecurityIdentity};
use crate::strategy::PermissionGrantingStrategy;

/// Upper bound for a single cache call; a slower cache counts as a miss.
const CACHE_OP_TIMEOUT: Duration = Duration::from_millis(100);

const NO_ACL_MESSAGE: &str = "There is no ACL available for this object identity. \
Please create one using the MutableAclProvider.";

const NO_ACL_FOR_IDENTITIES_MESSAGE: &str = "There is at least no ACL for this object identity \
and the given security identities. Try retrieving the ACL without security identity filter \
and add ACEs for the security identities.";

/// Type alias for boxed future to handle async recursion.
pub(super) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of resolving one level of the chain.
enum Resolved {
    Cached(Acl),
    Loaded(AclParts),
}

/// Finds ACLs for object identities.
///
/// The factory `F` decides which ACL flavour is handed out; parents are
/// always plain [`Acl`]s.
pub struct AclProvider<S, F = PlainAclFactory> {
    store: Arc<S>,
    hierarchy: HierarchyResolver<S>,
    factory: F,
    strategy: Arc<dyn PermissionGrantingStrategy>,
    config: ProviderConfig,
}

impl<S: AclStore + 'static> AclProvider<S> {
    /// Creates a provider with the default configuration.
    pub fn new(store: Arc<S>, strategy: Arc<dyn PermissionGrantingStrategy>) -> Self {
        Self::with_config(store, strategy, ProviderConfig::default())
    }

    /// Creates a provider with custom configuration.
    pub fn with_config(
        store: Arc<S>,
        strategy: Arc<dyn PermissionGrantingStrategy>,
        config: ProviderConfig,
    ) -> Self {
        Self::with_factory(store, strategy, config, PlainAclFactory)
    }
}

impl<S, F> AclProvider<S, F>
where
    S: AclStore + 'static,
    F: AclFactory,
{
    /// Creates a provider that builds its results through `factory`.
    pub fn with_factory(
        store: Arc<S>,
        strategy: Arc<dyn PermissionGrantingStrategy>,
        config: ProviderConfig,
        factory: F,
    ) -> Self {
        Self {
            hierarchy: HierarchyResolver::new(Arc::clone(&store)),
            store,
            factory,
            strategy,
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn hierarchy(&self) -> &HierarchyResolver<S> {
        &self.hierarchy
    }

    pub fn strategy(&self) -> &Arc<dyn PermissionGrantingStrategy> {
        &self.strategy
    }

    pub(super) fn factory(&self) -> &F {
        &self.factory
    }

    /// Returns the ACL of `object_identity`.
    ///
    /// A non-empty `identities` filter restricts the loaded entries to those
    /// security identities. A cached ACL is returned as is, whatever the
    /// filter.
    ///
    /// # Errors
    ///
    /// `NotFound` when the object has no matching entries of its own,
    /// even if its parent has some.
    #[instrument(skip(self, identities), fields(object = %object_identity))]
    pub async fn find_acl(
        &self,
        object_identity: &ObjectIdentity,
        identities: &[SecurityIdentity],
    ) -> DomainResult<F::Output> {
        self.with_timeout(async {
            match self
                .resolve(object_identity.clone(), identities.to_vec(), 0)
                .await?
            {
                Resolved::Cached(acl) => self.factory.from_cached(acl).await,
                Resolved::Loaded(parts) => {
                    let output = self.factory.build_acl(parts).await?;
                    // Filtered results are partial and never cached
                    if identities.is_empty() {
                        self.cache_put(output.acl()).await;
                    }
                    Ok(output)
                }
            }
        })
        .await
    }

    /// Returns the ACLs of every identity in `object_identities`.
    ///
    /// The first `NotFound` (or any other failure) aborts the batch.
    pub async fn find_acls(
        &self,
        object_identities: &[ObjectIdentity],
        identities: &[SecurityIdentity],
    ) -> DomainResult<HashMap<ObjectIdentity, F::Output>> {
        let mut acls = HashMap::with_capacity(object_identities.len());
        for object_identity in object_identities {
            let acl = self.find_acl(object_identity, identities).await?;
            acls.insert(object_identity.clone(), acl);
        }
        Ok(acls)
    }

    /// Returns the children of `object_identity`: direct ones only, or all
    /// descendants. Unknown identities have no children.
    #[instrument(skip(self), fields(object = %object_identity))]
    pub async fn find_children(
        &self,
        object_identity: &ObjectIdentity,
        direct_only: bool,
    ) -> DomainResult<Vec<ObjectIdentity>> {
        self.with_timeout(async {
            let Some(row) = self.hierarchy.resolve_or_none(object_identity).await? else {
                return Ok(Vec::new());
            };

            let rows = if direct_only {
                self.hierarchy.find_direct_children(&row).await?
            } else {
                self.hierarchy.find_descendants(&row).await?
            };

            Ok(rows.into_iter().map(|r| r.identity).collect())
        })
        .await
    }

    pub(super) async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = DomainResult<T>>,
    ) -> DomainResult<T> {
        match timeout(self.config.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::Timeout {
                duration_ms: self.config.timeout.as_millis() as u64,
            }),
        }
    }

    /// Resolves one level of the chain (boxed for recursion).
    fn resolve(
        &self,
        object_identity: ObjectIdentity,
        identities: Vec<SecurityIdentity>,
        depth: u32,
    ) -> BoxFuture<'_, DomainResult<Resolved>> {
        Box::pin(async move {
            if depth >= self.config.max_depth {
                warn!(
                    object = %object_identity,
                    max_depth = self.config.max_depth,
                    "parent chain exceeds depth limit"
                );
                return Err(DomainError::DepthLimitExceeded {
                    max_depth: self.config.max_depth,
                });
            }

            let row = self.hierarchy.resolve_or_none(&object_identity).await?;

            if let (Some(cache), Some(row)) = (&self.config.cache, &row) {
                if let Some(acl) = cache_get(cache.as_ref(), row.id).await {
                    debug!(row_id = row.id, "ACL served from cache");
                    return Ok(Resolved::Cached(acl));
                }
            }

            let records = self
                .store
                .find_entries_matching(
                    &object_identity.object_type,
                    row.as_ref().map(|r| r.id),
                    &identities,
                )
                .await?;

            if records.is_empty() {
                let message = if identities.is_empty() {
                    NO_ACL_MESSAGE
                } else {
                    NO_ACL_FOR_IDENTITIES_MESSAGE
                };
                return Err(DomainError::NotFound {
                    message: message.to_string(),
                });
            }

            let mut seen = HashSet::new();
            let loaded_identities = records
                .iter()
                .filter(|r| seen.insert(r.security_identity_id))
                .map(|r| r.security_identity.clone())
                .collect();

            let (parent, entries_inheriting) = match &row {
                Some(row) => (self.resolve_parent(row, depth).await?, row.entries_inheriting),
                None => (None, true),
            };

            Ok(Resolved::Loaded(AclParts {
                id: row.as_ref().map(|r| r.id),
                object_identity,
                entries: records,
                loaded_identities,
                parent,
                entries_inheriting,
                strategy: Arc::clone(&self.strategy),
                partial: !identities.is_empty(),
            }))
        })
    }

    /// Resolves the parent ACL of `row`, mapping a parent without entries
    /// to `None`.
    async fn resolve_parent(
        &self,
        row: &ObjectIdentityRow,
        depth: u32,
    ) -> DomainResult<Option<Arc<Acl>>> {
        let Some(parent_id) = row.parent_id else {
            return Ok(None);
        };
        let parent_row = self.store.get_row(parent_id).await?;

        match self.resolve(parent_row.identity, Vec::new(), depth + 1).await {
            Ok(Resolved::Cached(acl)) => Ok(Some(Arc::new(acl))),
            Ok(Resolved::Loaded(parts)) => {
                let acl = Acl::new(parts)?;
                self.cache_put(&acl).await;
                Ok(Some(Arc::new(acl)))
            }
            Err(e) if e.is_not_found() => {
                debug!(parent_id, "parent has no entries; resolving without parent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort cache insert of a persisted ACL.
    pub(super) async fn cache_put(&self, acl: &Acl) {
        let Some(cache) = &self.config.cache else {
            return;
        };
        if acl.id().is_none() {
            return;
        }
        match timeout(CACHE_OP_TIMEOUT, cache.put(acl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to cache ACL"),
            Err(_) => warn!("ACL cache put timed out"),
        }
    }
}

async fn cache_get(cache: &dyn AclCache, row_id: i64) -> Option<Acl> {
    match timeout(CACHE_OP_TIMEOUT, cache.get_by_id(row_id)).await {
        Ok(Ok(acl)) => acl,
        Ok(Err(e)) => {
            warn!(row_id, error = %e, "ACL cache lookup failed; treating as miss");
            None
        }
        Err(_) => {
            warn!(row_id, "ACL cache lookup timed out; treating as miss");
            None
        }
    }
}
