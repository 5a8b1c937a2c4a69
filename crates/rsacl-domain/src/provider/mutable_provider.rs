//! Write provider: creates, persists and deletes ACLs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use super::acl_provider::{AclProvider, BoxFuture};
use super::config::ProviderConfig;
use super::factory::{AclFactory, AuditableAclFactory, MutableAclFactory};
use super::traits::AclStore;
use crate::acl::{AclParts, MutableAcl};
use crate::error::{DomainError, DomainResult};
use crate::model::{
    AceScope, EntryChanges, EntryDraft, EntryRecord, ObjectIdentity, ObjectIdentityRow,
    SecurityIdentity,
};
use crate::strategy::PermissionGrantingStrategy;

/// Provider handing out [`crate::acl::AuditableAcl`]s.
pub type AuditableAclProvider<S> = MutableAclProvider<S, AuditableAclFactory<S>>;

/// Provider whose ACLs can be edited and written back.
pub struct MutableAclProvider<S, F = MutableAclFactory<S>> {
    inner: AclProvider<S, F>,
}

impl<S: AclStore + 'static> MutableAclProvider<S> {
    /// Creates a provider handing out [`MutableAcl`]s.
    pub fn new(
        store: Arc<S>,
        strategy: Arc<dyn PermissionGrantingStrategy>,
        config: ProviderConfig,
    ) -> Self {
        let factory = MutableAclFactory::new(Arc::clone(&store));
        Self {
            inner: AclProvider::with_factory(store, strategy, config, factory),
        }
    }

    /// Creates a provider handing out auditable ACLs.
    pub fn auditable(
        store: Arc<S>,
        strategy: Arc<dyn PermissionGrantingStrategy>,
        config: ProviderConfig,
    ) -> AuditableAclProvider<S> {
        let factory = AuditableAclFactory::new(Arc::clone(&store));
        MutableAclProvider {
            inner: AclProvider::with_factory(store, strategy, config, factory),
        }
    }
}

impl<S, F> MutableAclProvider<S, F>
where
    S: AclStore + 'static,
    F: AclFactory,
{
    /// The underlying read provider.
    pub fn reader(&self) -> &AclProvider<S, F> {
        &self.inner
    }

    pub async fn find_acl(
        &self,
        object_identity: &ObjectIdentity,
        identities: &[SecurityIdentity],
    ) -> DomainResult<F::Output> {
        self.inner.find_acl(object_identity, identities).await
    }

    pub async fn find_acls(
        &self,
        object_identities: &[ObjectIdentity],
        identities: &[SecurityIdentity],
    ) -> DomainResult<HashMap<ObjectIdentity, F::Output>> {
        self.inner.find_acls(object_identities, identities).await
    }

    pub async fn find_children(
        &self,
        object_identity: &ObjectIdentity,
        direct_only: bool,
    ) -> DomainResult<Vec<ObjectIdentity>> {
        self.inner.find_children(object_identity, direct_only).await
    }

    /// Returns an empty, inheriting ACL without parent, bound to the row
    /// of `object_identity` (created when missing).
    #[instrument(skip(self), fields(object = %object_identity))]
    pub async fn create_acl(&self, object_identity: &ObjectIdentity) -> DomainResult<F::Output> {
        self.inner
            .with_timeout(async {
                let row = self.inner.store().find_or_create_row(object_identity).await?;
                debug!(row_id = row.id, "created ACL");

                self.inner
                    .factory()
                    .build_acl(AclParts {
                        id: Some(row.id),
                        object_identity: object_identity.clone(),
                        entries: Vec::new(),
                        loaded_identities: Vec::new(),
                        parent: None,
                        entries_inheriting: true,
                        strategy: Arc::clone(self.inner.strategy()),
                        // Entries already stored for a reused row are not loaded
                        partial: true,
                    })
                    .await
            })
            .await
    }

    /// Persists every in-memory edit of `acl`.
    ///
    /// Writes the inheritance flag and parent link, upserts every entry
    /// with its current order, and deletes entries that were loaded but
    /// are gone. Afterwards `acl` carries the persisted entry ids.
    ///
    /// A [partial](MutableAcl::is_partial) ACL is merged into the stored
    /// buckets: stored entries it never saw keep their relative order, and
    /// each new entry lands right before the loaded entry that follows it
    /// in the ACL (or at the end of the bucket).
    ///
    /// With a cache configured the refreshed ACL is cached (a partial one
    /// is evicted instead) and cached descendants, whose parent chain
    /// embeds it, are evicted. Changes to class-scope entries clear the
    /// whole cache since every ACL of the type embeds them.
    #[instrument(skip(self, acl), fields(row_id = acl.row_id()))]
    pub async fn update_acl(&self, acl: &mut MutableAcl) -> DomainResult<()> {
        self.inner
            .with_timeout(async {
                let store = self.inner.store();
                let row = self.save_row_state(acl).await?;

                let mut upserts: Vec<EntryDraft> = acl
                    .all_entries()
                    .map(|entry| EntryDraft::from_entry(entry, &row))
                    .collect();
                let current: HashSet<i64> = upserts.iter().filter_map(|d| d.id).collect();
                let own = upserts.len();
                if acl.is_partial() {
                    let moved = self.rebase_partial(acl, &row, &mut upserts).await?;
                    upserts.extend(moved);
                }

                let mut removed: Vec<(i64, AceScope)> = acl
                    .loaded_entries()
                    .iter()
                    .filter(|(id, _)| !current.contains(id))
                    .map(|(id, scope)| (*id, *scope))
                    .collect();
                removed.sort_unstable_by_key(|(id, _)| *id);

                let touches_class_scope = upserts.iter().any(|d| d.object_identity_id.is_none())
                    || removed.iter().any(|(_, scope)| *scope == AceScope::Class);

                let persisted = store
                    .apply_entry_changes(EntryChanges {
                        upserts,
                        deletes: removed.iter().map(|(id, _)| *id).collect(),
                    })
                    .await?;
                // Rebased unseen entries follow the ACL's own upserts
                let ids: Vec<i64> = persisted.iter().take(own).map(|r| r.id).collect();
                acl.mark_persisted(&ids);

                debug!(
                    entries = ids.len(),
                    rebased = persisted.len() - ids.len(),
                    deleted = removed.len(),
                    "persisted ACL"
                );

                self.refresh_cache(acl, &row, touches_class_scope).await
            })
            .await
    }

    /// Deletes the ACL of `object_identity` and of all its descendants.
    /// Unknown identities are ignored.
    #[instrument(skip(self), fields(object = %object_identity))]
    pub async fn delete_acl(&self, object_identity: &ObjectIdentity) -> DomainResult<()> {
        self.inner
            .with_timeout(async {
                match self.inner.hierarchy().resolve_or_none(object_identity).await? {
                    Some(row) => self.delete_subtree(row, 0).await,
                    None => Ok(()),
                }
            })
            .await
    }

    /// Writes the parent link and inheritance flag when they changed.
    async fn save_row_state(&self, acl: &MutableAcl) -> DomainResult<ObjectIdentityRow> {
        let store = self.inner.store();
        let mut row = store.get_row(acl.row_id()).await?;

        let parent_id = match acl.parent_acl() {
            Some(parent) => Some(store.find_or_create_row(parent.object_identity()).await?.id),
            None => None,
        };

        if row.parent_id == parent_id && row.entries_inheriting == acl.is_entries_inheriting() {
            return Ok(row);
        }

        row.parent_id = parent_id;
        row.entries_inheriting = acl.is_entries_inheriting();
        store.save_row(&row).await
    }

    /// Assigns the stored orders of a partial ACL's drafts and returns the
    /// writes for unseen stored entries whose order moved.
    ///
    /// `drafts` must be in bucket order, as built from `acl.all_entries()`.
    async fn rebase_partial(
        &self,
        acl: &MutableAcl,
        row: &ObjectIdentityRow,
        drafts: &mut [EntryDraft],
    ) -> DomainResult<Vec<EntryDraft>> {
        let stored = self
            .inner
            .store()
            .find_entries_matching(&row.identity.object_type, Some(row.id), &[])
            .await?;

        let mut stored_buckets: HashMap<BucketKey, Vec<EntryRecord>> = HashMap::new();
        for record in stored {
            let key = (record.scope(), record.field_name.clone());
            stored_buckets.entry(key).or_default().push(record);
        }

        let mut own_buckets: HashMap<BucketKey, Vec<usize>> = HashMap::new();
        for (index, draft) in drafts.iter().enumerate() {
            own_buckets.entry(draft_key(draft)).or_default().push(index);
        }

        let mut moved = Vec::new();
        for (key, mut records) in stored_buckets {
            records.sort_by_key(|r| (r.order, r.id));
            let own: &[usize] = own_buckets.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            let own_position: HashMap<i64, usize> = own
                .iter()
                .enumerate()
                .filter_map(|(k, &index)| drafts[index].id.map(|id| (id, k)))
                .collect();

            let mut next = 0;
            let mut position = 0;
            for record in &records {
                if acl.loaded_entries().contains_key(&record.id) {
                    // A loaded entry still present anchors the entries
                    // inserted before it; a deleted one leaves no slot
                    let Some(&end) = own_position.get(&record.id) else {
                        continue;
                    };
                    for &index in own.get(next..=end).unwrap_or_default() {
                        drafts[index].order = position;
                        position += 1;
                    }
                    next = next.max(end + 1);
                } else {
                    if record.order != position {
                        moved.push(EntryDraft::from_entry(&record.to_entry(position), row));
                    }
                    position += 1;
                }
            }
            for &index in own.get(next..).unwrap_or_default() {
                drafts[index].order = position;
                position += 1;
            }
        }

        moved.sort_unstable_by_key(|d| d.id);
        Ok(moved)
    }

    async fn refresh_cache(
        &self,
        acl: &MutableAcl,
        row: &ObjectIdentityRow,
        touches_class_scope: bool,
    ) -> DomainResult<()> {
        let Some(cache) = &self.inner.config().cache else {
            return Ok(());
        };

        if touches_class_scope {
            debug!(
                object_type = %row.identity.object_type,
                "class-scope entries changed; clearing ACL cache"
            );
            cache.clear().await;
            return Ok(());
        }

        for descendant in self.inner.hierarchy().find_descendants(row).await? {
            cache.evict_by_id(descendant.id).await;
        }
        cache.evict_by_id(row.id).await;
        if acl.is_partial() {
            // Never cache a partial view; the next unfiltered read reloads it
            cache.evict_by_identity(&row.identity).await;
        } else {
            self.inner.cache_put(&acl.to_acl()).await;
        }
        Ok(())
    }

    /// Deletes `row` after its children, deepest first (boxed for recursion).
    fn delete_subtree(
        &self,
        row: ObjectIdentityRow,
        depth: u32,
    ) -> BoxFuture<'_, DomainResult<()>> {
        Box::pin(async move {
            let max_depth = self.inner.config().max_depth;
            if depth >= max_depth {
                return Err(DomainError::DepthLimitExceeded { max_depth });
            }

            for child in self.inner.store().find_child_rows(row.id).await? {
                self.delete_subtree(child, depth + 1).await?;
            }

            self.inner.store().delete_row(row.id).await?;
            if let Some(cache) = &self.inner.config().cache {
                cache.evict_by_id(row.id).await;
                cache.evict_by_identity(&row.identity).await;
            }
            debug!(row_id = row.id, object = %row.identity, "deleted ACL");
            Ok(())
        })
    }
}

/// Scope and field name: identifies one stored entry bucket.
type BucketKey = (AceScope, Option<String>);

fn draft_key(draft: &EntryDraft) -> BucketKey {
    let scope = if draft.object_identity_id.is_some() {
        AceScope::Object
    } else {
        AceScope::Class
    };
    (scope, draft.field_name.clone())
}
