//! Object identity hierarchy resolution.
//!
//! Descendant and ancestor sets are read from the materialized ancestor
//! closure instead of walking parent pointers, so each query costs one
//! closure read plus one row load regardless of depth.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{instrument, warn};

use crate::error::DomainResult;
use crate::model::{ObjectIdentity, ObjectIdentityRow};
use crate::provider::AclStore;

/// Resolves rows and their relatives through an [`AclStore`].
pub struct HierarchyResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for HierarchyResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: AclStore> HierarchyResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the row for `identity`, or `None` when it was never
    /// persisted. Callers treat `None` as an inheriting object without
    /// parent.
    pub async fn resolve_or_none(
        &self,
        identity: &ObjectIdentity,
    ) -> DomainResult<Option<ObjectIdentityRow>> {
        self.store.find_row(identity).await
    }

    /// Rows whose parent is `row`.
    pub async fn find_direct_children(
        &self,
        row: &ObjectIdentityRow,
    ) -> DomainResult<Vec<ObjectIdentityRow>> {
        self.store.find_child_rows(row.id).await
    }

    /// All transitive descendants of `row`, never `row` itself.
    #[instrument(skip(self, row), fields(row_id = row.id))]
    pub async fn find_descendants(
        &self,
        row: &ObjectIdentityRow,
    ) -> DomainResult<Vec<ObjectIdentityRow>> {
        let links = self.store.find_ancestor_closure(row.id).await?;
        let ids = related_ids(
            row.id,
            links
                .iter()
                .filter(|l| l.ancestor_id == row.id)
                .map(|l| l.object_identity_id),
        );
        self.store.find_rows(&ids).await
    }

    /// All transitive ancestors of `row`, never `row` itself.
    #[instrument(skip(self, row), fields(row_id = row.id))]
    pub async fn find_ancestors(
        &self,
        row: &ObjectIdentityRow,
    ) -> DomainResult<Vec<ObjectIdentityRow>> {
        let links = self.store.find_ancestor_closure(row.id).await?;
        let ids = related_ids(
            row.id,
            links
                .iter()
                .filter(|l| l.object_identity_id == row.id)
                .map(|l| l.ancestor_id),
        );
        self.store.find_rows(&ids).await
    }
}

/// Deduplicates ids and drops `self_id`, which a sound closure never holds.
fn related_ids(self_id: i64, ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut unique: BTreeSet<i64> = ids.collect();
    if unique.remove(&self_id) {
        warn!(row_id = self_id, "ancestor closure contains a self-link; ignoring it");
    }
    unique.into_iter().collect()
}
