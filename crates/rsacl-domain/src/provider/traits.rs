//! Collaborator traits used by the providers.
//!
//! These abstractions allow the domain layer to be independent of the
//! storage layer. Adapters in the server crate bridge them to
//! `rsacl_storage::DataStore`.

use std::fmt;

use async_trait::async_trait;

use crate::acl::Acl;
use crate::error::DomainResult;
use crate::model::{
    ClosureLink, EntryChanges, EntryRecord, ObjectIdentity, ObjectIdentityRow, SecurityIdentity,
};

/// Persistence collaborator for object identities, the ancestor closure and
/// entries.
#[async_trait]
pub trait AclStore: Send + Sync {
    /// Finds the row for `identity`, or `None` when it was never persisted.
    async fn find_row(&self, identity: &ObjectIdentity) -> DomainResult<Option<ObjectIdentityRow>>;

    async fn get_row(&self, id: i64) -> DomainResult<ObjectIdentityRow>;

    /// Finds the row for `identity` or creates it without parent and with
    /// inheritance enabled.
    async fn find_or_create_row(&self, identity: &ObjectIdentity) -> DomainResult<ObjectIdentityRow>;

    /// Persists parent link and inheritance flag of an existing row.
    async fn save_row(&self, row: &ObjectIdentityRow) -> DomainResult<ObjectIdentityRow>;

    /// Deletes a childless row with its object-scope entries.
    async fn delete_row(&self, id: i64) -> DomainResult<()>;

    async fn find_child_rows(&self, parent_id: i64) -> DomainResult<Vec<ObjectIdentityRow>>;

    /// Loads rows by id, skipping unknown ids.
    async fn find_rows(&self, ids: &[i64]) -> DomainResult<Vec<ObjectIdentityRow>>;

    /// Closure links in which `id` is the descendant or the ancestor.
    async fn find_ancestor_closure(&self, id: i64) -> DomainResult<Vec<ClosureLink>>;

    /// Entries linked to `row_id` plus the class-scope entries of
    /// `object_type`, restricted to `identities` when non-empty.
    async fn find_entries_matching(
        &self,
        object_type: &str,
        row_id: Option<i64>,
        identities: &[SecurityIdentity],
    ) -> DomainResult<Vec<EntryRecord>>;

    /// Applies the changes as one unit and returns the persisted upserts
    /// in input order.
    async fn apply_entry_changes(&self, changes: EntryChanges) -> DomainResult<Vec<EntryRecord>>;
}

/// Cache of resolved ACLs keyed by object identity row id.
#[async_trait]
pub trait AclCache: Send + Sync + fmt::Debug {
    async fn get_by_id(&self, row_id: i64) -> DomainResult<Option<Acl>>;

    /// Stores `acl`. Fails with `InvalidArgument` if it has no id.
    async fn put(&self, acl: &Acl) -> DomainResult<()>;

    async fn evict_by_id(&self, row_id: i64);

    async fn evict_by_identity(&self, identity: &ObjectIdentity);

    async fn clear(&self);
}
