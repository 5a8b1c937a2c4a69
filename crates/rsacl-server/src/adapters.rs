//! Adapters that bridge the storage layer to the domain layer.
//!
//! The domain layer (rsacl-domain) defines the `AclStore` collaborator in
//! terms of rows, entry records and closure links. The storage layer
//! (rsacl-storage) implements `DataStore` over its own table types.
//!
//! [`DataStoreAclStore`] implements `AclStore` on top of any `DataStore`,
//! translating types and mapping storage failures to `DomainError::Storage`.

use std::sync::Arc;

use async_trait::async_trait;

use rsacl_domain::error::{DomainError, DomainResult};
use rsacl_domain::model::{
    ClosureLink, EntryChanges, EntryDraft, EntryRecord, GrantingStrategy, ObjectIdentity,
    ObjectIdentityRow, SecurityIdentity,
};
use rsacl_domain::provider::AclStore;
use rsacl_storage::{
    DataStore, EntryChangeSet, EntryFilter, EntryWrite, SecurityIdentityKey, StorageError,
    StoredEntry, StoredObjectIdentity,
};

/// Adapter that implements `AclStore` using a `DataStore`.
pub struct DataStoreAclStore<S: DataStore> {
    storage: Arc<S>,
}

impl<S: DataStore> DataStoreAclStore<S> {
    /// Creates a new adapter wrapping the given storage.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// The wrapped storage.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

#[async_trait]
impl<S: DataStore> AclStore for DataStoreAclStore<S> {
    async fn find_row(&self, identity: &ObjectIdentity) -> DomainResult<Option<ObjectIdentityRow>> {
        let row = self
            .storage
            .find_object_identity(&identity.object_type, &identity.identifier)
            .await
            .map_err(storage_error)?;
        Ok(row.map(row_from_stored))
    }

    async fn get_row(&self, id: i64) -> DomainResult<ObjectIdentityRow> {
        self.storage
            .get_object_identity(id)
            .await
            .map(row_from_stored)
            .map_err(storage_error)
    }

    async fn find_or_create_row(&self, identity: &ObjectIdentity) -> DomainResult<ObjectIdentityRow> {
        self.storage
            .find_or_create_object_identity(&identity.object_type, &identity.identifier)
            .await
            .map(row_from_stored)
            .map_err(storage_error)
    }

    async fn save_row(&self, row: &ObjectIdentityRow) -> DomainResult<ObjectIdentityRow> {
        let stored = StoredObjectIdentity {
            id: row.id,
            class_type: row.identity.object_type.clone(),
            identifier: row.identity.identifier.clone(),
            parent_id: row.parent_id,
            entries_inheriting: row.entries_inheriting,
        };
        self.storage
            .save_object_identity(&stored)
            .await
            .map(row_from_stored)
            .map_err(storage_error)
    }

    async fn delete_row(&self, id: i64) -> DomainResult<()> {
        self.storage
            .delete_object_identity(id)
            .await
            .map_err(storage_error)
    }

    async fn find_child_rows(&self, parent_id: i64) -> DomainResult<Vec<ObjectIdentityRow>> {
        let rows = self
            .storage
            .list_child_object_identities(parent_id)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(row_from_stored).collect())
    }

    async fn find_rows(&self, ids: &[i64]) -> DomainResult<Vec<ObjectIdentityRow>> {
        let rows = self
            .storage
            .list_object_identities(ids)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(row_from_stored).collect())
    }

    async fn find_ancestor_closure(&self, id: i64) -> DomainResult<Vec<ClosureLink>> {
        let links = self
            .storage
            .read_ancestor_links(id)
            .await
            .map_err(storage_error)?;
        Ok(links
            .into_iter()
            .map(|link| ClosureLink {
                object_identity_id: link.object_identity_id,
                ancestor_id: link.ancestor_id,
            })
            .collect())
    }

    async fn find_entries_matching(
        &self,
        object_type: &str,
        row_id: Option<i64>,
        identities: &[SecurityIdentity],
    ) -> DomainResult<Vec<EntryRecord>> {
        let filter = EntryFilter {
            class_type: object_type.to_string(),
            object_identity_id: row_id,
            security_identities: identities.iter().map(identity_key).collect(),
        };

        let entries = self
            .storage
            .read_entries(&filter)
            .await
            .map_err(storage_error)?;

        entries.into_iter().map(record_from_stored).collect()
    }

    async fn apply_entry_changes(&self, changes: EntryChanges) -> DomainResult<Vec<EntryRecord>> {
        let upserts = changes
            .upserts
            .iter()
            .map(write_from_draft)
            .collect::<DomainResult<Vec<_>>>()?;

        let persisted = self
            .storage
            .write_entries(EntryChangeSet {
                upserts,
                deletes: changes.deletes,
            })
            .await
            .map_err(storage_error)?;

        persisted.into_iter().map(record_from_stored).collect()
    }
}

fn storage_error(e: StorageError) -> DomainError {
    DomainError::Storage {
        message: e.to_string(),
    }
}

fn row_from_stored(row: StoredObjectIdentity) -> ObjectIdentityRow {
    ObjectIdentityRow {
        id: row.id,
        identity: ObjectIdentity::new(row.class_type, row.identifier),
        parent_id: row.parent_id,
        entries_inheriting: row.entries_inheriting,
    }
}

fn identity_key(identity: &SecurityIdentity) -> SecurityIdentityKey {
    SecurityIdentityKey::new(identity.identifier(), identity.is_principal())
}

fn record_from_stored(entry: StoredEntry) -> DomainResult<EntryRecord> {
    let security_identity = if entry.security_identity.principal {
        SecurityIdentity::principal(entry.security_identity.identifier)
    } else {
        SecurityIdentity::role(entry.security_identity.identifier)
    };
    let strategy: GrantingStrategy = entry.granting_strategy.parse()?;

    Ok(EntryRecord {
        id: entry.id,
        object_type: entry.class_type,
        object_identity_id: entry.object_identity_id,
        security_identity,
        security_identity_id: entry.security_identity.id,
        field_name: entry.field_name,
        order: entry.ace_order as usize,
        mask: entry.mask,
        granting: entry.granting,
        strategy,
        audit_success: entry.audit_success,
        audit_failure: entry.audit_failure,
    })
}

fn write_from_draft(draft: &EntryDraft) -> DomainResult<EntryWrite> {
    let ace_order = u32::try_from(draft.order).map_err(|_| DomainError::InvalidArgument {
        message: format!("entry order {} is out of range", draft.order),
    })?;

    Ok(EntryWrite {
        id: draft.id,
        class_type: draft.object_type.clone(),
        object_identity_id: draft.object_identity_id,
        security_identity: identity_key(&draft.security_identity),
        field_name: draft.field_name.clone(),
        ace_order,
        mask: draft.mask,
        granting: draft.granting,
        granting_strategy: draft.strategy.as_str().to_string(),
        audit_success: draft.audit_success,
        audit_failure: draft.audit_failure,
    })
}
