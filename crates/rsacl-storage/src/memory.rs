//! In-memory storage implementation for testing and single-process use.
//!
//! Rows, security identities and entries live in `DashMap`s so reads never
//! block each other. Multi-map mutations (re-parenting, entry change sets)
//! are serialized through a single writer lock so the ancestor closure and
//! entry tables are never observed half-updated by another writer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    validate_class_type, validate_entry_write, validate_identifier, AncestorLink, DataStore,
    EntryChangeSet, EntryFilter, SecurityIdentityKey, StoredEntry, StoredObjectIdentity,
    StoredSecurityIdentity,
};

/// Entry row as stored; the security identity is referenced by id.
#[derive(Debug, Clone)]
struct EntryRow {
    id: i64,
    class_type: String,
    object_identity_id: Option<i64>,
    security_identity_id: i64,
    field_name: Option<String>,
    ace_order: u32,
    mask: i32,
    granting: bool,
    granting_strategy: String,
    audit_success: bool,
    audit_failure: bool,
}

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Row lookup by (class, identifier)**: O(1) (secondary index)
/// - **Ancestors of a row**: O(1) lookup of the materialized closure
/// - **Descendants of a row**: O(N) scan of the closure
/// - **Read entries**: O(E) linear scan with filtering
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    object_identities: DashMap<i64, StoredObjectIdentity>,
    /// `(class_type, identifier)` -> row id.
    identity_index: DashMap<(String, String), i64>,
    /// Ancestor closure: row id -> every ancestor id (never the row itself).
    ancestors: DashMap<i64, HashSet<i64>>,
    security_identities: DashMap<SecurityIdentityKey, i64>,
    security_identity_rows: DashMap<i64, StoredSecurityIdentity>,
    entries: DashMap<i64, EntryRow>,
    next_object_identity_id: AtomicI64,
    next_security_identity_id: AtomicI64,
    next_entry_id: AtomicI64,
    write_lock: Mutex<()>,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn descendants_of(&self, id: i64) -> HashSet<i64> {
        self.ancestors
            .iter()
            .filter(|entry| entry.value().contains(&id))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Moves `id` (and its subtree) under `new_parent`, rewriting the closure.
    /// Caller must hold the writer lock.
    fn reparent(&self, id: i64, new_parent: Option<i64>) -> StorageResult<()> {
        let descendants = self.descendants_of(id);

        if let Some(parent_id) = new_parent {
            if !self.object_identities.contains_key(&parent_id) {
                return Err(StorageError::ObjectIdentityNotFound { id: parent_id });
            }
            if parent_id == id || descendants.contains(&parent_id) {
                return Err(StorageError::HierarchyCycle { id, parent_id });
            }
        }

        let old_ancestors: HashSet<i64> = self
            .ancestors
            .get(&id)
            .map(|a| a.value().clone())
            .unwrap_or_default();

        let mut new_ancestors = HashSet::new();
        if let Some(parent_id) = new_parent {
            new_ancestors.insert(parent_id);
            let inherited: HashSet<i64> = self
                .ancestors
                .get(&parent_id)
                .map(|a| a.value().clone())
                .unwrap_or_default();
            new_ancestors.extend(inherited);
        }

        for node in std::iter::once(id).chain(descendants) {
            let mut node_ancestors = self.ancestors.entry(node).or_default();
            node_ancestors.retain(|a| !old_ancestors.contains(a));
            node_ancestors.extend(new_ancestors.iter().copied());
        }

        Ok(())
    }

    fn find_or_create_security_identity(&self, key: &SecurityIdentityKey) -> i64 {
        if let Some(id) = self.security_identities.get(key) {
            return *id;
        }
        let id = self.next_security_identity_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.security_identity_rows.insert(
            id,
            StoredSecurityIdentity {
                id,
                identifier: key.identifier.clone(),
                principal: key.principal,
            },
        );
        self.security_identities.insert(key.clone(), id);
        id
    }

    fn join(&self, row: &EntryRow) -> StorageResult<StoredEntry> {
        let security_identity = self
            .security_identity_rows
            .get(&row.security_identity_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| StorageError::InternalError {
                message: format!(
                    "entry {} references missing security identity {}",
                    row.id, row.security_identity_id
                ),
            })?;

        Ok(StoredEntry {
            id: row.id,
            class_type: row.class_type.clone(),
            object_identity_id: row.object_identity_id,
            security_identity,
            field_name: row.field_name.clone(),
            ace_order: row.ace_order,
            mask: row.mask,
            granting: row.granting,
            granting_strategy: row.granting_strategy.clone(),
            audit_success: row.audit_success,
            audit_failure: row.audit_failure,
        })
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn find_object_identity(
        &self,
        class_type: &str,
        identifier: &str,
    ) -> StorageResult<Option<StoredObjectIdentity>> {
        validate_class_type(class_type)?;
        validate_identifier(identifier)?;

        let id = self
            .identity_index
            .get(&(class_type.to_string(), identifier.to_string()))
            .map(|id| *id);

        Ok(id.and_then(|id| self.object_identities.get(&id).map(|r| r.value().clone())))
    }

    async fn get_object_identity(&self, id: i64) -> StorageResult<StoredObjectIdentity> {
        self.object_identities
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StorageError::ObjectIdentityNotFound { id })
    }

    #[instrument(skip(self))]
    async fn find_or_create_object_identity(
        &self,
        class_type: &str,
        identifier: &str,
    ) -> StorageResult<StoredObjectIdentity> {
        validate_class_type(class_type)?;
        validate_identifier(identifier)?;

        let _guard = self.write_lock.lock().await;

        let key = (class_type.to_string(), identifier.to_string());
        if let Some(id) = self.identity_index.get(&key).map(|id| *id) {
            return self.get_object_identity(id).await;
        }

        let id = self.next_object_identity_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = StoredObjectIdentity {
            id,
            class_type: class_type.to_string(),
            identifier: identifier.to_string(),
            parent_id: None,
            entries_inheriting: true,
        };
        self.object_identities.insert(id, row.clone());
        self.identity_index.insert(key, id);
        self.ancestors.insert(id, HashSet::new());

        debug!(id, "created object identity");
        Ok(row)
    }

    #[instrument(skip(self), fields(id = row.id))]
    async fn save_object_identity(
        &self,
        row: &StoredObjectIdentity,
    ) -> StorageResult<StoredObjectIdentity> {
        let _guard = self.write_lock.lock().await;

        let existing = self
            .object_identities
            .get(&row.id)
            .map(|r| r.value().clone())
            .ok_or(StorageError::ObjectIdentityNotFound { id: row.id })?;

        if existing.class_type != row.class_type || existing.identifier != row.identifier {
            return Err(StorageError::InvalidInput {
                message: format!(
                    "object identity {} cannot change from {}:{} to {}:{}",
                    row.id, existing.class_type, existing.identifier, row.class_type, row.identifier
                ),
            });
        }

        if existing.parent_id != row.parent_id {
            self.reparent(row.id, row.parent_id)?;
            debug!(parent_id = ?row.parent_id, "re-parented object identity");
        }

        let updated = StoredObjectIdentity {
            parent_id: row.parent_id,
            entries_inheriting: row.entries_inheriting,
            ..existing
        };
        self.object_identities.insert(row.id, updated.clone());
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_object_identity(&self, id: i64) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        let row = self
            .object_identities
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StorageError::ObjectIdentityNotFound { id })?;

        let children = self
            .object_identities
            .iter()
            .filter(|r| r.parent_id == Some(id))
            .count();
        if children > 0 {
            return Err(StorageError::HasChildren { id, children });
        }

        self.object_identities.remove(&id);
        self.identity_index
            .remove(&(row.class_type.clone(), row.identifier.clone()));
        self.ancestors.remove(&id);
        for mut node_ancestors in self.ancestors.iter_mut() {
            node_ancestors.remove(&id);
        }
        self.entries
            .retain(|_, entry| entry.object_identity_id != Some(id));

        Ok(())
    }

    async fn list_child_object_identities(
        &self,
        parent_id: i64,
    ) -> StorageResult<Vec<StoredObjectIdentity>> {
        let mut children: Vec<StoredObjectIdentity> = self
            .object_identities
            .iter()
            .filter(|r| r.parent_id == Some(parent_id))
            .map(|r| r.value().clone())
            .collect();
        children.sort_by_key(|r| r.id);
        Ok(children)
    }

    async fn list_object_identities(
        &self,
        ids: &[i64],
    ) -> StorageResult<Vec<StoredObjectIdentity>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.object_identities.get(id).map(|r| r.value().clone()))
            .collect())
    }

    async fn read_ancestor_links(&self, id: i64) -> StorageResult<Vec<AncestorLink>> {
        let own: Vec<i64> = self
            .ancestors
            .get(&id)
            .map(|a| a.iter().copied().collect())
            .unwrap_or_default();

        let mut links: Vec<AncestorLink> = own
            .into_iter()
            .map(|ancestor_id| AncestorLink {
                object_identity_id: id,
                ancestor_id,
            })
            .collect();

        links.extend(
            self.descendants_of(id)
                .into_iter()
                .map(|descendant| AncestorLink {
                    object_identity_id: descendant,
                    ancestor_id: id,
                }),
        );

        links.sort_by_key(|l| (l.object_identity_id, l.ancestor_id));
        Ok(links)
    }

    async fn read_entries(&self, filter: &EntryFilter) -> StorageResult<Vec<StoredEntry>> {
        validate_class_type(&filter.class_type)?;

        let security_identity_ids: Option<HashSet<i64>> = if filter.security_identities.is_empty()
        {
            None
        } else {
            Some(
                filter
                    .security_identities
                    .iter()
                    .filter_map(|key| self.security_identities.get(key).map(|id| *id))
                    .collect(),
            )
        };

        let mut rows: Vec<EntryRow> = self
            .entries
            .iter()
            .filter(|e| match (e.object_identity_id, filter.object_identity_id) {
                (Some(linked), Some(wanted)) => linked == wanted,
                (None, _) => e.class_type == filter.class_type,
                (Some(_), None) => false,
            })
            .filter(|e| {
                security_identity_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&e.security_identity_id))
            })
            .map(|e| e.value().clone())
            .collect();

        rows.sort_by(|a, b| {
            (
                a.object_identity_id.is_some(),
                &a.field_name,
                a.ace_order,
                a.id,
            )
                .cmp(&(
                    b.object_identity_id.is_some(),
                    &b.field_name,
                    b.ace_order,
                    b.id,
                ))
        });

        rows.iter().map(|row| self.join(row)).collect()
    }

    #[instrument(skip(self, changes), fields(upserts = changes.upserts.len(), deletes = changes.deletes.len()))]
    async fn write_entries(&self, changes: EntryChangeSet) -> StorageResult<Vec<StoredEntry>> {
        let _guard = self.write_lock.lock().await;

        // Validate everything before touching any table.
        for write in &changes.upserts {
            validate_entry_write(write)?;
            if let Some(id) = write.id {
                if !self.entries.contains_key(&id) {
                    return Err(StorageError::EntryNotFound { id });
                }
            }
            if let Some(object_identity_id) = write.object_identity_id {
                let row_class = self
                    .object_identities
                    .get(&object_identity_id)
                    .map(|r| r.class_type.clone())
                    .ok_or(StorageError::ObjectIdentityNotFound {
                        id: object_identity_id,
                    })?;
                if row_class != write.class_type {
                    return Err(StorageError::InvalidInput {
                        message: format!(
                            "entry class '{}' does not match object identity class '{}'",
                            write.class_type, row_class
                        ),
                    });
                }
            }
        }

        for id in &changes.deletes {
            self.entries.remove(id);
        }

        let mut persisted = Vec::with_capacity(changes.upserts.len());
        for write in changes.upserts {
            let security_identity_id = self.find_or_create_security_identity(&write.security_identity);
            let id = write
                .id
                .unwrap_or_else(|| self.next_entry_id.fetch_add(1, Ordering::SeqCst) + 1);
            let row = EntryRow {
                id,
                class_type: write.class_type,
                object_identity_id: write.object_identity_id,
                security_identity_id,
                field_name: write.field_name,
                ace_order: write.ace_order,
                mask: write.mask,
                granting: write.granting,
                granting_strategy: write.granting_strategy,
                audit_success: write.audit_success,
                audit_failure: write.audit_failure,
            };
            persisted.push(self.join(&row)?);
            self.entries.insert(id, row);
        }

        Ok(persisted)
    }
}
