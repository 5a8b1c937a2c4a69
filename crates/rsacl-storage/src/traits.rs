//! DataStore trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Maximum length of a class discriminator or object identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 200;

/// A stored object identity row.
///
/// Rows are unique by `(class_type, identifier)`. `parent_id` forms a forest:
/// every row has at most one parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObjectIdentity {
    pub id: i64,
    pub class_type: String,
    pub identifier: String,
    pub parent_id: Option<i64>,
    pub entries_inheriting: bool,
}

/// A stored security identity (role or principal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredSecurityIdentity {
    pub id: i64,
    pub identifier: String,
    /// `true` for an individual principal, `false` for a role.
    pub principal: bool,
}

/// Lookup key for a security identity, used in filters and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityIdentityKey {
    pub identifier: String,
    pub principal: bool,
}

impl SecurityIdentityKey {
    /// Creates a new key.
    pub fn new(identifier: impl Into<String>, principal: bool) -> Self {
        Self {
            identifier: identifier.into(),
            principal,
        }
    }
}

/// A stored access control entry, joined with its security identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: i64,
    pub class_type: String,
    /// `None` for class-scope entries.
    pub object_identity_id: Option<i64>,
    pub security_identity: StoredSecurityIdentity,
    pub field_name: Option<String>,
    pub ace_order: u32,
    pub mask: i32,
    pub granting: bool,
    pub granting_strategy: String,
    pub audit_success: bool,
    pub audit_failure: bool,
}

/// An entry to insert (`id == None`) or overwrite (`id == Some`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWrite {
    pub id: Option<i64>,
    pub class_type: String,
    pub object_identity_id: Option<i64>,
    pub security_identity: SecurityIdentityKey,
    pub field_name: Option<String>,
    pub ace_order: u32,
    pub mask: i32,
    pub granting: bool,
    pub granting_strategy: String,
    pub audit_success: bool,
    pub audit_failure: bool,
}

/// A set of entry changes applied atomically.
#[derive(Debug, Clone, Default)]
pub struct EntryChangeSet {
    pub upserts: Vec<EntryWrite>,
    pub deletes: Vec<i64>,
}

/// Filter for reading entries.
///
/// Matches entries linked to `object_identity_id` (when set) and the
/// class-scope entries of `class_type`. A non-empty `security_identities`
/// list further restricts the result to those principals.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub class_type: String,
    pub object_identity_id: Option<i64>,
    pub security_identities: Vec<SecurityIdentityKey>,
}

/// One `(descendant, ancestor)` pair of the ancestor closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AncestorLink {
    pub object_identity_id: i64,
    pub ancestor_id: i64,
}

/// Abstract storage interface for ACL data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations. The ancestor closure is maintained by the store
/// whenever a row's parent changes and never contains self-links.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Object identity operations

    /// Finds a row by its `(class_type, identifier)` pair.
    async fn find_object_identity(
        &self,
        class_type: &str,
        identifier: &str,
    ) -> StorageResult<Option<StoredObjectIdentity>>;

    /// Gets a row by id.
    async fn get_object_identity(&self, id: i64) -> StorageResult<StoredObjectIdentity>;

    /// Finds a row by `(class_type, identifier)` or creates it
    /// (no parent, inheriting entries).
    async fn find_or_create_object_identity(
        &self,
        class_type: &str,
        identifier: &str,
    ) -> StorageResult<StoredObjectIdentity>;

    /// Persists the parent link and inheritance flag of an existing row.
    async fn save_object_identity(
        &self,
        row: &StoredObjectIdentity,
    ) -> StorageResult<StoredObjectIdentity>;

    /// Deletes a childless row together with its object-scope entries.
    async fn delete_object_identity(&self, id: i64) -> StorageResult<()>;

    /// Lists rows whose parent is `parent_id`.
    async fn list_child_object_identities(
        &self,
        parent_id: i64,
    ) -> StorageResult<Vec<StoredObjectIdentity>>;

    /// Lists rows by id. Unknown ids are skipped.
    async fn list_object_identities(&self, ids: &[i64])
        -> StorageResult<Vec<StoredObjectIdentity>>;

    // Closure operations

    /// Reads every closure link in which `id` is either the descendant
    /// or the ancestor.
    async fn read_ancestor_links(&self, id: i64) -> StorageResult<Vec<AncestorLink>>;

    // Entry operations

    /// Reads entries matching the filter, ordered by scope, field and
    /// `ace_order`.
    async fn read_entries(&self, filter: &EntryFilter) -> StorageResult<Vec<StoredEntry>>;

    /// Applies inserts, overwrites and deletes atomically. Returns the
    /// persisted upserts in input order.
    async fn write_entries(&self, changes: EntryChangeSet) -> StorageResult<Vec<StoredEntry>>;
}

/// Validates a class discriminator.
pub fn validate_class_type(class_type: &str) -> StorageResult<()> {
    validate_identifier_like("class_type", class_type)
}

/// Validates an object identifier.
pub fn validate_identifier(identifier: &str) -> StorageResult<()> {
    validate_identifier_like("identifier", identifier)
}

fn validate_identifier_like(name: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidInput {
            message: format!("{name} cannot be empty"),
        });
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!(
                "{name} exceeds maximum length of {MAX_IDENTIFIER_LENGTH} characters"
            ),
        });
    }
    Ok(())
}

/// Validates an entry before it is written.
pub fn validate_entry_write(entry: &EntryWrite) -> StorageResult<()> {
    validate_class_type(&entry.class_type)?;
    if entry.security_identity.identifier.is_empty() {
        return Err(StorageError::InvalidInput {
            message: "security identity cannot be empty".to_string(),
        });
    }
    if entry.granting_strategy.is_empty() {
        return Err(StorageError::InvalidInput {
            message: "granting strategy cannot be empty".to_string(),
        });
    }
    if let Some(field) = &entry.field_name {
        if field.is_empty() {
            return Err(StorageError::InvalidInput {
                message: "field name cannot be empty".to_string(),
            });
        }
    }
    Ok(())
}
