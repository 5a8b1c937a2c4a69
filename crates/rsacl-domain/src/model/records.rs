//! Row-level records exchanged with the persistence collaborator.

use super::entry::{AceScope, Entry, GrantingStrategy};
use super::identity::{ObjectIdentity, SecurityIdentity};

/// A persisted object identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentityRow {
    pub id: i64,
    pub identity: ObjectIdentity,
    pub parent_id: Option<i64>,
    pub entries_inheriting: bool,
}

/// A persisted entry as loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub id: i64,
    pub object_type: String,
    /// `None` for class-scope entries.
    pub object_identity_id: Option<i64>,
    pub security_identity: SecurityIdentity,
    /// Persisted id of the security identity, used for deduplication.
    pub security_identity_id: i64,
    pub field_name: Option<String>,
    pub order: usize,
    pub mask: i32,
    pub granting: bool,
    pub strategy: GrantingStrategy,
    pub audit_success: bool,
    pub audit_failure: bool,
}

impl EntryRecord {
    pub fn scope(&self) -> AceScope {
        if self.object_identity_id.is_some() {
            AceScope::Object
        } else {
            AceScope::Class
        }
    }

    /// Converts the record into an entry snapshot placed at `order`.
    pub fn to_entry(&self, order: usize) -> Entry {
        Entry::new(
            self.scope(),
            self.field_name.clone(),
            self.security_identity.clone(),
            self.mask,
            self.granting,
            self.strategy,
        )
        .with_id(Some(self.id))
        .with_auditing(self.audit_success, self.audit_failure)
        .with_order(order)
    }
}

/// An entry to be written. `id == None` inserts, `Some` overwrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub id: Option<i64>,
    pub object_type: String,
    pub object_identity_id: Option<i64>,
    pub security_identity: SecurityIdentity,
    pub field_name: Option<String>,
    pub order: usize,
    pub mask: i32,
    pub granting: bool,
    pub strategy: GrantingStrategy,
    pub audit_success: bool,
    pub audit_failure: bool,
}

impl EntryDraft {
    /// Builds the write for `entry` as it sits in the ACL of `row`.
    pub fn from_entry(entry: &Entry, row: &ObjectIdentityRow) -> Self {
        Self {
            id: entry.id(),
            object_type: row.identity.object_type.clone(),
            object_identity_id: match entry.scope() {
                AceScope::Object => Some(row.id),
                AceScope::Class => None,
            },
            security_identity: entry.security_identity().clone(),
            field_name: entry.field().map(str::to_string),
            order: entry.order(),
            mask: entry.mask(),
            granting: entry.is_granting(),
            strategy: entry.strategy(),
            audit_success: entry.is_audit_success(),
            audit_failure: entry.is_audit_failure(),
        }
    }
}

/// Entry writes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChanges {
    pub upserts: Vec<EntryDraft>,
    pub deletes: Vec<i64>,
}

impl EntryChanges {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// One `(descendant, ancestor)` pair of the ancestor closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClosureLink {
    pub object_identity_id: i64,
    pub ancestor_id: i64,
}
