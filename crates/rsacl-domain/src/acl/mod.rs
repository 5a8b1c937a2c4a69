//! The ACL aggregate and its editors.
//!
//! An [`Acl`] holds four ordered entry buckets:
//!
//! ```text
//!                 │ plain        │ field-keyed
//! ────────────────┼──────────────┼──────────────────────────
//!  class scope    │ class_aces   │ class_field_aces[field]
//!  object scope   │ object_aces  │ object_field_aces[field]
//! ```
//!
//! Within each bucket entry orders are `0..n-1` without gaps. Every field key
//! present in either field-keyed map is listed in `fields()`.
//!
//! [`MutableAcl`] and [`AuditableAcl`] wrap an `Acl` and edit its buckets in
//! memory; persisting the edits is the provider's job.

mod auditable;
mod codec;
#[cfg(test)]
mod editor_proptest;
mod mutable;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::model::{Entry, EntryRecord, ObjectIdentity, SecurityIdentity};
use crate::strategy::PermissionGrantingStrategy;

pub use auditable::AuditableAcl;
pub use codec::AclCodec;
pub use mutable::MutableAcl;

/// Addresses one of the four entry buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket<'a> {
    Class,
    ClassField(&'a str),
    Object,
    ObjectField(&'a str),
}

impl<'a> Bucket<'a> {
    pub fn field(&self) -> Option<&'a str> {
        match self {
            Bucket::ClassField(field) | Bucket::ObjectField(field) => Some(field),
            Bucket::Class | Bucket::Object => None,
        }
    }

    fn for_record(record: &'a EntryRecord) -> Self {
        match (record.object_identity_id.is_some(), record.field_name.as_deref()) {
            (false, None) => Bucket::Class,
            (false, Some(field)) => Bucket::ClassField(field),
            (true, None) => Bucket::Object,
            (true, Some(field)) => Bucket::ObjectField(field),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EntryBuckets {
    class_aces: Vec<Entry>,
    class_field_aces: BTreeMap<String, Vec<Entry>>,
    object_aces: Vec<Entry>,
    object_field_aces: BTreeMap<String, Vec<Entry>>,
}

impl EntryBuckets {
    /// Returns `None` for an unknown field key.
    pub(crate) fn list(&self, bucket: Bucket<'_>) -> Option<&Vec<Entry>> {
        match bucket {
            Bucket::Class => Some(&self.class_aces),
            Bucket::ClassField(field) => self.class_field_aces.get(field),
            Bucket::Object => Some(&self.object_aces),
            Bucket::ObjectField(field) => self.object_field_aces.get(field),
        }
    }

    pub(crate) fn list_mut(&mut self, bucket: Bucket<'_>) -> Option<&mut Vec<Entry>> {
        match bucket {
            Bucket::Class => Some(&mut self.class_aces),
            Bucket::ClassField(field) => self.class_field_aces.get_mut(field),
            Bucket::Object => Some(&mut self.object_aces),
            Bucket::ObjectField(field) => self.object_field_aces.get_mut(field),
        }
    }

    pub(crate) fn list_mut_or_create(&mut self, bucket: Bucket<'_>) -> &mut Vec<Entry> {
        match bucket {
            Bucket::Class => &mut self.class_aces,
            Bucket::ClassField(field) => self.class_field_aces.entry(field.to_string()).or_default(),
            Bucket::Object => &mut self.object_aces,
            Bucket::ObjectField(field) => {
                self.object_field_aces.entry(field.to_string()).or_default()
            }
        }
    }

    /// Class, class-field, object, object-field; field maps in key order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.class_aces
            .iter()
            .chain(self.class_field_aces.values().flatten())
            .chain(self.object_aces.iter())
            .chain(self.object_field_aces.values().flatten())
    }

    /// Same order as [`EntryBuckets::iter`].
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.class_aces
            .iter_mut()
            .chain(self.class_field_aces.values_mut().flatten())
            .chain(self.object_aces.iter_mut())
            .chain(self.object_field_aces.values_mut().flatten())
    }
}

/// Everything needed to build an ACL.
#[derive(Debug, Clone)]
pub struct AclParts {
    /// Persisted object identity row id, when one exists.
    pub id: Option<i64>,
    pub object_identity: ObjectIdentity,
    pub entries: Vec<EntryRecord>,
    pub loaded_identities: Vec<SecurityIdentity>,
    pub parent: Option<Arc<Acl>>,
    pub entries_inheriting: bool,
    pub strategy: Arc<dyn PermissionGrantingStrategy>,
    /// Set when `entries` may omit stored entries of the object, e.g. after
    /// a security identity filter. Editors built from partial parts place
    /// their entries among the unseen ones when saved.
    pub partial: bool,
}

/// Read-only access control list for one object identity.
#[derive(Debug, Clone)]
pub struct Acl {
    id: Option<i64>,
    object_identity: ObjectIdentity,
    buckets: EntryBuckets,
    fields: Vec<String>,
    parent: Option<Arc<Acl>>,
    entries_inheriting: bool,
    loaded_identities: Vec<SecurityIdentity>,
    strategy: Arc<dyn PermissionGrantingStrategy>,
}

impl Acl {
    /// Partitions the entry records into the four buckets.
    ///
    /// Records are placed by their stored order; the resulting orders are
    /// their positions within each bucket.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if a record belongs to another object type.
    pub fn new(parts: AclParts) -> DomainResult<Self> {
        let mut acl = Self {
            id: parts.id,
            object_identity: parts.object_identity,
            buckets: EntryBuckets::default(),
            fields: Vec::new(),
            parent: parts.parent,
            entries_inheriting: parts.entries_inheriting,
            loaded_identities: parts.loaded_identities,
            strategy: parts.strategy,
        };

        let mut records = parts.entries;
        records.sort_by_key(|r| (r.order, r.id));

        for record in &records {
            if record.object_type != acl.object_identity.object_type {
                return Err(DomainError::TypeMismatch {
                    expected: acl.object_identity.object_type.clone(),
                    found: record.object_type.clone(),
                });
            }

            let bucket = Bucket::for_record(record);
            if let Some(field) = bucket.field() {
                acl.register_field(field);
            }
            let list = acl.buckets.list_mut_or_create(bucket);
            let order = list.len();
            list.push(record.to_entry(order));
        }

        Ok(acl)
    }

    /// Persisted object identity row id.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn object_identity(&self) -> &ObjectIdentity {
        &self.object_identity
    }

    pub fn class_aces(&self) -> &[Entry] {
        &self.buckets.class_aces
    }

    /// Class-scope entries for `field`; empty for an unknown field.
    pub fn class_field_aces(&self, field: &str) -> &[Entry] {
        self.entries(Bucket::ClassField(field))
    }

    pub fn object_aces(&self) -> &[Entry] {
        &self.buckets.object_aces
    }

    /// Object-scope entries for `field`; empty for an unknown field.
    pub fn object_field_aces(&self, field: &str) -> &[Entry] {
        self.entries(Bucket::ObjectField(field))
    }

    /// Entries of any bucket.
    pub fn entries(&self, bucket: Bucket<'_>) -> &[Entry] {
        self.buckets.list(bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every entry of the ACL (not of its parents).
    pub fn all_entries(&self) -> impl Iterator<Item = &Entry> {
        self.buckets.iter()
    }

    pub fn parent_acl(&self) -> Option<&Arc<Acl>> {
        self.parent.as_ref()
    }

    pub fn is_entries_inheriting(&self) -> bool {
        self.entries_inheriting
    }

    /// Field names known to this ACL, in order of first appearance.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn loaded_identities(&self) -> &[SecurityIdentity] {
        &self.loaded_identities
    }

    pub fn strategy(&self) -> &Arc<dyn PermissionGrantingStrategy> {
        &self.strategy
    }

    pub fn is_granted(
        &self,
        masks: &[i32],
        identities: &[SecurityIdentity],
        administrative_mode: bool,
    ) -> bool {
        self.strategy
            .is_granted(self, masks, identities, administrative_mode)
    }

    pub fn is_field_granted(
        &self,
        field: &str,
        masks: &[i32],
        identities: &[SecurityIdentity],
        administrative_mode: bool,
    ) -> bool {
        self.strategy
            .is_field_granted(self, field, masks, identities, administrative_mode)
    }

    /// Whether entries were loaded for every identity in `identities`.
    ///
    /// Compares by value. An empty query is trivially loaded.
    pub fn is_identity_loaded(&self, identities: &[SecurityIdentity]) -> bool {
        identities
            .iter()
            .all(|identity| self.loaded_identities.contains(identity))
    }

    fn register_field(&mut self, field: &str) {
        if !self.fields.iter().any(|f| f == field) {
            self.fields.push(field.to_string());
        }
    }
}

impl PartialEq for Acl {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.object_identity == other.object_identity
            && self.buckets == other.buckets
            && self.fields == other.fields
            && self.parent == other.parent
            && self.entries_inheriting == other.entries_inheriting
            && self.loaded_identities == other.loaded_identities
            && self.strategy.id() == other.strategy.id()
    }
}

/// Common view over the ACL flavours a provider can build.
pub trait AclView: Send + Sync + fmt::Debug {
    fn acl(&self) -> &Acl;

    fn into_acl(self) -> Acl
    where
        Self: Sized;
}

impl AclView for Acl {
    fn acl(&self) -> &Acl {
        self
    }

    fn into_acl(self) -> Acl {
        self
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::GrantingStrategy;
    use crate::provider::tests::mocks::RecordingStrategy;

    pub(crate) fn record(
        id: i64,
        object_identity_id: Option<i64>,
        field: Option<&str>,
        identity: SecurityIdentity,
        order: usize,
        mask: i32,
    ) -> EntryRecord {
        EntryRecord {
            id,
            object_type: "Document".to_string(),
            object_identity_id,
            security_identity_id: id * 100,
            security_identity: identity,
            field_name: field.map(str::to_string),
            order,
            mask,
            granting: true,
            strategy: GrantingStrategy::All,
            audit_success: false,
            audit_failure: true,
        }
    }

    pub(crate) fn parts(entries: Vec<EntryRecord>) -> AclParts {
        AclParts {
            id: Some(1),
            object_identity: ObjectIdentity::new("Document", "42"),
            entries,
            loaded_identities: vec![SecurityIdentity::role("ROLE_USER")],
            parent: None,
            entries_inheriting: true,
            strategy: Arc::new(RecordingStrategy::new(true)),
            partial: false,
        }
    }
}
