//! In-memory editor over the entry buckets of one ACL.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use super::{Acl, AclView, Bucket};
use crate::error::{DomainError, DomainResult};
use crate::model::{AceScope, Entry, GrantingStrategy, IntoMask, SecurityIdentity};

/// An ACL bound to a persisted object identity row whose entries can be
/// inserted, updated and deleted in memory.
///
/// Every edit keeps the orders of the touched bucket contiguous. Edits are
/// not visible to the store until the ACL is handed to
/// `MutableAclProvider::update_acl`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutableAcl {
    acl: Acl,
    row_id: i64,
    /// Persisted entries as of the last load or save, with their scope.
    loaded_entries: HashMap<i64, AceScope>,
    partial: bool,
}

impl MutableAcl {
    /// Binds `acl` to the object identity row `row_id`.
    pub fn new(mut acl: Acl, row_id: i64) -> Self {
        acl.id = Some(row_id);
        let loaded_entries = persisted_entries(&acl);
        Self {
            acl,
            row_id,
            loaded_entries,
            partial: false,
        }
    }

    /// Id of the object identity row this ACL is bound to.
    pub fn row_id(&self) -> i64 {
        self.row_id
    }

    /// Whether stored entries of the object may be missing from this ACL,
    /// because it was loaded with a security identity filter or created
    /// over an existing row. Saving such an ACL keeps the unseen entries
    /// and their relative order.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub(crate) fn mark_partial(&mut self) {
        self.partial = true;
    }

    /// Returns a snapshot of the current state as a read-only ACL.
    pub fn to_acl(&self) -> Acl {
        self.acl.clone()
    }

    pub fn set_entries_inheriting(&mut self, entries_inheriting: bool) {
        self.acl.entries_inheriting = entries_inheriting;
    }

    pub fn set_parent_acl(&mut self, parent: Option<Arc<Acl>>) {
        self.acl.parent = parent;
    }

    // ========== Generic bucket operations ==========

    /// Inserts a new entry at `index`, shifting later entries up by one.
    ///
    /// `index` may equal the bucket length to append. A field bucket that
    /// does not exist yet is created. Without an explicit strategy the
    /// entry uses `All` when granting and `Any` otherwise.
    pub fn insert_ace(
        &mut self,
        bucket: Bucket<'_>,
        security_identity: SecurityIdentity,
        mask: impl IntoMask,
        index: usize,
        granting: bool,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        let mask = mask.into_mask()?;
        if bucket.field() == Some("") {
            return Err(DomainError::invalid_argument("The field name cannot be empty."));
        }

        let len = self.acl.buckets.list(bucket).map_or(0, Vec::len);
        if index > len {
            return Err(DomainError::OutOfBounds {
                message: format!("The index must be in the interval [0, {len}]."),
            });
        }

        let scope = match bucket {
            Bucket::Class | Bucket::ClassField(_) => AceScope::Class,
            Bucket::Object | Bucket::ObjectField(_) => AceScope::Object,
        };
        let entry = Entry::new(
            scope,
            bucket.field().map(str::to_string),
            security_identity,
            mask,
            granting,
            strategy.unwrap_or_else(|| GrantingStrategy::default_for(granting)),
        )
        .with_order(index);

        if let Some(field) = bucket.field() {
            self.acl.register_field(field);
        }
        let list = self.acl.buckets.list_mut_or_create(bucket);
        list.insert(index, entry);
        renumber(list, index + 1);
        Ok(())
    }

    /// Replaces the mask (and the strategy, when given) of the entry at
    /// `index`.
    pub fn update_ace(
        &mut self,
        bucket: Bucket<'_>,
        index: usize,
        mask: impl IntoMask,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        let mask = mask.into_mask()?;
        self.replace_entry(bucket, index, |entry| {
            let updated = entry.with_mask(mask);
            match strategy {
                Some(strategy) => updated.with_strategy(strategy),
                None => updated,
            }
        })
    }

    /// Removes the entry at `index` and closes the gap.
    pub fn delete_ace(&mut self, bucket: Bucket<'_>, index: usize) -> DomainResult<()> {
        let list = self.existing_list_mut(bucket)?;
        if index >= list.len() {
            return Err(index_missing(index));
        }
        list.remove(index);
        renumber(list, index);
        Ok(())
    }

    /// Substitutes the entry at `index` with `f(entry)`, keeping its position.
    pub(crate) fn replace_entry<F>(&mut self, bucket: Bucket<'_>, index: usize, f: F) -> DomainResult<()>
    where
        F: FnOnce(&Entry) -> Entry,
    {
        let list = self.existing_list_mut(bucket)?;
        let current = list.get(index).ok_or_else(|| index_missing(index))?;
        let replacement = f(current).with_order(index);
        list[index] = replacement;
        Ok(())
    }

    fn existing_list_mut(&mut self, bucket: Bucket<'_>) -> DomainResult<&mut Vec<Entry>> {
        self.acl.buckets.list_mut(bucket).ok_or_else(|| {
            DomainError::invalid_argument(format!(
                "The given field \"{}\" does not exist.",
                bucket.field().unwrap_or_default()
            ))
        })
    }

    // ========== Class scope ==========

    pub fn insert_class_ace(
        &mut self,
        security_identity: SecurityIdentity,
        mask: impl IntoMask,
        index: usize,
        granting: bool,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.insert_ace(Bucket::Class, security_identity, mask, index, granting, strategy)
    }

    pub fn insert_class_field_ace(
        &mut self,
        field: &str,
        security_identity: SecurityIdentity,
        mask: impl IntoMask,
        index: usize,
        granting: bool,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.insert_ace(
            Bucket::ClassField(field),
            security_identity,
            mask,
            index,
            granting,
            strategy,
        )
    }

    pub fn update_class_ace(
        &mut self,
        index: usize,
        mask: impl IntoMask,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.update_ace(Bucket::Class, index, mask, strategy)
    }

    pub fn update_class_field_ace(
        &mut self,
        index: usize,
        field: &str,
        mask: impl IntoMask,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.update_ace(Bucket::ClassField(field), index, mask, strategy)
    }

    pub fn delete_class_ace(&mut self, index: usize) -> DomainResult<()> {
        self.delete_ace(Bucket::Class, index)
    }

    pub fn delete_class_field_ace(&mut self, index: usize, field: &str) -> DomainResult<()> {
        self.delete_ace(Bucket::ClassField(field), index)
    }

    // ========== Object scope ==========

    pub fn insert_object_ace(
        &mut self,
        security_identity: SecurityIdentity,
        mask: impl IntoMask,
        index: usize,
        granting: bool,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.insert_ace(Bucket::Object, security_identity, mask, index, granting, strategy)
    }

    pub fn insert_object_field_ace(
        &mut self,
        field: &str,
        security_identity: SecurityIdentity,
        mask: impl IntoMask,
        index: usize,
        granting: bool,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.insert_ace(
            Bucket::ObjectField(field),
            security_identity,
            mask,
            index,
            granting,
            strategy,
        )
    }

    pub fn update_object_ace(
        &mut self,
        index: usize,
        mask: impl IntoMask,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.update_ace(Bucket::Object, index, mask, strategy)
    }

    pub fn update_object_field_ace(
        &mut self,
        index: usize,
        field: &str,
        mask: impl IntoMask,
        strategy: Option<GrantingStrategy>,
    ) -> DomainResult<()> {
        self.update_ace(Bucket::ObjectField(field), index, mask, strategy)
    }

    pub fn delete_object_ace(&mut self, index: usize) -> DomainResult<()> {
        self.delete_ace(Bucket::Object, index)
    }

    pub fn delete_object_field_ace(&mut self, index: usize, field: &str) -> DomainResult<()> {
        self.delete_ace(Bucket::ObjectField(field), index)
    }

    // ========== Persistence support ==========

    pub(crate) fn loaded_entries(&self) -> &HashMap<i64, AceScope> {
        &self.loaded_entries
    }

    /// Assigns persisted ids (in bucket iteration order) after a save.
    pub(crate) fn mark_persisted(&mut self, ids: &[i64]) {
        for (entry, id) in self.acl.buckets.iter_mut().zip(ids) {
            *entry = entry.with_id(Some(*id));
        }
        self.loaded_entries = persisted_entries(&self.acl);
    }
}

impl Deref for MutableAcl {
    type Target = Acl;

    fn deref(&self) -> &Acl {
        &self.acl
    }
}

impl AclView for MutableAcl {
    fn acl(&self) -> &Acl {
        &self.acl
    }

    fn into_acl(self) -> Acl {
        self.acl
    }
}

fn persisted_entries(acl: &Acl) -> HashMap<i64, AceScope> {
    acl.all_entries()
        .filter_map(|entry| entry.id().map(|id| (id, entry.scope())))
        .collect()
}

fn index_missing(index: usize) -> DomainError {
    DomainError::OutOfBounds {
        message: format!("The index \"{index}\" does not exist."),
    }
}

/// Re-derives the orders of `list[from..]` from their positions.
fn renumber(list: &mut [Entry], from: usize) {
    for (position, entry) in list.iter_mut().enumerate().skip(from) {
        *entry = entry.with_order(position);
    }
}
