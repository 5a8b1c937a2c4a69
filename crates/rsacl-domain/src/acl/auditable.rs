//! Mutable ACL with per-entry audit flags.

use std::ops::{Deref, DerefMut};

use super::{Acl, AclView, Bucket, MutableAcl};
use crate::error::DomainResult;

/// A [`MutableAcl`] whose entries' audit flags can be changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditableAcl {
    inner: MutableAcl,
}

impl AuditableAcl {
    pub fn new(inner: MutableAcl) -> Self {
        Self { inner }
    }

    pub fn into_mutable(self) -> MutableAcl {
        self.inner
    }

    /// Replaces the entry at `index` with one carrying the given flags.
    pub fn update_auditing(
        &mut self,
        bucket: Bucket<'_>,
        index: usize,
        audit_success: bool,
        audit_failure: bool,
    ) -> DomainResult<()> {
        self.inner.replace_entry(bucket, index, |entry| {
            entry.with_auditing(audit_success, audit_failure)
        })
    }

    pub fn update_class_auditing(
        &mut self,
        index: usize,
        audit_success: bool,
        audit_failure: bool,
    ) -> DomainResult<()> {
        self.update_auditing(Bucket::Class, index, audit_success, audit_failure)
    }

    pub fn update_class_field_auditing(
        &mut self,
        index: usize,
        field: &str,
        audit_success: bool,
        audit_failure: bool,
    ) -> DomainResult<()> {
        self.update_auditing(Bucket::ClassField(field), index, audit_success, audit_failure)
    }

    pub fn update_object_auditing(
        &mut self,
        index: usize,
        audit_success: bool,
        audit_failure: bool,
    ) -> DomainResult<()> {
        self.update_auditing(Bucket::Object, index, audit_success, audit_failure)
    }

    pub fn update_object_field_auditing(
        &mut self,
        index: usize,
        field: &str,
        audit_success: bool,
        audit_failure: bool,
    ) -> DomainResult<()> {
        self.update_auditing(Bucket::ObjectField(field), index, audit_success, audit_failure)
    }
}

impl Deref for AuditableAcl {
    type Target = MutableAcl;

    fn deref(&self) -> &MutableAcl {
        &self.inner
    }
}

impl DerefMut for AuditableAcl {
    fn deref_mut(&mut self) -> &mut MutableAcl {
        &mut self.inner
    }
}

impl AclView for AuditableAcl {
    fn acl(&self) -> &Acl {
        self.inner.acl()
    }

    fn into_acl(self) -> Acl {
        self.inner.into_acl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::test_support::parts;
    use crate::error::DomainError;
    use crate::model::SecurityIdentity;

    fn auditable() -> AuditableAcl {
        let mut acl = AuditableAcl::new(MutableAcl::new(Acl::new(parts(vec![])).unwrap(), 1));
        acl.insert_object_ace(SecurityIdentity::role("ROLE_USER"), 64, 0, true, None)
            .unwrap();
        acl.insert_object_ace(SecurityIdentity::role("ROLE_ADMIN"), 128, 1, true, None)
            .unwrap();
        acl
    }

    fn flags(acl: &AuditableAcl, index: usize) -> (bool, bool) {
        let entry = &acl.object_aces()[index];
        (entry.is_audit_success(), entry.is_audit_failure())
    }

    #[test]
    fn test_update_auditing_toggle_sequence() {
        let mut acl = auditable();

        for expected in [(true, true), (false, true), (true, false), (false, false)] {
            acl.update_object_auditing(0, expected.0, expected.1).unwrap();
            assert_eq!(flags(&acl, 0), expected);
            // Other entry keeps the defaults
            assert_eq!(flags(&acl, 1), (false, true));
        }
    }

    #[test]
    fn test_update_auditing_keeps_position_and_content() {
        let mut acl = auditable();
        let before = acl.object_aces()[1].clone();

        acl.update_object_auditing(1, true, false).unwrap();

        let after = &acl.object_aces()[1];
        assert_eq!(after.order(), 1);
        assert_eq!(after.mask(), before.mask());
        assert_eq!(after.security_identity(), before.security_identity());
        assert!(!before.is_audit_success());
    }

    #[test]
    fn test_update_auditing_validates_index_and_field() {
        let mut acl = auditable();
        assert!(matches!(
            acl.update_object_auditing(5, true, true),
            Err(DomainError::OutOfBounds { .. })
        ));
        assert!(matches!(
            acl.update_class_field_auditing(0, "title", true, true),
            Err(DomainError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_field_auditing() {
        let mut acl = auditable();
        acl.insert_class_field_ace("title", SecurityIdentity::principal("alice"), 1, 0, true, None)
            .unwrap();
        acl.update_class_field_auditing(0, "title", true, true)
            .unwrap();

        let entry = &acl.class_field_aces("title")[0];
        assert!(entry.is_audit_success());
        assert!(entry.is_audit_failure());
    }
}
