//! Construction of the concrete ACL flavour a provider hands out.

use std::sync::Arc;

use async_trait::async_trait;

use super::traits::AclStore;
use crate::acl::{Acl, AclParts, AclView, AuditableAcl, MutableAcl};
use crate::error::DomainResult;

/// Builds the ACL type returned by a provider.
#[async_trait]
pub trait AclFactory: Send + Sync {
    type Output: AclView;

    /// Builds an ACL from freshly loaded parts.
    async fn build_acl(&self, parts: AclParts) -> DomainResult<Self::Output>;

    /// Wraps an ACL served from the cache.
    async fn from_cached(&self, acl: Acl) -> DomainResult<Self::Output>;
}

/// Builds read-only [`Acl`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainAclFactory;

#[async_trait]
impl AclFactory for PlainAclFactory {
    type Output = Acl;

    async fn build_acl(&self, parts: AclParts) -> DomainResult<Acl> {
        Acl::new(parts)
    }

    async fn from_cached(&self, acl: Acl) -> DomainResult<Acl> {
        Ok(acl)
    }
}

/// Builds [`MutableAcl`]s, creating the backing row when it is missing.
pub struct MutableAclFactory<S> {
    store: Arc<S>,
}

impl<S> MutableAclFactory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: AclStore> MutableAclFactory<S> {
    async fn bind(&self, acl: Acl) -> DomainResult<MutableAcl> {
        let row_id = match acl.id() {
            Some(id) => id,
            None => self.store.find_or_create_row(acl.object_identity()).await?.id,
        };
        Ok(MutableAcl::new(acl, row_id))
    }
}

#[async_trait]
impl<S: AclStore + 'static> AclFactory for MutableAclFactory<S> {
    type Output = MutableAcl;

    async fn build_acl(&self, parts: AclParts) -> DomainResult<MutableAcl> {
        let partial = parts.partial;
        let mut acl = self.bind(Acl::new(parts)?).await?;
        if partial {
            acl.mark_partial();
        }
        Ok(acl)
    }

    async fn from_cached(&self, acl: Acl) -> DomainResult<MutableAcl> {
        self.bind(acl).await
    }
}

/// Builds [`AuditableAcl`]s.
pub struct AuditableAclFactory<S> {
    inner: MutableAclFactory<S>,
}

impl<S> AuditableAclFactory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            inner: MutableAclFactory::new(store),
        }
    }
}

#[async_trait]
impl<S: AclStore + 'static> AclFactory for AuditableAclFactory<S> {
    type Output = AuditableAcl;

    async fn build_acl(&self, parts: AclParts) -> DomainResult<AuditableAcl> {
        self.inner.build_acl(parts).await.map(AuditableAcl::new)
    }

    async fn from_cached(&self, acl: Acl) -> DomainResult<AuditableAcl> {
        self.inner.from_cached(acl).await.map(AuditableAcl::new)
    }
}
