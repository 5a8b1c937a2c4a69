//! ACL providers.
//!
//! [`AclProvider`] resolves read-only ACLs; [`MutableAclProvider`] adds
//! creation, persistence of edits and deletion on top of it.

mod acl_provider;
mod config;
mod factory;
mod mutable_provider;
mod traits;

#[cfg(test)]
pub(crate) mod tests;

pub use acl_provider::AclProvider;
pub use config::ProviderConfig;
pub use factory::{AclFactory, AuditableAclFactory, MutableAclFactory, PlainAclFactory};
pub use mutable_provider::{AuditableAclProvider, MutableAclProvider};
pub use traits::{AclCache, AclStore};
