//! rsacl-domain: Core ACL domain logic
//!
//! This crate contains the access control list model and its providers:
//! - Object/security identities and access control entries
//! - The ACL aggregate with its mutable and auditable editors
//! - Hierarchy resolution over the ancestor closure
//! - Read and write providers with optional caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                rsacl-domain                  │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Identities, entries, rows    │
//! │  acl/        - ACL aggregate & editors      │
//! │  strategy    - Granting strategy seam       │
//! │  hierarchy/  - Parent/child resolution      │
//! │  provider/   - Read & write providers       │
//! │  cache/      - ACL caching                  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod acl;
pub mod cache;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod provider;
pub mod strategy;

// Re-export commonly used types at the crate root
pub use acl::{Acl, AclCodec, AclView, AuditableAcl, Bucket, MutableAcl};
pub use cache::{AclCacheConfig, MokaAclCache};
pub use error::{DomainError, DomainResult};
pub use model::{Entry, GrantingStrategy, ObjectIdentity, SecurityIdentity};
pub use provider::{AclProvider, AuditableAclProvider, MutableAclProvider, ProviderConfig};
pub use strategy::{PermissionGrantingStrategy, StrategyRegistry};
