//! Serialized form of an ACL, used by out-of-process style caches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Acl, EntryBuckets};
use crate::error::{DomainError, DomainResult};
use crate::model::{ObjectIdentity, SecurityIdentity};
use crate::strategy::StrategyRegistry;

#[derive(Debug, Serialize, Deserialize)]
struct AclDocument {
    id: Option<i64>,
    object_identity: ObjectIdentity,
    buckets: EntryBuckets,
    fields: Vec<String>,
    parent: Option<Box<AclDocument>>,
    entries_inheriting: bool,
    loaded_identities: Vec<SecurityIdentity>,
    /// Id of the granting strategy, re-bound through the registry.
    strategy: String,
}

impl AclDocument {
    fn from_acl(acl: &Acl) -> Self {
        Self {
            id: acl.id,
            object_identity: acl.object_identity.clone(),
            buckets: acl.buckets.clone(),
            fields: acl.fields.clone(),
            parent: acl
                .parent
                .as_deref()
                .map(|parent| Box::new(AclDocument::from_acl(parent))),
            entries_inheriting: acl.entries_inheriting,
            loaded_identities: acl.loaded_identities.clone(),
            strategy: acl.strategy.id().to_string(),
        }
    }

    fn into_acl(self, registry: &StrategyRegistry) -> DomainResult<Acl> {
        let parent = match self.parent {
            Some(parent) => Some(Arc::new(parent.into_acl(registry)?)),
            None => None,
        };
        Ok(Acl {
            id: self.id,
            object_identity: self.object_identity,
            buckets: self.buckets,
            fields: self.fields,
            parent,
            entries_inheriting: self.entries_inheriting,
            loaded_identities: self.loaded_identities,
            strategy: registry.get(&self.strategy)?,
        })
    }
}

/// Encodes ACLs, including their parent chain, to JSON and back.
#[derive(Debug, Clone)]
pub struct AclCodec {
    registry: Arc<StrategyRegistry>,
}

impl AclCodec {
    pub fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self { registry }
    }

    pub fn encode(&self, acl: &Acl) -> DomainResult<Vec<u8>> {
        serde_json::to_vec(&AclDocument::from_acl(acl)).map_err(|e| DomainError::Serialization {
            message: e.to_string(),
        })
    }

    pub fn decode(&self, bytes: &[u8]) -> DomainResult<Acl> {
        let document: AclDocument =
            serde_json::from_slice(bytes).map_err(|e| DomainError::Serialization {
                message: e.to_string(),
            })?;
        document.into_acl(&self.registry)
    }
}
