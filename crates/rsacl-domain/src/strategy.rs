//! Permission granting strategy collaborator.
//!
//! The ACL never interprets masks itself. Every `is_granted` question is
//! forwarded to a strategy, which is identified by a stable id so a decoded
//! ACL can be re-bound to the same strategy instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::acl::Acl;
use crate::error::{DomainError, DomainResult};
use crate::model::SecurityIdentity;

/// Decides whether an ACL grants the requested masks.
pub trait PermissionGrantingStrategy: Send + Sync + fmt::Debug {
    /// Stable identifier used when ACLs are encoded.
    fn id(&self) -> &str;

    fn is_granted(
        &self,
        acl: &Acl,
        masks: &[i32],
        identities: &[SecurityIdentity],
        administrative_mode: bool,
    ) -> bool;

    fn is_field_granted(
        &self,
        acl: &Acl,
        field: &str,
        masks: &[i32],
        identities: &[SecurityIdentity],
        administrative_mode: bool,
    ) -> bool;
}

/// Lookup of strategies by id.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn PermissionGrantingStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding exactly one strategy.
    pub fn single(strategy: Arc<dyn PermissionGrantingStrategy>) -> Self {
        Self::new().with_strategy(strategy)
    }

    /// Adds a strategy, replacing any previous one with the same id.
    pub fn with_strategy(mut self, strategy: Arc<dyn PermissionGrantingStrategy>) -> Self {
        self.register(strategy);
        self
    }

    pub fn register(&mut self, strategy: Arc<dyn PermissionGrantingStrategy>) {
        self.strategies.insert(strategy.id().to_string(), strategy);
    }

    pub fn get(&self, id: &str) -> DomainResult<Arc<dyn PermissionGrantingStrategy>> {
        self.strategies
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::Serialization {
                message: format!("unknown permission granting strategy '{id}'"),
            })
    }
}
