//! Access control entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::identity::SecurityIdentity;
use crate::error::{DomainError, DomainResult};

/// How the masks of matching entries are compared against a request.
///
/// The decision itself belongs to the `PermissionGrantingStrategy`
/// collaborator; this is only the tag stored on each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantingStrategy {
    /// Every requested bit must be set in the entry mask.
    All,
    /// At least one requested bit must be set.
    Any,
    /// The entry mask must equal the requested mask.
    Equal,
}

impl GrantingStrategy {
    /// Default used when an entry is created without an explicit strategy.
    pub fn default_for(granting: bool) -> Self {
        if granting {
            GrantingStrategy::All
        } else {
            GrantingStrategy::Any
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantingStrategy::All => "all",
            GrantingStrategy::Any => "any",
            GrantingStrategy::Equal => "equal",
        }
    }
}

impl fmt::Display for GrantingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantingStrategy {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(GrantingStrategy::All),
            "any" => Ok(GrantingStrategy::Any),
            "equal" => Ok(GrantingStrategy::Equal),
            other => Err(DomainError::invalid_argument(format!(
                "unknown granting strategy '{other}'"
            ))),
        }
    }
}

/// Whether an entry is a default for the whole class or bound to one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AceScope {
    Class,
    Object,
}

/// One access control entry.
///
/// Entries are immutable snapshots. The `with_*` methods return a new
/// value and leave the receiver untouched, so an entry already handed out
/// never changes under its holder. The scope tuple (`scope`, `field`) is
/// fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    id: Option<i64>,
    scope: AceScope,
    field: Option<String>,
    security_identity: SecurityIdentity,
    mask: i32,
    granting: bool,
    strategy: GrantingStrategy,
    audit_success: bool,
    audit_failure: bool,
    order: usize,
}

impl Entry {
    /// Creates an unpersisted entry. Failures are audited, successes are not.
    pub fn new(
        scope: AceScope,
        field: Option<String>,
        security_identity: SecurityIdentity,
        mask: i32,
        granting: bool,
        strategy: GrantingStrategy,
    ) -> Self {
        Self {
            id: None,
            scope,
            field,
            security_identity,
            mask,
            granting,
            strategy,
            audit_success: false,
            audit_failure: true,
            order: 0,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn scope(&self) -> AceScope {
        self.scope
    }

    /// Field name for field-scope entries.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn is_field_entry(&self) -> bool {
        self.field.is_some()
    }

    pub fn security_identity(&self) -> &SecurityIdentity {
        &self.security_identity
    }

    pub fn mask(&self) -> i32 {
        self.mask
    }

    pub fn is_granting(&self) -> bool {
        self.granting
    }

    pub fn strategy(&self) -> GrantingStrategy {
        self.strategy
    }

    pub fn is_audit_success(&self) -> bool {
        self.audit_success
    }

    pub fn is_audit_failure(&self) -> bool {
        self.audit_failure
    }

    /// Position of the entry within its bucket.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn with_id(&self, id: Option<i64>) -> Self {
        Self { id, ..self.clone() }
    }

    pub fn with_mask(&self, mask: i32) -> Self {
        Self {
            mask,
            ..self.clone()
        }
    }

    pub fn with_strategy(&self, strategy: GrantingStrategy) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }

    pub fn with_auditing(&self, audit_success: bool, audit_failure: bool) -> Self {
        Self {
            audit_success,
            audit_failure,
            ..self.clone()
        }
    }

    pub fn with_order(&self, order: usize) -> Self {
        Self {
            order,
            ..self.clone()
        }
    }
}

/// Conversion of caller-supplied mask values into the `i32` bitset.
///
/// Integer inputs convert when they fit; floating-point inputs only when
/// they hold an exact integer; strings only when they parse as one.
pub trait IntoMask {
    fn into_mask(self) -> DomainResult<i32>;
}

const INVALID_MASK: &str = "The given mask is not valid. Please provide an integer.";

impl IntoMask for i32 {
    fn into_mask(self) -> DomainResult<i32> {
        Ok(self)
    }
}

macro_rules! impl_into_mask_for_int {
    ($($ty:ty),*) => {
        $(
            impl IntoMask for $ty {
                fn into_mask(self) -> DomainResult<i32> {
                    i32::try_from(self).map_err(|_| DomainError::invalid_argument(INVALID_MASK))
                }
            }
        )*
    };
}

impl_into_mask_for_int!(i8, i16, i64, u8, u16, u32, u64, usize);

impl IntoMask for f64 {
    fn into_mask(self) -> DomainResult<i32> {
        if !self.is_finite()
            || self.fract() != 0.0
            || self < f64::from(i32::MIN)
            || self > f64::from(i32::MAX)
        {
            return Err(DomainError::invalid_argument(INVALID_MASK));
        }
        Ok(self as i32)
    }
}

impl IntoMask for f32 {
    fn into_mask(self) -> DomainResult<i32> {
        f64::from(self).into_mask()
    }
}

impl IntoMask for &str {
    fn into_mask(self) -> DomainResult<i32> {
        self.trim()
            .parse::<i32>()
            .map_err(|_| DomainError::invalid_argument(INVALID_MASK))
    }
}
