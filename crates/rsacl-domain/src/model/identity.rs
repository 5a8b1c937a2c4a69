//! Object and security identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// The `(type, identifier)` key naming the object an ACL governs
/// (e.g., "Document:42").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// The type discriminator (e.g., "Document").
    pub object_type: String,
    /// The identifier within the type (e.g., "42").
    pub identifier: String,
}

impl ObjectIdentity {
    /// Creates a new ObjectIdentity from type and identifier.
    pub fn new(object_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Parses an identity from "type:identifier" format.
    ///
    /// Only the first colon separates the parts, so identifiers may
    /// contain colons themselves.
    pub fn parse(value: &str) -> DomainResult<Self> {
        let (object_type, identifier) = value.split_once(':').ok_or_else(|| {
            DomainError::invalid_argument(format!(
                "object identity '{value}' must be in 'type:identifier' format"
            ))
        })?;
        if object_type.is_empty() || identifier.is_empty() {
            return Err(DomainError::invalid_argument(
                "object identity type and identifier cannot be empty",
            ));
        }
        Ok(Self::new(object_type, identifier))
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.identifier)
    }
}

/// The principal an entry applies to.
///
/// Compared by value: two `Role("ROLE_USER")` instances are the same
/// identity no matter where they were loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SecurityIdentity {
    /// A role shared by many principals.
    Role(String),
    /// An individual principal, usually a username.
    Principal(String),
}

impl SecurityIdentity {
    pub fn role(name: impl Into<String>) -> Self {
        SecurityIdentity::Role(name.into())
    }

    pub fn principal(name: impl Into<String>) -> Self {
        SecurityIdentity::Principal(name.into())
    }

    /// Returns the role name or username.
    pub fn identifier(&self) -> &str {
        match self {
            SecurityIdentity::Role(name) | SecurityIdentity::Principal(name) => name,
        }
    }

    pub fn is_principal(&self) -> bool {
        matches!(self, SecurityIdentity::Principal(_))
    }
}

impl fmt::Display for SecurityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityIdentity::Role(name) => write!(f, "role:{name}"),
            SecurityIdentity::Principal(name) => write!(f, "principal:{name}"),
        }
    }
}

impl FromStr for SecurityIdentity {
    type Err = DomainError;

    /// Parses "role:NAME" or "principal:NAME".
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || {
            DomainError::invalid_argument(format!(
                "security identity '{value}' must be 'role:NAME' or 'principal:NAME'"
            ))
        };
        let (kind, name) = value.split_once(':').ok_or_else(malformed)?;
        if name.is_empty() {
            return Err(malformed());
        }
        match kind {
            "role" => Ok(SecurityIdentity::role(name)),
            "principal" => Ok(SecurityIdentity::principal(name)),
            _ => Err(malformed()),
        }
    }
}

/// Parses a list of "kind:NAME" strings, failing on the first malformed one.
pub fn parse_security_identities<I, S>(values: I) -> DomainResult<Vec<SecurityIdentity>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| value.as_ref().parse())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_identity_parse() {
        let identity = ObjectIdentity::parse("Document:42").unwrap();
        assert_eq!(identity, ObjectIdentity::new("Document", "42"));
        assert_eq!(identity.to_string(), "Document:42");
    }

    #[test]
    fn test_object_identity_parse_keeps_colons_in_identifier() {
        let identity = ObjectIdentity::parse("Url:https://example.com").unwrap();
        assert_eq!(identity.object_type, "Url");
        assert_eq!(identity.identifier, "https://example.com");
    }

    #[test]
    fn test_object_identity_parse_rejects_malformed() {
        assert!(ObjectIdentity::parse("Document").is_err());
        assert!(ObjectIdentity::parse(":42").is_err());
        assert!(ObjectIdentity::parse("Document:").is_err());
    }

    #[test]
    fn test_security_identity_value_equality() {
        assert_eq!(SecurityIdentity::role("ROLE_USER"), SecurityIdentity::role("ROLE_USER"));
        assert_ne!(SecurityIdentity::role("alice"), SecurityIdentity::principal("alice"));
    }

    #[test]
    fn test_security_identity_from_str() {
        assert_eq!(
            "role:ROLE_USER".parse::<SecurityIdentity>().unwrap(),
            SecurityIdentity::role("ROLE_USER")
        );
        assert_eq!(
            "principal:alice".parse::<SecurityIdentity>().unwrap(),
            SecurityIdentity::principal("alice")
        );
        assert!(matches!(
            "group:eng".parse::<SecurityIdentity>(),
            Err(DomainError::InvalidArgument { .. })
        ));
        assert!("role:".parse::<SecurityIdentity>().is_err());
        assert!("alice".parse::<SecurityIdentity>().is_err());
    }

    #[test]
    fn test_parse_security_identities_fails_on_malformed_entry() {
        let parsed = parse_security_identities(["role:ROLE_USER", "principal:bob"]).unwrap();
        assert_eq!(parsed.len(), 2);

        let result = parse_security_identities(["role:ROLE_USER", "bogus"]);
        assert!(matches!(result, Err(DomainError::InvalidArgument { .. })));
    }

    #[test]
    fn test_security_identity_serde_shape() {
        let json = serde_json::to_string(&SecurityIdentity::role("ROLE_USER")).unwrap();
        assert_eq!(json, r#"{"kind":"role","value":"ROLE_USER"}"#);
    }
}
