//! ACL value types.
//!
//! This module contains:
//! - Object and security identities
//! - Access control entries and their granting strategy tag
//! - Row records exchanged with the persistence collaborator

mod entry;
mod identity;
mod records;

pub use entry::{AceScope, Entry, GrantingStrategy, IntoMask};
pub use identity::{parse_security_identities, ObjectIdentity, SecurityIdentity};
pub use records::{ClosureLink, EntryChanges, EntryDraft, EntryRecord, ObjectIdentityRow};
