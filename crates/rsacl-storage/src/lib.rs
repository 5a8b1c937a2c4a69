//! rsacl-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for RSACL, including:
//! - DataStore trait for object identity, closure and entry tables
//! - In-memory implementation for testing and single-process use
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsacl-storage                  │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DataStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use traits::{
    AncestorLink, DataStore, EntryChangeSet, EntryFilter, EntryWrite, SecurityIdentityKey,
    StoredEntry, StoredObjectIdentity, StoredSecurityIdentity,
};
