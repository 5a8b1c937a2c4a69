//! End-to-end ACL lifecycle tests over the in-memory storage backend.
//!
//! These tests wire the providers to `MemoryDataStore` through the
//! adapter, exactly as `AclServices` does in production.

use std::sync::Arc;

use rsacl_domain::acl::Acl;
use rsacl_domain::error::DomainError;
use rsacl_domain::model::{GrantingStrategy, ObjectIdentity, SecurityIdentity};
use rsacl_domain::provider::AclCache;
use rsacl_domain::strategy::PermissionGrantingStrategy;
use rsacl_server::config::ServerConfig;
use rsacl_server::{AclServices, ConfigLoadError};

/// First matching entry decides: object entries before class entries, then
/// the parent when inheriting.
#[derive(Debug)]
struct FirstMatchStrategy;

impl FirstMatchStrategy {
    fn decide(
        acl: &Acl,
        field: Option<&str>,
        masks: &[i32],
        identities: &[SecurityIdentity],
    ) -> Option<bool> {
        let (object, class) = match field {
            Some(field) => (acl.object_field_aces(field), acl.class_field_aces(field)),
            None => (acl.object_aces(), acl.class_aces()),
        };
        for mask in masks {
            for identity in identities {
                let decision = object
                    .iter()
                    .chain(class.iter())
                    .find(|e| e.security_identity() == identity && e.mask() & mask == *mask)
                    .map(|e| e.is_granting());
                if decision.is_some() {
                    return decision;
                }
            }
        }
        if acl.is_entries_inheriting() {
            return acl
                .parent_acl()
                .and_then(|parent| Self::decide(parent, field, masks, identities));
        }
        None
    }
}

impl PermissionGrantingStrategy for FirstMatchStrategy {
    fn id(&self) -> &str {
        "first-match"
    }

    fn is_granted(
        &self,
        acl: &Acl,
        masks: &[i32],
        identities: &[SecurityIdentity],
        _administrative_mode: bool,
    ) -> bool {
        Self::decide(acl, None, masks, identities).unwrap_or(false)
    }

    fn is_field_granted(
        &self,
        acl: &Acl,
        field: &str,
        masks: &[i32],
        identities: &[SecurityIdentity],
        _administrative_mode: bool,
    ) -> bool {
        Self::decide(acl, Some(field), masks, identities).unwrap_or(false)
    }
}

fn services(cache_enabled: bool) -> AclServices<rsacl_storage::MemoryDataStore> {
    let mut config = ServerConfig::default();
    config.cache.enabled = cache_enabled;
    AclServices::from_config(&config, Arc::new(FirstMatchStrategy)).unwrap()
}

fn document(id: &str) -> ObjectIdentity {
    ObjectIdentity::new("Document", id)
}

fn user() -> SecurityIdentity {
    SecurityIdentity::role("ROLE_USER")
}

fn admin() -> SecurityIdentity {
    SecurityIdentity::role("ROLE_ADMIN")
}

// ========== Section 1: Editing and Persistence ==========

#[tokio::test]
async fn test_document_scenario_persists_order_changes() {
    let services = services(false);
    let provider = services.mutable();

    let mut acl = provider.create_acl(&document("42")).await.unwrap();
    acl.insert_object_ace(user(), 64, 0, true, None).unwrap();
    assert_eq!(acl.object_aces()[0].strategy(), GrantingStrategy::All);
    provider.update_acl(&mut acl).await.unwrap();

    acl.insert_object_ace(admin(), 128, 0, true, None).unwrap();
    provider.update_acl(&mut acl).await.unwrap();

    let loaded = services.reader().find_acl(&document("42"), &[]).await.unwrap();
    let aces = loaded.object_aces();
    assert_eq!(aces.len(), 2);
    assert_eq!(aces[0].security_identity(), &admin());
    assert_eq!(aces[1].security_identity(), &user());
    assert_eq!(aces[1].order(), 1);

    let mut acl = provider.find_acl(&document("42"), &[]).await.unwrap();
    acl.delete_object_ace(0).unwrap();
    provider.update_acl(&mut acl).await.unwrap();

    let loaded = services.reader().find_acl(&document("42"), &[]).await.unwrap();
    let aces = loaded.object_aces();
    assert_eq!(aces.len(), 1);
    assert_eq!(aces[0].security_identity(), &user());
    assert_eq!(aces[0].mask(), 64);
    assert_eq!(aces[0].order(), 0);
}

#[tokio::test]
async fn test_class_and_field_entries_round_trip() {
    let services = services(false);
    let provider = services.mutable();

    let mut acl = provider.create_acl(&document("1")).await.unwrap();
    acl.insert_class_ace(admin(), 1, 0, true, None).unwrap();
    acl.insert_class_field_ace("title", user(), 2, 0, false, None)
        .unwrap();
    acl.insert_object_field_ace("body", user(), 4, 0, true, Some(GrantingStrategy::Equal))
        .unwrap();
    provider.update_acl(&mut acl).await.unwrap();

    // Class entries are shared by every object of the type
    let other = services.reader().find_acl(&document("2"), &[]).await.unwrap();
    assert_eq!(other.id(), None);
    assert_eq!(other.class_aces().len(), 1);
    assert_eq!(other.class_field_aces("title").len(), 1);
    assert!(other.object_field_aces("body").is_empty());

    let loaded = services.reader().find_acl(&document("1"), &[]).await.unwrap();
    let body = loaded.object_field_aces("body");
    assert_eq!(body[0].strategy(), GrantingStrategy::Equal);
    let mut fields = loaded.fields().to_vec();
    fields.sort();
    assert_eq!(fields, vec!["body".to_string(), "title".to_string()]);
}

#[tokio::test]
async fn test_audit_flags_are_persisted() {
    let services = services(false);
    let provider = services.auditable();

    let mut acl = provider.create_acl(&document("42")).await.unwrap();
    acl.insert_object_ace(user(), 1, 0, true, None).unwrap();
    acl.update_object_auditing(0, true, false).unwrap();
    provider.update_acl(&mut acl).await.unwrap();

    let loaded = services.reader().find_acl(&document("42"), &[]).await.unwrap();
    assert!(loaded.object_aces()[0].is_audit_success());
    assert!(!loaded.object_aces()[0].is_audit_failure());
}

// ========== Section 2: Hierarchy ==========

#[tokio::test]
async fn test_child_inherits_parent_decision() {
    let services = services(false);
    let provider = services.mutable();

    let mut folder = provider.create_acl(&document("folder")).await.unwrap();
    folder.insert_object_ace(user(), 1, 0, true, None).unwrap();
    provider.update_acl(&mut folder).await.unwrap();

    let mut file = provider.create_acl(&document("file")).await.unwrap();
    file.insert_object_ace(admin(), 2, 0, true, None).unwrap();
    file.set_parent_acl(Some(Arc::new(folder.to_acl())));
    provider.update_acl(&mut file).await.unwrap();

    let loaded = services.reader().find_acl(&document("file"), &[]).await.unwrap();
    assert!(loaded.is_granted(&[1], &[user()], false));
    assert!(loaded.is_granted(&[2], &[admin()], false));
    assert!(!loaded.is_granted(&[4], &[user()], false));

    // Without inheritance the parent no longer decides
    let mut file = provider.find_acl(&document("file"), &[]).await.unwrap();
    file.set_entries_inheriting(false);
    provider.update_acl(&mut file).await.unwrap();

    let loaded = services.reader().find_acl(&document("file"), &[]).await.unwrap();
    assert!(!loaded.is_granted(&[1], &[user()], false));
}

#[tokio::test]
async fn test_reparenting_into_own_subtree_is_rejected() {
    let services = services(false);
    let provider = services.mutable();

    let mut root = provider.create_acl(&document("root")).await.unwrap();
    root.insert_object_ace(user(), 1, 0, true, None).unwrap();
    provider.update_acl(&mut root).await.unwrap();

    let mut child = provider.create_acl(&document("child")).await.unwrap();
    child.insert_object_ace(user(), 1, 0, true, None).unwrap();
    child.set_parent_acl(Some(Arc::new(root.to_acl())));
    provider.update_acl(&mut child).await.unwrap();

    root.set_parent_acl(Some(Arc::new(child.to_acl())));
    let result = provider.update_acl(&mut root).await;

    assert!(matches!(result, Err(DomainError::Storage { .. })));
}

#[tokio::test]
async fn test_delete_acl_removes_subtree() {
    let services = services(true);
    let provider = services.mutable();

    let mut parent_acl: Option<Arc<Acl>> = None;
    for id in ["a", "b", "c"] {
        let mut acl = provider.create_acl(&document(id)).await.unwrap();
        acl.insert_object_ace(user(), 1, 0, true, None).unwrap();
        acl.set_parent_acl(parent_acl.take());
        provider.update_acl(&mut acl).await.unwrap();
        parent_acl = Some(Arc::new(acl.to_acl()));
    }

    let descendants = services
        .reader()
        .find_children(&document("a"), false)
        .await
        .unwrap();
    assert_eq!(descendants.len(), 2);

    provider.delete_acl(&document("a")).await.unwrap();

    for id in ["a", "b", "c"] {
        let result = services.reader().find_acl(&document(id), &[]).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })), "{id}");
    }
}

// ========== Section 3: Caching ==========

#[tokio::test]
async fn test_cached_reader_sees_writes_through_provider() {
    let services = services(true);
    let provider = services.mutable();

    let mut acl = provider.create_acl(&document("42")).await.unwrap();
    acl.insert_object_ace(user(), 1, 0, true, None).unwrap();
    provider.update_acl(&mut acl).await.unwrap();

    let first = services.reader().find_acl(&document("42"), &[]).await.unwrap();
    assert_eq!(first.object_aces()[0].mask(), 1);

    acl.update_object_ace(0, 3, None).unwrap();
    provider.update_acl(&mut acl).await.unwrap();

    let second = services.reader().find_acl(&document("42"), &[]).await.unwrap();
    assert_eq!(second.object_aces()[0].mask(), 3);

    let cache = services.cache().expect("cache should be enabled");
    cache.run_pending_tasks().await;
    assert!(cache.entry_count() >= 1);
}

#[tokio::test]
async fn test_filtered_edit_after_cache_clear_keeps_full_acl_visible() {
    let services = services(true);
    let provider = services.mutable();

    let mut acl = provider.create_acl(&document("42")).await.unwrap();
    acl.insert_object_ace(admin(), 8, 0, true, None).unwrap();
    acl.insert_object_ace(user(), 4, 1, true, None).unwrap();
    provider.update_acl(&mut acl).await.unwrap();

    services.cache().expect("cache should be enabled").clear().await;

    let mut filtered = provider.find_acl(&document("42"), &[user()]).await.unwrap();
    assert_eq!(filtered.object_aces().len(), 1);
    filtered.update_object_ace(0, 6, None).unwrap();
    provider.update_acl(&mut filtered).await.unwrap();

    let loaded = services.reader().find_acl(&document("42"), &[]).await.unwrap();
    let aces = loaded.object_aces();
    assert_eq!(aces.len(), 2);
    assert_eq!(aces[0].security_identity(), &admin());
    assert_eq!(aces[1].security_identity(), &user());
    assert_eq!(aces[1].mask(), 6);
}

#[tokio::test]
async fn test_filtered_edit_keeps_order_of_unseen_entries() {
    let services = services(false);
    let provider = services.mutable();
    let roles: Vec<_> = ["ROLE_A", "ROLE_B", "ROLE_C"]
        .into_iter()
        .map(SecurityIdentity::role)
        .collect();

    let mut acl = provider.create_acl(&document("42")).await.unwrap();
    for (index, role) in roles.iter().enumerate() {
        acl.insert_object_ace(role.clone(), 1, index, true, None)
            .unwrap();
    }
    provider.update_acl(&mut acl).await.unwrap();

    let mut filtered = provider
        .find_acl(&document("42"), &roles[2..])
        .await
        .unwrap();
    filtered.update_object_ace(0, 2, None).unwrap();
    provider.update_acl(&mut filtered).await.unwrap();

    let loaded = services.reader().find_acl(&document("42"), &[]).await.unwrap();
    let identities: Vec<_> = loaded
        .object_aces()
        .iter()
        .map(|e| e.security_identity().clone())
        .collect();
    assert_eq!(identities, roles);
    let orders: Vec<_> = loaded.object_aces().iter().map(|e| e.order()).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    assert_eq!(loaded.object_aces()[2].mask(), 2);
}

// ========== Section 4: Bootstrap ==========

#[test]
fn test_from_config_rejects_invalid_configuration() {
    let mut config = ServerConfig::default();
    config.provider.max_depth = 0;

    let result = AclServices::from_config(&config, Arc::new(FirstMatchStrategy));

    assert!(matches!(result, Err(ConfigLoadError::Invalid { .. })));
}

#[test]
fn test_bootstrap_installs_logging_once() {
    let mut config = ServerConfig::default();
    config.logging.level = "debug".to_string();

    let first = AclServices::bootstrap(&config, Arc::new(FirstMatchStrategy));
    let second = AclServices::bootstrap(&config, Arc::new(FirstMatchStrategy));

    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[test]
fn test_bootstrap_rejects_invalid_log_level() {
    let mut config = ServerConfig::default();
    config.logging.level = "verbose".to_string();

    let result = AclServices::bootstrap(&config, Arc::new(FirstMatchStrategy));

    assert!(matches!(result, Err(ConfigLoadError::Invalid { .. })));
}

#[test]
fn test_cache_is_only_built_when_enabled() {
    assert!(services(false).cache().is_none());
    assert!(services(true).cache().is_some());
}
