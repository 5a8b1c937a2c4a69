//! Storage Integration Tests.
//!
//! These tests drive the DataStore trait through a generic helper so any
//! backend can be plugged in. Only the in-memory store ships today.

use std::collections::HashSet;
use std::sync::Arc;

use rsacl_storage::{
    DataStore, EntryChangeSet, EntryFilter, EntryWrite, MemoryDataStore, SecurityIdentityKey,
    StorageError,
};

fn create_memory_store() -> MemoryDataStore {
    MemoryDataStore::new()
}

fn entry(object_identity_id: Option<i64>, identity: &str, principal: bool, order: u32) -> EntryWrite {
    EntryWrite {
        id: None,
        class_type: "Document".to_string(),
        object_identity_id,
        security_identity: SecurityIdentityKey::new(identity, principal),
        field_name: None,
        ace_order: order,
        mask: 1,
        granting: true,
        granting_strategy: "all".to_string(),
        audit_success: false,
        audit_failure: true,
    }
}

/// Builds `root -> folder -> doc` and exercises every table.
async fn run_hierarchy_lifecycle<S: DataStore>(store: &S) {
    let root = store
        .find_or_create_object_identity("Document", "root")
        .await
        .unwrap();
    let folder = store
        .find_or_create_object_identity("Document", "folder")
        .await
        .unwrap();
    let doc = store
        .find_or_create_object_identity("Document", "doc")
        .await
        .unwrap();

    let mut folder_row = folder.clone();
    folder_row.parent_id = Some(root.id);
    store.save_object_identity(&folder_row).await.unwrap();

    let mut doc_row = doc.clone();
    doc_row.parent_id = Some(folder.id);
    doc_row.entries_inheriting = false;
    store.save_object_identity(&doc_row).await.unwrap();

    // Children are direct only
    let children = store.list_child_object_identities(root.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, folder.id);

    // Closure covers the whole chain
    let links = store.read_ancestor_links(root.id).await.unwrap();
    let descendants: HashSet<i64> = links
        .iter()
        .filter(|l| l.ancestor_id == root.id)
        .map(|l| l.object_identity_id)
        .collect();
    assert_eq!(descendants, HashSet::from([folder.id, doc.id]));

    // Entries at both scopes
    store
        .write_entries(EntryChangeSet {
            upserts: vec![
                entry(Some(doc.id), "alice", true, 0),
                entry(Some(doc.id), "ROLE_EDITOR", false, 1),
                entry(None, "ROLE_ADMIN", false, 0),
            ],
            deletes: vec![],
        })
        .await
        .unwrap();

    let all = store
        .read_entries(&EntryFilter {
            class_type: "Document".to_string(),
            object_identity_id: Some(doc.id),
            security_identities: vec![],
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let alice_only = store
        .read_entries(&EntryFilter {
            class_type: "Document".to_string(),
            object_identity_id: Some(doc.id),
            security_identities: vec![SecurityIdentityKey::new("alice", true)],
        })
        .await
        .unwrap();
    assert_eq!(alice_only.len(), 1);
    assert!(alice_only[0].security_identity.principal);

    // A role and a principal with the same name are distinct
    let alice_role = store
        .read_entries(&EntryFilter {
            class_type: "Document".to_string(),
            object_identity_id: Some(doc.id),
            security_identities: vec![SecurityIdentityKey::new("alice", false)],
        })
        .await
        .unwrap();
    assert!(alice_role.is_empty());

    // Leaves are deleted before their parents
    assert!(matches!(
        store.delete_object_identity(folder.id).await,
        Err(StorageError::HasChildren { .. })
    ));
    store.delete_object_identity(doc.id).await.unwrap();
    store.delete_object_identity(folder.id).await.unwrap();

    let links = store.read_ancestor_links(root.id).await.unwrap();
    assert!(links.is_empty());

    let remaining = store
        .read_entries(&EntryFilter {
            class_type: "Document".to_string(),
            object_identity_id: None,
            security_identities: vec![],
        })
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_memory_store_hierarchy_lifecycle() {
    let store = create_memory_store();
    run_hierarchy_lifecycle(&store).await;
}

#[tokio::test]
async fn test_memory_store_list_object_identities_skips_unknown_ids() {
    let store = create_memory_store();
    let a = store
        .find_or_create_object_identity("Document", "a")
        .await
        .unwrap();
    let b = store
        .find_or_create_object_identity("Document", "b")
        .await
        .unwrap();

    let rows = store
        .list_object_identities(&[b.id, 999, a.id])
        .await
        .unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[tokio::test]
async fn test_memory_store_concurrent_entry_writes() {
    let store = Arc::new(create_memory_store());
    let row = store
        .find_or_create_object_identity("Document", "busy")
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..20u32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .write_entries(EntryChangeSet {
                    upserts: vec![entry(Some(row.id), &format!("user{i}"), true, i)],
                    deletes: vec![],
                })
                .await
                .unwrap()
        }));
    }

    let ids: HashSet<i64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|persisted| persisted.unwrap()[0].id)
        .collect();
    assert_eq!(ids.len(), 20);

    let entries = store
        .read_entries(&EntryFilter {
            class_type: "Document".to_string(),
            object_identity_id: Some(row.id),
            security_identities: vec![],
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 20);
}
