//! Exercises `MemoryGraphStore` against the `GraphStore` contract it implements.

use resolver_core::store::{AuditQuery, GraphStore, ReviewFilters};
use resolver_core::types::{
    AuditEntry, DuplicateEntity, Entity, EntityStatus, Evaluator, LibraryRelationship, MatchOutcome,
    MergeRecord, ReviewItem,
};
use resolver_graph::MemoryGraphStore;
use std::time::Duration;

fn company(name: &str) -> Entity {
    Entity::new(name.to_string(), name.to_lowercase(), "COMPANY".to_string())
}

#[tokio::test]
async fn insert_and_get_entity_roundtrips() {
    let store = MemoryGraphStore::default();
    let entity = company("Acme Corp");
    let id = entity.id.clone();
    store.insert_entity(entity).await.unwrap();

    let fetched = store.get_entity(&id).await.unwrap();
    assert_eq!(fetched.canonical_name, "Acme Corp");
}

#[tokio::test]
async fn get_entity_missing_is_not_found() {
    let store = MemoryGraphStore::default();
    let err = store.get_entity("does-not-exist").await.unwrap_err();
    assert!(matches!(err, resolver_core::error::CoreError::NotFound(_)));
}

#[tokio::test]
async fn find_active_by_normalized_name_respects_status_and_tenant() {
    let store = MemoryGraphStore::default();
    let acme = company("Acme Corp").with_tenant("tenant-a");
    let acme_id = acme.id.clone();
    store.insert_entity(acme).await.unwrap();

    let found = store
        .find_active_by_normalized_name("acme corp", "COMPANY", Some("tenant-a"))
        .await
        .unwrap();
    assert_eq!(found.unwrap().id, acme_id);

    let not_found_other_tenant = store
        .find_active_by_normalized_name("acme corp", "COMPANY", Some("tenant-b"))
        .await
        .unwrap();
    assert!(not_found_other_tenant.is_none());

    store.set_entity_status(&acme_id, EntityStatus::Merged).await.unwrap();
    let not_found_after_merge = store
        .find_active_by_normalized_name("acme corp", "COMPANY", Some("tenant-a"))
        .await
        .unwrap();
    assert!(not_found_after_merge.is_none());
}

#[tokio::test]
async fn blocking_key_scan_matches_any_shared_key() {
    let store = MemoryGraphStore::default();
    let e = company("Acme Corp").with_blocking_keys(vec!["pfx:acm".to_string(), "tok:acme".to_string()]);
    store.insert_entity(e).await.unwrap();

    let matches = store
        .find_active_by_blocking_keys(&["tok:acme".to_string()], "COMPANY", None)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);

    let none = store
        .find_active_by_blocking_keys(&["tok:globex".to_string()], "COMPANY", None)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn resolve_merged_into_follows_chain_to_terminal_active_id() {
    let store = MemoryGraphStore::default();
    let a = company("Acme Inc");
    let b = company("Acme Corporation");
    let c = company("Acme Holdings");
    let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());
    store.insert_entity(a).await.unwrap();
    store.insert_entity(b).await.unwrap();
    store.insert_entity(c).await.unwrap();

    // a merged into b, b merged into c: resolving a should terminate at c.
    store.link_merged_into(&a_id, &b_id).await.unwrap();
    store.link_merged_into(&b_id, &c_id).await.unwrap();

    assert_eq!(store.resolve_merged_into(&a_id).await.unwrap(), c_id);
    assert_eq!(store.resolve_merged_into(&c_id).await.unwrap(), c_id);
}

#[tokio::test]
async fn relationship_rehoming_updates_both_endpoint_indexes() {
    let store = MemoryGraphStore::default();
    let a = company("Acme");
    let b = company("Globex");
    let c = company("Initech");
    let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());
    store.insert_entity(a).await.unwrap();
    store.insert_entity(b).await.unwrap();
    store.insert_entity(c).await.unwrap();

    let rel = LibraryRelationship::new(a_id.clone(), b_id.clone(), "PARTNER_OF".to_string(), "system".to_string());
    let rel_id = rel.id.clone();
    store.insert_relationship(rel).await.unwrap();

    assert_eq!(store.get_relationships_touching(&a_id).await.unwrap().len(), 1);
    assert_eq!(store.get_relationships_touching(&b_id).await.unwrap().len(), 1);

    store.rehome_relationship(&rel_id, Some(c_id.clone()), None).await.unwrap();

    assert!(store.get_relationships_touching(&a_id).await.unwrap().is_empty());
    assert_eq!(store.get_relationships_touching(&c_id).await.unwrap().len(), 1);
    assert_eq!(store.get_relationships_touching(&b_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn merge_chain_walks_transitive_merges() {
    let store = MemoryGraphStore::default();
    let record_ab = MergeRecord::new(
        "a".to_string(),
        "b".to_string(),
        "A".to_string(),
        "B".to_string(),
        0.95,
        MatchOutcome::AutoMerge,
        Evaluator::System,
        "exact match".to_string(),
    );
    let record_bc = MergeRecord::new(
        "b".to_string(),
        "c".to_string(),
        "B".to_string(),
        "C".to_string(),
        0.93,
        MatchOutcome::AutoMerge,
        Evaluator::System,
        "high similarity".to_string(),
    );
    store.append_merge_record(record_ab).await.unwrap();
    store.append_merge_record(record_bc).await.unwrap();

    let chain = store.get_merge_chain("c").await.unwrap();
    assert_eq!(chain.len(), 2);
    let sources: Vec<&str> = chain.iter().map(|r| r.source_id.as_str()).collect();
    assert!(sources.contains(&"a"));
    assert!(sources.contains(&"b"));
}

#[tokio::test]
async fn pending_reviews_are_paginated_and_filtered_by_score() {
    let store = MemoryGraphStore::default();
    for i in 0..5 {
        let item = ReviewItem::new(
            format!("src-{i}"),
            format!("cand-{i}"),
            0.60 + (i as f64) * 0.05,
            "COMPANY".to_string(),
        );
        store.insert_review_item(item).await.unwrap();
    }

    let page = store
        .list_pending_reviews(0, 2, ReviewFilters::default())
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);

    let filtered = store
        .list_pending_reviews(
            0,
            10,
            ReviewFilters {
                score_min: Some(0.70),
                score_max: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(filtered.total, 3);
}

#[tokio::test]
async fn audit_query_filters_and_orders_most_recent_first() {
    let store = MemoryGraphStore::default();
    store
        .append_audit_entry(AuditEntry::new("e-1".to_string(), "CREATE", "system"))
        .await
        .unwrap();
    store
        .append_audit_entry(AuditEntry::new("e-1".to_string(), "MERGE", "system"))
        .await
        .unwrap();
    store
        .append_audit_entry(AuditEntry::new("e-2".to_string(), "CREATE", "system"))
        .await
        .unwrap();

    let results = store
        .query_audit(AuditQuery {
            entity_id: Some("e-1".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].action, "MERGE");
}

#[tokio::test]
async fn lock_is_exclusive_until_released_or_expired() {
    let store = MemoryGraphStore::default();
    assert!(store.try_acquire_lock("entity:acme", "worker-1", Duration::from_secs(5)).await.unwrap());
    assert!(!store.try_acquire_lock("entity:acme", "worker-2", Duration::from_secs(5)).await.unwrap());

    store.release_lock("entity:acme", "worker-1").await.unwrap();
    assert!(store.try_acquire_lock("entity:acme", "worker-2", Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
async fn lock_release_by_non_owner_is_a_no_op() {
    let store = MemoryGraphStore::default();
    assert!(store.try_acquire_lock("entity:acme", "worker-1", Duration::from_secs(5)).await.unwrap());
    store.release_lock("entity:acme", "worker-2").await.unwrap();
    assert!(!store.try_acquire_lock("entity:acme", "worker-3", Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
async fn duplicate_entity_insert_and_delete() {
    let store = MemoryGraphStore::default();
    let dup = DuplicateEntity::new("Acme Corp.".to_string(), "acme corp".to_string(), "crm".to_string());
    let dup_id = dup.id.clone();
    store.insert_duplicate("target-1", dup).await.unwrap();
    store.delete_duplicate(&dup_id).await.unwrap();
}
