//! Merge engine (spec §4.F): re-homes a source entity into a target entity
//! via an ordered sequence of steps, each paired with an idempotent
//! compensation pushed onto a stack (spec §9 design notes: "model as a
//! stack of (forward, compensate) pairs; on success, drop; on failure,
//! pop-and-run"). The store offers only single-statement execution, so this
//! simulates atomicity rather than relying on it.

use chrono::Utc;
use resolver_core::error::{CoreError, Result};
use resolver_core::events::{EventBus, MergeEvent};
use resolver_core::store::GraphStore;
use resolver_core::types::{
    AuditEntry, DuplicateEntity, Entity, EntityStatus, Evaluator, LibraryRelationship,
    MatchOutcome, MergeRecord, Synonym, SynonymSource,
};

use crate::lock::{self, LockProvider};
use crate::normalizer::Normalizer;

/// A reversible action taken during a merge attempt, kept on a stack so a
/// mid-merge failure can be unwound LIFO. Append-only steps (step 6) carry
/// no compensation and are represented by simply not pushing one.
enum Compensation {
    DeleteSynonym(String),
    DeleteDuplicate(String),
    RestoreRelationship(LibraryRelationship),
    DeletedSelfLoopRelationship(LibraryRelationship),
    RevertStatusFlip { source_id: String, target_id: String },
}

async fn run_compensations(store: &dyn GraphStore, stack: Vec<Compensation>) {
    for compensation in stack.into_iter().rev() {
        let outcome: Result<()> = match compensation {
            Compensation::DeleteSynonym(id) => store.delete_synonym(&id).await,
            Compensation::DeleteDuplicate(id) => store.delete_duplicate(&id).await,
            Compensation::RestoreRelationship(rel) => {
                store
                    .rehome_relationship(&rel.id, Some(rel.from_entity.clone()), Some(rel.to_entity.clone()))
                    .await
            }
            Compensation::DeletedSelfLoopRelationship(rel) => store.insert_relationship(rel).await,
            Compensation::RevertStatusFlip { source_id, target_id } => {
                let unlink = store.unlink_merged_into(&source_id).await;
                let flip = store.set_entity_status(&source_id, EntityStatus::Active).await;
                unlink.and(flip)
            }
        };
        if let Err(e) = outcome {
            // Compensations are best-effort (spec §4.F): log and continue so
            // one failed rollback step doesn't prevent the others from running.
            tracing::error!(error = %e, "merge compensation step failed");
        }
    }
}

/// Outcome of a successful merge.
pub struct MergeOutcome {
    pub record: MergeRecord,
}

/// Re-home `source_id` into `target_id` (spec §4.F). Acquires the merge lock
/// for the pair before step 1, so dueling merges sharing an endpoint
/// serialize on the same key.
#[allow(clippy::too_many_arguments)]
pub async fn merge_entities(
    store: &dyn GraphStore,
    lock_provider: &dyn LockProvider,
    event_bus: &EventBus,
    normalizer: &Normalizer,
    source_id: &str,
    target_id: &str,
    decision: MatchOutcome,
    triggered_by: Evaluator,
    reasoning: &str,
    source_system: &str,
    lock_timeout: std::time::Duration,
    lock_max_retries: u32,
) -> Result<MergeOutcome> {
    let lock_key = lock::merge_key(source_id, target_id);
    lock::acquire_with_retry(lock_provider, &lock_key, "merge-engine", lock_timeout, lock_max_retries).await?;

    let result = run_merge_steps(store, event_bus, normalizer, source_id, target_id, decision, triggered_by, reasoning, source_system).await;

    let _ = lock_provider.unlock(&lock_key, "merge-engine").await;
    result
}

#[allow(clippy::too_many_arguments)]
async fn run_merge_steps(
    store: &dyn GraphStore,
    event_bus: &EventBus,
    normalizer: &Normalizer,
    source_id: &str,
    target_id: &str,
    decision: MatchOutcome,
    triggered_by: Evaluator,
    reasoning: &str,
    source_system: &str,
) -> Result<MergeOutcome> {
    let mut compensations: Vec<Compensation> = Vec::new();

    // Step 1: validate. Read-only, no compensation.
    let (source, target) = match validate(store, source_id, target_id).await {
        Ok(pair) => pair,
        Err(reason) => {
            return Err(CoreError::MergeFailed {
                step: "validate".to_string(),
                reason,
            });
        }
    };

    // Step 2: attach a SYSTEM synonym to the target carrying the source's
    // canonical name, skipping if one is already present case-insensitively.
    let normalized_source_name = normalizer.normalize(&source.canonical_name, &source.entity_type);
    match store.find_synonym_case_insensitive(target_id, &normalized_source_name).await {
        Ok(None) => {
            let synonym = Synonym::new(
                source.canonical_name.clone(),
                normalized_source_name.clone(),
                SynonymSource::System,
                source.confidence_score,
            );
            let synonym_id = synonym.id.clone();
            if let Err(e) = store.insert_synonym(target_id, synonym).await {
                run_compensations(store, compensations).await;
                return Err(CoreError::MergeFailed {
                    step: "attach_synonym".to_string(),
                    reason: e.to_string(),
                });
            }
            compensations.push(Compensation::DeleteSynonym(synonym_id));
        }
        Ok(Some(_)) => {}
        Err(e) => {
            run_compensations(store, compensations).await;
            return Err(CoreError::MergeFailed {
                step: "attach_synonym".to_string(),
                reason: e.to_string(),
            });
        }
    }

    // Step 3: create a DuplicateEntity referencing the source.
    let duplicate = DuplicateEntity::new(
        source.canonical_name.clone(),
        source.normalized_name.clone(),
        source_system.to_string(),
    );
    let duplicate_id = duplicate.id.clone();
    if let Err(e) = store.insert_duplicate(target_id, duplicate).await {
        run_compensations(store, compensations).await;
        return Err(CoreError::MergeFailed {
            step: "create_duplicate".to_string(),
            reason: e.to_string(),
        });
    }
    compensations.push(Compensation::DeleteDuplicate(duplicate_id));

    // Step 4: re-home library relationships, dropping self-loops.
    if let Err(e) = rehome_relationships(store, source_id, target_id, &mut compensations).await {
        run_compensations(store, compensations).await;
        return Err(CoreError::MergeFailed {
            step: "rehome_relationships".to_string(),
            reason: e.to_string(),
        });
    }

    // Step 5: status flip and MERGED_INTO edge.
    if let Err(e) = store.set_entity_status(source_id, EntityStatus::Merged).await {
        run_compensations(store, compensations).await;
        return Err(CoreError::MergeFailed {
            step: "status_flip".to_string(),
            reason: e.to_string(),
        });
    }
    if let Err(e) = store.link_merged_into(source_id, target_id).await {
        // Undo the status flip we just performed before compensating further.
        let _ = store.set_entity_status(source_id, EntityStatus::Active).await;
        run_compensations(store, compensations).await;
        return Err(CoreError::MergeFailed {
            step: "status_flip".to_string(),
            reason: e.to_string(),
        });
    }
    compensations.push(Compensation::RevertStatusFlip {
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
    });

    // Step 6: append MergeRecord and AuditEntry. No compensation of its
    // own, but a failure here still unwinds everything prior.
    let record = MergeRecord::new(
        source_id.to_string(),
        target_id.to_string(),
        source.canonical_name.clone(),
        target.canonical_name.clone(),
        source.confidence_score,
        decision,
        triggered_by,
        reasoning.to_string(),
    );
    if let Err(e) = store.append_merge_record(record.clone()).await {
        run_compensations(store, compensations).await;
        return Err(CoreError::MergeFailed {
            step: "ledger_append".to_string(),
            reason: e.to_string(),
        });
    }
    let audit_entry = AuditEntry::new(target_id.to_string(), "ENTITY_MERGED", "merge-engine").with_details(
        serde_json::json!({ "source_id": source_id, "target_id": target_id, "merge_record_id": record.id }),
    );
    if let Err(e) = store.append_audit_entry(audit_entry).await {
        run_compensations(store, compensations).await;
        return Err(CoreError::MergeFailed {
            step: "ledger_append".to_string(),
            reason: e.to_string(),
        });
    }

    // Step 7: success. Discard the compensation stack and notify listeners.
    event_bus
        .emit_merge(MergeEvent {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            at: Utc::now(),
        })
        .await;

    Ok(MergeOutcome { record })
}

async fn validate(store: &dyn GraphStore, source_id: &str, target_id: &str) -> std::result::Result<(Entity, Entity), String> {
    if source_id == target_id {
        return Err("source and target are the same entity".to_string());
    }
    let source = store.get_entity(source_id).await.map_err(|e| e.to_string())?;
    let target = store.get_entity(target_id).await.map_err(|e| e.to_string())?;
    if !source.is_active() {
        return Err(format!("source entity {source_id} is not ACTIVE"));
    }
    if !target.is_active() {
        return Err(format!("target entity {target_id} is not ACTIVE"));
    }
    if source.entity_type != target.entity_type {
        return Err(format!(
            "type mismatch: source is {}, target is {}",
            source.entity_type, target.entity_type
        ));
    }
    Ok((source, target))
}

/// Re-home outgoing and incoming relationships of `source_id` to
/// `target_id`. Edges that would create a self-loop on the target are
/// dropped instead (spec §4.F step 4, and the self-loop choice from §9 open
/// questions).
async fn rehome_relationships(
    store: &dyn GraphStore,
    source_id: &str,
    target_id: &str,
    compensations: &mut Vec<Compensation>,
) -> Result<()> {
    let relationships = store.get_relationships_touching(source_id).await?;
    for rel in relationships {
        let new_from = if rel.from_entity == source_id { target_id.to_string() } else { rel.from_entity.clone() };
        let new_to = if rel.to_entity == source_id { target_id.to_string() } else { rel.to_entity.clone() };

        if new_from == new_to {
            store.delete_relationship(&rel.id).await?;
            compensations.push(Compensation::DeletedSelfLoopRelationship(rel));
        } else {
            store.rehome_relationship(&rel.id, Some(new_from), Some(new_to)).await?;
            compensations.push(Compensation::RestoreRelationship(rel));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LocalLockProvider;
    use resolver_graph::MemoryGraphStore;

    fn entity(name: &str) -> Entity {
        Entity::new(name.to_string(), name.to_lowercase(), "COMPANY".to_string())
    }

    #[tokio::test]
    async fn merge_rehomes_synonym_and_flips_status() {
        let store = MemoryGraphStore::default();
        let source = entity("Acme Inc");
        let target = entity("Acme Corporation");
        let (source_id, target_id) = (source.id.clone(), target.id.clone());
        store.insert_entity(source).await.unwrap();
        store.insert_entity(target).await.unwrap();

        let lock_provider = LocalLockProvider::new();
        let bus = EventBus::new();
        let normalizer = Normalizer::with_defaults();

        let outcome = merge_entities(
            &store,
            &lock_provider,
            &bus,
            &normalizer,
            &source_id,
            &target_id,
            MatchOutcome::AutoMerge,
            Evaluator::System,
            "near-exact match",
            "test-source",
            std::time::Duration::from_secs(5),
            3,
        )
        .await
        .unwrap();

        assert_eq!(outcome.record.source_id, source_id);

        let source_after = store.get_entity(&source_id).await.unwrap();
        assert_eq!(source_after.status, EntityStatus::Merged);
        assert_eq!(store.resolve_merged_into(&source_id).await.unwrap(), target_id);

        let synonyms = store.get_synonyms_for_entity(&target_id).await.unwrap();
        assert!(synonyms.iter().any(|s| s.normalized_value == "acme"));
    }

    #[tokio::test]
    async fn merge_rejects_same_id() {
        let store = MemoryGraphStore::default();
        let source = entity("Acme Inc");
        let id = source.id.clone();
        store.insert_entity(source).await.unwrap();

        let lock_provider = LocalLockProvider::new();
        let bus = EventBus::new();
        let normalizer = Normalizer::with_defaults();

        let result = merge_entities(
            &store,
            &lock_provider,
            &bus,
            &normalizer,
            &id,
            &id,
            MatchOutcome::AutoMerge,
            Evaluator::System,
            "n/a",
            "test-source",
            std::time::Duration::from_secs(5),
            3,
        )
        .await;

        assert!(matches!(result, Err(CoreError::MergeFailed { step, .. }) if step == "validate"));
    }

    #[tokio::test]
    async fn merge_drops_self_loop_relationships_on_rehome() {
        let store = MemoryGraphStore::default();
        let source = entity("Acme Inc");
        let target = entity("Acme Corporation");
        let (source_id, target_id) = (source.id.clone(), target.id.clone());
        store.insert_entity(source).await.unwrap();
        store.insert_entity(target).await.unwrap();

        // A relationship from source to target would become a self-loop on target.
        let rel = LibraryRelationship::new(source_id.clone(), target_id.clone(), "ALIAS_OF".to_string(), "system".to_string());
        store.insert_relationship(rel).await.unwrap();

        let lock_provider = LocalLockProvider::new();
        let bus = EventBus::new();
        let normalizer = Normalizer::with_defaults();

        merge_entities(
            &store,
            &lock_provider,
            &bus,
            &normalizer,
            &source_id,
            &target_id,
            MatchOutcome::AutoMerge,
            Evaluator::System,
            "near-exact match",
            "test-source",
            std::time::Duration::from_secs(5),
            3,
        )
        .await
        .unwrap();

        assert!(store.get_relationships_touching(&target_id).await.unwrap().is_empty());
    }
}
