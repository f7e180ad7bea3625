//! Property-based tests for cache reconciliation.
//!
//! Uses proptest to verify, for arbitrary cached lists:
//! 1. A created task always ends up first.
//! 2. An update keeps the entry's position and takes the server record.
//! 3. An update for an uncached id changes nothing.
//! 4. A removed id is gone afterwards, and removing it again is a no-op.
//! 5. Ids stay unique under any sequence of outcomes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use smarttask::tasks::reconcile::{self, Outcome};
use smarttask_proto::task::{Task, TaskId, TaskStatus};
use uuid::Uuid;

// --- Strategies ---

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

/// A task whose id is derived from `key`, so small keys collide on purpose.
fn arb_task_with_key(keys: std::ops::Range<u128>) -> impl Strategy<Value = Task> {
    (
        keys,
        "[a-z ]{3,20}",
        proptest::option::of("[a-z ]{0,40}"),
        arb_status(),
        0i64..2_000_000_000,
    )
        .prop_map(|(key, title, description, status, secs)| Task {
            id: TaskId::from_uuid(Uuid::from_u128(key)),
            title,
            description,
            status,
            assigned_to: None,
            created_by: None,
            created_at: DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default(),
        })
}

/// A cached list with unique ids.
fn arb_cache() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_task_with_key(0..64), 0..24).prop_map(|tasks| {
        let mut seen = HashSet::new();
        tasks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect()
    })
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        prop::collection::vec(arb_task_with_key(0..64), 0..8).prop_map(|tasks| {
            let mut seen = HashSet::new();
            Outcome::Fetched(
                tasks
                    .into_iter()
                    .filter(|t| seen.insert(t.id.clone()))
                    .collect(),
            )
        }),
        arb_task_with_key(0..64).prop_map(Outcome::Created),
        arb_task_with_key(0..64).prop_map(Outcome::Updated),
        (0u128..64).prop_map(|k| Outcome::Removed(TaskId::from_uuid(Uuid::from_u128(k)))),
    ]
}

fn ids(list: &[Task]) -> Vec<TaskId> {
    list.iter().map(|t| t.id.clone()).collect()
}

// --- Properties ---

proptest! {
    #[test]
    fn created_task_is_first(cache in arb_cache(), created in arb_task_with_key(0..128)) {
        let mut list = cache;
        reconcile::apply(&mut list, Outcome::Created(created.clone()));
        prop_assert_eq!(&list[0], &created);
        prop_assert_eq!(list.iter().filter(|t| t.id == created.id).count(), 1);
    }

    #[test]
    fn update_keeps_position(
        cache in arb_cache().prop_filter("non-empty", |c| !c.is_empty()),
        pick in any::<prop::sample::Index>(),
        title in "[a-z]{3,12}",
        status in arb_status(),
    ) {
        let idx = pick.index(cache.len());
        let mut updated = cache[idx].clone();
        updated.title = title;
        updated.status = status;

        let mut list = cache.clone();
        reconcile::apply(&mut list, Outcome::Updated(updated.clone()));

        prop_assert_eq!(ids(&list), ids(&cache));
        prop_assert_eq!(&list[idx], &updated);
        for (i, (after, before)) in list.iter().zip(&cache).enumerate() {
            if i != idx {
                prop_assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn update_of_uncached_id_is_noop(cache in arb_cache(), stranger in arb_task_with_key(64..128)) {
        let mut list = cache.clone();
        reconcile::apply(&mut list, Outcome::Updated(stranger));
        prop_assert_eq!(list, cache);
    }

    #[test]
    fn remove_is_total_and_idempotent(cache in arb_cache(), key in 0u128..96) {
        let id = TaskId::from_uuid(Uuid::from_u128(key));
        let mut list = cache;
        reconcile::apply(&mut list, Outcome::Removed(id.clone()));
        prop_assert!(list.iter().all(|t| t.id != id));

        let after_first = list.clone();
        reconcile::apply(&mut list, Outcome::Removed(id));
        prop_assert_eq!(list, after_first);
    }

    #[test]
    fn ids_stay_unique(cache in arb_cache(), outcomes in prop::collection::vec(arb_outcome(), 0..32)) {
        let mut list = cache;
        for outcome in outcomes {
            reconcile::apply(&mut list, outcome);
            let unique: HashSet<_> = list.iter().map(|t| t.id.clone()).collect();
            prop_assert_eq!(unique.len(), list.len());
        }
    }
}
