//! Pure cache reducers.
//!
//! Each function folds one successful remote result into the cached list.
//! None of them touch the network, so the reconciliation rules can be
//! tested in isolation.
//!
//! Invariants kept by every reducer:
//! - ids in the list stay unique
//! - order is newest first, as the remote store returns it

use smarttask_proto::task::{Task, TaskId};

/// A successful remote result to fold into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A full fetch; replaces the whole list.
    Fetched(Vec<Task>),
    /// A newly created task.
    Created(Task),
    /// The authoritative record after an edit or status change.
    Updated(Task),
    /// A deleted task's id.
    Removed(TaskId),
}

/// Folds `outcome` into `list`.
pub fn apply(list: &mut Vec<Task>, outcome: Outcome) {
    match outcome {
        Outcome::Fetched(tasks) => *list = tasks,
        Outcome::Created(task) => prepend(list, task),
        Outcome::Updated(task) => {
            replace_in_place(list, task);
        }
        Outcome::Removed(id) => {
            remove_by_id(list, &id);
        }
    }
}

/// Puts a created task first. A stale copy with the same id (e.g. from a
/// fetch that raced the insert) is dropped so ids stay unique.
pub fn prepend(list: &mut Vec<Task>, task: Task) {
    list.retain(|t| t.id != task.id);
    list.insert(0, task);
}

/// Replaces the entry with the same id, keeping its position.
///
/// Returns `false`, leaving the list untouched, when no entry matches.
pub fn replace_in_place(list: &mut [Task], task: Task) -> bool {
    match list.iter_mut().find(|t| t.id == task.id) {
        Some(slot) => {
            *slot = task;
            true
        }
        None => false,
    }
}

/// Removes the entry with `id`. Returns whether one was present.
pub fn remove_by_id(list: &mut Vec<Task>, id: &TaskId) -> bool {
    let before = list.len();
    list.retain(|t| &t.id != id);
    list.len() != before
}
