//! Completion tracking with cascade-on-complete.
//!
//! The completed set is the sole mutable task-progress state. Completing a
//! task auto-completes its entire transitive prerequisite chain; un-completing
//! removes only the task itself (no downward cascade through dependents -
//! deliberate, see `toggle`). Every mutation persists the whole set before
//! returning.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use questlog_domain::{TaskGraph, TaskId};

use crate::infrastructure::persistence::SetCollection;
use crate::infrastructure::ports::{ProgressStore, StoreError};

pub struct CompletionTracker {
    store: Arc<dyn ProgressStore>,
    // One lock covers the set computation and the persistence write, so a
    // toggle is a single non-interleaved read-modify-write per process.
    state: Mutex<HashSet<TaskId>>,
}

impl CompletionTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            state: Mutex::new(HashSet::new()),
        }
    }

    /// Reload the completed set from the active profile's store. Called once
    /// at profile activation.
    pub async fn activate(&self) -> Result<(), StoreError> {
        let stored = self.store.load_set(SetCollection::CompletedTasks).await?;
        let mut state = self.state.lock().await;
        *state = stored.into_iter().map(TaskId::from).collect();
        Ok(())
    }

    /// Toggle one task.
    ///
    /// Completing adds the task plus every transitive prerequisite in one
    /// atomic set update. Un-completing removes only the task itself:
    /// dependents that are now "orphaned" stay completed. The asymmetry is
    /// intended behavior, not a bug - surfacing it to users is the UI's job.
    ///
    /// The resulting set is persisted before returning. A persistence
    /// failure propagates to the caller but does not roll back the
    /// in-memory state: local state is optimistic, durability eventual.
    pub async fn toggle(
        &self,
        graph: &TaskGraph,
        task_id: &TaskId,
    ) -> Result<HashSet<TaskId>, StoreError> {
        let mut state = self.state.lock().await;

        if state.contains(task_id) {
            state.remove(task_id);
        } else {
            for prerequisite in graph.transitive_dependencies(task_id) {
                state.insert(prerequisite);
            }
            state.insert(task_id.clone());
        }

        let snapshot = state.clone();
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    /// Replace the completed set with empty and persist it.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.clear();
        let snapshot = state.clone();
        self.persist(&snapshot).await
    }

    pub async fn completed(&self) -> HashSet<TaskId> {
        self.state.lock().await.clone()
    }

    pub async fn is_completed(&self, task_id: &TaskId) -> bool {
        self.state.lock().await.contains(task_id)
    }

    /// True iff every direct prerequisite of `task_id` is completed.
    pub async fn can_complete(&self, graph: &TaskGraph, task_id: &TaskId) -> bool {
        let state = self.state.lock().await;
        graph.can_complete(task_id, &state)
    }

    async fn persist(&self, state: &HashSet<TaskId>) -> Result<(), StoreError> {
        let entries: HashSet<String> = state
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        self.store
            .save_set(SetCollection::CompletedTasks, &entries)
            .await
    }
}
