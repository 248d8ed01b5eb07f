//! Prerequisite graph derived from a task list.
//!
//! The graph is rebuilt from the merged task set whenever it changes; it is
//! never persisted. Forward edges answer "what does this task require",
//! reverse edges answer "if I complete X, which direct dependents might
//! become completable".

use std::collections::{HashMap, HashSet};

use crate::entities::Task;
use crate::ids::TaskId;

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Task id -> direct prerequisite ids, in requirement order.
    prerequisites: HashMap<TaskId, Vec<TaskId>>,
    /// Task id -> ids of tasks that directly require it.
    dependents: HashMap<TaskId, Vec<TaskId>>,
}

impl TaskGraph {
    /// Build the lookup structures in one pass over the task list.
    ///
    /// Duplicate prerequisite ids within one task are collapsed. References
    /// to ids with no task in the set are kept as-is; traversals skip them.
    pub fn build(tasks: &[Task]) -> Self {
        let mut prerequisites: HashMap<TaskId, Vec<TaskId>> =
            HashMap::with_capacity(tasks.len());
        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();

        for task in tasks {
            let entry = prerequisites.entry(task.id.clone()).or_default();
            let mut seen: HashSet<&TaskId> = HashSet::new();
            for required in task.prerequisite_ids() {
                if seen.insert(required) {
                    entry.push(required.clone());
                }
            }
            for required in entry.clone() {
                dependents.entry(required).or_default().push(task.id.clone());
            }
        }

        Self {
            prerequisites,
            dependents,
        }
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.prerequisites.contains_key(id)
    }

    pub fn task_count(&self) -> usize {
        self.prerequisites.len()
    }

    /// Direct prerequisite ids of `id`, in requirement order.
    pub fn direct_prerequisites(&self, id: &TaskId) -> &[TaskId] {
        self.prerequisites.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of tasks that directly require `id`.
    pub fn dependents(&self, id: &TaskId) -> &[TaskId] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every task that must be completed before `id`, dependencies listed
    /// before the tasks that need them. `id` itself is not included.
    ///
    /// The walk is iterative with an explicit frame stack: task sets run into
    /// the hundreds and the graph is community data, so neither recursion
    /// depth nor cycles can be trusted. A cyclic reference counts as already
    /// visited and is skipped; unknown ids are skipped the same way.
    pub fn transitive_dependencies(&self, id: &TaskId) -> Vec<TaskId> {
        struct Frame<'a> {
            id: &'a TaskId,
            next: usize,
        }

        let mut ordered = Vec::new();
        if !self.contains(id) {
            return ordered;
        }

        let mut visited: HashSet<&TaskId> = HashSet::new();
        visited.insert(id);
        let mut stack = vec![Frame { id, next: 0 }];

        while let Some(frame) = stack.last_mut() {
            let prereqs = self
                .prerequisites
                .get(frame.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            if frame.next < prereqs.len() {
                let child = &prereqs[frame.next];
                frame.next += 1;
                if !visited.contains(child) && self.contains(child) {
                    visited.insert(child);
                    stack.push(Frame { id: child, next: 0 });
                }
            } else {
                let finished = match stack.pop() {
                    Some(frame) => frame,
                    None => break,
                };
                if !stack.is_empty() {
                    ordered.push(finished.id.clone());
                }
            }
        }

        ordered
    }

    /// True iff every *direct* prerequisite of `id` is in `completed`.
    /// A task with no prerequisites is always completable.
    pub fn can_complete(&self, id: &TaskId, completed: &HashSet<TaskId>) -> bool {
        self.direct_prerequisites(id)
            .iter()
            .all(|required| completed.contains(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: &str, requires: &[&str]) -> Task {
        let requirements: Vec<_> = requires
            .iter()
            .map(|req| json!({"taskId": req, "taskName": req}))
            .collect();
        serde_json::from_value(json!({
            "id": id,
            "name": id,
            "taskRequirements": requirements
        }))
        .expect("task fixture")
    }

    #[test]
    fn transitive_dependencies_lists_dependencies_first() {
        let tasks = vec![task("b", &[]), task("c", &["b"]), task("d", &["c"])];
        let graph = TaskGraph::build(&tasks);

        let closure = graph.transitive_dependencies(&TaskId::from("d"));
        assert_eq!(closure, vec![TaskId::from("b"), TaskId::from("c")]);
    }

    #[test]
    fn diamond_dependencies_are_emitted_once() {
        // d requires b and c; both require a.
        let tasks = vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b", "c"]),
        ];
        let graph = TaskGraph::build(&tasks);

        let closure = graph.transitive_dependencies(&TaskId::from("d"));
        assert_eq!(
            closure,
            vec![TaskId::from("a"), TaskId::from("b"), TaskId::from("c")]
        );
    }

    #[test]
    fn cycles_terminate_without_duplicates() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        let graph = TaskGraph::build(&tasks);

        let closure = graph.transitive_dependencies(&TaskId::from("a"));
        assert_eq!(closure, vec![TaskId::from("b")]);
    }

    #[test]
    fn unknown_references_are_skipped() {
        let tasks = vec![task("a", &["missing", "b"]), task("b", &[])];
        let graph = TaskGraph::build(&tasks);

        let closure = graph.transitive_dependencies(&TaskId::from("a"));
        assert_eq!(closure, vec![TaskId::from("b")]);
    }

    #[test]
    fn unknown_root_yields_empty_closure() {
        let graph = TaskGraph::build(&[task("a", &[])]);
        assert!(graph
            .transitive_dependencies(&TaskId::from("missing"))
            .is_empty());
    }

    #[test]
    fn can_complete_checks_direct_prerequisites_only() {
        let tasks = vec![task("b", &[]), task("c", &["b"]), task("d", &["c"])];
        let graph = TaskGraph::build(&tasks);

        let mut completed = HashSet::new();
        assert!(graph.can_complete(&TaskId::from("b"), &completed));
        assert!(!graph.can_complete(&TaskId::from("d"), &completed));

        // Only the direct prerequisite matters, not the whole chain.
        completed.insert(TaskId::from("c"));
        assert!(graph.can_complete(&TaskId::from("d"), &completed));
    }

    #[test]
    fn duplicate_requirements_collapse_in_build() {
        let tasks = vec![task("a", &[]), task("b", &["a", "a"])];
        let graph = TaskGraph::build(&tasks);

        assert_eq!(graph.direct_prerequisites(&TaskId::from("b")).len(), 1);
        assert_eq!(graph.dependents(&TaskId::from("a")), &[TaskId::from("b")]);
    }
}
