//! Dependency resolver for subtasks
//!
//! Depth-first topological ordering over the advisory dependency edges.
//! Dependencies are best-effort hints: ids outside the input set and
//! self-loops are treated as satisfied, and cycles are broken silently by
//! the visited marker so ordering never blocks execution.

use std::collections::{HashMap, HashSet};

use crate::domain::SubTask;

/// Order subtasks so that each appears after its in-set dependencies
///
/// Returns indices into the input slice. Deterministic for a given input
/// order: subtasks are visited first-to-last, each preceded by its
/// not-yet-emitted dependencies.
pub fn order_subtasks(subtasks: &[SubTask]) -> Vec<usize> {
    let index_map: HashMap<&str, usize> = subtasks.iter().enumerate().map(|(i, s)| (s.id.as_str(), i)).collect();

    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(subtasks.len());

    for idx in 0..subtasks.len() {
        visit(idx, subtasks, &index_map, &mut visited, &mut order);
    }

    order
}

fn visit(
    idx: usize,
    subtasks: &[SubTask],
    index_map: &HashMap<&str, usize>,
    visited: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) {
    if !visited.insert(idx) {
        // Already emitted, or on the current path: either way the edge is
        // considered satisfied, which is what breaks cycles.
        return;
    }

    for dep_id in &subtasks[idx].dependencies {
        if let Some(&dep_idx) = index_map.get(dep_id.as_str()) {
            if dep_idx != idx {
                visit(dep_idx, subtasks, index_map, visited, order);
            }
        }
    }

    order.push(idx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn subtask(id: &str, deps: &[&str]) -> SubTask {
        let mut s = SubTask::new("task-1", id, "test subtask");
        s.id = id.to_string();
        s.dependencies = deps.iter().map(|d| d.to_string()).collect();
        s
    }

    fn position(order: &[usize], idx: usize) -> usize {
        order.iter().position(|&i| i == idx).unwrap()
    }

    #[test]
    fn test_order_chain() {
        let subtasks = vec![subtask("c", &["b"]), subtask("b", &["a"]), subtask("a", &[])];
        let order = order_subtasks(&subtasks);

        assert_eq!(order.len(), 3);
        assert!(position(&order, 2) < position(&order, 1)); // a before b
        assert!(position(&order, 1) < position(&order, 0)); // b before c
    }

    #[test]
    fn test_order_diamond() {
        // a <- b, a <- c, d <- {b, c}
        let subtasks = vec![
            subtask("a", &[]),
            subtask("b", &["a"]),
            subtask("c", &["a"]),
            subtask("d", &["b", "c"]),
        ];
        let order = order_subtasks(&subtasks);

        assert!(position(&order, 0) < position(&order, 1));
        assert!(position(&order, 0) < position(&order, 2));
        assert!(position(&order, 1) < position(&order, 3));
        assert!(position(&order, 2) < position(&order, 3));
    }

    #[test]
    fn test_order_is_deterministic_first_seen() {
        let subtasks = vec![subtask("x", &[]), subtask("y", &[]), subtask("z", &[])];
        assert_eq!(order_subtasks(&subtasks), vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_terminates_and_emits_each_once() {
        let subtasks = vec![subtask("a", &["c"]), subtask("b", &["a"]), subtask("c", &["b"])];
        let order = order_subtasks(&subtasks);

        assert_eq!(order.len(), 3);
        let mut seen: Vec<usize> = order.clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_self_loop_is_ignored() {
        let subtasks = vec![subtask("a", &["a"]), subtask("b", &["a"])];
        let order = order_subtasks(&subtasks);
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_missing_dependency_is_ignored() {
        let subtasks = vec![subtask("a", &["ghost"]), subtask("b", &["a"])];
        let order = order_subtasks(&subtasks);
        assert_eq!(order.len(), 2);
        assert!(position(&order, 0) < position(&order, 1));
    }

    #[test]
    fn test_empty_input() {
        assert!(order_subtasks(&[]).is_empty());
    }

    proptest! {
        /// For any DAG (edges only point to lower indices), every subtask
        /// appears after all of its in-set dependencies.
        #[test]
        fn prop_dag_order_respects_dependencies(dep_sets in prop::collection::vec(prop::collection::vec(0usize..12, 0..4), 1..12)) {
            let subtasks: Vec<SubTask> = dep_sets
                .iter()
                .enumerate()
                .map(|(i, deps)| {
                    let dep_ids: Vec<String> = deps.iter().filter(|&&d| d < i).map(|&d| format!("st-{}", d)).collect();
                    let mut s = SubTask::new("task-1", format!("st-{}", i), "test subtask");
                    s.id = format!("st-{}", i);
                    s.dependencies = dep_ids;
                    s
                })
                .collect();

            let order = order_subtasks(&subtasks);
            prop_assert_eq!(order.len(), subtasks.len());

            for (idx, s) in subtasks.iter().enumerate() {
                let own_pos = order.iter().position(|&i| i == idx).unwrap();
                for dep_id in &s.dependencies {
                    if let Some(dep_idx) = subtasks.iter().position(|t| &t.id == dep_id) {
                        let dep_pos = order.iter().position(|&i| i == dep_idx).unwrap();
                        prop_assert!(dep_pos < own_pos);
                    }
                }
            }
        }

        /// For any dependency sets, including cyclic ones, ordering
        /// terminates and emits each subtask exactly once.
        #[test]
        fn prop_any_graph_emits_each_exactly_once(dep_sets in prop::collection::vec(prop::collection::vec(0usize..12, 0..4), 1..12)) {
            let n = dep_sets.len();
            let subtasks: Vec<SubTask> = dep_sets
                .iter()
                .enumerate()
                .map(|(i, deps)| {
                    let dep_ids: Vec<String> = deps.iter().filter(|&&d| d < n).map(|&d| format!("st-{}", d)).collect();
                    let mut s = SubTask::new("task-1", format!("st-{}", i), "test subtask");
                    s.id = format!("st-{}", i);
                    s.dependencies = dep_ids;
                    s
                })
                .collect();

            let order = order_subtasks(&subtasks);
            prop_assert_eq!(order.len(), n);

            let mut seen = order;
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());
        }
    }
}
