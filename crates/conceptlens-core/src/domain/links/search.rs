//! Bounded path enumeration over the schema graph
//!
//! All searches are iterative DFS with an explicit stack. A node never
//! appears twice in one path, and every search stops once it has produced
//! its cap of paths, so dense graphs cannot blow up enumeration.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::schema::SchemaGraph;

use super::types::ReasoningMethod;

/// Partial paths kept per frontier in bidirectional search, per result path
const FRONTIER_FACTOR: usize = 16;

/// A simple path and the methods that found it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundPath {
    pub nodes: Vec<String>,
    /// Sorted, without duplicates
    pub methods: Vec<ReasoningMethod>,
}

impl FoundPath {
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// The method with the highest confidence bonus
    pub fn best_method(&self) -> ReasoningMethod {
        self.methods
            .iter()
            .copied()
            .max_by(|a, b| a.bonus().total_cmp(&b.bonus()))
            .unwrap_or(ReasoningMethod::Forward)
    }
}

/// Simple paths from `start` of at most `max_hops` edges, never entering
/// `avoid`. The trivial path `[start]` is included.
fn partial_paths(
    graph: &SchemaGraph,
    start: &str,
    avoid: &str,
    max_hops: usize,
    cap: usize,
) -> Vec<Vec<String>> {
    let mut results = Vec::new();
    let mut stack: Vec<Vec<String>> = vec![vec![start.to_string()]];

    while let Some(path) = stack.pop() {
        if results.len() >= cap {
            break;
        }
        let depth = path.len() - 1;
        let current = path[path.len() - 1].clone();
        results.push(path.clone());

        if depth >= max_hops {
            continue;
        }
        let next: Vec<&String> = graph
            .neighbors(&current)
            .filter(|n| n.as_str() != avoid && !path.contains(*n))
            .collect();
        // reversed so the smallest neighbor is explored first
        for neighbor in next.into_iter().rev() {
            let mut extended = path.clone();
            extended.push(neighbor.clone());
            stack.push(extended);
        }
    }

    results
}

/// Simple paths from `from` to `to` of at most `max_hops` edges
pub fn forward_paths(
    graph: &SchemaGraph,
    from: &str,
    to: &str,
    max_hops: usize,
    cap: usize,
) -> Vec<Vec<String>> {
    if from == to || !graph.contains(from) || !graph.contains(to) || cap == 0 {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut stack: Vec<Vec<String>> = vec![vec![from.to_string()]];

    while let Some(path) = stack.pop() {
        if results.len() >= cap {
            break;
        }
        if path.len() - 1 >= max_hops {
            continue;
        }

        let current = path[path.len() - 1].clone();
        let next: Vec<&String> = graph
            .neighbors(&current)
            .filter(|n| !path.contains(*n))
            .collect();
        for neighbor in next.into_iter().rev() {
            let mut extended = path.clone();
            extended.push(neighbor.clone());
            if neighbor == to {
                results.push(extended);
                if results.len() >= cap {
                    break;
                }
            } else {
                stack.push(extended);
            }
        }
    }

    results
}

/// Search from `to` back to `from`, returned in `from → to` order
pub fn backward_paths(
    graph: &SchemaGraph,
    from: &str,
    to: &str,
    max_hops: usize,
    cap: usize,
) -> Vec<Vec<String>> {
    forward_paths(graph, to, from, max_hops, cap)
        .into_iter()
        .map(|mut path| {
            path.reverse();
            path
        })
        .collect()
}

/// Meet-in-the-middle search
///
/// Both ends expand half of the hop budget. A forward partial path and a
/// backward partial path are stitched when their endpoints coincide or
/// are adjacent.
pub fn bidirectional_paths(
    graph: &SchemaGraph,
    from: &str,
    to: &str,
    max_hops: usize,
    cap: usize,
) -> Vec<Vec<String>> {
    if from == to || !graph.contains(from) || !graph.contains(to) || cap == 0 {
        return Vec::new();
    }

    let forward_budget = max_hops.div_ceil(2);
    let backward_budget = max_hops / 2;
    let frontier_cap = cap.saturating_mul(FRONTIER_FACTOR);

    let forward = partial_paths(graph, from, to, forward_budget, frontier_cap);
    let backward = partial_paths(graph, to, from, backward_budget, frontier_cap);

    let mut by_end: HashMap<&str, Vec<&Vec<String>>> = HashMap::new();
    for path in &backward {
        by_end
            .entry(path[path.len() - 1].as_str())
            .or_default()
            .push(path);
    }

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut results = Vec::new();

    let mut stitch = |head: &Vec<String>, tail: &Vec<String>, skip_meeting: bool| -> bool {
        let mut combined = head.clone();
        let rest = tail.iter().rev().skip(usize::from(skip_meeting));
        combined.extend(rest.cloned());

        let unique: HashSet<&String> = combined.iter().collect();
        if unique.len() != combined.len() || combined.len() - 1 > max_hops {
            return false;
        }
        if seen.insert(combined.clone()) {
            results.push(combined);
        }
        results.len() >= cap
    };

    'outer: for head in &forward {
        let end = head[head.len() - 1].as_str();

        // touching frontiers
        if let Some(tails) = by_end.get(end) {
            for tail in tails {
                if stitch(head, *tail, true) {
                    break 'outer;
                }
            }
        }
        // adjacent frontiers
        for neighbor in graph.neighbors(end) {
            if let Some(tails) = by_end.get(neighbor.as_str()) {
                for tail in tails {
                    if stitch(head, *tail, false) {
                        break 'outer;
                    }
                }
            }
        }
    }

    results
}

/// Run all three searches and merge their paths
///
/// Each path appears once, tagged with every method that found it, and the
/// result is ordered by hop count then lexicographically, capped at
/// `max_paths`.
pub fn search_paths(
    graph: &SchemaGraph,
    from: &str,
    to: &str,
    max_hops: usize,
    max_paths: usize,
) -> Vec<FoundPath> {
    let mut merged: BTreeMap<Vec<String>, Vec<ReasoningMethod>> = BTreeMap::new();
    let searches = [
        (ReasoningMethod::Forward, forward_paths(graph, from, to, max_hops, max_paths)),
        (ReasoningMethod::Backward, backward_paths(graph, from, to, max_hops, max_paths)),
        (
            ReasoningMethod::Bidirectional,
            bidirectional_paths(graph, from, to, max_hops, max_paths),
        ),
    ];

    for (method, paths) in searches {
        for path in paths {
            let methods = merged.entry(path).or_default();
            if !methods.contains(&method) {
                methods.push(method);
                methods.sort();
            }
        }
    }

    let mut found: Vec<FoundPath> = merged
        .into_iter()
        .map(|(nodes, methods)| FoundPath { nodes, methods })
        .collect();
    found.sort_by(|a, b| a.hops().cmp(&b.hops()).then_with(|| a.nodes.cmp(&b.nodes)));
    found.truncate(max_paths);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::NodeOrigin;

    /// a - b - c - d plus a shortcut a - c, entities only
    fn graph() -> SchemaGraph {
        let mut g = SchemaGraph::new();
        for id in ["a", "b", "c", "d", "e"] {
            g.upsert_entity(id, NodeOrigin::Internal);
        }
        g.connect("a", "b");
        g.connect("b", "c");
        g.connect("c", "d");
        g.connect("a", "c");
        g
    }

    fn v(nodes: &[&str]) -> Vec<String> {
        nodes.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_forward_enumerates_all_simple_paths() {
        let paths = forward_paths(&graph(), "a", "d", 3, 100);
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&v(&["a", "c", "d"])));
        assert!(paths.contains(&v(&["a", "b", "c", "d"])));
    }

    #[test]
    fn test_hop_limit() {
        let paths = forward_paths(&graph(), "a", "d", 2, 100);
        assert_eq!(paths, vec![v(&["a", "c", "d"])]);
        assert!(forward_paths(&graph(), "a", "d", 1, 100).is_empty());
    }

    #[test]
    fn test_backward_paths_are_reversed() {
        let paths = backward_paths(&graph(), "a", "d", 3, 100);
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p[0] == "a" && p[p.len() - 1] == "d"));
    }

    #[test]
    fn test_bidirectional_matches_forward() {
        let g = graph();
        for hops in 1..=4 {
            let mut forward = forward_paths(&g, "a", "d", hops, 100);
            let mut both = bidirectional_paths(&g, "a", "d", hops, 100);
            forward.sort();
            both.sort();
            assert_eq!(forward, both, "max_hops = {}", hops);
        }
    }

    #[test]
    fn test_paths_are_simple() {
        let g = graph();
        for path in search_paths(&g, "a", "d", 4, 100) {
            let unique: HashSet<&String> = path.nodes.iter().collect();
            assert_eq!(unique.len(), path.nodes.len());
        }
    }

    #[test]
    fn test_cap_limits_enumeration() {
        let mut g = SchemaGraph::new();
        for i in 0..10 {
            let mid = format!("m{}", i);
            g.upsert_entity("s", NodeOrigin::Internal);
            g.upsert_entity("t", NodeOrigin::Internal);
            g.upsert_entity(&mid, NodeOrigin::Internal);
            g.connect("s", &mid);
            g.connect(&mid, "t");
        }
        assert_eq!(forward_paths(&g, "s", "t", 2, 3).len(), 3);
        assert_eq!(bidirectional_paths(&g, "s", "t", 2, 3).len(), 3);
        assert_eq!(search_paths(&g, "s", "t", 2, 4).len(), 4);
    }

    #[test]
    fn test_search_merges_methods() {
        let found = search_paths(&graph(), "a", "d", 3, 100);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].nodes, v(&["a", "c", "d"]));
        assert_eq!(
            found[0].methods,
            vec![
                ReasoningMethod::Forward,
                ReasoningMethod::Backward,
                ReasoningMethod::Bidirectional
            ]
        );
        assert_eq!(found[0].best_method(), ReasoningMethod::Bidirectional);
        assert_eq!(found[1].hops(), 3);
    }

    #[test]
    fn test_unreachable_and_unknown_nodes() {
        let g = graph();
        assert!(search_paths(&g, "a", "e", 3, 100).is_empty());
        assert!(search_paths(&g, "a", "zzz", 3, 100).is_empty());
        assert!(search_paths(&g, "a", "a", 3, 100).is_empty());
    }
}
