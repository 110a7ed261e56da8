//! Greedy modularity agglomeration (Clauset–Newman–Moore).
//!
//! ## The Algorithm (Clauset, Newman & Moore 2004)
//!
//! Start with every node in its own community. At each step, merge the pair of
//! adjacent communities whose union increases modularity the most. Stop when
//! no merge increases modularity.
//!
//! With `e_ij` the fraction of edge weight running between communities i and j
//! (each direction counted separately) and `a_i` the fraction of edge ends
//! attached to community i, merging i and j changes modularity by
//!
//! ```text
//! ΔQ_ij = 2 (e_ij − γ a_i a_j)
//! ```
//!
//! Only adjacent pairs (e_ij > 0) can have a positive gain, so the search runs
//! over the community adjacency lists.
//!
//! ## Determinism
//!
//! Adjacency is kept in ordered maps and the best pair is the first maximum in
//! (i, j) order. Node order is fixed by the graph builder, so equal-gain ties
//! always resolve the same way.
//!
//! ## Complexity
//!
//! Finding the best pair scans the live adjacency: O(m) per merge and O(n·m)
//! over at most n − 1 merges. Members are kept per community, so folding j
//! into i moves only j's nodes. Enrichment pools are small enough that the
//! heap-based variant is not needed.
//!
//! ## References
//!
//! Clauset, Newman, Moore (2004). "Finding community structure in very large
//! networks." Physical Review E 70, 066111.

use super::traits::CommunityDetection;
use super::{relabel, weighted_edges};
use crate::error::{Error, Result};
use petgraph::graph::UnGraph;
use std::collections::BTreeMap;

/// Greedy modularity community detection.
#[derive(Debug, Clone)]
pub struct GreedyModularity {
    /// Resolution parameter (gamma).
    resolution: f64,
    /// Minimum modularity gain for a merge.
    min_gain: f64,
}

impl GreedyModularity {
    /// Create a detector with standard modularity (γ = 1).
    pub fn new() -> Self {
        Self {
            resolution: 1.0,
            min_gain: 1e-12,
        }
    }

    /// Set resolution parameter.
    ///
    /// Higher values produce smaller communities.
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set minimum modularity gain for a merge to be taken.
    pub fn with_min_gain(mut self, min_gain: f64) -> Self {
        self.min_gain = min_gain;
        self
    }

    /// Best merge candidate: (gain, i, j) with i < j.
    fn best_merge(
        &self,
        e: &[BTreeMap<usize, f64>],
        a: &[f64],
        alive: &[bool],
    ) -> Option<(f64, usize, usize)> {
        let mut best: Option<(f64, usize, usize)> = None;
        for (i, row) in e.iter().enumerate() {
            if !alive[i] {
                continue;
            }
            for (&j, &eij) in row.range(i + 1..) {
                let gain = 2.0 * (eij - self.resolution * a[i] * a[j]);
                if best.map_or(true, |(g, _, _)| gain > g) {
                    best = Some((gain, i, j));
                }
            }
        }
        best
    }
}

impl Default for GreedyModularity {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityDetection for GreedyModularity {
    fn detect<N, E>(&self, graph: &UnGraph<N, E>) -> Result<Vec<usize>>
    where
        E: Copy + Into<f64>,
    {
        let n = graph.node_count();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let edges = weighted_edges(graph);
        if edges.is_empty() {
            // No edges: each node is its own community
            return Ok((0..n).collect());
        }

        let two_m: f64 = 2.0 * edges.iter().map(|(_, _, w)| w).sum::<f64>();

        let mut e: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
        let mut a = vec![0.0; n];
        for &(i, j, w) in &edges {
            let frac = w / two_m;
            *e[i].entry(j).or_insert(0.0) += frac;
            *e[j].entry(i).or_insert(0.0) += frac;
            a[i] += frac;
            a[j] += frac;
        }

        let mut alive = vec![true; n];
        let mut members: Vec<Vec<usize>> = (0..n).map(|node| vec![node]).collect();

        while let Some((gain, i, j)) = self.best_merge(&e, &a, &alive) {
            if gain <= self.min_gain {
                break;
            }

            // Fold j into i.
            let row_j = std::mem::take(&mut e[j]);
            for (k, w) in row_j {
                if k == i {
                    continue;
                }
                let _ = e[k].remove(&j);
                *e[k].entry(i).or_insert(0.0) += w;
                *e[i].entry(k).or_insert(0.0) += w;
            }
            let _ = e[i].remove(&j);
            a[i] += a[j];
            a[j] = 0.0;
            alive[j] = false;
            let moved = std::mem::take(&mut members[j]);
            members[i].extend(moved);
        }

        let mut owner = vec![0; n];
        for (community, nodes) in members.iter().enumerate() {
            for &node in nodes {
                owner[node] = community;
            }
        }
        Ok(relabel(&owner))
    }

    fn resolution(&self) -> f64 {
        self.resolution
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::community::modularity;
    use petgraph::graph::UnGraph;

    fn two_triangles(bridge: f64) -> UnGraph<(), f64> {
        let mut graph = UnGraph::<(), f64>::new_undirected();
        let n: Vec<_> = (0..6).map(|_| graph.add_node(())).collect();
        for &(x, y) in &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)] {
            let _ = graph.add_edge(n[x], n[y], 1.0);
        }
        let _ = graph.add_edge(n[2], n[3], bridge);
        graph
    }

    #[test]
    fn test_greedy_triangle() {
        let mut graph = UnGraph::<(), f64>::new_undirected();
        let n0 = graph.add_node(());
        let n1 = graph.add_node(());
        let n2 = graph.add_node(());
        let _ = graph.add_edge(n0, n1, 1.0);
        let _ = graph.add_edge(n1, n2, 1.0);
        let _ = graph.add_edge(n0, n2, 1.0);

        let communities = GreedyModularity::new().detect(&graph).unwrap();
        assert_eq!(communities, vec![0, 0, 0]);
    }

    #[test]
    fn test_greedy_two_cliques() {
        let graph = two_triangles(1.0);
        let communities = GreedyModularity::new().detect(&graph).unwrap();

        assert_eq!(communities.len(), 6);
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[1], communities[2]);
        assert_eq!(communities[3], communities[4]);
        assert_eq!(communities[4], communities[5]);
        assert_ne!(communities[0], communities[3]);

        let q = modularity(&graph, &communities, 1.0);
        assert!(q > 0.3, "modularity {q}");
    }

    #[test]
    fn test_greedy_uses_weights() {
        // A heavy bridge outweighs the triangles and pulls 2 and 3 together.
        let graph = two_triangles(10.0);
        let communities = GreedyModularity::new().detect(&graph).unwrap();
        assert_eq!(communities[2], communities[3]);
    }

    #[test]
    fn test_greedy_isolated_nodes_stay_apart() {
        let mut graph = UnGraph::<(), f64>::new_undirected();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let _ = graph.add_node(());
        let _ = graph.add_edge(a, b, 0.8);

        let communities = GreedyModularity::new().detect(&graph).unwrap();
        assert_eq!(communities, vec![0, 0, 1]);
    }

    #[test]
    fn test_greedy_empty_graph() {
        let graph = UnGraph::<(), f64>::new_undirected();
        assert!(GreedyModularity::new().detect(&graph).is_err());
    }

    #[test]
    fn test_greedy_min_gain_blocks_merges() {
        // Best first merge in a triangle pair gains well under 0.5.
        let graph = two_triangles(1.0);
        let communities = GreedyModularity::new().with_min_gain(0.5).detect(&graph).unwrap();
        assert_eq!(communities, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_greedy_folds_merged_communities() {
        // Two 4-cliques joined by one edge: each side is built by folding
        // already-merged communities into each other.
        let mut graph = UnGraph::<(), f64>::new_undirected();
        let n: Vec<_> = (0..8).map(|_| graph.add_node(())).collect();
        for side in [&n[..4], &n[4..]] {
            for (x, &u) in side.iter().enumerate() {
                for &v in &side[x + 1..] {
                    let _ = graph.add_edge(u, v, 1.0);
                }
            }
        }
        let _ = graph.add_edge(n[3], n[4], 1.0);

        let communities = GreedyModularity::new().detect(&graph).unwrap();
        assert_eq!(communities, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_greedy_is_deterministic() {
        let graph = two_triangles(0.5);
        let first = GreedyModularity::new().detect(&graph).unwrap();
        for _ in 0..10 {
            assert_eq!(GreedyModularity::new().detect(&graph).unwrap(), first);
        }
    }
}
