//! Similarity graph construction over gene sets.
//!
//! This module bridges gene-set overlap to community detection. Given a set of
//! ids and their gene sets, it builds an undirected weighted graph where:
//! - Each id incident to at least one kept edge becomes a node
//! - An edge joins two ids whose similarity is at least `min_weight`
//! - The edge weight is the similarity itself
//!
//! ```text
//! ids + gene sets → pairwise similarity → threshold → UnGraph<String, f64> → detector
//! ```
//!
//! Sub-threshold pairs are absent, not zero-weighted. An id with no kept edge
//! does not appear in the graph at all; callers recover it as a singleton by
//! set subtraction.
//!
//! # Determinism
//!
//! Ids are sorted and deduplicated before pair enumeration, and nodes are
//! inserted in that order. Greedy community detection is order-sensitive, so
//! this is what makes repeated runs produce identical partitions.
//!
//! # Performance Considerations
//!
//! Pair enumeration is O(n²) set intersections. Pools are the significant
//! terms of one enrichment run (hundreds, rarely a few thousand), well within
//! budget.

use crate::error::{Error, Result};
use crate::similarity::SimilarityMeasure;
use crate::term::{GeneSet, TermTable};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Source of gene sets keyed by id.
///
/// Implemented for terms (the [`TermTable`]) and for communities (the
/// hierarchy arena), so the same builder serves both clustering levels.
pub trait GeneSetLookup {
    /// Gene set for `id`.
    fn gene_set(&self, id: &str) -> Option<&GeneSet>;
}

impl GeneSetLookup for TermTable {
    fn gene_set(&self, id: &str) -> Option<&GeneSet> {
        self.genes(id)
    }
}

impl GeneSetLookup for HashMap<String, GeneSet> {
    fn gene_set(&self, id: &str) -> Option<&GeneSet> {
        self.get(id)
    }
}

impl GeneSetLookup for BTreeMap<String, GeneSet> {
    fn gene_set(&self, id: &str) -> Option<&GeneSet> {
        self.get(id)
    }
}

/// An undirected similarity graph keyed by id.
///
/// Built fresh for each clustering pass and dropped afterwards.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraph {
    graph: UnGraph<String, f64>,
    index: HashMap<String, NodeIndex>,
}

impl SimilarityGraph {
    /// The underlying petgraph graph. Node weights are ids.
    pub fn inner(&self) -> &UnGraph<String, f64> {
        &self.graph
    }

    /// Number of nodes (ids with at least one edge).
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `id` participates in any edge.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Id of the node at `index`.
    pub fn id(&self, index: usize) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(index))
            .map(String::as_str)
    }

    /// Edge weight between two ids, if an edge exists.
    pub fn weight(&self, a: &str, b: &str) -> Option<f64> {
        let (&ia, &ib) = (self.index.get(a)?, self.index.get(b)?);
        self.graph
            .find_edge(ia, ib)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
    }
}

/// Build a similarity graph over `ids`.
///
/// # Errors
///
/// Returns [`Error::UnknownId`] if any id has no gene set in `genes`, and
/// [`Error::InvalidParameter`] if `min_weight` is not a finite value.
pub fn build_similarity_graph<L, S>(
    ids: &[S],
    genes: &L,
    measure: SimilarityMeasure,
    min_weight: f64,
) -> Result<SimilarityGraph>
where
    L: GeneSetLookup + ?Sized,
    S: AsRef<str>,
{
    if !min_weight.is_finite() {
        return Err(Error::InvalidParameter {
            name: "min_weight",
            message: "must be finite",
        });
    }

    let mut sorted: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let sets = sorted
        .iter()
        .map(|&id| {
            genes
                .gene_set(id)
                .ok_or_else(|| Error::UnknownId { id: id.to_string() })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut edges: Vec<(usize, usize, f64)> = Vec::new();
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            if let Some(w) = measure.similarity(sets[i], sets[j]) {
                if w >= min_weight {
                    edges.push((i, j, w));
                }
            }
        }
    }

    let mut participates = vec![false; sorted.len()];
    for &(i, j, _) in &edges {
        participates[i] = true;
        participates[j] = true;
    }

    let mut graph = UnGraph::<String, f64>::with_capacity(sorted.len(), edges.len());
    let mut index = HashMap::new();
    let mut nodes: Vec<Option<NodeIndex>> = vec![None; sorted.len()];
    for (pos, &id) in sorted.iter().enumerate() {
        if participates[pos] {
            let node = graph.add_node(id.to_string());
            let _ = index.insert(id.to_string(), node);
            nodes[pos] = Some(node);
        }
    }
    for (i, j, w) in edges {
        if let (Some(a), Some(b)) = (nodes[i], nodes[j]) {
            let _ = graph.add_edge(a, b, w);
        }
    }

    debug!(
        ids = sorted.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        measure = measure.name(),
        min_weight,
        "built similarity graph"
    );

    Ok(SimilarityGraph { graph, index })
}
