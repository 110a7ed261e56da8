//! Partitioning a similarity graph into size-classified candidate sets.
//!
//! One partition run detects communities on a [`SimilarityGraph`] and sorts
//! the resulting vertex sets by cardinality:
//!
//! ```text
//! size 1        → singleton  (dropped; the caller recovers it by set subtraction)
//! size 2..=cap  → accepted
//! size > cap    → oversized  (handed to the resolver)
//! ```
//!
//! A graph without edges yields no raw communities at all. Since the graph
//! builder never inserts isolated ids, and size-1 communities are dropped, a
//! graph with isolated vertices and a graph with no vertices behave the same.

use crate::community::CommunityDetection;
use crate::error::Result;
use crate::graph::SimilarityGraph;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// An immutable, sorted collection of ids produced by one partition run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateSet {
    ids: Vec<String>,
}

impl CandidateSet {
    /// Build from ids; sorts and deduplicates.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// The ids, sorted.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Consume into the sorted ids.
    pub fn into_ids(self) -> Vec<String> {
        self.ids
    }

    /// Number of ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.binary_search_by(|x| x.as_str().cmp(id)).is_ok()
    }

    /// Classify against a size cap.
    pub fn class(&self, size_cap: usize) -> SetClass {
        match self.len() {
            0 | 1 => SetClass::Singleton,
            n if n <= size_cap => SetClass::Accepted,
            _ => SetClass::Oversized,
        }
    }

    /// Canonical order: larger sets first, then lexicographic by ids.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .len()
            .cmp(&self.len())
            .then_with(|| self.ids.cmp(&other.ids))
    }
}

/// Size class of a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetClass {
    /// One id; not a community.
    Singleton,
    /// Between 2 and the size cap.
    Accepted,
    /// Larger than the size cap.
    Oversized,
}

/// Sort candidate sets into canonical order.
pub fn sort_canonical(sets: &mut [CandidateSet]) {
    sets.sort_by(CandidateSet::canonical_cmp);
}

/// Result of one partition run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Sets of size 2..=cap, in canonical order.
    pub accepted: Vec<CandidateSet>,
    /// Sets larger than the cap, in canonical order.
    pub oversized: Vec<CandidateSet>,
}

impl Partition {
    /// Whether nothing is oversized.
    pub fn is_resolved(&self) -> bool {
        self.oversized.is_empty()
    }

    /// Total number of ids in accepted and oversized sets.
    pub fn covered(&self) -> usize {
        self.accepted
            .iter()
            .chain(&self.oversized)
            .map(CandidateSet::len)
            .sum()
    }
}

/// Detect communities on `graph` and classify them against `size_cap`.
pub fn partition_graph<D>(
    graph: &SimilarityGraph,
    size_cap: usize,
    detector: &D,
) -> Result<Partition>
where
    D: CommunityDetection + ?Sized,
{
    if graph.edge_count() == 0 {
        return Ok(Partition::default());
    }

    let labels = detector.detect(graph.inner())?;

    let mut groups: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (node, &label) in labels.iter().enumerate() {
        if let Some(id) = graph.id(node) {
            groups.entry(label).or_default().push(id);
        }
    }

    let mut partition = Partition::default();
    let mut singletons = 0usize;
    for ids in groups.into_values() {
        let set = CandidateSet::from_ids(ids);
        match set.class(size_cap) {
            SetClass::Singleton => singletons += 1,
            SetClass::Accepted => partition.accepted.push(set),
            SetClass::Oversized => partition.oversized.push(set),
        }
    }
    sort_canonical(&mut partition.accepted);
    sort_canonical(&mut partition.oversized);

    debug!(
        nodes = graph.node_count(),
        accepted = partition.accepted.len(),
        oversized = partition.oversized.len(),
        singletons,
        size_cap,
        "partitioned similarity graph"
    );

    Ok(partition)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::community::GreedyModularity;
    use crate::graph::build_similarity_graph;
    use crate::similarity::SimilarityMeasure;
    use crate::term::GeneSet;
    use std::collections::HashMap;

    fn lookup(entries: Vec<(String, Vec<String>)>) -> HashMap<String, GeneSet> {
        entries
            .into_iter()
            .map(|(id, genes)| (id, genes.into_iter().collect()))
            .collect()
    }

    /// `groups` cliques of `size` terms sharing a core of genes.
    fn cliques(groups: usize, size: usize) -> HashMap<String, GeneSet> {
        let mut entries = Vec::new();
        for g in 0..groups {
            for t in 0..size {
                let mut genes: Vec<String> = (0..4).map(|k| format!("core{g}_{k}")).collect();
                genes.push(format!("own{g}_{t}"));
                entries.push((format!("T{g}_{t:02}"), genes));
            }
        }
        lookup(entries)
    }

    #[test]
    fn test_candidate_set_order() {
        let mut sets = vec![
            CandidateSet::from_ids(["b", "c"]),
            CandidateSet::from_ids(["x", "y", "z"]),
            CandidateSet::from_ids(["a", "d"]),
        ];
        sort_canonical(&mut sets);
        assert_eq!(sets[0].ids(), ["x", "y", "z"]);
        assert_eq!(sets[1].ids(), ["a", "d"]);
        assert_eq!(sets[2].ids(), ["b", "c"]);
    }

    #[test]
    fn test_classification() {
        assert_eq!(CandidateSet::from_ids(["a"]).class(3), SetClass::Singleton);
        assert_eq!(CandidateSet::from_ids(["a", "b", "c"]).class(3), SetClass::Accepted);
        assert_eq!(CandidateSet::from_ids(["a", "b", "c", "d"]).class(3), SetClass::Oversized);
    }

    #[test]
    fn test_two_terms_one_singleton() {
        let genes = lookup(vec![
            ("A".into(), vec!["g1".into(), "g2".into(), "g3".into()]),
            ("B".into(), vec!["g2".into(), "g3".into(), "g4".into()]),
            ("C".into(), vec!["g9".into()]),
        ]);
        let graph = build_similarity_graph(
            &["A", "B", "C"],
            &genes,
            SimilarityMeasure::OverlapCoefficient,
            0.5,
        )
        .unwrap();
        let partition = partition_graph(&graph, 15, &GreedyModularity::new()).unwrap();

        assert_eq!(partition.accepted, vec![CandidateSet::from_ids(["A", "B"])]);
        assert!(partition.is_resolved());
    }

    #[test]
    fn test_zero_edges_zero_communities() {
        let genes = lookup((0..20).map(|i| (format!("T{i}"), vec![format!("g{i}")])).collect());
        let ids: Vec<String> = genes.keys().cloned().collect();
        let graph = build_similarity_graph(&ids, &genes, SimilarityMeasure::Jaccard, 0.1).unwrap();
        let partition = partition_graph(&graph, 15, &GreedyModularity::new()).unwrap();
        assert_eq!(partition, Partition::default());
    }

    #[test]
    fn test_oversized_and_accepted_split() {
        let genes = cliques(2, 6);
        let ids: Vec<String> = genes.keys().cloned().collect();
        let graph = build_similarity_graph(&ids, &genes, SimilarityMeasure::OverlapCoefficient, 0.5)
            .unwrap();

        let partition = partition_graph(&graph, 5, &GreedyModularity::new()).unwrap();
        assert!(partition.accepted.is_empty());
        assert_eq!(partition.oversized.len(), 2);
        assert_eq!(partition.covered(), 12);
        assert!(partition.oversized[0].ids().iter().all(|id| id.starts_with("T0_")));

        let partition = partition_graph(&graph, 6, &GreedyModularity::new()).unwrap();
        assert_eq!(partition.accepted.len(), 2);
        assert!(partition.is_resolved());
    }
}
