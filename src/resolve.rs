//! Adaptive resolution of oversized candidate sets.
//!
//! A partition run can leave sets larger than the size cap: broad terms glue
//! otherwise separate groups together. The resolver breaks them up by
//! escalating two levers, round by round, on each oversized set:
//!
//! 1. **Eligibility** (ontology-typed ids only): lower the maximum descendant
//!    bound by one step and drop ontology ids that now exceed it, then rebuild
//!    the similarity subgraph over the survivors at the current threshold and
//!    re-partition.
//! 2. **Threshold**: if residue is still oversized, raise the similarity
//!    threshold by one step and re-partition the same ids.
//!
//! ```text
//! round:      1      2      3   ...
//! bound:     45     40     35        (start 50, step 5, floor 10)
//! threshold: 0.6    0.7    0.8       (start 0.5, step 0.1, max 0.9)
//! ```
//!
//! The loop stops when no oversized residue remains or every lever is spent
//! (threshold above its max and bound below its floor). Residue left at that
//! point is returned unmodified; it is never force-split. Ids that fall out of
//! a set (dropped by eligibility, or left without edges at a higher threshold)
//! are never re-admitted and end up as singletons.
//!
//! Eligibility always runs before the threshold raise within a round. The
//! order changes which ids survive.
//!
//! Without an eligibility lever (non-ontology pools, and the Community level)
//! a round is a single raise + re-partition, so a run takes at most
//! `(max − start) / step + 1` rounds.

use crate::community::CommunityDetection;
use crate::error::{Error, Result};
use crate::graph::{build_similarity_graph, GeneSetLookup};
use crate::partition::{partition_graph, sort_canonical, CandidateSet};
use crate::similarity::SimilarityMeasure;
use crate::term::{Eligibility, OntologyView};
use tracing::{debug, warn};

/// Slack for comparing thresholds built from repeated steps.
const EPS: f64 = 1e-9;

/// The similarity-threshold lever.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdLever {
    /// Threshold of the initial partition.
    pub start: f64,
    /// Increment per raise.
    pub step: f64,
    /// Largest threshold that still counts as unexhausted.
    pub max: f64,
}

impl ThresholdLever {
    /// Create a threshold lever.
    pub fn new(start: f64, step: f64, max: f64) -> Self {
        Self { start, step, max }
    }

    /// Threshold after `raises` raises, snapped to a 1e-9 grid so repeated
    /// steps compare exactly against gene-set ratios.
    pub fn at(&self, raises: u32) -> f64 {
        let raw = self.start + self.step * f64::from(raises);
        (raw * 1e9).round() / 1e9
    }

    /// Whether `threshold` may still be raised.
    pub fn available(&self, threshold: f64) -> bool {
        threshold <= self.max + EPS
    }

    /// Upper bound on rounds when this is the only lever.
    pub fn max_rounds(&self) -> usize {
        if self.step <= 0.0 || self.start > self.max + EPS {
            return 0;
        }
        ((self.max - self.start) / self.step + EPS).floor() as usize + 1
    }
}

/// The ontology-eligibility lever.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityLever<'a> {
    /// Starting maximum descendant bound.
    pub start_bound: usize,
    /// Decrement per round.
    pub step: usize,
    /// Smallest bound that still counts as unexhausted.
    pub floor: usize,
    /// Minimum ontology level, held fixed.
    pub min_level: usize,
    /// Which ids are ontology-typed, and their stats.
    pub view: OntologyView<'a>,
}

impl EligibilityLever<'_> {
    fn available(&self, bound: usize) -> bool {
        self.step > 0 && bound >= self.floor
    }

    /// Upper bound on tightenings.
    pub fn max_rounds(&self) -> usize {
        if self.step == 0 || self.start_bound < self.floor {
            return 0;
        }
        (self.start_bound - self.floor) / self.step + 1
    }
}

/// Levers available to one resolver run.
#[derive(Debug, Clone, Copy)]
pub struct Levers<'a> {
    /// Similarity-threshold lever.
    pub threshold: ThresholdLever,
    /// Eligibility lever, if the pool has ontology-typed ids.
    pub eligibility: Option<EligibilityLever<'a>>,
}

impl<'a> Levers<'a> {
    /// Only the threshold lever.
    pub fn threshold_only(threshold: ThresholdLever) -> Self {
        Self {
            threshold,
            eligibility: None,
        }
    }

    /// Both levers.
    pub fn with_eligibility(threshold: ThresholdLever, eligibility: EligibilityLever<'a>) -> Self {
        Self {
            threshold,
            eligibility: Some(eligibility),
        }
    }

    /// Upper bound on rounds for one run.
    ///
    /// With the default levers an ontology pool may run 9 rounds, not 5:
    /// once the threshold passes its maximum, each remaining tightening
    /// still re-partitions at the last raised threshold (1.0 by default).
    pub fn max_rounds(&self) -> usize {
        let t = self.threshold.max_rounds();
        match &self.eligibility {
            Some(e) => t.max(e.max_rounds()),
            None => t,
        }
    }
}

/// What happened in one resolver round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrace {
    /// 1-based round number within its run.
    pub round: usize,
    /// Eligibility bound after this round's tightening, if the lever exists.
    pub bound: Option<usize>,
    /// Threshold at the end of the round.
    pub threshold: f64,
    /// Ids dropped by eligibility this round.
    pub dropped: Vec<String>,
    /// Sizes of sets accepted this round, in canonical order.
    pub accepted: Vec<usize>,
    /// Oversized residue carried to the next round.
    pub residue: Vec<CandidateSet>,
}

/// Output of resolving a batch of oversized sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Every set accepted across all rounds, in canonical order.
    pub accepted: Vec<CandidateSet>,
    /// Sets still oversized when the levers ran out, in canonical order.
    pub residue: Vec<CandidateSet>,
    /// One trace per run (per input set), in input order.
    pub runs: Vec<Vec<RoundTrace>>,
}

impl Resolution {
    /// Accepted sets followed by residue.
    pub fn into_sets(self) -> Vec<CandidateSet> {
        let mut sets = self.accepted;
        sets.extend(self.residue);
        sets
    }
}

/// Re-partitions oversized sets with escalating levers.
///
/// Generic over the gene-set source, so it serves both terms and Communities.
#[derive(Debug)]
pub struct Resolver<'a, L: ?Sized, D: ?Sized> {
    genes: &'a L,
    measure: SimilarityMeasure,
    size_cap: usize,
    detector: &'a D,
}

impl<'a, L, D> Resolver<'a, L, D>
where
    L: GeneSetLookup + ?Sized,
    D: CommunityDetection + ?Sized,
{
    /// Create a resolver.
    pub fn new(genes: &'a L, measure: SimilarityMeasure, size_cap: usize, detector: &'a D) -> Self {
        Self {
            genes,
            measure,
            size_cap,
            detector,
        }
    }

    /// Resolve each oversized set in its own run with fresh levers.
    pub fn resolve(&self, oversized: Vec<CandidateSet>, levers: &Levers<'_>) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        for set in oversized {
            let trace = self.resolve_one(set, levers, &mut resolution)?;
            resolution.runs.push(trace);
        }
        sort_canonical(&mut resolution.accepted);
        sort_canonical(&mut resolution.residue);
        Ok(resolution)
    }

    fn resolve_one(
        &self,
        set: CandidateSet,
        levers: &Levers<'_>,
        out: &mut Resolution,
    ) -> Result<Vec<RoundTrace>> {
        let initial_size = set.len();
        let mut residue = vec![set];
        let mut raises = 0u32;
        let mut threshold = levers.threshold.at(0);
        let mut bound = levers.eligibility.as_ref().map(|e| e.start_bound);
        let mut trace = Vec::new();

        let lever_left = |threshold: f64, bound: Option<usize>| {
            levers.threshold.available(threshold)
                || matches!((&levers.eligibility, bound), (Some(e), Some(b)) if e.available(b))
        };

        let max_rounds = levers.max_rounds();
        while !residue.is_empty() && lever_left(threshold, bound) && trace.len() < max_rounds {
            let round = trace.len() + 1;
            let mut accepted = Vec::new();
            let mut dropped = Vec::new();

            if let (Some(lever), Some(b)) = (&levers.eligibility, bound.as_mut()) {
                if lever.available(*b) {
                    *b = b.saturating_sub(lever.step);
                    let gate = Eligibility::new(*b, lever.min_level);
                    residue = self.tighten(residue, lever, gate, &mut dropped)?;
                    residue = self.repartition(residue, threshold, &mut accepted)?;
                }
            }

            if !residue.is_empty() && levers.threshold.available(threshold) {
                raises += 1;
                threshold = levers.threshold.at(raises);
                residue = self.repartition(residue, threshold, &mut accepted)?;
            }

            debug!(
                round,
                bound = ?bound,
                threshold,
                dropped = dropped.len(),
                accepted = accepted.len(),
                residue = residue.len(),
                "resolver round"
            );

            sort_canonical(&mut accepted);
            trace.push(RoundTrace {
                round,
                bound,
                threshold,
                dropped,
                accepted: accepted.iter().map(CandidateSet::len).collect(),
                residue: residue.clone(),
            });
            out.accepted.extend(accepted);
        }

        if !residue.is_empty() {
            warn!(
                initial_size,
                residue = residue.len(),
                largest = residue.first().map_or(0, CandidateSet::len),
                size_cap = self.size_cap,
                "resolver levers exhausted with oversized residue"
            );
        }
        out.residue.extend(residue);
        Ok(trace)
    }

    /// Drop ontology ids the gate no longer admits.
    fn tighten(
        &self,
        residue: Vec<CandidateSet>,
        lever: &EligibilityLever<'_>,
        gate: Eligibility,
        dropped: &mut Vec<String>,
    ) -> Result<Vec<CandidateSet>> {
        let mut kept = Vec::with_capacity(residue.len());
        for set in residue {
            let mut survivors = Vec::with_capacity(set.len());
            for id in set.into_ids() {
                if lever.view.admits(&id, gate)? {
                    survivors.push(id);
                } else {
                    dropped.push(id);
                }
            }
            kept.push(CandidateSet::from_ids(survivors));
        }
        Ok(kept)
    }

    /// Rebuild the subgraph of each set at `threshold` and partition it.
    ///
    /// Accepted sets go to `accepted`; the oversized ones are returned.
    fn repartition(
        &self,
        residue: Vec<CandidateSet>,
        threshold: f64,
        accepted: &mut Vec<CandidateSet>,
    ) -> Result<Vec<CandidateSet>> {
        let mut next = Vec::new();
        for set in residue {
            let graph = build_similarity_graph(set.ids(), self.genes, self.measure, threshold)?;
            let partition = partition_graph(&graph, self.size_cap, self.detector)?;
            accepted.extend(partition.accepted);
            next.extend(partition.oversized);
        }
        sort_canonical(&mut next);
        Ok(next)
    }
}

/// Check a lever configuration before use.
pub fn validate_threshold_lever(lever: &ThresholdLever) -> Result<()> {
    if !(0.0..=1.0).contains(&lever.start) {
        return Err(Error::InvalidParameter {
            name: "threshold",
            message: "must be within [0, 1]",
        });
    }
    if !(lever.step > 0.0 && lever.step.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "threshold_step",
            message: "must be positive",
        });
    }
    if !(0.0..=1.0).contains(&lever.max) {
        return Err(Error::InvalidParameter {
            name: "max_threshold",
            message: "must be within [0, 1]",
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::community::GreedyModularity;
    use crate::term::{GeneSet, Term, TermStats, TermTable};
    use petgraph::graph::UnGraph;
    use petgraph::unionfind::UnionFind;
    use petgraph::visit::EdgeRef;
    use std::collections::{BTreeSet, HashMap};

    /// Connected components as communities: makes splits predictable.
    struct Components;

    impl CommunityDetection for Components {
        fn detect<N, E>(&self, graph: &UnGraph<N, E>) -> Result<Vec<usize>>
        where
            E: Copy + Into<f64>,
        {
            let mut uf = UnionFind::<usize>::new(graph.node_count());
            for edge in graph.edge_references() {
                let _ = uf.union(edge.source().index(), edge.target().index());
            }
            Ok(crate::community::relabel(&uf.into_labeling()))
        }
    }

    fn go_types() -> BTreeSet<String> {
        ["GO:BP".to_string()].into()
    }

    /// Three groups of ontology terms: 12 A, 9 B and 19 C.
    ///
    /// A and B terms share two of their four genes, so every A–B pair scores
    /// exactly 0.5 and at that threshold A ∪ B (21) is one dense block. C
    /// terms score 0.75 among themselves and nothing against A or B. All
    /// descendant counts are below 45, so only the threshold raise can
    /// separate A from B.
    fn three_groups() -> (TermTable, HashMap<String, TermStats>) {
        let mut terms = Vec::new();
        for i in 0..12 {
            terms.push(Term::new(format!("A{i:02}"), "GO:BP", ["x1", "x2", "a1", "a2"]));
        }
        for i in 0..9 {
            terms.push(Term::new(format!("B{i:02}"), "GO:BP", ["x1", "x2", "b1", "b2"]));
        }
        for i in 0..19 {
            let genes = ["c1", "c2", "c3"].map(String::from);
            let own = format!("c_own{i}");
            terms.push(Term::new(format!("C{i:02}"), "GO:BP", genes.into_iter().chain([own])));
        }
        let stats = terms
            .iter()
            .map(|t| (t.id.clone(), TermStats::new(10, 5)))
            .collect();
        (TermTable::from_terms(terms).unwrap(), stats)
    }

    fn default_levers(view: OntologyView<'_>) -> Levers<'_> {
        Levers::with_eligibility(
            ThresholdLever::new(0.5, 0.1, 0.9),
            EligibilityLever {
                start_bound: 50,
                step: 5,
                floor: 10,
                min_level: 0,
                view,
            },
        )
    }

    #[test]
    fn test_threshold_lever_steps() {
        let lever = ThresholdLever::new(0.5, 0.1, 0.9);
        assert_eq!(lever.at(0), 0.5);
        assert_eq!(lever.at(3), 0.8);
        assert!(lever.available(0.9));
        assert!(!lever.available(lever.at(5)));
        assert_eq!(lever.max_rounds(), 5);
        assert_eq!(ThresholdLever::new(0.7, 0.1, 0.9).max_rounds(), 3);
    }

    fn assert_twelve_nine_nineteen<D: CommunityDetection>(detector: &D) {
        let (table, stats) = three_groups();
        let types = go_types();
        let levers = default_levers(OntologyView::new(&table, &types, &stats));

        let all = CandidateSet::from_ids(table.ids());
        assert_eq!(all.len(), 40);

        let resolver = Resolver::new(&table, SimilarityMeasure::OverlapCoefficient, 15, detector);
        let resolution = resolver.resolve(vec![all], &levers).unwrap();

        let first = &resolution.runs[0][0];
        assert_eq!(first.bound, Some(45));
        assert_eq!(first.threshold, 0.6);
        assert!(first.dropped.is_empty());
        assert_eq!(first.accepted, vec![12, 9]);
        assert_eq!(first.residue.len(), 1);
        assert_eq!(first.residue[0].len(), 19);
        assert!(first.residue[0].ids().iter().all(|id| id.starts_with('C')));

        // At 0.8 the C group loses every edge and dissolves into singletons.
        assert!(resolution.residue.is_empty());
        assert_eq!(resolution.accepted.len(), 2);
        assert_eq!(resolution.runs[0].len(), 3);
        assert_eq!(resolution.runs[0][2].threshold, 0.8);
    }

    #[test]
    fn test_first_round_splits_twelve_and_nine() {
        assert_twelve_nine_nineteen(&GreedyModularity::new());
    }

    #[test]
    fn test_first_round_split_with_components() {
        assert_twelve_nine_nineteen(&Components);
    }

    #[test]
    fn test_starting_threshold_keeps_a_and_b_together() {
        // The raise does the split: at 0.5 the tightening re-partition still
        // sees A ∪ B as one oversized block.
        let (table, _) = three_groups();
        let graph =
            build_similarity_graph(&table.ids(), &table, SimilarityMeasure::OverlapCoefficient, 0.5)
                .unwrap();
        let partition = partition_graph(&graph, 15, &GreedyModularity::new()).unwrap();
        assert!(partition.accepted.is_empty());
        let sizes: Vec<usize> = partition.oversized.iter().map(CandidateSet::len).collect();
        assert_eq!(sizes, vec![21, 19]);
    }

    #[test]
    fn test_dropped_ids_never_return() {
        let (table, mut stats) = three_groups();
        // Broad terms: gone once the bound falls below 48.
        let _ = stats.insert("A00".into(), TermStats::new(48, 2));
        let _ = stats.insert("A01".into(), TermStats::new(48, 2));
        let types = go_types();
        let levers = default_levers(OntologyView::new(&table, &types, &stats));

        let detector = GreedyModularity::new();
        let resolver = Resolver::new(&table, SimilarityMeasure::OverlapCoefficient, 15, &detector);
        let resolution = resolver
            .resolve(vec![CandidateSet::from_ids(table.ids())], &levers)
            .unwrap();

        let run = &resolution.runs[0];
        assert_eq!(run[0].dropped, vec!["A00".to_string(), "A01".to_string()]);
        assert_eq!(run[0].threshold, 0.6);
        assert_eq!(run[0].accepted, vec![10, 9]);
        for round in run {
            for set in &round.residue {
                assert!(!set.contains("A00") && !set.contains("A01"));
            }
        }
        for set in &resolution.accepted {
            assert!(!set.contains("A00") && !set.contains("A01"));
        }
    }

    #[test]
    fn test_irreducible_residue_returned_unmodified() {
        // 16 identical gene sets: weight 1.0 at every threshold.
        let genes: HashMap<String, GeneSet> = (0..16)
            .map(|i| (format!("K{i:02}"), ["g1", "g2", "g3"].map(String::from).into()))
            .collect();
        let set = CandidateSet::from_ids(genes.keys().cloned());
        let lever = ThresholdLever::new(0.5, 0.1, 0.9);
        let detector = GreedyModularity::new();
        let resolver = Resolver::new(&genes, SimilarityMeasure::Jaccard, 15, &detector);

        let resolution = resolver
            .resolve(vec![set.clone()], &Levers::threshold_only(lever))
            .unwrap();

        assert!(resolution.accepted.is_empty());
        assert_eq!(resolution.residue, vec![set]);
        assert_eq!(resolution.runs[0].len(), lever.max_rounds());
        assert_eq!(resolution.runs[0].len(), 5);
    }

    #[test]
    fn test_ontology_pool_runs_nine_rounds_up_to_full_overlap() {
        // 16 identical narrow GO terms: nothing is ever dropped and no
        // threshold separates them, so both levers run dry.
        let terms = (0..16).map(|i| Term::new(format!("GO:{i:02}"), "GO:BP", ["g1", "g2", "g3"]));
        let table = TermTable::from_terms(terms).unwrap();
        let stats: HashMap<String, TermStats> = table
            .ids()
            .into_iter()
            .map(|id| (id, TermStats::new(3, 4)))
            .collect();
        let types = go_types();
        let levers = default_levers(OntologyView::new(&table, &types, &stats));
        let detector = GreedyModularity::new();
        let resolver = Resolver::new(&table, SimilarityMeasure::OverlapCoefficient, 15, &detector);

        let resolution = resolver
            .resolve(vec![CandidateSet::from_ids(table.ids())], &levers)
            .unwrap();

        let run = &resolution.runs[0];
        assert_eq!(levers.max_rounds(), 9);
        assert_eq!(run.len(), 9);
        let thresholds: Vec<f64> = run.iter().map(|r| r.threshold).collect();
        assert_eq!(thresholds, vec![0.6, 0.7, 0.8, 0.9, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(run[8].bound, Some(5));
        assert!(run.iter().all(|r| r.dropped.is_empty()));
        assert_eq!(resolution.residue.len(), 1);
        assert_eq!(resolution.residue[0].len(), 16);
    }

    #[test]
    fn test_missing_stats_fail_fast() {
        let (table, _) = three_groups();
        let types = go_types();
        let stats: HashMap<String, TermStats> = HashMap::new();
        let levers = default_levers(OntologyView::new(&table, &types, &stats));
        let resolver =
            Resolver::new(&table, SimilarityMeasure::OverlapCoefficient, 15, &Components);
        let err = resolver
            .resolve(vec![CandidateSet::from_ids(table.ids())], &levers)
            .unwrap_err();
        assert!(matches!(err, Error::MissingOntologyStats { .. }));
    }

    #[test]
    fn test_validate_threshold_lever() {
        assert!(validate_threshold_lever(&ThresholdLever::new(0.5, 0.1, 0.9)).is_ok());
        assert!(validate_threshold_lever(&ThresholdLever::new(1.5, 0.1, 0.9)).is_err());
        assert!(validate_threshold_lever(&ThresholdLever::new(0.5, 0.0, 0.9)).is_err());
    }
}
