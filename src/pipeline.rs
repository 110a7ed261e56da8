//! End-to-end clustering of one enrichment result.
//!
//! ```text
//! TermTable ──► term pass (per pool) ──► Hierarchy::build ──► link_singletons
//!                   │                                              │
//!          graph → partition → resolve                             ▼
//!                                            meta pass: graph over Community genes
//!                                            → partition → resolve (threshold only)
//!                                            → attach_meta_communities
//! ```
//!
//! Every piece of state is local to one call; nothing survives between runs.
//! Two calls with equal inputs produce equal hierarchies, names included.

use crate::config::{ClusterConfig, TypePooling};
use crate::error::{Error, Result};
use crate::graph::build_similarity_graph;
use crate::partition::{partition_graph, CandidateSet};
use crate::registry::{Community, CommunityId, Hierarchy};
use crate::resolve::{EligibilityLever, Levers, Resolution, Resolver, RoundTrace};
use crate::term::{OntologyStats, OntologyView, TermTable};
use tracing::info;

/// Output of [`cluster_terms`].
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Communities, Singletons and Meta-Communities.
    pub hierarchy: Hierarchy,
    /// Resolver traces of the term-level pass, one per oversized set.
    pub term_runs: Vec<Vec<RoundTrace>>,
    /// Resolver traces of the Community-level pass.
    pub meta_runs: Vec<Vec<RoundTrace>>,
    /// Term sets still oversized when the levers ran out. They are kept as
    /// Communities.
    pub term_residue: Vec<CandidateSet>,
    /// Community sets still oversized when the levers ran out. They are kept
    /// as Meta-Communities.
    pub meta_residue: Vec<CandidateSet>,
}

impl Clustering {
    /// Communities that joined no Meta-Community, in ordinal order.
    pub fn singleton_meta_communities(&self) -> Vec<&Community> {
        self.hierarchy
            .singleton_meta_communities()
            .into_iter()
            .filter_map(|id| self.hierarchy.community(id))
            .collect()
    }

    /// Whether any resolver run ended with oversized residue.
    pub fn has_residue(&self) -> bool {
        !self.term_residue.is_empty() || !self.meta_residue.is_empty()
    }
}

/// Cluster the terms of `table` into Communities and Meta-Communities.
///
/// `stats` supplies descendant counts and levels for ontology-typed terms; it
/// is only consulted when an oversized set needs the eligibility lever.
///
/// # Errors
///
/// [`Error::EmptyInput`] for an empty table, [`Error::InvalidParameter`] for
/// an invalid `config`, and [`Error::MissingOntologyStats`] when the
/// eligibility lever meets an ontology term without stats.
pub fn cluster_terms(
    table: &TermTable,
    stats: &dyn OntologyStats,
    config: &ClusterConfig,
) -> Result<Clustering> {
    config.validate()?;
    if table.is_empty() {
        return Err(Error::EmptyInput);
    }

    let view = OntologyView::new(table, &config.ontology_types, stats);
    let pools: Vec<Vec<String>> = match config.pooling {
        TypePooling::Combined => vec![table.ids()],
        TypePooling::PerType => table.ids_by_type().into_values().collect(),
    };

    let mut sets = Vec::new();
    let mut term_runs = Vec::new();
    let mut term_residue = Vec::new();
    for pool in &pools {
        let pass = term_pass(pool, table, view, config)?;
        sets.extend(pass.accepted);
        sets.extend(pass.residue.iter().cloned());
        term_runs.extend(pass.runs);
        term_residue.extend(pass.residue);
    }

    let mut hierarchy = Hierarchy::build(sets, &table.ids(), table, &config.community_prefix)?;
    let links = hierarchy.link_singletons(table, config.link.measure, config.link.threshold)?;

    let meta = meta_pass(&hierarchy, config)?;
    let mut meta_sets = meta.accepted;
    meta_sets.extend(meta.residue.iter().cloned());
    let unassigned = hierarchy.attach_meta_communities(meta_sets, &config.meta_prefix)?;

    info!(
        terms = table.len(),
        pools = pools.len(),
        communities = hierarchy.communities().len(),
        singletons = hierarchy.singletons().len(),
        links,
        meta_communities = hierarchy.meta_communities().len(),
        unassigned_communities = unassigned.len(),
        "clustered enrichment terms"
    );

    Ok(Clustering {
        hierarchy,
        term_runs,
        meta_runs: meta.runs,
        term_residue,
        meta_residue: meta.residue,
    })
}

/// Sets produced by one level pass.
struct Pass {
    /// Accepted straight away or by the resolver.
    accepted: Vec<CandidateSet>,
    /// Irreducible oversized sets.
    residue: Vec<CandidateSet>,
    runs: Vec<Vec<RoundTrace>>,
}

impl Pass {
    fn new(mut accepted: Vec<CandidateSet>, resolution: Resolution) -> Self {
        accepted.extend(resolution.accepted);
        Self {
            accepted,
            residue: resolution.residue,
            runs: resolution.runs,
        }
    }
}

/// Partition one pool of terms and resolve its oversized sets.
fn term_pass(
    pool: &[String],
    table: &TermTable,
    view: OntologyView<'_>,
    config: &ClusterConfig,
) -> Result<Pass> {
    let level = &config.term;
    let graph = build_similarity_graph(pool, table, level.measure, level.min_weight)?;
    let partition = partition_graph(&graph, level.size_cap, &config.algorithm)?;

    let threshold = config.threshold_lever(level);
    let levers = if pool.iter().any(|id| view.is_ontology(id)) {
        let e = &config.eligibility;
        Levers::with_eligibility(
            threshold,
            EligibilityLever {
                start_bound: e.max_descendants,
                step: e.step,
                floor: e.floor,
                min_level: e.min_level,
                view,
            },
        )
    } else {
        Levers::threshold_only(threshold)
    };

    let resolver = Resolver::new(table, level.measure, level.size_cap, &config.algorithm);
    let resolution = resolver.resolve(partition.oversized, &levers)?;
    Ok(Pass::new(partition.accepted, resolution))
}

/// Group Communities by the overlap of their aggregate gene sets.
///
/// Same routine as the term pass, over Community names, with the threshold
/// lever only.
fn meta_pass(hierarchy: &Hierarchy, config: &ClusterConfig) -> Result<Pass> {
    let level = &config.meta;
    let names: Vec<&str> = hierarchy.communities().iter().map(|c| c.name.as_str()).collect();
    let graph = build_similarity_graph(&names, hierarchy, level.measure, level.min_weight)?;
    let partition = partition_graph(&graph, level.size_cap, &config.algorithm)?;

    let levers = Levers::threshold_only(config.threshold_lever(level));
    let resolver = Resolver::new(hierarchy, level.measure, level.size_cap, &config.algorithm);
    let resolution = resolver.resolve(partition.oversized, &levers)?;
    Ok(Pass::new(partition.accepted, resolution))
}

/// Communities of `hierarchy` grouped by Meta-Community name, with the
/// unassigned ones under `None`. Convenience for reports.
pub fn grouped_by_meta(hierarchy: &Hierarchy) -> Vec<(Option<&str>, Vec<CommunityId>)> {
    let mut out: Vec<(Option<&str>, Vec<CommunityId>)> = hierarchy
        .meta_communities()
        .iter()
        .map(|m| (Some(m.name.as_str()), m.members.clone()))
        .collect();
    let rest = hierarchy.singleton_meta_communities();
    if !rest.is_empty() {
        out.push((None, rest));
    }
    out
}
