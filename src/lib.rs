//! # coterie
//!
//! Two-level clustering of redundant enrichment terms by gene-set overlap.
//!
//! An enrichment run returns many terms that describe the same biology with
//! nearly the same genes. `coterie` groups them:
//!
//! ```text
//! terms ──(overlap graph, modularity)──► Communities + Singletons
//! Communities ──(Jaccard graph, modularity)──► Meta-Communities
//! ```
//!
//! Groups larger than a size cap are broken up adaptively, by dropping overly
//! broad ontology terms and by raising the similarity threshold, until they
//! fit or the levers run out. Singletons are cross-linked to the Communities
//! whose genes they overlap.
//!
//! ```rust
//! use coterie::{cluster_terms, ClusterConfig, NoOntologyStats, Term, TermTable};
//!
//! let table = TermTable::from_terms([
//!     Term::new("A", "KEGG", ["g1", "g2", "g3"]),
//!     Term::new("B", "KEGG", ["g2", "g3", "g4"]),
//!     Term::new("C", "KEGG", ["g9"]),
//! ])
//! .unwrap();
//!
//! let clustering = cluster_terms(&table, &NoOntologyStats, &ClusterConfig::default()).unwrap();
//! let h = &clustering.hierarchy;
//! assert_eq!(h.communities()[0].name, "C01");
//! assert_eq!(h.communities()[0].members, ["A", "B"]);
//! assert_eq!(h.singletons()[0].id, "C");
//! ```

pub mod community;
pub mod config;
/// Error types used across `coterie`.
pub mod error;
pub mod graph;
pub mod partition;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod similarity;
pub mod term;
pub mod validate;


pub use error::{Error, Result};

pub use community::{Algorithm, CommunityDetection, GreedyModularity, Louvain};
pub use config::{ClusterConfig, EligibilityConfig, LevelConfig, LinkConfig, TypePooling};
pub use graph::{build_similarity_graph, GeneSetLookup, SimilarityGraph};
pub use partition::{partition_graph, CandidateSet, Partition, SetClass};
pub use pipeline::{cluster_terms, Clustering};
pub use registry::{
    Community, CommunityId, Hierarchy, MetaCommunity, MetaId, Singleton, SingletonId,
};
pub use resolve::{EligibilityLever, Levers, Resolution, Resolver, RoundTrace, ThresholdLever};
pub use similarity::SimilarityMeasure;
pub use term::{
    Eligibility, GeneSet, NoOntologyStats, OntologyStats, OntologyView, Term, TermStats, TermTable,
};
pub use validate::{Severity, ValidationIssue, ValidationReport};
