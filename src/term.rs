//! Enrichment terms and the read-only lookups the clustering passes consume.
//!
//! A [`Term`] is one significant result of an over-representation or
//! gene-set-enrichment run: an id, a type label (`GO:BP`, `KEGG`, ...), a
//! free-text definition and the genes that drove the hit. Terms are immutable
//! once loaded into a [`TermTable`].
//!
//! Ontology-typed terms additionally carry a `(descendant_count, level)` pair
//! supplied by an external ontology collaborator through [`OntologyStats`].
//! Broad terms high up the ontology have many descendants; the resolver uses
//! this to shed them from oversized groups.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A set of gene identifiers.
///
/// Ordered so that every traversal over it is reproducible.
pub type GeneSet = BTreeSet<String>;

/// One enrichment result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Term {
    /// Unique identifier (e.g. `GO:0006915`).
    pub id: String,
    /// Type label (e.g. `GO:BP`, `KEGG`).
    pub term_type: String,
    /// Free-text description.
    #[cfg_attr(feature = "serde", serde(default))]
    pub definition: String,
    /// Genes associated with this term in the experiment.
    pub genes: GeneSet,
}

impl Term {
    /// Create a term with an empty definition.
    pub fn new<I, G>(id: impl Into<String>, term_type: impl Into<String>, genes: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        Self {
            id: id.into(),
            term_type: term_type.into(),
            definition: String::new(),
            genes: genes.into_iter().map(Into::into).collect(),
        }
    }

    /// Set the definition.
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }
}

/// Ontology statistics for one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TermStats {
    /// Number of descendant terms in the ontology DAG.
    pub descendant_count: usize,
    /// Depth of the term below the ontology root.
    pub level: usize,
}

impl TermStats {
    /// Create a stats pair.
    pub fn new(descendant_count: usize, level: usize) -> Self {
        Self {
            descendant_count,
            level,
        }
    }
}

/// Read-only lookup of ontology statistics.
pub trait OntologyStats {
    /// Stats for `id`, if the ontology knows it.
    fn stats(&self, id: &str) -> Option<TermStats>;
}

impl OntologyStats for HashMap<String, TermStats> {
    fn stats(&self, id: &str) -> Option<TermStats> {
        self.get(id).copied()
    }
}

impl OntologyStats for BTreeMap<String, TermStats> {
    fn stats(&self, id: &str) -> Option<TermStats> {
        self.get(id).copied()
    }
}

/// Stats lookup for inputs that carry no ontology terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOntologyStats;

impl OntologyStats for NoOntologyStats {
    fn stats(&self, _id: &str) -> Option<TermStats> {
        None
    }
}

/// Eligibility gate for ontology-typed terms.
///
/// A term is admitted when it is specific enough (`descendant_count <= max_descendants`)
/// and deep enough (`level >= min_level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    /// Largest admitted descendant count.
    pub max_descendants: usize,
    /// Smallest admitted ontology level.
    pub min_level: usize,
}

impl Eligibility {
    /// Create an eligibility gate.
    pub fn new(max_descendants: usize, min_level: usize) -> Self {
        Self {
            max_descendants,
            min_level,
        }
    }

    /// Whether a term with these stats passes the gate.
    pub fn admits(&self, stats: TermStats) -> bool {
        stats.descendant_count <= self.max_descendants && stats.level >= self.min_level
    }
}

/// Terms indexed by id.
#[derive(Debug, Clone, Default)]
pub struct TermTable {
    terms: Vec<Term>,
    index: HashMap<String, usize>,
}

impl TermTable {
    /// Build a table, rejecting duplicate ids.
    pub fn from_terms(terms: impl IntoIterator<Item = Term>) -> Result<Self> {
        let mut table = Self::default();
        for term in terms {
            if table.index.contains_key(&term.id) {
                return Err(Error::DuplicateId { id: term.id });
            }
            let _ = table.index.insert(term.id.clone(), table.terms.len());
            table.terms.push(term);
        }
        Ok(table)
    }

    /// Look up a term.
    pub fn get(&self, id: &str) -> Option<&Term> {
        self.index.get(id).map(|&i| &self.terms[i])
    }

    /// Gene set of a term.
    pub fn genes(&self, id: &str) -> Option<&GeneSet> {
        self.get(id).map(|t| &t.genes)
    }

    /// Type label of a term.
    pub fn term_type(&self, id: &str) -> Option<&str> {
        self.get(id).map(|t| t.term_type.as_str())
    }

    /// All ids, in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.terms.iter().map(|t| t.id.clone()).collect()
    }

    /// Iterate over terms in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the table has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Ids grouped by type label. Groups and their ids are sorted.
    pub fn ids_by_type(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for term in &self.terms {
            groups
                .entry(term.term_type.clone())
                .or_default()
                .push(term.id.clone());
        }
        for ids in groups.values_mut() {
            ids.sort_unstable();
        }
        groups
    }

    /// A copy of the table without terms that have fewer than `min_genes` genes.
    pub fn with_min_genes(&self, min_genes: usize) -> Self {
        let terms: Vec<Term> = self
            .terms
            .iter()
            .filter(|t| t.genes.len() >= min_genes)
            .cloned()
            .collect();
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self { terms, index }
    }
}

/// Which ids are ontology-typed, and their stats.
///
/// Bundles the term table, the set of ontology type labels and the external
/// stats lookup so that eligibility can be decided per id.
#[derive(Clone, Copy)]
pub struct OntologyView<'a> {
    table: &'a TermTable,
    ontology_types: &'a BTreeSet<String>,
    stats: &'a dyn OntologyStats,
}

impl<'a> OntologyView<'a> {
    /// Create a view.
    pub fn new(
        table: &'a TermTable,
        ontology_types: &'a BTreeSet<String>,
        stats: &'a dyn OntologyStats,
    ) -> Self {
        Self {
            table,
            ontology_types,
            stats,
        }
    }

    /// Whether `id` is an ontology-typed term.
    pub fn is_ontology(&self, id: &str) -> bool {
        self.table
            .term_type(id)
            .is_some_and(|t| self.ontology_types.contains(t))
    }

    /// Whether `id` passes `gate`. Non-ontology ids always pass.
    ///
    /// Fails if an ontology-typed id has no stats.
    pub fn admits(&self, id: &str, gate: Eligibility) -> Result<bool> {
        if !self.is_ontology(id) {
            return Ok(true);
        }
        let stats = self
            .stats
            .stats(id)
            .ok_or_else(|| Error::MissingOntologyStats { id: id.to_string() })?;
        Ok(gate.admits(stats))
    }

    /// The ids of the table that pass `gate`, in insertion order.
    pub fn eligible_ids(&self, gate: Eligibility) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(self.table.len());
        for term in self.table.iter() {
            if self.admits(&term.id, gate)? {
                out.push(term.id.clone());
            }
        }
        Ok(out)
    }
}

impl core::fmt::Debug for OntologyView<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OntologyView")
            .field("terms", &self.table.len())
            .field("ontology_types", self.ontology_types)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table() -> TermTable {
        TermTable::from_terms([
            Term::new("GO:1", "GO:BP", ["g1", "g2", "g3"]),
            Term::new("GO:2", "GO:BP", ["g2"]),
            Term::new("hsa04110", "KEGG", ["g4", "g5"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = TermTable::from_terms([
            Term::new("GO:1", "GO:BP", ["g1"]),
            Term::new("GO:1", "GO:MF", ["g2"]),
        ])
        .unwrap_err();
        assert_eq!(err, Error::DuplicateId { id: "GO:1".into() });
    }

    #[test]
    fn test_ids_by_type() {
        let groups = table().ids_by_type();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["GO:BP"], vec!["GO:1".to_string(), "GO:2".to_string()]);
        assert_eq!(groups["KEGG"], vec!["hsa04110".to_string()]);
    }

    #[test]
    fn test_with_min_genes() {
        let filtered = table().with_min_genes(2);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.get("GO:2").is_none());
        assert_eq!(filtered.genes("hsa04110").unwrap().len(), 2);
    }

    #[test]
    fn test_eligibility_gate() {
        let table = table();
        let types: BTreeSet<String> = ["GO:BP".to_string()].into();
        let mut stats = HashMap::new();
        let _ = stats.insert("GO:1".to_string(), TermStats::new(120, 3));
        let _ = stats.insert("GO:2".to_string(), TermStats::new(4, 6));

        let view = OntologyView::new(&table, &types, &stats);
        let ids = view.eligible_ids(Eligibility::new(50, 2)).unwrap();
        assert_eq!(ids, vec!["GO:2".to_string(), "hsa04110".to_string()]);

        let ids = view.eligible_ids(Eligibility::new(200, 4)).unwrap();
        assert_eq!(ids, vec!["GO:2".to_string(), "hsa04110".to_string()]);
    }

    #[test]
    fn test_missing_stats_fails_fast() {
        let table = table();
        let types: BTreeSet<String> = ["GO:BP".to_string()].into();
        let view = OntologyView::new(&table, &types, &NoOntologyStats);
        assert_eq!(
            view.admits("GO:1", Eligibility::new(50, 0)),
            Err(Error::MissingOntologyStats { id: "GO:1".into() })
        );
        assert_eq!(view.admits("hsa04110", Eligibility::new(50, 0)), Ok(true));
    }
}
