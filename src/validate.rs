//! Hierarchy validation and health checking.
//!
//! Verifies the structural guarantees of a clustering run:
//! - Every input term is in exactly one Community or is exactly one Singleton
//! - Every Community has at least two members
//! - Names within a level share a prefix and carry contiguous ordinals
//! - Meta-Community membership and the Community back-references agree
//! - Singleton ↔ Community links are symmetric
//!
//! # Example
//!
//! ```rust
//! use coterie::{cluster_terms, ClusterConfig, NoOntologyStats, Term, TermTable};
//!
//! let table = TermTable::from_terms([
//!     Term::new("A", "KEGG", ["g1", "g2"]),
//!     Term::new("B", "KEGG", ["g1", "g2"]),
//! ])
//! .unwrap();
//! let clustering = cluster_terms(&table, &NoOntologyStats, &ClusterConfig::default()).unwrap();
//!
//! let report = clustering.hierarchy.validate(&table);
//! assert!(report.is_healthy(), "{report}");
//! ```

use crate::registry::{CommunityId, Hierarchy, SingletonId};
use crate::term::TermTable;
use std::collections::{BTreeMap, HashMap};

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, not a problem.
    Info,
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A broken guarantee.
    Error,
    /// A term lost or duplicated.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single issue found during validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Term id or Community/Meta-Community name involved.
    pub subject: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            subject: None,
        }
    }

    /// Attach the term id or name involved.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(subject) = &self.subject {
            write!(f, " ({subject})")?;
        }
        Ok(())
    }
}

/// Report from [`Hierarchy::validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    fn push(&mut self, severity: Severity, message: impl Into<String>, subject: &str) {
        self.add(ValidationIssue::new(severity, message).with_subject(subject));
    }

    /// No errors or critical issues.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// No issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of a specific severity or higher.
    pub fn issues_at_level(&self, min_severity: Severity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity >= min_severity)
            .collect()
    }

    /// Count issues by severity.
    pub fn counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_default() += 1;
        }
        counts
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return write!(f, "Validation passed: no issues found");
        }

        let counts = self.counts();
        write!(f, "Validation report: ")?;

        let parts: Vec<String> = [
            (Severity::Critical, "critical"),
            (Severity::Error, "errors"),
            (Severity::Warning, "warnings"),
            (Severity::Info, "info"),
        ]
        .iter()
        .filter_map(|(sev, name)| counts.get(sev).map(|c| format!("{c} {name}")))
        .collect();

        writeln!(f, "{}", parts.join(", "))?;

        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }

        Ok(())
    }
}

impl Hierarchy {
    /// Check the structural guarantees of this hierarchy against the terms it
    /// was built from.
    pub fn validate(&self, table: &TermTable) -> ValidationReport {
        let mut report = ValidationReport::new();
        check_coverage(self, table, &mut report);
        check_communities(self, &mut report);
        check_names(self.communities().iter().map(|c| c.name.as_str()), &mut report);
        check_names(self.meta_communities().iter().map(|m| m.name.as_str()), &mut report);
        check_meta_membership(self, &mut report);
        check_links(self, &mut report);

        let unassigned = self.singleton_meta_communities().len();
        if unassigned > 0 && !self.meta_communities().is_empty() {
            report.add(ValidationIssue::new(
                Severity::Info,
                format!("{unassigned} Communities joined no Meta-Community"),
            ));
        }
        report
    }
}

/// Every term exactly once, and nothing that is not a term.
fn check_coverage(hierarchy: &Hierarchy, table: &TermTable, report: &mut ValidationReport) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let members = hierarchy
        .communities()
        .iter()
        .flat_map(|c| c.members.iter())
        .chain(hierarchy.singletons().iter().map(|s| &s.id));
    for id in members {
        *seen.entry(id.as_str()).or_default() += 1;
    }

    for term in table.iter() {
        match seen.remove(term.id.as_str()) {
            None => report.push(
                Severity::Critical,
                "term is in no Community and no Singleton",
                &term.id,
            ),
            Some(1) => {}
            Some(n) => {
                report.push(Severity::Critical, format!("term placed {n} times"), &term.id);
            }
        }
    }
    for id in seen.keys() {
        report.push(Severity::Error, "id is not an input term", id);
    }
}

fn check_communities(hierarchy: &Hierarchy, report: &mut ValidationReport) {
    for community in hierarchy.communities() {
        if community.members.len() < 2 {
            report.push(
                Severity::Error,
                "Community has fewer than two members",
                &community.name,
            );
        }
        if community.genes.is_empty() {
            report.push(Severity::Warning, "Community has no genes", &community.name);
        }
    }
}

/// Shared prefix, contiguous 1-based ordinals zero-padded to `max(2, digits)`.
fn check_names<'a>(names: impl Iterator<Item = &'a str>, report: &mut ValidationReport) {
    let names: Vec<&str> = names.collect();
    let width = names.len().to_string().len().max(2);
    let mut prefix: Option<&str> = None;
    for (i, name) in names.iter().enumerate() {
        let ordinal = format!("{:0width$}", i + 1);
        let Some(head) = name.strip_suffix(ordinal.as_str()) else {
            report.push(Severity::Error, format!("expected ordinal {ordinal}"), name);
            continue;
        };
        match prefix {
            None => prefix = Some(head),
            Some(p) if p != head => {
                report.push(Severity::Error, format!("prefix differs from '{p}'"), name);
            }
            Some(_) => {}
        }
    }
}

/// Each Community in at most one Meta-Community, recorded on both sides.
fn check_meta_membership(hierarchy: &Hierarchy, report: &mut ValidationReport) {
    let mut owner: HashMap<CommunityId, usize> = HashMap::new();
    for (mi, meta) in hierarchy.meta_communities().iter().enumerate() {
        if meta.members.len() < 2 {
            report.push(
                Severity::Error,
                "Meta-Community has fewer than two members",
                &meta.name,
            );
        }
        for &cid in &meta.members {
            if owner.insert(cid, mi).is_some() {
                report.push(
                    Severity::Error,
                    "Community in more than one Meta-Community",
                    &meta.name,
                );
            }
        }
    }

    for (ci, community) in hierarchy.communities().iter().enumerate() {
        let listed = owner.get(&CommunityId(ci)).copied();
        let recorded = community.meta.map(|m| m.0);
        if listed != recorded {
            report.push(
                Severity::Error,
                "meta back-reference disagrees with Meta-Community members",
                &community.name,
            );
        }
    }
}

fn check_links(hierarchy: &Hierarchy, report: &mut ValidationReport) {
    for (si, singleton) in hierarchy.singletons().iter().enumerate() {
        for &cid in &singleton.linked {
            let back = hierarchy
                .community(cid)
                .is_some_and(|c| c.also_overlaps.contains(&SingletonId(si)));
            if !back {
                report.push(Severity::Error, "link has no back-link", &singleton.id);
            }
        }
    }
    for (ci, community) in hierarchy.communities().iter().enumerate() {
        for &sid in &community.also_overlaps {
            let back = hierarchy
                .singleton(sid)
                .is_some_and(|s| s.linked.contains(&CommunityId(ci)));
            if !back {
                report.push(Severity::Error, "link has no back-link", &community.name);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::partition::CandidateSet;
    use crate::similarity::SimilarityMeasure;
    use crate::term::Term;

    fn table() -> TermTable {
        TermTable::from_terms([
            Term::new("a", "KEGG", ["g1", "g2"]),
            Term::new("b", "KEGG", ["g1", "g2", "g3"]),
            Term::new("c", "KEGG", ["g7", "g8"]),
            Term::new("d", "KEGG", ["g7", "g8", "g9"]),
            Term::new("e", "KEGG", ["g1", "g7"]),
        ])
        .unwrap()
    }

    fn hierarchy(table: &TermTable) -> Hierarchy {
        let sets = vec![CandidateSet::from_ids(["a", "b"]), CandidateSet::from_ids(["c", "d"])];
        let mut h = Hierarchy::build(sets, &table.ids(), table, "C").unwrap();
        let _ = h
            .link_singletons(table, SimilarityMeasure::OverlapCoefficient, 0.4)
            .unwrap();
        let _ = h
            .attach_meta_communities(vec![CandidateSet::from_ids(["C01", "C02"])], "M")
            .unwrap();
        h
    }

    #[test]
    fn test_built_hierarchy_is_clean() {
        let table = table();
        let report = hierarchy(&table).validate(&table);
        assert!(report.is_clean(), "{report}");
        assert_eq!(report.to_string(), "Validation passed: no issues found");
    }

    #[test]
    fn test_missing_term_is_critical() {
        let table = table();
        let h = Hierarchy::build(vec![CandidateSet::from_ids(["a", "b"])], &["a", "b"], &table, "C")
            .unwrap();
        let report = h.validate(&table);
        assert!(!report.is_healthy());
        let critical = report.issues_at_level(Severity::Critical);
        let missing: Vec<_> = critical.iter().filter_map(|i| i.subject.as_deref()).collect();
        assert_eq!(missing, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_name_checks() {
        let mut report = ValidationReport::new();
        check_names(["C01", "C02", "C03"].into_iter(), &mut report);
        assert!(report.is_clean());

        check_names(["C01", "C03"].into_iter(), &mut report);
        check_names(["C01", "X02"].into_iter(), &mut report);
        assert_eq!(report.counts().get(&Severity::Error), Some(&2));
    }

    #[test]
    fn test_report_display_lists_issues() {
        let mut report = ValidationReport::new();
        report.add(
            ValidationIssue::new(Severity::Warning, "Community has no genes").with_subject("C01"),
        );
        let text = report.to_string();
        assert!(text.starts_with("Validation report: 1 warnings"));
        assert!(text.contains("[WARN] Community has no genes (C01)"));
        assert!(report.is_healthy());
    }
}
