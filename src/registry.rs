//! Community registry: the arena holding every Community, Singleton and
//! Meta-Community of one clustering run.
//!
//! ```text
//! Meta-Community M01 ──► [C01, C04]          (owning, ordered)
//! Community C01      ──► [GO:a, GO:b, ...]    (owning, ordered term ids)
//!        │  meta ─────► M01                   (back-reference, index)
//!        │  also_overlaps ──► [S3, S7]        (non-owning, index)
//! Singleton S3       ──► linked: [C01]        (non-owning, index)
//! ```
//!
//! Cross-links between levels are plain indices into the arena. Neither side
//! owns the other, and presentation code resolves them through the lookup
//! methods on [`Hierarchy`].
//!
//! # Naming
//!
//! Communities and Meta-Communities are named by a prefix plus a contiguous,
//! 1-based ordinal zero-padded to `max(2, digits(count))`. Ordinals follow the
//! canonical order of the underlying sets: larger first, ties by ids.

use crate::error::{Error, Result};
use crate::graph::GeneSetLookup;
use crate::partition::{sort_canonical, CandidateSet};
use crate::similarity::SimilarityMeasure;
use crate::term::GeneSet;
use std::collections::{HashMap, HashSet};

/// Index of a Community in its [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommunityId(pub usize);

/// Index of a Singleton in its [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SingletonId(pub usize);

/// Index of a Meta-Community in its [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(pub usize);

/// A named group of terms with overlapping gene sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Community {
    /// Ordinal name, e.g. `C03`.
    pub name: String,
    /// Member term ids, sorted.
    pub members: Vec<String>,
    /// Union of the members' gene sets.
    pub genes: GeneSet,
    /// Singletons whose genes also overlap this Community.
    pub also_overlaps: Vec<SingletonId>,
    /// The Meta-Community this Community joined, if any.
    pub meta: Option<MetaId>,
}

/// A term not absorbed into any Community.
#[derive(Debug, Clone, PartialEq)]
pub struct Singleton {
    /// The term id.
    pub id: String,
    /// Communities whose genes overlap this term.
    pub linked: Vec<CommunityId>,
}

/// A named group of Communities.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaCommunity {
    /// Ordinal name, e.g. `M01`.
    pub name: String,
    /// Member Communities, in ordinal order.
    pub members: Vec<CommunityId>,
    /// Union of the member Communities' gene sets.
    pub genes: GeneSet,
}

/// Ordinal names `prefix01`, `prefix02`, ... for `count` items.
pub fn ordinal_names(prefix: &str, count: usize) -> Vec<String> {
    let width = count.to_string().len().max(2);
    (1..=count)
        .map(|i| format!("{prefix}{i:0width$}"))
        .collect()
}

/// The arena of one clustering run.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    communities: Vec<Community>,
    singletons: Vec<Singleton>,
    metas: Vec<MetaCommunity>,
    by_name: HashMap<String, CommunityId>,
    by_term: HashMap<String, CommunityId>,
}

impl Hierarchy {
    /// Wrap term-level sets into named Communities; every id in `all_ids` not
    /// covered by a set becomes a Singleton.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateId`] if a term appears in two sets, and
    /// [`Error::UnknownId`] if a member has no gene set.
    pub fn build<L, S>(
        mut sets: Vec<CandidateSet>,
        all_ids: &[S],
        genes: &L,
        prefix: &str,
    ) -> Result<Self>
    where
        L: GeneSetLookup + ?Sized,
        S: AsRef<str>,
    {
        sets.retain(|s| s.len() >= 2);
        sort_canonical(&mut sets);

        let names = ordinal_names(prefix, sets.len());
        let mut hierarchy = Self::default();

        for (set, name) in sets.into_iter().zip(names) {
            let cid = CommunityId(hierarchy.communities.len());
            let mut union = GeneSet::new();
            for id in set.ids() {
                let g = genes
                    .gene_set(id)
                    .ok_or_else(|| Error::UnknownId { id: id.clone() })?;
                union.extend(g.iter().cloned());
                if hierarchy.by_term.insert(id.clone(), cid).is_some() {
                    return Err(Error::DuplicateId { id: id.clone() });
                }
            }
            let _ = hierarchy.by_name.insert(name.clone(), cid);
            hierarchy.communities.push(Community {
                name,
                members: set.into_ids(),
                genes: union,
                also_overlaps: Vec::new(),
                meta: None,
            });
        }

        let mut rest: Vec<&str> = all_ids
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| !hierarchy.by_term.contains_key(*id))
            .collect();
        rest.sort_unstable();
        rest.dedup();
        hierarchy.singletons = rest
            .into_iter()
            .map(|id| Singleton {
                id: id.to_string(),
                linked: Vec::new(),
            })
            .collect();

        Ok(hierarchy)
    }

    /// Cross-link Singletons to Communities whose aggregate genes overlap them
    /// by more than `threshold`. Returns the number of links.
    ///
    /// Exhaustive over all (Community, Singleton) pairs.
    pub fn link_singletons<L>(
        &mut self,
        genes: &L,
        measure: SimilarityMeasure,
        threshold: f64,
    ) -> Result<usize>
    where
        L: GeneSetLookup + ?Sized,
    {
        let mut links = 0;
        for (si, singleton) in self.singletons.iter_mut().enumerate() {
            let own = genes
                .gene_set(&singleton.id)
                .ok_or_else(|| Error::UnknownId {
                    id: singleton.id.clone(),
                })?;
            for (ci, community) in self.communities.iter_mut().enumerate() {
                let overlaps = measure
                    .similarity(own, &community.genes)
                    .is_some_and(|w| w > threshold);
                if overlaps {
                    community.also_overlaps.push(SingletonId(si));
                    singleton.linked.push(CommunityId(ci));
                    links += 1;
                }
            }
        }
        Ok(links)
    }

    /// Wrap Community-level sets (of Community names) into named
    /// Meta-Communities and record the back-references.
    ///
    /// Returns the Communities left in no Meta-Community. On error the
    /// previous Meta-Communities are left in place.
    pub fn attach_meta_communities(
        &mut self,
        mut sets: Vec<CandidateSet>,
        prefix: &str,
    ) -> Result<Vec<CommunityId>> {
        sets.retain(|s| s.len() >= 2);
        sort_canonical(&mut sets);

        let names = ordinal_names(prefix, sets.len());
        let mut metas = Vec::with_capacity(sets.len());
        let mut assigned: HashMap<CommunityId, MetaId> = HashMap::new();
        for (set, name) in sets.into_iter().zip(names) {
            let mid = MetaId(metas.len());
            let mut members = Vec::with_capacity(set.len());
            let mut union = GeneSet::new();
            for community_name in set.ids() {
                let cid = self
                    .community_id(community_name)
                    .ok_or_else(|| Error::UnknownId {
                        id: community_name.clone(),
                    })?;
                if assigned.insert(cid, mid).is_some() {
                    return Err(Error::DuplicateId {
                        id: community_name.clone(),
                    });
                }
                union.extend(self.communities[cid.0].genes.iter().cloned());
                members.push(cid);
            }
            members.sort_unstable();
            metas.push(MetaCommunity {
                name,
                members,
                genes: union,
            });
        }

        for (i, community) in self.communities.iter_mut().enumerate() {
            community.meta = assigned.get(&CommunityId(i)).copied();
        }
        self.metas = metas;

        Ok(self.singleton_meta_communities())
    }

    /// All Communities, in ordinal order.
    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    /// All Singletons, sorted by term id.
    pub fn singletons(&self) -> &[Singleton] {
        &self.singletons
    }

    /// All Meta-Communities, in ordinal order.
    pub fn meta_communities(&self) -> &[MetaCommunity] {
        &self.metas
    }

    /// Communities that joined no Meta-Community, in ordinal order.
    pub fn singleton_meta_communities(&self) -> Vec<CommunityId> {
        self.communities
            .iter()
            .enumerate()
            .filter(|(_, c)| c.meta.is_none())
            .map(|(i, _)| CommunityId(i))
            .collect()
    }

    /// Look up a Community.
    pub fn community(&self, id: CommunityId) -> Option<&Community> {
        self.communities.get(id.0)
    }

    /// Look up a Singleton.
    pub fn singleton(&self, id: SingletonId) -> Option<&Singleton> {
        self.singletons.get(id.0)
    }

    /// Look up a Meta-Community.
    pub fn meta_community(&self, id: MetaId) -> Option<&MetaCommunity> {
        self.metas.get(id.0)
    }

    /// Community by name.
    pub fn community_id(&self, name: &str) -> Option<CommunityId> {
        self.by_name.get(name).copied()
    }

    /// Community by name.
    pub fn community_by_name(&self, name: &str) -> Option<&Community> {
        self.community_id(name).and_then(|id| self.community(id))
    }

    /// The Community holding `term`, if it is not a Singleton.
    pub fn community_of(&self, term: &str) -> Option<CommunityId> {
        self.by_term.get(term).copied()
    }

    /// The Meta-Community a Community joined.
    pub fn meta_of(&self, id: CommunityId) -> Option<&MetaCommunity> {
        self.community(id)
            .and_then(|c| c.meta)
            .and_then(|m| self.meta_community(m))
    }

    /// Other Communities in the same Meta-Community.
    pub fn siblings(&self, id: CommunityId) -> Vec<CommunityId> {
        self.meta_of(id)
            .map(|m| m.members.iter().copied().filter(|&c| c != id).collect())
            .unwrap_or_default()
    }

    /// Names of the Communities a Singleton is linked to.
    pub fn linked_communities(&self, id: SingletonId) -> Vec<&str> {
        self.singleton(id)
            .map(|s| {
                s.linked
                    .iter()
                    .filter_map(|&c| self.community(c))
                    .map(|c| c.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Term ids of the Singletons that also overlap a Community.
    pub fn also_overlaps(&self, id: CommunityId) -> Vec<&str> {
        self.community(id)
            .map(|c| {
                c.also_overlaps
                    .iter()
                    .filter_map(|&s| self.singleton(s))
                    .map(|s| s.id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of distinct terms held.
    pub fn term_count(&self) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        for c in &self.communities {
            seen.extend(c.members.iter().map(String::as_str));
        }
        seen.extend(self.singletons.iter().map(|s| s.id.as_str()));
        seen.len()
    }
}

/// Community gene sets keyed by Community name, for the Meta-Community pass.
impl GeneSetLookup for Hierarchy {
    fn gene_set(&self, id: &str) -> Option<&GeneSet> {
        self.community_by_name(id).map(|c| &c.genes)
    }
}
