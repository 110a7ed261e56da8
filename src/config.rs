//! Clustering configuration.
//!
//! Every knob of a run lives here and is passed explicitly into the pipeline;
//! nothing is read from process-wide state. With the `serde` feature the
//! tree (de)serializes, and sections missing from a document take their
//! defaults, so a partial TOML or JSON document is a valid configuration.

use crate::community::Algorithm;
use crate::error::{Error, Result};
use crate::resolve::{validate_threshold_lever, ThresholdLever};
use crate::similarity::SimilarityMeasure;
use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Graph and size settings for one clustering level.
///
/// Deserializes only from a complete document: the two levels have different
/// defaults, so filling a partial one from either would surprise.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LevelConfig {
    /// Similarity measure for edge weights.
    pub measure: SimilarityMeasure,
    /// Minimum edge weight (starting threshold of the resolver).
    pub min_weight: f64,
    /// Largest accepted set.
    pub size_cap: usize,
}

impl LevelConfig {
    /// Term-level defaults: overlap coefficient ≥ 0.5, at most 15 terms.
    pub fn terms() -> Self {
        Self {
            measure: SimilarityMeasure::OverlapCoefficient,
            min_weight: 0.5,
            size_cap: 15,
        }
    }

    /// Community-level defaults: Jaccard ≥ 0.1, at most 10 Communities.
    pub fn communities() -> Self {
        Self {
            measure: SimilarityMeasure::Jaccard,
            min_weight: 0.1,
            size_cap: 10,
        }
    }

    /// Set the measure.
    pub fn with_measure(mut self, measure: SimilarityMeasure) -> Self {
        self.measure = measure;
        self
    }

    /// Set the minimum edge weight.
    pub fn with_min_weight(mut self, min_weight: f64) -> Self {
        self.min_weight = min_weight;
        self
    }

    /// Set the size cap.
    pub fn with_size_cap(mut self, size_cap: usize) -> Self {
        self.size_cap = size_cap;
        self
    }
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self::terms()
    }
}

/// Settings for linking Singletons to Communities.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Similarity measure between a Singleton and a Community's genes.
    pub measure: SimilarityMeasure,
    /// A link is recorded when the overlap exceeds this value.
    pub threshold: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            measure: SimilarityMeasure::OverlapCoefficient,
            threshold: 0.5,
        }
    }
}

/// Settings for the ontology-eligibility lever.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EligibilityConfig {
    /// Starting maximum descendant count.
    pub max_descendants: usize,
    /// Decrement per resolver round.
    pub step: usize,
    /// The lever is spent once the bound drops below this.
    pub floor: usize,
    /// Minimum ontology level, fixed across rounds.
    pub min_level: usize,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            max_descendants: 50,
            step: 5,
            floor: 10,
            min_level: 0,
        }
    }
}

/// How terms of different types are pooled for the term-level pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TypePooling {
    /// All terms form one pool.
    #[default]
    Combined,
    /// One pool per type label.
    PerType,
}

/// Full configuration of a clustering run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterConfig {
    /// Term-level graph and size cap.
    pub term: LevelConfig,
    /// Singleton ↔ Community linking.
    pub link: LinkConfig,
    /// Community-level graph and size cap.
    pub meta: LevelConfig,
    /// Eligibility lever.
    pub eligibility: EligibilityConfig,
    /// Threshold increment per resolver round.
    pub threshold_step: f64,
    /// The threshold lever is spent once the threshold exceeds this.
    pub max_threshold: f64,
    /// Community detection algorithm.
    pub algorithm: Algorithm,
    /// Type pooling policy.
    pub pooling: TypePooling,
    /// Type labels treated as ontology-typed.
    pub ontology_types: BTreeSet<String>,
    /// Prefix for Community names.
    pub community_prefix: String,
    /// Prefix for Meta-Community names.
    pub meta_prefix: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            term: LevelConfig::terms(),
            link: LinkConfig::default(),
            meta: LevelConfig::communities(),
            eligibility: EligibilityConfig::default(),
            threshold_step: 0.1,
            max_threshold: 0.9,
            algorithm: Algorithm::default(),
            pooling: TypePooling::default(),
            ontology_types: ["GO:BP", "GO:CC", "GO:MF"].into_iter().map(String::from).collect(),
            community_prefix: "C".to_string(),
            meta_prefix: "M".to_string(),
        }
    }
}

impl ClusterConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the term-level settings.
    pub fn with_term_level(mut self, level: LevelConfig) -> Self {
        self.term = level;
        self
    }

    /// Set the Community-level settings.
    pub fn with_meta_level(mut self, level: LevelConfig) -> Self {
        self.meta = level;
        self
    }

    /// Set the linking settings.
    pub fn with_link(mut self, measure: SimilarityMeasure, threshold: f64) -> Self {
        self.link = LinkConfig { measure, threshold };
        self
    }

    /// Set the eligibility lever.
    pub fn with_eligibility(mut self, eligibility: EligibilityConfig) -> Self {
        self.eligibility = eligibility;
        self
    }

    /// Set the community detection algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the type pooling policy.
    pub fn with_pooling(mut self, pooling: TypePooling) -> Self {
        self.pooling = pooling;
        self
    }

    /// Replace the ontology type labels.
    pub fn with_ontology_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ontology_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Threshold lever for a level.
    pub fn threshold_lever(&self, level: &LevelConfig) -> ThresholdLever {
        ThresholdLever::new(level.min_weight, self.threshold_step, self.max_threshold)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<()> {
        for level in [&self.term, &self.meta] {
            if level.size_cap < 2 {
                return Err(Error::InvalidParameter {
                    name: "size_cap",
                    message: "must be at least 2",
                });
            }
            validate_threshold_lever(&self.threshold_lever(level))?;
        }
        if !(0.0..=1.0).contains(&self.link.threshold) {
            return Err(Error::InvalidParameter {
                name: "link.threshold",
                message: "must be within [0, 1]",
            });
        }
        if self.eligibility.step == 0 {
            return Err(Error::InvalidParameter {
                name: "eligibility.step",
                message: "must be positive",
            });
        }
        if self.community_prefix.is_empty() || self.meta_prefix.is_empty() {
            return Err(Error::InvalidParameter {
                name: "prefix",
                message: "must not be empty",
            });
        }
        if self.community_prefix == self.meta_prefix {
            return Err(Error::InvalidParameter {
                name: "prefix",
                message: "community and meta prefixes must differ",
            });
        }
        Ok(())
    }
}
