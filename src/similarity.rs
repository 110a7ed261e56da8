//! Set-similarity measures over gene sets.
//!
//! ```text
//! Jaccard(A, B)             = |A ∩ B| / |A ∪ B|
//! Overlap-Coefficient(A, B) = |A ∩ B| / min(|A|, |B|)
//! ```
//!
//! Both are symmetric and lie in [0, 1]. Jaccard penalizes size asymmetry;
//! the overlap coefficient scores a small set nested inside a large one as 1.0,
//! which suits enrichment terms where a specific child term sits inside its
//! broad parent.
//!
//! When the denominator is zero the value is undefined and [`SimilarityMeasure::similarity`]
//! returns `None`. Callers treat that pair as having no edge.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which set-similarity measure to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SimilarityMeasure {
    /// |A ∩ B| / |A ∪ B|
    Jaccard,
    /// |A ∩ B| / min(|A|, |B|)
    #[default]
    OverlapCoefficient,
}

impl SimilarityMeasure {
    /// Similarity between two sets, or `None` when undefined.
    pub fn similarity<T: Ord>(&self, a: &BTreeSet<T>, b: &BTreeSet<T>) -> Option<f64> {
        let inter = intersection_len(a, b);
        let denom = match self {
            SimilarityMeasure::Jaccard => a.len() + b.len() - inter,
            SimilarityMeasure::OverlapCoefficient => a.len().min(b.len()),
        };
        if denom == 0 {
            return None;
        }
        Some(inter as f64 / denom as f64)
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SimilarityMeasure::Jaccard => "jaccard",
            SimilarityMeasure::OverlapCoefficient => "overlap",
        }
    }
}

impl core::fmt::Display for SimilarityMeasure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

fn intersection_len<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|x| large.contains(*x)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_overlap_coefficient() {
        let a = set(&["g1", "g2", "g3"]);
        let b = set(&["g2", "g3", "g4"]);
        let w = SimilarityMeasure::OverlapCoefficient.similarity(&a, &b);
        assert!((w.unwrap_or(0.0) - 2.0 / 3.0).abs() < 1e-12);

        let c = set(&["g9"]);
        assert_eq!(SimilarityMeasure::OverlapCoefficient.similarity(&a, &c), Some(0.0));
    }

    #[test]
    fn test_jaccard() {
        let x: BTreeSet<String> = (1..=10).map(|i| format!("g{i}")).collect();
        let y: BTreeSet<String> = (5..=14).map(|i| format!("g{i}")).collect();
        let w = SimilarityMeasure::Jaccard.similarity(&x, &y).unwrap_or(0.0);
        assert!((w - 6.0 / 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_nested_set_scores_one_under_overlap() {
        let small = set(&["g1", "g2"]);
        let large = set(&["g1", "g2", "g3", "g4"]);
        assert_eq!(SimilarityMeasure::OverlapCoefficient.similarity(&small, &large), Some(1.0));
        assert_eq!(SimilarityMeasure::Jaccard.similarity(&small, &large), Some(0.5));
    }

    #[test]
    fn test_empty_sets_are_undefined() {
        let empty = BTreeSet::<String>::new();
        let a = set(&["g1"]);
        assert_eq!(SimilarityMeasure::Jaccard.similarity(&empty, &empty), None);
        assert_eq!(SimilarityMeasure::OverlapCoefficient.similarity(&empty, &empty), None);
        assert_eq!(SimilarityMeasure::OverlapCoefficient.similarity(&empty, &a), None);
        assert_eq!(SimilarityMeasure::Jaccard.similarity(&empty, &a), Some(0.0));
    }

    proptest! {
        #[test]
        fn similarity_is_symmetric_and_bounded(
            a in proptest::collection::btree_set(0u8..30, 0..12),
            b in proptest::collection::btree_set(0u8..30, 0..12),
        ) {
            for measure in [SimilarityMeasure::Jaccard, SimilarityMeasure::OverlapCoefficient] {
                let ab = measure.similarity(&a, &b);
                let ba = measure.similarity(&b, &a);
                prop_assert_eq!(ab, ba);
                if let Some(w) = ab {
                    prop_assert!((0.0..=1.0).contains(&w));
                }
            }
        }
    }
}
