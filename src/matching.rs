use std::collections::HashSet;

use bitarray::BitArray;
use log::debug;
use space::{Knn, KnnFromBatch, LinearKnn, Metric};

use crate::{
    error::MatchError,
    features::{BinaryDescriptor, Feature},
};

/// Pair of feature indices, one in each of the two matched sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Correspondence {
    pub source: usize,
    pub target: usize,
}

impl Correspondence {
    pub fn new(source: usize, target: usize) -> Self {
        Self { source, target }
    }
}

/// Finds correspondences between the features of two frames.
pub trait FeatureMatcher<D>: Sync {
    /// Match `source` features onto `target` features.
    ///
    /// When `max_distance` is set, pairs whose keypoints lie further apart
    /// (in pixels) are dropped.
    fn correspond(
        &self,
        source: &[Feature<D>],
        target: &[Feature<D>],
        max_distance: Option<f64>,
    ) -> Result<Vec<Correspondence>, MatchError>;
}

/// Brute-force 2-NN matcher in Hamming space with Lowe's ratio test.
#[derive(Clone, Debug)]
pub struct HammingMatcher {
    lowe_ratio: f32,
    max_hamming: u32,
}

impl Default for HammingMatcher {
    fn default() -> Self {
        Self {
            lowe_ratio: 0.75,
            max_hamming: 64,
        }
    }
}

impl HammingMatcher {
    /// Minimum number of features on each side for a 2-NN search.
    pub const MIN_FEATURES: usize = 2;

    pub fn lowe_ratio(self, lowe_ratio: f32) -> Self {
        Self { lowe_ratio, ..self }
    }

    /// Largest descriptor distance a best match may have.
    pub fn max_hamming(self, max_hamming: u32) -> Self {
        Self {
            max_hamming,
            ..self
        }
    }
}

impl<const N: usize> FeatureMatcher<BinaryDescriptor<N>> for HammingMatcher {
    fn correspond(
        &self,
        source: &[Feature<BinaryDescriptor<N>>],
        target: &[Feature<BinaryDescriptor<N>>],
        max_distance: Option<f64>,
    ) -> Result<Vec<Correspondence>, MatchError> {
        for side in [source.len(), target.len()] {
            if side < Self::MIN_FEATURES {
                return Err(MatchError::NotEnoughFeatures {
                    found: side,
                    required: Self::MIN_FEATURES,
                });
            }
        }

        let data = target.iter().map(|f| (f, ())).collect::<Vec<_>>();
        let search: LinearKnn<FeatureHamming, _> = KnnFromBatch::from_batch(data.iter());

        // enforce that each point maps to only one
        let mut seen_source = HashSet::<usize>::new();
        let mut seen_target = HashSet::<usize>::new();

        let matches: Vec<_> = source
            .iter()
            .enumerate()
            .filter_map(|(i, feature)| {
                // k = 2 so that Lowe's test can reject answers chosen by noise
                let nearest = search.knn(&feature, 2);
                let (best, second) = (&nearest[0].0, &nearest[1].0);

                let within_reach = max_distance.map_or(true, |max| {
                    (target[best.index].keypoint - feature.keypoint).norm() <= max
                });

                if best.distance <= self.max_hamming
                    && best.distance < (self.lowe_ratio * second.distance as f32) as u32
                    && within_reach
                    && !seen_target.contains(&best.index)
                    && !seen_source.contains(&i)
                {
                    seen_target.insert(best.index);
                    seen_source.insert(i);

                    Some(Correspondence::new(i, best.index))
                } else {
                    None
                }
            })
            .collect();

        debug!(
            "{} correspondences between {} and {} features",
            matches.len(),
            source.len(),
            target.len()
        );

        Ok(matches)
    }
}

// Implementations for `space`

#[derive(Default)]
struct FeatureHamming;

impl<'f, const N: usize> Metric<&'f Feature<BinaryDescriptor<N>>> for FeatureHamming {
    type Unit = u32;
    fn distance(
        &self,
        a: &&Feature<BinaryDescriptor<N>>,
        b: &&Feature<BinaryDescriptor<N>>,
    ) -> Self::Unit {
        BitArray::new(a.descriptor).distance(&BitArray::new(b.descriptor))
    }
}
