use arrsac::Arrsac;
use log::{debug, warn};
use nalgebra::Matrix3;
use rand::{rngs::StdRng, SeedableRng};
use sample_consensus::{Consensus, Estimator};

use crate::{
    algorithms::affine::{fit_least_squares, AffineEstimator, PointPair},
    error::EstimationError,
    features::Feature,
    matching::Correspondence,
};

/// Fits the local transform mapping `source` pixel coordinates onto `target`
/// pixel coordinates from a set of correspondences.
///
/// The returned matrix is always affine (bottom row `(0, 0, 1)`).
pub trait TransformEstimator<D>: Sync {
    fn estimate(
        &self,
        source: &[Feature<D>],
        target: &[Feature<D>],
        matches: &[Correspondence],
    ) -> Result<Matrix3<f64>, EstimationError>;
}

/// Robust affine fit: ARRSAC over 3-point hypotheses, refined by least
/// squares on the consensus set.
#[derive(Clone, Debug)]
pub struct ArrsacAffine {
    inlier_threshold: f64,
    seed: u64,
}

impl Default for ArrsacAffine {
    fn default() -> Self {
        Self {
            inlier_threshold: 3.0,
            seed: 0x5eed,
        }
    }
}

impl ArrsacAffine {
    /// Below this share of inliers the fit is still returned, but flagged.
    const LOW_INLIER_RATIO: f64 = 0.25;

    /// Largest reprojection error (pixels) of a correspondence counted as inlier.
    pub fn inlier_threshold(self, inlier_threshold: f64) -> Self {
        Self {
            inlier_threshold,
            ..self
        }
    }

    /// Seed of the sampling RNG. Every call starts from the same seed, so
    /// identical inputs give identical transforms.
    pub fn seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}

impl<D: Sync> TransformEstimator<D> for ArrsacAffine {
    fn estimate(
        &self,
        source: &[Feature<D>],
        target: &[Feature<D>],
        matches: &[Correspondence],
    ) -> Result<Matrix3<f64>, EstimationError> {
        const MIN_SAMPLES: usize = <AffineEstimator as Estimator<PointPair>>::MIN_SAMPLES;

        if matches.len() < MIN_SAMPLES {
            return Err(EstimationError::TooFewCorrespondences {
                found: matches.len(),
                required: MIN_SAMPLES,
            });
        }

        let pairs: Vec<PointPair> = matches
            .iter()
            .map(|c| (source[c.source].keypoint, target[c.target].keypoint))
            .collect();

        // no subset can do better than the whole set if it does not span the plane
        if fit_least_squares(&pairs).is_none() {
            return Err(EstimationError::Degenerate);
        }

        // This is an ARRSAC (Adaptive Real-Time Random Sample Consensus) package,
        // which could perform as well or better than RANSAC.
        // https://people.inf.ethz.ch/pomarc/pubs/RaguramECCV08.pdf
        let (_, inliers) = Arrsac::new(self.inlier_threshold, StdRng::seed_from_u64(self.seed))
            .model_inliers(&AffineEstimator, pairs.iter().copied())
            .ok_or(EstimationError::NoConsensus {
                candidates: pairs.len(),
            })?;

        let inlier_pairs: Vec<PointPair> = inliers.iter().map(|&i| pairs[i]).collect();
        let transform = fit_least_squares(&inlier_pairs).ok_or(EstimationError::Degenerate)?;

        let ratio = inlier_pairs.len() as f64 / pairs.len() as f64;
        if ratio < Self::LOW_INLIER_RATIO {
            warn!(
                "only {} of {} correspondences agree on the affine fit",
                inlier_pairs.len(),
                pairs.len()
            );
        } else {
            debug!("{} of {} inliers", inlier_pairs.len(), pairs.len());
        }

        Ok(transform)
    }
}
