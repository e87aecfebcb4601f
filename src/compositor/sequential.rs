use log::info;
use nalgebra::Matrix3;
use rayon::prelude::*;

use crate::{
    algorithms::geometry::invert_affine,
    compositor::{Composition, Compositor, RunContext},
    error::{Error, EstimationError, Result},
    estimation::TransformEstimator,
    matching::FeatureMatcher,
};

/// Chains every frame onto its predecessor: `G[i] = G[i-1] * inverse(L[i])`.
///
/// Errors of every local transform compound over the sequence, nothing bounds
/// the drift.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialCompositor;

impl Compositor for SequentialCompositor {
    fn compose<D, M, E>(&self, run: &RunContext<'_, D, M, E>) -> Result<Composition>
    where
        D: Send + Sync,
        M: FeatureMatcher<D>,
        E: TransformEstimator<D>,
    {
        if run.is_empty() {
            return Err(Error::EmptySource);
        }

        // consecutive pairs are independent of each other
        let locals: Vec<Result<Matrix3<f64>>> = (1..run.len())
            .into_par_iter()
            .map(|frame| run.local_transform(frame - 1, frame, None))
            .collect();

        info!("matched {} consecutive frame pairs", locals.len());

        let mut transforms = Vec::with_capacity(run.len());
        transforms.push(Matrix3::identity());

        // the earliest failing frame is the one reported
        for (frame, local) in (1..).zip(locals) {
            let inverse = invert_affine(&local?).ok_or(Error::Estimation {
                frame,
                reference: frame - 1,
                source: EstimationError::Singular,
            })?;

            let previous = transforms[frame - 1];
            transforms.push(previous * inverse);
        }

        Ok(Composition {
            transforms,
            reference_frames: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::geometry::is_affine,
        compositor::fixtures::*,
        estimation::ArrsacAffine,
        features::Feature,
    };

    fn compose(features: &[Vec<Feature<usize>>]) -> Result<Composition> {
        let run = RunContext {
            features,
            width: 200,
            height: 100,
            matcher: &IdMatcher,
            estimator: &ArrsacAffine::default(),
        };
        SequentialCompositor.compose(&run)
    }

    #[test]
    fn translation_accumulates() {
        let features = panning_features(5, 200.0, 100.0, (5.0, 3.0));
        let composition = compose(&features).unwrap();

        assert_eq!(composition.transforms.len(), 5);
        assert_eq!(composition.transforms[0], Matrix3::identity());
        assert_eq!(composition.reference_frames, None);

        for (i, g) in composition.transforms.iter().enumerate() {
            assert!(is_affine(g));
            assert_transform_eq(g, &translation(5.0 * i as f64, 3.0 * i as f64), 1e-6);
        }
    }

    #[test]
    fn still_sequence_is_identity() {
        let features = panning_features(4, 200.0, 100.0, (0.0, 0.0));
        let composition = compose(&features).unwrap();

        for g in &composition.transforms {
            assert_transform_eq(g, &Matrix3::identity(), 1e-9);
        }
    }

    #[test]
    fn single_frame() {
        let features = panning_features(1, 200.0, 100.0, (0.0, 0.0));
        let composition = compose(&features).unwrap();
        assert_eq!(composition.transforms, vec![Matrix3::identity()]);
    }

    #[test]
    fn empty_matches_fail_on_the_later_frame() {
        let features = panning_features(3, 200.0, 100.0, (2.0, 0.0));
        let run = RunContext {
            features: &features,
            width: 200,
            height: 100,
            matcher: &EmptyMatcher,
            estimator: &ArrsacAffine::default(),
        };

        match SequentialCompositor.compose(&run) {
            Err(Error::Estimation {
                frame: 1,
                reference: 0,
                source: EstimationError::TooFewCorrespondences { found: 0, .. },
            }) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
