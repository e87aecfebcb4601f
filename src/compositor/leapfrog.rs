use log::{debug, info};
use nalgebra::Matrix3;

use crate::{
    algorithms::geometry::{invert_affine, overlap_ratio, transformed_rect},
    compositor::{Composition, Compositor, RunContext},
    error::{Error, EstimationError, Result},
    estimation::TransformEstimator,
    matching::FeatureMatcher,
};

/// Aligns every frame against the most recent reference frame instead of its
/// predecessor.
///
/// A frame becomes the new reference as soon as its footprint covers less than
/// `overlap_threshold` of the current reference's footprint. The number of
/// chained inversions between a frame and frame 0 is therefore the number of
/// reference switches, not the frame index.
///
/// Every step depends on the reference chosen by the previous one, so frames
/// are processed strictly in order.
#[derive(Clone, Debug)]
pub struct LeapfrogCompositor {
    overlap_threshold: f64,
    max_distance_ratio: f64,
}

impl Default for LeapfrogCompositor {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.8,
            max_distance_ratio: 1.0 / 3.0,
        }
    }
}

impl LeapfrogCompositor {
    /// Overlap ratio below which the current frame becomes the reference.
    pub fn overlap_threshold(self, overlap_threshold: f64) -> Self {
        Self {
            overlap_threshold,
            ..self
        }
    }

    /// Largest keypoint displacement accepted for a match, as a fraction of
    /// the frame width.
    pub fn max_distance_ratio(self, max_distance_ratio: f64) -> Self {
        Self {
            max_distance_ratio,
            ..self
        }
    }
}

impl Compositor for LeapfrogCompositor {
    fn compose<D, M, E>(&self, run: &RunContext<'_, D, M, E>) -> Result<Composition>
    where
        D: Send + Sync,
        M: FeatureMatcher<D>,
        E: TransformEstimator<D>,
    {
        if run.is_empty() {
            return Err(Error::EmptySource);
        }

        let (width, height) = (run.width as f64, run.height as f64);
        let max_distance = width * self.max_distance_ratio;

        let mut transforms = Vec::with_capacity(run.len());
        transforms.push(Matrix3::identity());
        let mut reference_frames = vec![0];
        let mut reference = 0;

        for frame in 1..run.len() {
            let local = run.local_transform(reference, frame, Some(max_distance))?;
            let inverse = invert_affine(&local).ok_or(Error::Estimation {
                frame,
                reference,
                source: EstimationError::Singular,
            })?;

            let global = transforms[reference] * inverse;

            let overlap = overlap_ratio(
                &transformed_rect(width, height, &transforms[reference]),
                &transformed_rect(width, height, &global),
            );

            transforms.push(global);

            if overlap < self.overlap_threshold {
                debug!(
                    "frame {} overlaps reference {} by {:.3}, switching reference",
                    frame, reference, overlap
                );
                reference = frame;
                reference_frames.push(frame);
            }
        }

        info!(
            "leapfrog used {} reference frames over {} frames",
            reference_frames.len(),
            run.len()
        );

        Ok(Composition {
            transforms,
            reference_frames: Some(reference_frames),
        })
    }
}
