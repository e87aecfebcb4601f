//! Accumulation of local frame-to-frame transforms into global transforms.
//!
//! Two strategies are available. [`SequentialCompositor`] chains consecutive
//! frames, [`LeapfrogCompositor`] aligns every frame against a reference frame
//! that only changes when the overlap with it becomes too small.

use log::info;
use nalgebra::Matrix3;

use crate::{
    error::{Error, Result},
    estimation::TransformEstimator,
    features::Feature,
    matching::FeatureMatcher,
};

pub mod leapfrog;
pub mod sequential;

pub use leapfrog::LeapfrogCompositor;
pub use sequential::SequentialCompositor;

/// Everything a compositor needs for one stabilization run.
pub struct RunContext<'a, D, M, E> {
    /// Features of every frame, indexed by frame.
    pub features: &'a [Vec<Feature<D>>],
    pub width: u32,
    pub height: u32,
    pub matcher: &'a M,
    pub estimator: &'a E,
}

impl<'a, D, M, E> RunContext<'a, D, M, E>
where
    M: FeatureMatcher<D>,
    E: TransformEstimator<D>,
{
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Match `frame` against `reference` and fit the transform mapping the
    /// reference's pixel space onto the frame's.
    pub fn local_transform(
        &self,
        reference: usize,
        frame: usize,
        max_distance: Option<f64>,
    ) -> Result<Matrix3<f64>> {
        let reference_features = &self.features[reference];
        let frame_features = &self.features[frame];

        let matches = self
            .matcher
            .correspond(reference_features, frame_features, max_distance)
            .map_err(|source| Error::Match {
                frame,
                reference,
                source,
            })?;

        self.estimator
            .estimate(reference_features, frame_features, &matches)
            .map_err(|source| Error::Estimation {
                frame,
                reference,
                source,
            })
    }
}

/// Global transforms of a whole sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    /// One transform per frame, mapping it into the shared coordinate system.
    pub transforms: Vec<Matrix3<f64>>,
    /// Frames adopted as references, for strategies that have them.
    pub reference_frames: Option<Vec<usize>>,
}

pub trait Compositor {
    fn compose<D, M, E>(&self, run: &RunContext<'_, D, M, E>) -> Result<Composition>
    where
        D: Send + Sync,
        M: FeatureMatcher<D>,
        E: TransformEstimator<D>;
}

/// Compositor selected for a run.
#[derive(Clone, Debug)]
pub enum Strategy {
    Sequential(SequentialCompositor),
    Leapfrog(LeapfrogCompositor),
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Sequential(SequentialCompositor)
    }
}

impl Strategy {
    pub fn sequential() -> Self {
        Strategy::Sequential(SequentialCompositor)
    }

    pub fn leapfrog() -> Self {
        Strategy::Leapfrog(LeapfrogCompositor::default())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Sequential(_) => "sequential",
            Strategy::Leapfrog(_) => "leapfrog",
        }
    }
}

impl Compositor for Strategy {
    fn compose<D, M, E>(&self, run: &RunContext<'_, D, M, E>) -> Result<Composition>
    where
        D: Send + Sync,
        M: FeatureMatcher<D>,
        E: TransformEstimator<D>,
    {
        info!("composing {} frames ({})", run.len(), self.name());

        match self {
            Strategy::Sequential(c) => c.compose(run),
            Strategy::Leapfrog(c) => c.compose(run),
        }
    }
}
