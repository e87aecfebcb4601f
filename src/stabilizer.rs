//! Stabilization pipeline: feature extraction, compositing, canvas fitting
//! and lazy warping of the input frames.

use std::{iter::FusedIterator, sync::Arc};

use image::{GrayImage, RgbImage};
use log::info;
use nalgebra::Matrix3;
use rayon::prelude::*;

use crate::{
    canvas::Canvas,
    compositor::{Composition, Compositor, RunContext, Strategy},
    error::{Error, Result},
    estimation::{ArrsacAffine, TransformEstimator},
    features::{FastBrief, Feature, FeatureDetector},
    matching::{FeatureMatcher, HammingMatcher},
    source::FrameSource,
    warp,
};

/// Owns the collaborators of a stabilization run and the compositing
/// strategy.
///
/// ```no_run
/// use video_stabilizer::prelude::v1::*;
///
/// # fn main() -> video_stabilizer::Result<()> {
/// let source = ImageSequence::open("frames")?;
/// let stabilized = Stabilizer::new()
///     .with_strategy(Strategy::leapfrog())
///     .stabilize(&source, false)?;
///
/// for (index, frame) in stabilized.frames.enumerate() {
///     frame?.save(format!("out/{:06}.png", index))?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Stabilizer<Det = FastBrief, Mat = HammingMatcher, Est = ArrsacAffine> {
    detector: Det,
    matcher: Mat,
    estimator: Est,
    strategy: Strategy,
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stabilizer {
    pub fn new() -> Self {
        Self {
            detector: FastBrief::default(),
            matcher: HammingMatcher::default(),
            estimator: ArrsacAffine::default(),
            strategy: Strategy::default(),
        }
    }
}

impl<Det, Mat, Est> Stabilizer<Det, Mat, Est> {
    pub fn with_strategy(self, strategy: Strategy) -> Self {
        Self { strategy, ..self }
    }

    pub fn with_detector<T>(self, detector: T) -> Stabilizer<T, Mat, Est> {
        Stabilizer {
            detector,
            matcher: self.matcher,
            estimator: self.estimator,
            strategy: self.strategy,
        }
    }

    pub fn with_matcher<T>(self, matcher: T) -> Stabilizer<Det, T, Est> {
        Stabilizer {
            detector: self.detector,
            matcher,
            estimator: self.estimator,
            strategy: self.strategy,
        }
    }

    pub fn with_estimator<T>(self, estimator: T) -> Stabilizer<Det, Mat, T> {
        Stabilizer {
            detector: self.detector,
            matcher: self.matcher,
            estimator,
            strategy: self.strategy,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }
}

impl<Det, Mat, Est> Stabilizer<Det, Mat, Est>
where
    Det: FeatureDetector,
    Mat: FeatureMatcher<Det::Descriptor>,
    Est: TransformEstimator<Det::Descriptor>,
{
    /// Detect features on every frame of `source`, in parallel.
    pub fn extract_features<S>(&self, source: &S) -> Result<Vec<Vec<Feature<Det::Descriptor>>>>
    where
        S: FrameSource + ?Sized,
    {
        info!("extracting features from {} frames", source.len());

        let features: Vec<Result<_>> = (0..source.len())
            .into_par_iter()
            .map(|frame| {
                let image = image::imageops::grayscale(&source.frame(frame)?);
                self.detector
                    .detect(&image)
                    .map_err(|source| Error::FeatureExtraction { frame, source })
            })
            .collect();

        // sequential collect so the lowest failing frame wins
        features.into_iter().collect()
    }

    /// Global transforms of every frame relative to frame 0, before any
    /// canvas adjustment.
    pub fn compose<S>(&self, source: &S) -> Result<Composition>
    where
        S: FrameSource + ?Sized,
    {
        if source.is_empty() {
            return Err(Error::EmptySource);
        }

        let features = self.extract_features(source)?;
        let (width, height) = source.dimensions();

        let run = RunContext {
            features: &features,
            width,
            height,
            matcher: &self.matcher,
            estimator: &self.estimator,
        };

        self.strategy.compose(&run)
    }

    /// Run the whole pipeline on `source`.
    ///
    /// Every transform is known once this returns, but no frame has been
    /// warped yet: [`Stabilized::frames`] decodes and warps one frame per
    /// step. `diagnostics` controls whether [`Stabilized::diagnostics`] is
    /// filled in with the coverage mask iterator, the fitted transforms and the
    /// reference frames. [`Stabilized::mask_at`] works either way.
    pub fn stabilize<'s, S>(&self, source: &'s S, diagnostics: bool) -> Result<Stabilized<'s, S>>
    where
        S: FrameSource + ?Sized,
    {
        let Composition {
            transforms,
            reference_frames,
        } = self.compose(source)?;

        let frame_size = source.dimensions();
        let canvas = Arc::new(Canvas::fit(frame_size.0, frame_size.1, &transforms)?);

        let diagnostics = diagnostics.then(|| Diagnostics {
            transforms: canvas.transforms.clone(),
            reference_frames,
            masks: CoverageMasks::new(Arc::clone(&canvas), frame_size),
        });

        Ok(Stabilized {
            width: canvas.width,
            height: canvas.height,
            frames: StabilizedFrames::new(source, canvas),
            diagnostics,
        })
    }
}

/// Outcome of [`Stabilizer::stabilize`].
pub struct Stabilized<'s, S: ?Sized> {
    pub width: u32,
    pub height: u32,
    pub frames: StabilizedFrames<'s, S>,
    pub diagnostics: Option<Diagnostics>,
}

impl<'s, S> Stabilized<'s, S>
where
    S: FrameSource + ?Sized,
{
    pub fn canvas(&self) -> &Canvas {
        &self.frames.canvas
    }

    /// Warp frame `index` regardless of how far `frames` has been consumed.
    pub fn frame_at(&self, index: usize) -> Result<RgbImage> {
        self.frames.frame_at(index)
    }

    /// Coverage mask of frame `index`. Available whether or not diagnostics
    /// were requested, since it only depends on the fitted canvas.
    pub fn mask_at(&self, index: usize) -> Result<GrayImage> {
        mask(&self.frames.canvas, self.frames.source.dimensions(), index)
    }
}

#[derive(Clone)]
pub struct Diagnostics {
    pub masks: CoverageMasks,
    /// Canvas-fitted transforms, one per frame.
    pub transforms: Vec<Matrix3<f64>>,
    /// Final reference frames of a leapfrog run.
    pub reference_frames: Option<Vec<usize>>,
}

fn frame_transform(canvas: &Canvas, index: usize) -> Result<&Matrix3<f64>> {
    canvas.transforms.get(index).ok_or(Error::FrameOutOfRange {
        index,
        len: canvas.len(),
    })
}

fn mask(canvas: &Canvas, frame_size: (u32, u32), index: usize) -> Result<GrayImage> {
    let transform = frame_transform(canvas, index)?;
    warp::coverage_mask(frame_size, transform, canvas.dimensions())
        .ok_or(Error::SingularTransform { frame: index })
}

/// Stabilized frames in input order, warped on demand.
pub struct StabilizedFrames<'s, S: ?Sized> {
    source: &'s S,
    canvas: Arc<Canvas>,
    next: usize,
}

impl<'s, S> StabilizedFrames<'s, S>
where
    S: FrameSource + ?Sized,
{
    fn new(source: &'s S, canvas: Arc<Canvas>) -> Self {
        Self {
            source,
            canvas,
            next: 0,
        }
    }

    pub fn frame_at(&self, index: usize) -> Result<RgbImage> {
        let transform = frame_transform(&self.canvas, index)?;
        let frame = self.source.frame(index)?;
        warp::warp_frame(&frame, transform, self.canvas.dimensions())
            .ok_or(Error::SingularTransform { frame: index })
    }
}

impl<'s, S> Iterator for StabilizedFrames<'s, S>
where
    S: FrameSource + ?Sized,
{
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.canvas.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.frame_at(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.canvas.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl<'s, S> ExactSizeIterator for StabilizedFrames<'s, S> where S: FrameSource + ?Sized {}

impl<'s, S> FusedIterator for StabilizedFrames<'s, S> where S: FrameSource + ?Sized {}

/// Per-frame coverage masks in input order, 1 where the frame's content
/// lands on the canvas and 0 where the canvas is padding.
#[derive(Clone)]
pub struct CoverageMasks {
    canvas: Arc<Canvas>,
    frame_size: (u32, u32),
    next: usize,
}

impl CoverageMasks {
    fn new(canvas: Arc<Canvas>, frame_size: (u32, u32)) -> Self {
        Self {
            canvas,
            frame_size,
            next: 0,
        }
    }

    pub fn mask_at(&self, index: usize) -> Result<GrayImage> {
        mask(&self.canvas, self.frame_size, index)
    }
}

impl Iterator for CoverageMasks {
    type Item = Result<GrayImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.canvas.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.mask_at(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.canvas.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CoverageMasks {}

impl FusedIterator for CoverageMasks {}
