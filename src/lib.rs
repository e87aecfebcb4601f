//! Feature-based video stabilization.
//!
//! Every frame is registered against an earlier one with a robust affine fit
//! over matched keypoints. The local transforms are accumulated into global
//! transforms relative to frame 0, either by chaining consecutive frames or by
//! leapfrogging over a reference frame that is only replaced once its overlap
//! with the current frame becomes too small. Finally a canvas large enough
//! for every warped frame is fitted and the frames are warped onto it.

pub mod algorithms;
pub mod canvas;
pub mod compositor;
pub mod error;
pub mod estimation;
pub mod features;
pub mod matching;
pub mod source;
pub mod stabilizer;
pub mod transforms;
pub mod warp;

pub use error::{Error, Result};

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            canvas::Canvas,
            compositor::{
                Composition, Compositor, LeapfrogCompositor, SequentialCompositor, Strategy,
            },
            error::{Error, EstimationError, FeatureError, MatchError, Result},
            estimation::{ArrsacAffine, TransformEstimator},
            features::{FastBrief, Feature, FeatureDetector},
            matching::{Correspondence, FeatureMatcher, HammingMatcher},
            source::{FrameSource, ImageSequence, MemorySource},
            stabilizer::{CoverageMasks, Diagnostics, Stabilized, StabilizedFrames, Stabilizer},
            transforms::{read_transforms, write_transforms},
        };
    }
}
