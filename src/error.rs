use thiserror::Error;

/// Failure of a feature detector on a single frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("no keypoints found")]
    NoKeypoints,
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

/// Failure of a matcher between two feature sets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("not enough features to match ({found}, need at least {required})")]
    NotEnoughFeatures { found: usize, required: usize },
}

/// Failure to fit an affine transform from a correspondence set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimationError {
    #[error("too few correspondences ({found}, need at least {required})")]
    TooFewCorrespondences { found: usize, required: usize },
    #[error("no consensus reached among {candidates} correspondences")]
    NoConsensus { candidates: usize },
    #[error("correspondences are degenerate (collinear or coincident)")]
    Degenerate,
    #[error("local transform is not invertible")]
    Singular,
}

/// Errors that abort a stabilization run.
///
/// Every failure coming out of a collaborator is tagged with the frame it
/// occurred on before it leaves a compositor.
#[derive(Error, Debug)]
pub enum Error {
    #[error("could not extract features on frame {frame}")]
    FeatureExtraction {
        frame: usize,
        #[source]
        source: FeatureError,
    },
    #[error("could not match frame {frame} against frame {reference}")]
    Match {
        frame: usize,
        reference: usize,
        #[source]
        source: MatchError,
    },
    #[error("affine estimate failed on frame {frame} (against frame {reference})")]
    Estimation {
        frame: usize,
        reference: usize,
        #[source]
        source: EstimationError,
    },
    #[error("transform of frame {frame} cannot be used for warping")]
    SingularTransform { frame: usize },
    #[error("frame source is empty")]
    EmptySource,
    #[error("frame {frame} is {found:?}, expected {expected:?}")]
    FrameSizeMismatch {
        frame: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("frame index {index} out of range ({len} frames)")]
    FrameOutOfRange { index: usize, len: usize },
    #[error("invalid transform table: {0}")]
    InvalidTransforms(String),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Frame index the error is attached to, if any.
    pub fn frame(&self) -> Option<usize> {
        match self {
            Error::FeatureExtraction { frame, .. }
            | Error::Match { frame, .. }
            | Error::Estimation { frame, .. }
            | Error::SingularTransform { frame }
            | Error::FrameSizeMismatch { frame, .. } => Some(*frame),
            Error::FrameOutOfRange { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
