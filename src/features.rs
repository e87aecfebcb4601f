use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use log::debug;
use nalgebra::Point2;

use crate::{algorithms::brief, error::FeatureError};

/// Const Generic assignement of Feature Descriptor Size
pub const DESCRIPTOR_SIZE: usize = brief::MAX_BITS / u8::BITS as usize;
pub type BinaryDescriptor<const N: usize> = [u8; N];
pub type SizedDescriptor = BinaryDescriptor<DESCRIPTOR_SIZE>;

/// Feature object which holds a keypoint position on a frame
/// and tries to handle a generic descriptor
#[derive(Clone, Debug, PartialEq)]
pub struct Feature<Descriptor> {
    pub keypoint: Point2<f64>,
    pub descriptor: Descriptor,
}

impl<D> Feature<D> {
    pub fn new(x: f64, y: f64, descriptor: D) -> Self {
        Self {
            keypoint: Point2::new(x, y),
            descriptor,
        }
    }
}

/// Produces the keypoints and descriptors of one frame.
///
/// Detection of different frames is independent, so implementations are
/// invoked concurrently.
pub trait FeatureDetector: Sync {
    type Descriptor: Send + Sync;

    fn detect(&self, image: &GrayImage) -> Result<Vec<Feature<Self::Descriptor>>, FeatureError>;
}

/// FAST-9 keypoints described with 512-bit BRIEF descriptors.
#[derive(Clone, Debug)]
pub struct FastBrief {
    fast_threshold: u8,
    blur_sigma: f32,
    max_features: Option<usize>,
}

impl Default for FastBrief {
    fn default() -> Self {
        Self {
            fast_threshold: 35,
            // a kernel of 2 keeps BRIEF from reacting to high frequency noise
            blur_sigma: 2.0,
            max_features: Some(2000),
        }
    }
}

impl FastBrief {
    pub fn fast_threshold(self, fast_threshold: u8) -> Self {
        Self {
            fast_threshold,
            ..self
        }
    }

    pub fn blur_sigma(self, blur_sigma: f32) -> Self {
        Self { blur_sigma, ..self }
    }

    /// Keep only the strongest corners. `None` keeps all of them.
    pub fn max_features(self, max_features: Option<usize>) -> Self {
        Self {
            max_features,
            ..self
        }
    }

    /// Uses FAST (Features from Accelerated Segment Test)
    /// as a keypoint detector for features like corners in a grayscale image
    fn fast_keypoints(&self, image: &GrayImage) -> Vec<Corner> {
        let mut corners = corners_fast9(image, self.fast_threshold);

        if let Some(max) = self.max_features {
            if corners.len() > max {
                corners.sort_by(|a, b| b.score.total_cmp(&a.score));
                corners.truncate(max);
            }
        }

        corners
    }
}

impl FeatureDetector for FastBrief {
    type Descriptor = SizedDescriptor;

    fn detect(&self, image: &GrayImage) -> Result<Vec<Feature<SizedDescriptor>>, FeatureError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FeatureError::EmptyFrame { width, height });
        }

        let smoothed_image = imageproc::filter::gaussian_blur_f32(image, self.blur_sigma);

        let features: Vec<_> = self
            .fast_keypoints(image)
            .into_iter()
            .map(|Corner { x, y, .. }| Feature {
                keypoint: Point2::new(x as f64, y as f64),
                descriptor: brief::compute_descriptor(x, y, &smoothed_image),
            })
            .collect();

        debug!("detected {} keypoints", features.len());

        if features.is_empty() {
            return Err(FeatureError::NoKeypoints);
        }

        Ok(features)
    }
}
