use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use sample_consensus::{Estimator, Model};

use crate::algorithms::geometry::transform_point;

/// Matched keypoint positions, source frame first.
pub type PointPair = (Point2<f64>, Point2<f64>);

/// Relative singular value below which a design matrix counts as rank deficient.
const RANK_TOLERANCE: f64 = 1e-9;

/// Affine transform from source to target pixel space.
#[derive(Clone, Debug, PartialEq)]
pub struct AffineModel(pub Matrix3<f64>);

impl Model<PointPair> for AffineModel {
    /// Reprojection error of the source keypoint, in pixels.
    fn residual(&self, data: &PointPair) -> f64 {
        (transform_point(&self.0, &data.0) - data.1).norm()
    }
}

/// Minimal 3-point affine solver for `sample_consensus`.
#[derive(Default)]
pub struct AffineEstimator;

impl Estimator<PointPair> for AffineEstimator {
    const MIN_SAMPLES: usize = 3;
    type Model = AffineModel;
    type ModelIter = Option<AffineModel>;

    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = PointPair> + Clone,
    {
        let mut samples = data.take(Self::MIN_SAMPLES);
        let (a, b, c) = (samples.next()?, samples.next()?, samples.next()?);
        affine_from_triangle([a, b, c]).map(AffineModel)
    }
}

/// Exact affine map carrying three source points onto three target points.
///
/// `None` for collinear or coincident source points.
pub fn affine_from_triangle(pairs: [PointPair; 3]) -> Option<Matrix3<f64>> {
    // rows of [x y 1] for the source triangle
    let design = Matrix3::from_fn(|r, c| match c {
        0 => pairs[r].0.x,
        1 => pairs[r].0.y,
        _ => 1.0,
    });

    // twice the triangle area, relative to its extent
    let extent = pairs
        .iter()
        .flat_map(|(p, _)| [p.x.abs(), p.y.abs()])
        .fold(1.0, f64::max);
    if design.determinant().abs() <= RANK_TOLERANCE * extent * extent {
        return None;
    }

    let inverse = design.try_inverse()?;
    let row_x = inverse * Vector3::new(pairs[0].1.x, pairs[1].1.x, pairs[2].1.x);
    let row_y = inverse * Vector3::new(pairs[0].1.y, pairs[1].1.y, pairs[2].1.y);

    Some(Matrix3::new(
        row_x.x, row_x.y, row_x.z, row_y.x, row_y.y, row_y.z, 0.0, 0.0, 1.0,
    ))
}

/// Least-squares affine fit over every given pair.
///
/// `None` when the source points do not span the plane (fewer than three
/// non-collinear points).
pub fn fit_least_squares(pairs: &[PointPair]) -> Option<Matrix3<f64>> {
    if pairs.len() < AffineEstimator::MIN_SAMPLES {
        return None;
    }

    let design = DMatrix::from_fn(pairs.len(), 3, |r, c| match c {
        0 => pairs[r].0.x,
        1 => pairs[r].0.y,
        _ => 1.0,
    });
    let targets = DMatrix::from_fn(pairs.len(), 2, |r, c| match c {
        0 => pairs[r].1.x,
        _ => pairs[r].1.y,
    });

    let svd = design.svd(true, true);
    let largest = svd.singular_values.max();
    if largest <= 0.0 || svd.singular_values.min() <= RANK_TOLERANCE * largest {
        return None;
    }

    // 3x2: one column per output coordinate
    let solution = svd.solve(&targets, RANK_TOLERANCE * largest).ok()?;

    Some(Matrix3::new(
        solution[(0, 0)],
        solution[(1, 0)],
        solution[(2, 0)],
        solution[(0, 1)],
        solution[(1, 1)],
        solution[(2, 1)],
        0.0,
        0.0,
        1.0,
    ))
}
