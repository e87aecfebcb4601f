//! Small affine-geometry toolkit used by the canvas fitter and the
//! leapfrog overlap check.
//!
//! Transforms are `3x3` homogeneous matrices whose bottom row is `(0, 0, 1)`,
//! so points are mapped without a perspective divide.

use nalgebra::{Matrix2, Matrix3, Point2, Vector2};

/// Quadrilateral produced by mapping a frame boundary through a transform.
pub type Quad = [Point2<f64>; 4];

/// Map a single point through an affine transform.
pub fn transform_point(transform: &Matrix3<f64>, point: &Point2<f64>) -> Point2<f64> {
    Point2::new(
        transform.m11 * point.x + transform.m12 * point.y + transform.m13,
        transform.m21 * point.x + transform.m22 * point.y + transform.m23,
    )
}

/// Boundary corners of a `width x height` frame, in the order
/// `(0,0), (0,h), (w,h), (w,0)`.
pub fn frame_corners(width: f64, height: f64) -> Quad {
    [
        Point2::new(0.0, 0.0),
        Point2::new(0.0, height),
        Point2::new(width, height),
        Point2::new(width, 0.0),
    ]
}

/// Map the frame boundary rectangle through `transform`.
pub fn transformed_rect(width: f64, height: f64, transform: &Matrix3<f64>) -> Quad {
    frame_corners(width, height).map(|corner| transform_point(transform, &corner))
}

/// Invert an affine transform, keeping the bottom row exactly `(0, 0, 1)`.
///
/// `None` when the linear part is singular.
pub fn invert_affine(transform: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let linear = Matrix2::new(transform.m11, transform.m12, transform.m21, transform.m22);
    if linear.determinant().abs() <= f64::EPSILON * linear.norm_squared() {
        return None;
    }

    let inverse = linear.try_inverse()?;
    let translation = -(inverse * Vector2::new(transform.m13, transform.m23));

    Some(Matrix3::new(
        inverse.m11,
        inverse.m12,
        translation.x,
        inverse.m21,
        inverse.m22,
        translation.y,
        0.0,
        0.0,
        1.0,
    ))
}

/// Whether the bottom row is exactly `(0, 0, 1)`.
pub fn is_affine(transform: &Matrix3<f64>) -> bool {
    transform.m31 == 0.0 && transform.m32 == 0.0 && transform.m33 == 1.0
}

/// Signed shoelace area, positive for counter-clockwise winding in a y-up frame.
pub fn signed_area(polygon: &[Point2<f64>]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let doubled: f64 = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();

    doubled / 2.0
}

pub fn polygon_area(polygon: &[Point2<f64>]) -> f64 {
    signed_area(polygon).abs()
}

fn cross(u: Vector2<f64>, v: Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Clip `subject` against the convex polygon `clip` (Sutherland-Hodgman).
///
/// Works with either winding of `clip`. Returns an empty polygon when the
/// two do not intersect or `clip` has no area.
pub fn convex_intersection(subject: &[Point2<f64>], clip: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let clip_area = signed_area(clip);
    if clip_area == 0.0 {
        return Vec::new();
    }
    let orientation = clip_area.signum();

    let mut output = subject.to_vec();

    for (i, edge_start) in clip.iter().enumerate() {
        if output.is_empty() {
            break;
        }

        let edge_end = clip[(i + 1) % clip.len()];
        let direction = edge_end - edge_start;
        let side = |p: &Point2<f64>| orientation * cross(direction, p - edge_start);

        let input = std::mem::take(&mut output);
        for (j, current) in input.iter().enumerate() {
            let previous = &input[(j + input.len() - 1) % input.len()];
            let (side_previous, side_current) = (side(previous), side(current));

            // segment crossing the clip line, parametrised from `previous`
            let crossing = || {
                let t = side_previous / (side_previous - side_current);
                previous + (current - previous) * t
            };

            match (side_previous >= 0.0, side_current >= 0.0) {
                (true, true) => output.push(*current),
                (true, false) => output.push(crossing()),
                (false, true) => {
                    output.push(crossing());
                    output.push(*current);
                }
                (false, false) => {}
            }
        }
    }

    output
}

pub fn intersection_area(a: &[Point2<f64>], b: &[Point2<f64>]) -> f64 {
    polygon_area(&convex_intersection(a, b))
}

/// Fraction of `reference`'s area covered by `other`.
///
/// A reference without area is treated as not overlapping anything.
pub fn overlap_ratio(reference: &[Point2<f64>], other: &[Point2<f64>]) -> f64 {
    let area = polygon_area(reference);
    if area <= f64::EPSILON {
        return 0.0;
    }

    intersection_area(other, reference) / area
}
