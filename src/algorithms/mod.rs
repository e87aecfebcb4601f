//! Self-contained algorithms the pipeline is assembled from.

pub mod affine;
pub mod brief;
pub mod geometry;
