//! Output canvas fitting.
//!
//! Given every global transform of a run, finds the smallest axis-aligned
//! canvas that contains all warped frames and shifts the transforms so that
//! the canvas starts at the origin. This needs the complete set of transforms,
//! so no frame can be warped before compositing has finished.

use log::info;
use nalgebra::{Matrix3, Vector2};

use crate::{
    algorithms::geometry::transformed_rect,
    error::{Error, Result},
};

/// Spans within this distance above an integer are rounded down rather than up.
const SNAP_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    /// Shift that was subtracted from every translation, i.e. the top-left
    /// corner of the canvas in the un-adjusted coordinate system.
    pub offset: Vector2<f64>,
    /// Global transforms moved so that every frame lands inside the canvas.
    pub transforms: Vec<Matrix3<f64>>,
}

impl Canvas {
    /// Fit a canvas around `transforms`, each applied to a
    /// `frame_width x frame_height` frame.
    pub fn fit(frame_width: u32, frame_height: u32, transforms: &[Matrix3<f64>]) -> Result<Self> {
        if transforms.is_empty() {
            return Err(Error::EmptySource);
        }

        let (w, h) = (frame_width as f64, frame_height as f64);

        let (mut min, mut max) = (
            Vector2::repeat(f64::INFINITY),
            Vector2::repeat(f64::NEG_INFINITY),
        );
        for corner in transforms.iter().flat_map(|g| transformed_rect(w, h, g)) {
            min = min.inf(&corner.coords);
            max = max.sup(&corner.coords);
        }

        let (width, height) = (span(max.x - min.x), span(max.y - min.y));

        let transforms = transforms
            .iter()
            .map(|g| {
                let mut adjusted = *g;
                adjusted.m13 -= min.x;
                adjusted.m23 -= min.y;
                adjusted
            })
            .collect();

        info!("canvas is {}x{} (offset {}, {})", width, height, min.x, min.y);

        Ok(Self {
            width,
            height,
            offset: min,
            transforms,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

fn span(extent: f64) -> u32 {
    (extent - SNAP_TOLERANCE).ceil().max(0.0) as u32
}
