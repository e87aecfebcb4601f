//! Resampling of frames onto the output canvas.

use image::{GrayImage, ImageBuffer, Luma, Pixel, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra::Matrix3;

/// Value of covered pixels in a coverage mask.
pub const COVERED: u8 = 1;

fn projection(transform: &Matrix3<f64>) -> Option<Projection> {
    // row-major, as `Projection` expects
    let mut coefficients = [0f32; 9];
    for (row, chunk) in coefficients.chunks_exact_mut(3).enumerate() {
        for (col, value) in chunk.iter_mut().enumerate() {
            *value = transform[(row, col)] as f32;
        }
    }
    Projection::from_matrix(coefficients)
}

fn warp_with<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    transform: &Matrix3<f64>,
    (width, height): (u32, u32),
    interpolation: Interpolation,
    background: P,
) -> Option<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8> + Send + Sync + 'static,
{
    let projection = projection(transform)?;
    let mut out = ImageBuffer::from_pixel(width, height, background);
    warp_into(image, &projection, interpolation, background, &mut out);
    Some(out)
}

/// Copy of `image` grown by one pixel on every side, the new pixels repeating
/// the nearest edge pixel.
fn replicate_border<P>(image: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(width + 2, height + 2, |x, y| {
        let x = x.saturating_sub(1).min(width - 1);
        let y = y.saturating_sub(1).min(height - 1);
        *image.get_pixel(x, y)
    })
}

/// Warp `frame` by `transform` (frame to canvas coordinates) onto a black
/// `width x height` canvas using bilinear sampling.
///
/// Bilinear sampling needs a right and bottom neighbour, so the frame is
/// sampled through a replicated border and its last row and column keep their
/// content. Every pixel [`coverage_mask`] marks as covered has frame content.
///
/// `None` if `transform` cannot be inverted.
pub fn warp_frame(
    frame: &RgbImage,
    transform: &Matrix3<f64>,
    dimensions: (u32, u32),
) -> Option<RgbImage> {
    let background = image::Rgb([0, 0, 0]);
    if frame.width() == 0 || frame.height() == 0 {
        projection(transform)?;
        return Some(RgbImage::from_pixel(dimensions.0, dimensions.1, background));
    }

    // padded pixel (x, y) is frame pixel (x - 1, y - 1)
    let unpad = Matrix3::new(1.0, 0.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0);
    warp_with(
        &replicate_border(frame),
        &(transform * unpad),
        dimensions,
        Interpolation::Bilinear,
        background,
    )
}

/// Canvas-sized mask holding [`COVERED`] where a `frame_width x frame_height`
/// frame lands after `transform`, and 0 elsewhere.
pub fn coverage_mask(
    (frame_width, frame_height): (u32, u32),
    transform: &Matrix3<f64>,
    dimensions: (u32, u32),
) -> Option<GrayImage> {
    let ones = GrayImage::from_pixel(frame_width, frame_height, Luma([COVERED]));
    warp_with(
        &ones,
        transform,
        dimensions,
        Interpolation::Nearest,
        Luma([0]),
    )
}
