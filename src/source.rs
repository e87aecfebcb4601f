//! Frame sources.
//!
//! Stabilizing needs two passes over the frames, one to extract features and
//! one to warp them once the canvas is known, so sources are random-access by
//! frame index instead of being consumed once.

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use image::RgbImage;
use log::{debug, info};

use crate::error::{Error, Result};

/// Ordered sequence of equally sized frames.
pub trait FrameSource: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width and height shared by every frame.
    fn dimensions(&self) -> (u32, u32);

    fn frame(&self, index: usize) -> Result<RgbImage>;
}

/// Frames already decoded in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    frames: Vec<RgbImage>,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>) -> Result<Self> {
        if let Some(first) = frames.first() {
            let expected = first.dimensions();
            for (frame, image) in frames.iter().enumerate() {
                if image.dimensions() != expected {
                    return Err(Error::FrameSizeMismatch {
                        frame,
                        expected,
                        found: image.dimensions(),
                    });
                }
            }
        }

        Ok(Self { frames })
    }

    pub fn into_inner(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl FrameSource for MemorySource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frames.first().map_or((0, 0), RgbImage::dimensions)
    }

    fn frame(&self, index: usize) -> Result<RgbImage> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(Error::FrameOutOfRange {
                index,
                len: self.frames.len(),
            })
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Image files of a directory, ordered by file name and decoded on demand.
#[derive(Clone, Debug)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    dimensions: (u32, u32),
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();

        let mut paths = fs::read_dir(directory)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.retain(|path| path.is_file() && is_image(path));
        paths.sort();

        let dimensions = match paths.first() {
            Some(first) => image::image_dimensions(first)?,
            None => (0, 0),
        };

        info!(
            "found {} frames of {}x{} in {}",
            paths.len(),
            dimensions.0,
            dimensions.1,
            directory.display()
        );

        Ok(Self { paths, dimensions })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

impl FrameSource for ImageSequence {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn frame(&self, index: usize) -> Result<RgbImage> {
        let path = self.paths.get(index).ok_or(Error::FrameOutOfRange {
            index,
            len: self.paths.len(),
        })?;

        debug!("decoding {}", path.display());
        let image = image::open(path)?.into_rgb8();

        if image.dimensions() != self.dimensions {
            return Err(Error::FrameSizeMismatch {
                frame: index,
                expected: self.dimensions,
                found: image.dimensions(),
            });
        }

        Ok(image)
    }
}
