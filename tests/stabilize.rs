use assert_approx_eq::assert_approx_eq;
use image::{GrayImage, Luma, Rgb, RgbImage};
use nalgebra::Matrix3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use video_stabilizer::{
    algorithms::geometry::{frame_corners, is_affine, transform_point},
    prelude::v1::*,
    warp::COVERED,
};

/// Single-pixel markers; the gray level identifies the world point.
struct MarkerDetector;

impl FeatureDetector for MarkerDetector {
    type Descriptor = u8;

    fn detect(&self, image: &GrayImage) -> std::result::Result<Vec<Feature<u8>>, FeatureError> {
        let features: Vec<_> = image
            .enumerate_pixels()
            .filter(|(_, _, Luma([v]))| *v > 0)
            .map(|(x, y, Luma([v]))| Feature::new(x as f64, y as f64, *v))
            .collect();

        if features.is_empty() {
            return Err(FeatureError::NoKeypoints);
        }
        Ok(features)
    }
}

/// Pairs markers of equal level within `max_distance`.
struct MarkerMatcher;

impl FeatureMatcher<u8> for MarkerMatcher {
    fn correspond(
        &self,
        source: &[Feature<u8>],
        target: &[Feature<u8>],
        max_distance: Option<f64>,
    ) -> std::result::Result<Vec<Correspondence>, MatchError> {
        let max_distance = max_distance.unwrap_or(f64::INFINITY);
        Ok(source
            .iter()
            .enumerate()
            .filter_map(|(i, a)| {
                let j = target.iter().position(|b| b.descriptor == a.descriptor)?;
                ((target[j].keypoint - a.keypoint).norm() <= max_distance)
                    .then(|| Correspondence::new(i, j))
            })
            .collect())
    }
}

struct NoMatches;

impl FeatureMatcher<u8> for NoMatches {
    fn correspond(
        &self,
        _: &[Feature<u8>],
        _: &[Feature<u8>],
        _: Option<f64>,
    ) -> std::result::Result<Vec<Correspondence>, MatchError> {
        Ok(vec![])
    }
}

fn markers() -> Stabilizer<MarkerDetector, MarkerMatcher, ArrsacAffine> {
    Stabilizer::new()
        .with_detector(MarkerDetector)
        .with_matcher(MarkerMatcher)
}

/// `frames` views of a field of markers, the camera moving by `step` pixels
/// per frame, so the content of each frame is the previous one shifted by
/// `-step`.
fn panning(frames: u32, (width, height): (u32, u32), step: (u32, u32)) -> MemorySource {
    let world: Vec<(u32, u32)> = (0..21)
        .flat_map(|c| (0..5).map(move |r| (3 + 13 * c, 4 + 14 * r)))
        .collect();

    let images = (0..frames)
        .map(|i| {
            let (ox, oy) = (i * step.0, i * step.1);
            let mut image = RgbImage::new(width, height);
            for (k, &(x, y)) in world.iter().enumerate() {
                if x >= ox && y >= oy && x - ox < width && y - oy < height {
                    let level = 2 + 2 * k as u8;
                    image.put_pixel(x - ox, y - oy, Rgb([level; 3]));
                }
            }
            image
        })
        .collect();

    MemorySource::new(images).unwrap()
}

fn translation(dx: f64, dy: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0)
}

fn assert_transform_eq(a: &Matrix3<f64>, b: &Matrix3<f64>, eps: f64) {
    for (x, y) in a.iter().zip(b.iter()) {
        assert_approx_eq!(*x, *y, eps);
    }
}

fn assert_canvas_invariant(canvas: &Canvas, (width, height): (u32, u32)) {
    const EPS: f64 = 1e-6;
    for transform in &canvas.transforms {
        assert!(is_affine(transform));
        for corner in frame_corners(width as f64, height as f64) {
            let p = transform_point(transform, &corner);
            assert!(p.x >= -EPS && p.x <= canvas.width as f64 + EPS);
            assert!(p.y >= -EPS && p.y <= canvas.height as f64 + EPS);
        }
    }
}

#[test]
fn constant_translation() {
    let (dx, dy) = (3, 2);
    let source = panning(5, (120, 60), (dx, dy));
    let stabilizer = markers();

    let composition = stabilizer.compose(&source).unwrap();
    assert_eq!(composition.transforms.len(), 5);
    assert_eq!(composition.transforms[0], Matrix3::identity());
    for (i, g) in composition.transforms.iter().enumerate() {
        assert!(is_affine(g));
        assert_transform_eq(g, &translation((i as u32 * dx) as f64, (i as u32 * dy) as f64), 1e-6);
    }

    let stabilized = stabilizer.stabilize(&source, true).unwrap();
    assert_eq!(stabilized.width, 120 + 4 * dx);
    assert_eq!(stabilized.height, 60 + 4 * dy);
    assert_canvas_invariant(stabilized.canvas(), (120, 60));

    let refit = Canvas::fit(120, 60, &stabilized.canvas().transforms).unwrap();
    assert_eq!(refit.dimensions(), stabilized.canvas().dimensions());
    assert_approx_eq!(refit.offset.x, 0.0, 1e-9);
    assert_approx_eq!(refit.offset.y, 0.0, 1e-9);

    let frames: Vec<RgbImage> = stabilized.frames.map(|f| f.unwrap()).collect();
    assert_eq!(frames.len(), 5);
    for frame in &frames {
        assert_eq!(frame.dimensions(), (132, 68));
    }
}

#[test]
fn still_sequence() {
    let source = panning(4, (120, 60), (0, 0));

    for strategy in [Strategy::sequential(), Strategy::leapfrog()] {
        let stabilized = markers()
            .with_strategy(strategy.clone())
            .stabilize(&source, true)
            .unwrap();

        assert_eq!((stabilized.width, stabilized.height), (120, 60));

        let diagnostics = stabilized.diagnostics.unwrap();
        for g in &diagnostics.transforms {
            assert_transform_eq(g, &Matrix3::identity(), 1e-9);
        }

        match strategy {
            Strategy::Leapfrog(_) => assert_eq!(diagnostics.reference_frames, Some(vec![0])),
            Strategy::Sequential(_) => assert_eq!(diagnostics.reference_frames, None),
        }
    }
}

#[test]
fn empty_correspondences_fail_on_second_frame() {
    let source = panning(2, (120, 60), (1, 0));

    for strategy in [Strategy::sequential(), Strategy::leapfrog()] {
        let result = markers()
            .with_matcher(NoMatches)
            .with_strategy(strategy)
            .stabilize(&source, true);

        match result {
            Err(err @ Error::Estimation { .. }) | Err(err @ Error::Match { .. }) => {
                assert_eq!(err.frame(), Some(1))
            }
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("no frame may be produced"),
        }
    }
}

#[test]
fn leapfrog_switches_at_overlap_threshold() {
    // 7px per frame on a 200px wide frame: frame 6 covers 158 / 200 = 0.79
    let source = panning(10, (200, 60), (7, 0));

    let leapfrog = markers()
        .with_strategy(Strategy::leapfrog())
        .stabilize(&source, true)
        .unwrap();
    let diagnostics = leapfrog.diagnostics.as_ref().unwrap();
    assert_eq!(diagnostics.reference_frames, Some(vec![0, 6]));
    assert_eq!((leapfrog.width, leapfrog.height), (263, 60));

    for (i, g) in diagnostics.transforms.iter().enumerate() {
        assert!(is_affine(g));
        assert_transform_eq(g, &translation(7.0 * i as f64, 0.0), 1e-6);
    }

    let sequential = markers().stabilize(&source, true).unwrap();
    assert_eq!(sequential.diagnostics.unwrap().reference_frames, None);
}

#[test]
fn leapfrog_references_increase() {
    let source = panning(12, (120, 60), (5, 1));
    let stabilized = markers()
        .with_strategy(Strategy::Leapfrog(
            LeapfrogCompositor::default().overlap_threshold(0.85),
        ))
        .stabilize(&source, true)
        .unwrap();

    let references = stabilized.diagnostics.unwrap().reference_frames.unwrap();
    assert_eq!(references[0], 0);
    assert!(references.len() > 1);
    assert!(references.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn masks_cover_each_frame_exactly() {
    let source = panning(3, (120, 60), (4, 3));
    let stabilized = markers().stabilize(&source, true).unwrap();
    let masks = stabilized.diagnostics.as_ref().unwrap().masks.clone();
    assert_eq!(masks.len(), 3);

    for (i, mask) in masks.enumerate() {
        let mask = mask.unwrap();
        assert_eq!(mask.dimensions(), (stabilized.width, stabilized.height));
        assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == COVERED));
        assert_eq!(mask.pixels().filter(|p| p[0] == COVERED).count(), 120 * 60);

        // top-left corner of frame i lands at (4i, 3i)
        let (x, y) = (4 * i as u32, 3 * i as u32);
        assert_eq!(mask.get_pixel(x, y)[0], COVERED);
        if x > 0 {
            assert_eq!(mask.get_pixel(x - 1, y)[0], 0);
        }
    }
}

#[test]
fn single_frame() {
    let source = panning(1, (120, 60), (0, 0));
    let stabilized = markers()
        .with_strategy(Strategy::leapfrog())
        .stabilize(&source, true)
        .unwrap();

    assert_eq!((stabilized.width, stabilized.height), (120, 60));
    assert_eq!(stabilized.frames.len(), 1);

    let diagnostics = stabilized.diagnostics.unwrap();
    assert_eq!(diagnostics.transforms, vec![Matrix3::identity()]);
    assert_eq!(diagnostics.reference_frames, Some(vec![0]));
}

#[test]
fn transforms_survive_a_round_trip_through_text() {
    let source = panning(4, (120, 60), (2, 5));
    let stabilized = markers().stabilize(&source, false).unwrap();

    let mut table = Vec::new();
    write_transforms(&mut table, &stabilized.canvas().transforms).unwrap();
    assert_eq!(String::from_utf8_lossy(&table).lines().count(), 4 * 3);

    let restored = read_transforms(table.as_slice()).unwrap();
    assert_eq!(restored, stabilized.canvas().transforms);
}

/// Gray blocks of random intensity, `block` pixels wide.
fn block_noise(width: u32, height: u32, block: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let (columns, rows) = (width / block + 1, height / block + 1);
    let levels: Vec<u8> = (0..columns * rows).map(|_| rng.gen()).collect();

    RgbImage::from_fn(width, height, |x, y| {
        let level = levels[((y / block) * columns + x / block) as usize];
        Rgb([level; 3])
    })
}

#[test]
fn detects_translation_on_textured_frames() {
    let world = block_noise(240, 180, 8, 7);
    let (width, height) = (160, 120);
    let step = (4, 3);

    let frames = (0..4)
        .map(|i| {
            image::imageops::crop_imm(&world, i * step.0, i * step.1, width, height).to_image()
        })
        .collect();
    let source = MemorySource::new(frames).unwrap();

    let composition = Stabilizer::new().compose(&source).unwrap();
    for (i, g) in composition.transforms.iter().enumerate() {
        assert!(is_affine(g));
        let expected = translation((i as u32 * step.0) as f64, (i as u32 * step.1) as f64);
        assert_transform_eq(g, &expected, 0.5);
    }
}
