use image::{GenericImageView, GrayImage};
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Number of bits of the largest descriptor the sampling pattern supports.
pub const MAX_BITS: usize = 512;

/// Compute a BRIEF (Binary Robust Independent Elementary Features) descriptor
/// around `(x, y)` on an already smoothed grayscale image.
///
/// Each bit compares the intensities of one pre-sampled point pair. Samples
/// falling outside the image read as `0`.
///
/// ### CAUTION
/// `N * 8` must not exceed [`MAX_BITS`].
pub fn compute_descriptor<const N: usize>(x: u32, y: u32, image: &GrayImage) -> [u8; N] {
    const BITS: usize = u8::BITS as _;

    let intensity = |px: i32, py: i32| -> u8 {
        if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
            // bounds were checked right above
            unsafe { image.unsafe_get_pixel(px as u32, py as u32).0[0] }
        } else {
            0
        }
    };

    let mut descriptor = [0; N];
    for (i, byte) in descriptor.iter_mut().enumerate() {
        for j in 0..BITS {
            let [p1x, p1y, p2x, p2y] = BRIEF512_SAMPLES[i * BITS + j];

            let first = intensity(x as i32 + p1x as i32, y as i32 + p1y as i32);
            let second = intensity(x as i32 + p2x as i32, y as i32 + p2y as i32);

            *byte = (*byte << 1) | u8::from(first > second);
        }
    }

    descriptor
}

/// Precomputed point-pair offsets for up to 512 BRIEF bits.
/// The pattern is seeded and identical across frames and runs.
static BRIEF512_SAMPLES: Lazy<[[i16; 4]; MAX_BITS]> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(42);

    // sigma of 2 keeps nearly every sample inside a 20x20 patch
    let normal_dist: Normal<f64> = match Normal::new(0.0, 2.0) {
        Ok(dist) => dist,
        Err(_) => unreachable!("standard deviation is finite and positive"),
    };

    let mut samples = [[0; 4]; MAX_BITS];
    for sample in samples.iter_mut() {
        *sample = [
            normal_dist.sample(&mut rng) as _,
            normal_dist.sample(&mut rng) as _,
            normal_dist.sample(&mut rng) as _,
            normal_dist.sample(&mut rng) as _,
        ];
    }

    samples
});
