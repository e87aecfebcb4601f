//! Stabilize a directory of frames

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use clap::*;
use image::Luma;
use log::{info, warn};
use rayon::prelude::*;
use video_stabilizer::{
    prelude::v1::{
        ArrsacAffine, FastBrief, FrameSource, ImageSequence, LeapfrogCompositor, Stabilizer,
        Strategy,
    },
    transforms::write_transforms,
    warp::COVERED,
};

fn cli() -> Command<'static> {
    Command::new("video-stabilizer")
        .version(crate_version!())
        .about("Align every frame of a sequence to the first one")
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .help("Directory of input frames, processed in file name order")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Directory receiving the stabilized frames")
                .takes_value(true),
        )
        .arg(
            Arg::new("strategy")
                .long("strategy")
                .short('s')
                .help("How frames are chained back to the first one")
                .takes_value(true)
                .possible_values(["sequential", "leapfrog"])
                .default_value("sequential"),
        )
        .arg(
            Arg::new("save-transforms")
                .long("save-transforms")
                .help("File receiving the canvas transforms, three rows per frame")
                .takes_value(true),
        )
        .arg(
            Arg::new("masks")
                .long("masks")
                .help("Directory receiving per-frame coverage masks")
                .takes_value(true),
        )
        .arg(
            Arg::new("overlap")
                .long("overlap")
                .help("Leapfrog overlap ratio below which the reference frame is replaced")
                .takes_value(true),
        )
        .arg(
            Arg::new("fast-threshold")
                .long("fast-threshold")
                .help("Intensity difference a FAST corner must exceed")
                .takes_value(true),
        )
        .arg(
            Arg::new("inlier-threshold")
                .long("inlier-threshold")
                .help("Largest reprojection error, in pixels, of an inlier match")
                .takes_value(true),
        )
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = cli().get_matches();

    let input = matches.value_of("input").context("no input directory")?;

    let strategy = match (matches.value_of("strategy"), matches.value_of("overlap")) {
        (Some("leapfrog"), Some(overlap)) => Strategy::Leapfrog(
            LeapfrogCompositor::default().overlap_threshold(overlap.parse()?),
        ),
        (Some("leapfrog"), None) => Strategy::leapfrog(),
        (_, overlap) => {
            if overlap.is_some() {
                warn!("--overlap only applies to the leapfrog strategy");
            }
            Strategy::sequential()
        }
    };

    let mut detector = FastBrief::default();
    if let Some(threshold) = matches.value_of("fast-threshold") {
        detector = detector.fast_threshold(threshold.parse()?);
    }

    let mut estimator = ArrsacAffine::default();
    if let Some(threshold) = matches.value_of("inlier-threshold") {
        estimator = estimator.inlier_threshold(threshold.parse()?);
    }

    let source = ImageSequence::open(input)
        .with_context(|| format!("could not read frames from {}", input))?;

    let masks = matches.value_of("masks");

    let stabilized = Stabilizer::new()
        .with_strategy(strategy)
        .with_detector(detector)
        .with_estimator(estimator)
        .stabilize(&source, masks.is_some())?;

    info!(
        "stabilized {} frames onto a {}x{} canvas",
        source.len(),
        stabilized.width,
        stabilized.height
    );

    if let Some(path) = matches.value_of("save-transforms") {
        let file = File::create(path).with_context(|| format!("could not create {}", path))?;
        write_transforms(BufWriter::new(file), &stabilized.canvas().transforms)?;
    }

    if let Some(references) = stabilized
        .diagnostics
        .as_ref()
        .and_then(|d| d.reference_frames.as_ref())
    {
        info!("reference frames: {:?}", references);
    }

    if let Some(directory) = masks {
        std::fs::create_dir_all(directory)?;
        if let Some(diagnostics) = &stabilized.diagnostics {
            for (index, mask) in diagnostics.masks.clone().enumerate() {
                let mut mask = mask?;
                for Luma([v]) in mask.pixels_mut() {
                    *v = if *v == COVERED { u8::MAX } else { 0 };
                }
                mask.save(Path::new(directory).join(format!("{:06}.png", index)))?;
            }
        }
    }

    if let Some(directory) = matches.value_of("output") {
        std::fs::create_dir_all(directory)?;
        (0..source.len()).into_par_iter().try_for_each(|index| -> Result<()> {
            let frame = stabilized.frame_at(index)?;
            frame.save(Path::new(directory).join(format!("{:06}.png", index)))?;
            Ok(())
        })?;
        info!("wrote {} frames to {}", source.len(), directory);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_are_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn every_argument_is_documented() {
        for arg in cli().get_arguments() {
            assert!(arg.get_help().is_some(), "--{} has no help", arg.get_long().unwrap_or_default());
        }
    }

    #[test]
    fn tuning_flags_are_parsed() {
        let matches = cli()
            .try_get_matches_from([
                "video-stabilizer",
                "--input",
                "frames",
                "--fast-threshold",
                "20",
                "--strategy",
                "leapfrog",
            ])
            .unwrap();

        assert_eq!(matches.value_of("fast-threshold"), Some("20"));
        assert_eq!(matches.value_of("strategy"), Some("leapfrog"));
        assert_eq!(matches.value_of("output"), None);
    }

    #[test]
    fn input_is_required() {
        assert!(cli().try_get_matches_from(["video-stabilizer"]).is_err());
        assert!(cli()
            .try_get_matches_from(["video-stabilizer", "-i", "x", "--strategy", "other"])
            .is_err());
    }
}
