//! Benchmark profiles for the Tessera pipeline framework.
//!
//! - [`smoothing_profile`]: noise source into a box mean
//! - [`reduction_profile`]: noise, crop, downsample, shift/scale chain

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tessera_core::{OutputRef, Region, StageId};
use tessera_engine::Pipeline;
use tessera_stages::{BoxMean, Crop, Downsample, NoiseSource, ShiftScale};

/// A built pipeline with its source and terminal output.
pub struct Profile {
    /// The pipeline.
    pub pipeline: Pipeline,
    /// The stage to touch to force a full re-execution.
    pub source: StageId,
    /// The output to update.
    pub output: OutputRef,
}

fn noise(side: u64, seed: u64) -> NoiseSource {
    NoiseSource::builder()
        .extent(&[side, side])
        .seed(seed)
        .build()
        .unwrap()
}

/// `side x side` noise smoothed with a box of `radius`.
pub fn smoothing_profile(side: u64, radius: u64, seed: u64) -> Profile {
    let mut pipeline = Pipeline::new();
    let source = pipeline.add_stage(noise(side, seed));
    let smooth = pipeline.add_stage(BoxMean::new(radius));
    pipeline.connect(source, smooth).unwrap();
    Profile {
        pipeline,
        source,
        output: OutputRef::new(smooth, 0),
    }
}

/// `side x side` noise, cropped to its central half, halved in
/// resolution and rescaled to `[-1, 1)`.
pub fn reduction_profile(side: u64, seed: u64) -> Profile {
    let quarter = (side / 4) as i64;
    let window = Region::new(&[quarter, quarter], &[side / 2, side / 2]).unwrap();

    let mut pipeline = Pipeline::new();
    let source = pipeline.add_stage(noise(side, seed));
    let crop = pipeline.add_stage(Crop::new(&window));
    let down = pipeline.add_stage(Downsample::new(2));
    let rescale = pipeline.add_stage(ShiftScale::new(-1.0, 2.0));
    pipeline.connect(source, crop).unwrap();
    pipeline.connect(crop, down).unwrap();
    pipeline.connect(down, rescale).unwrap();
    Profile {
        pipeline,
        source,
        output: OutputRef::new(rescale, 0),
    }
}
