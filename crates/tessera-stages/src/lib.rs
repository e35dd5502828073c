//! Reference stages for the Tessera pipeline.
//!
//! Sources, filters and sinks that exercise every part of the update
//! protocol: halos, geometry changes, several inputs, shared handles.
//!
//! | stage | kind | notes |
//! |---|---|---|
//! | [`ConstantSource`] | source | one `value` everywhere |
//! | [`ArraySource`] | source | serves an in-memory [`Buffer`](tessera_core::Buffer) |
//! | [`NoiseSource`] | source | seeded, identical for any tiling |
//! | [`ShiftScale`] | filter | `v * scale + shift` |
//! | [`AddImages`] | filter | two inputs, defined on their overlap |
//! | [`BoxMean`] | filter | `radius` halo, edges clamped |
//! | [`Crop`] | filter | output is a sub-box of the input |
//! | [`Downsample`] | filter | integer `factor` block mean |
//! | [`CollectSink`] | sink | copies its input into a shared handle |
//! | [`StatisticsSink`] | sink | min / max / mean into a shared handle |

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod add;
pub mod array;
pub mod box_mean;
pub mod collect;
pub mod constant;
pub mod crop;
pub mod downsample;
pub mod noise;
pub mod shift_scale;
pub mod statistics;

pub use add::AddImages;
pub use array::{ArrayHandle, ArraySource};
pub use box_mean::BoxMean;
pub use collect::{new_collected_buffer, CollectSink, CollectedBuffer};
pub use constant::ConstantSource;
pub use crop::Crop;
pub use downsample::Downsample;
pub use noise::{NoiseSource, NoiseSourceBuilder};
pub use shift_scale::ShiftScale;
pub use statistics::{new_statistics_cell, Statistics, StatisticsCell, StatisticsSink};

use tessera_core::{ProcessingError, Region, RegionError};

/// The only element of `inputs`, for single-input geometry stages.
pub(crate) fn single_input<'r>(
    stage: &str,
    inputs: &'r [Region],
) -> Result<&'r Region, RegionError> {
    match inputs {
        [input] => Ok(input),
        _ => Err(RegionError::InvariantViolated {
            stage: stage.to_string(),
            slot: "*".into(),
            reason: format!("expected 1 input region, got {}", inputs.len()),
        }),
    }
}

/// Error for an input buffer that lacks a sample the stage needs.
pub(crate) fn missing_sample(index: &[i64]) -> ProcessingError {
    ProcessingError::InvalidInput {
        reason: format!("input has no sample at {index:?}"),
    }
}
