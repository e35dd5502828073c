//! Tessera: demand-driven dataflow pipelines over n-dimensional regions.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tessera sub-crates. For most users, adding `tessera` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tessera::prelude::*;
//! use tessera::stages::{BoxMean, NoiseSource};
//!
//! let mut pipeline = Pipeline::new();
//! let noise = pipeline.add_stage(
//!     NoiseSource::builder().extent(&[64, 64]).seed(7).build().unwrap(),
//! );
//! let smooth = pipeline.add_stage(BoxMean::new(1));
//! pipeline.connect(noise, smooth).unwrap();
//! let out = OutputRef::new(smooth, 0);
//!
//! // Only the requested window, plus its halo upstream, is computed.
//! let window = Region::new(&[8, 8], &[16, 16]).unwrap();
//! let report = pipeline.update_region(out, window.clone()).unwrap();
//! assert_eq!(report.executed, vec![noise, smooth]);
//! assert_eq!(pipeline.output(out).unwrap().requested_region(), Some(&window));
//!
//! // Nothing changed, so nothing runs again.
//! assert!(pipeline.update_region(out, window).unwrap().executed.is_empty());
//!
//! // The whole output in four tiles of 16 rows.
//! let streamed = pipeline.update_streamed(out, None, Some(4)).unwrap();
//! assert_eq!(streamed.buffer.region(), &Region::from_extent(&[64, 64]));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tessera-core` | regions, buffers, parameters, IDs, errors |
//! | [`stage`] | `tessera-stage` | the `Stage` trait and execution context |
//! | [`engine`] | `tessera-engine` | pipeline graph, updates, streaming |
//! | [`stages`] | `tessera-stages` | reference sources, filters and sinks |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Regions, buffers, parameters, IDs and errors (`tessera-core`).
pub use tessera_core as types;

/// The [`stage::Stage`] trait, slots and the execution context
/// (`tessera-stage`).
pub use tessera_stage as stage;

/// Pipeline graph, demand-driven updates and streaming
/// (`tessera-engine`).
///
/// [`engine::Pipeline`] is the entry point.
pub use tessera_engine as engine;

/// Reference stages (`tessera-stages`).
pub use tessera_stages as stages;

/// Common imports for typical Tessera usage.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tessera_core::{
        Buffer, OutputRef, ParamSet, ParamValue, PixelType, Region, StageId, Stamp,
    };

    // Errors
    pub use tessera_core::{ConfigError, ProcessingError, RegionError, ResourceError, UpdateError};

    // Stage authoring
    pub use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

    // Engine
    pub use tessera_engine::{
        CancelToken, Pipeline, PipelineConfig, StreamedOutput, StreamingConfig, UpdateReport,
    };
}
