//! Core types for the Tessera demand-driven pipeline.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace:
//! identifiers and version [`Stamp`]s, the [`VersionClock`], index-space
//! [`Region`]s, typed sample [`Buffer`]s, stage parameters, and the
//! error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod clock;
pub mod error;
pub mod id;
pub mod param;
pub mod region;

pub use buffer::{Buffer, PixelType};
pub use clock::VersionClock;
pub use error::{ConfigError, ProcessingError, RegionError, ResourceError, UpdateError};
pub use id::{Coord, Extent, OutputRef, StageId, Stamp};
pub use param::{ParamKind, ParamSet, ParamValue};
pub use region::{Region, RegionIter};
