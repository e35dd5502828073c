//! The stage interface for Tessera pipelines.
//!
//! A [`Stage`] is the pluggable unit of computation. This crate defines
//! the trait, the [`ExecuteContext`] a stage runs inside, and the
//! [`RegionNegotiator`] that turns output requests into input requests
//! using a stage's padding function.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod negotiate;
pub mod stage;

pub use context::{ExecuteContext, InputView, OutputTarget};
pub use negotiate::{Demand, RegionNegotiator};
pub use stage::{InputSlot, OutputSlot, Stage, StageKind};
