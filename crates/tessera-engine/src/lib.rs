//! Pipeline graph and demand-driven update engine for Tessera.
//!
//! A [`Pipeline`] owns a graph of stages and answers requests of the form
//! "make this region of this output current". Each update runs as named
//! passes over the stages upstream of the request: largest possible
//! regions first, then requested regions, then staleness, then execution
//! of the stale stages only. [`Pipeline::update_streamed`] repeats this
//! tile by tile to bound memory.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cancel;
pub mod config;
pub mod container;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod streaming;
mod update;

pub use cancel::CancelToken;
pub use config::{PipelineConfig, StreamingConfig};
pub use container::DataContainer;
pub use graph::{PipelineGraph, StageNode};
pub use metrics::UpdateMetrics;
pub use pipeline::Pipeline;
pub use streaming::StreamedOutput;
pub use update::UpdateReport;
