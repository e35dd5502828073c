//! Error types for the Tessera pipeline.
//!
//! Organized by when they can occur: graph edits ([`ConfigError`]),
//! region negotiation ([`RegionError`]), stage execution
//! ([`ProcessingError`]), buffer allocation ([`ResourceError`]), and the
//! umbrella [`UpdateError`] returned by a pipeline update.

use std::error::Error;
use std::fmt;

use crate::buffer::PixelType;
use crate::id::StageId;
use crate::param::ParamKind;
use crate::region::Region;

/// Illegal graph edits and configuration.
///
/// Raised synchronously by the call that caused it; the graph is left
/// exactly as it was before that call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The stage ID does not belong to this pipeline.
    UnknownStage {
        /// The unrecognised stage.
        stage: StageId,
    },
    /// A named or indexed slot does not exist on the stage.
    UnknownSlot {
        /// Name of the stage.
        stage: String,
        /// The slot name or `#index`.
        slot: String,
    },
    /// Connecting the edge would close a cycle.
    CycleDetected {
        /// The stage whose input was being set.
        consumer: String,
        /// The stage whose output would have fed it.
        producer: String,
    },
    /// The producer's element type is not accepted by the input slot.
    PixelTypeMismatch {
        /// Name of the consuming stage.
        stage: String,
        /// The input slot.
        slot: String,
        /// What the slot accepts.
        expected: PixelType,
        /// What the producer emits.
        got: PixelType,
    },
    /// An input slot required by an update has no connection.
    UnconnectedInput {
        /// Name of the stage.
        stage: String,
        /// The empty slot.
        slot: String,
    },
    /// The stage does not declare this parameter.
    UnknownParameter {
        /// Name of the stage.
        stage: String,
        /// The undeclared parameter.
        name: String,
    },
    /// A parameter was set with a value of the wrong kind.
    ParameterKind {
        /// Name of the stage.
        stage: String,
        /// The parameter.
        name: String,
        /// Declared kind.
        expected: ParamKind,
        /// Kind of the rejected value.
        got: ParamKind,
    },
    /// The stage rejected a parameter value.
    InvalidParameter {
        /// Name of the stage.
        stage: String,
        /// The parameter.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// A pipeline-level setting is invalid.
    InvalidConfig {
        /// Description of the violated constraint.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStage { stage } => write!(f, "unknown stage {stage}"),
            Self::UnknownSlot { stage, slot } => {
                write!(f, "stage '{stage}' has no slot '{slot}'")
            }
            Self::CycleDetected { consumer, producer } => {
                write!(
                    f,
                    "connecting '{producer}' into '{consumer}' would create a cycle"
                )
            }
            Self::PixelTypeMismatch {
                stage,
                slot,
                expected,
                got,
            } => {
                write!(
                    f,
                    "input '{slot}' of stage '{stage}' accepts {expected}, got {got}"
                )
            }
            Self::UnconnectedInput { stage, slot } => {
                write!(f, "input '{slot}' of stage '{stage}' is not connected")
            }
            Self::UnknownParameter { stage, name } => {
                write!(f, "stage '{stage}' has no parameter '{name}'")
            }
            Self::ParameterKind {
                stage,
                name,
                expected,
                got,
            } => {
                write!(
                    f,
                    "parameter '{name}' of stage '{stage}' is {expected}, got {got}"
                )
            }
            Self::InvalidParameter {
                stage,
                name,
                reason,
            } => {
                write!(f, "invalid value for '{name}' of stage '{stage}': {reason}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid pipeline config: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// A requested region cannot be satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionError {
    /// Two regions (or a region and a radius) disagree in dimensionality.
    DimensionMismatch {
        /// Dimensionality of the reference region.
        expected: usize,
        /// Dimensionality that was supplied.
        got: usize,
    },
    /// The request does not overlap the data the producer can supply.
    EmptyRequest {
        /// What was asked for.
        requested: Region,
        /// The producer's largest possible region.
        available: Region,
    },
    /// A stage finished without covering its requested region.
    Unsatisfied {
        /// Name of the stage.
        stage: String,
        /// The output slot.
        slot: String,
        /// What was requested.
        requested: Region,
        /// What the stage actually buffered.
        produced: Region,
    },
    /// A container violates the containment invariant after an update.
    InvariantViolated {
        /// Name of the owning stage.
        stage: String,
        /// The output slot.
        slot: String,
        /// What is wrong.
        reason: String,
    },
    /// Sample count does not match the region size.
    LengthMismatch {
        /// Expected number of samples.
        expected: usize,
        /// Supplied number of samples.
        got: usize,
    },
    /// A region access falls outside a buffer.
    OutsideBuffer {
        /// The region accessed.
        region: Region,
        /// The region the buffer holds.
        buffer: Region,
    },
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
            Self::EmptyRequest {
                requested,
                available,
            } => {
                write!(
                    f,
                    "requested region {requested} does not intersect available {available}"
                )
            }
            Self::Unsatisfied {
                stage,
                slot,
                requested,
                produced,
            } => {
                write!(
                    f,
                    "stage '{stage}' output '{slot}' produced {produced}, requested {requested}"
                )
            }
            Self::InvariantViolated {
                stage,
                slot,
                reason,
            } => {
                write!(f, "region invariant violated on '{stage}' output '{slot}': {reason}")
            }
            Self::LengthMismatch { expected, got } => {
                write!(f, "length mismatch: expected {expected} samples, got {got}")
            }
            Self::OutsideBuffer { region, buffer } => {
                write!(f, "region {region} lies outside buffer {buffer}")
            }
        }
    }
}

impl Error for RegionError {}

/// A buffer could not be allocated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceError {
    /// The allocator refused the request.
    AllocationFailed {
        /// Bytes requested.
        bytes: usize,
    },
    /// The region exceeds the configured per-buffer ceiling.
    LimitExceeded {
        /// Indices in the region.
        cells: u64,
        /// Configured maximum.
        limit: usize,
    },
    /// The sample count does not fit in the address space.
    SizeOverflow {
        /// Indices in the region.
        cells: u64,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { bytes } => {
                write!(f, "buffer allocation of {bytes} bytes failed")
            }
            Self::LimitExceeded { cells, limit } => {
                write!(f, "buffer of {cells} cells exceeds limit of {limit}")
            }
            Self::SizeOverflow { cells } => {
                write!(f, "buffer of {cells} cells overflows addressable memory")
            }
        }
    }
}

impl Error for ResourceError {}

/// Failure inside a stage's `execute`.
///
/// Returned by stage implementations and wrapped in
/// [`UpdateError::StageFailed`] by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessingError {
    /// The algorithm failed.
    ExecutionFailed {
        /// Human-readable description.
        reason: String,
    },
    /// Input data is malformed or missing.
    InvalidInput {
        /// Human-readable description.
        reason: String,
    },
    /// A region operation inside the stage failed.
    Region(RegionError),
    /// A scratch or output allocation inside the stage failed.
    Resource(ResourceError),
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            Self::Region(e) => write!(f, "region: {e}"),
            Self::Resource(e) => write!(f, "resource: {e}"),
        }
    }
}

impl Error for ProcessingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Region(e) => Some(e),
            Self::Resource(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegionError> for ProcessingError {
    fn from(e: RegionError) -> Self {
        Self::Region(e)
    }
}

impl From<ResourceError> for ProcessingError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

/// Errors from a pipeline update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateError {
    /// The graph cannot be updated as configured.
    Config(ConfigError),
    /// Region negotiation failed; nothing was executed.
    Region(RegionError),
    /// An output buffer could not be allocated for a stage.
    Resource {
        /// Name of the stage.
        stage: String,
        /// The underlying failure.
        source: ResourceError,
    },
    /// A stage's `execute` failed. Upstream outputs stay valid.
    StageFailed {
        /// The failing stage.
        stage: StageId,
        /// Its name.
        name: String,
        /// The underlying error.
        reason: ProcessingError,
    },
    /// The update was cancelled between stage executions (or, when
    /// streaming, between tiles).
    Cancelled {
        /// Number of stale stages, or remaining tiles, that did not run.
        skipped: usize,
    },
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Region(e) => write!(f, "region: {e}"),
            Self::Resource { stage, source } => write!(f, "stage '{stage}': {source}"),
            Self::StageFailed { name, reason, .. } => {
                write!(f, "stage '{name}' failed: {reason}")
            }
            Self::Cancelled { skipped } => {
                write!(f, "update cancelled with {skipped} steps not run")
            }
        }
    }
}

impl Error for UpdateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Region(e) => Some(e),
            Self::Resource { source, .. } => Some(source),
            Self::StageFailed { reason, .. } => Some(reason),
            Self::Cancelled { .. } => None,
        }
    }
}

impl From<ConfigError> for UpdateError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<RegionError> for UpdateError {
    fn from(e: RegionError) -> Self {
        Self::Region(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_chains_source() {
        let err = UpdateError::StageFailed {
            stage: StageId(2),
            name: "blur".into(),
            reason: ProcessingError::Region(RegionError::DimensionMismatch {
                expected: 2,
                got: 3,
            }),
        };
        assert_eq!(
            err.to_string(),
            "stage 'blur' failed: region: dimension mismatch: expected 2, got 3"
        );
        let inner = err.source().unwrap();
        assert!(inner.source().is_some());
    }

    #[test]
    fn config_error_messages_name_the_stage() {
        let err = ConfigError::CycleDetected {
            consumer: "a".into(),
            producer: "b".into(),
        };
        assert_eq!(
            err.to_string(),
            "connecting 'b' into 'a' would create a cycle"
        );
    }

    #[test]
    fn conversions_wrap_without_loss() {
        let region = RegionError::LengthMismatch {
            expected: 4,
            got: 3,
        };
        let update: UpdateError = region.clone().into();
        assert_eq!(update, UpdateError::Region(region));
    }
}
