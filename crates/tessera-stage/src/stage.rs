//! The [`Stage`] trait and slot declarations.
//!
//! Stages are the pluggable algorithms of a pipeline. The engine only
//! ever talks to them through this trait: it asks what they consume and
//! produce, how large their outputs can be, how much input a given
//! output region needs, and finally asks them to execute.

use crate::context::ExecuteContext;
use tessera_core::{ParamSet, ParamValue, PixelType, ProcessingError, Region, RegionError};

/// Declaration of one input slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSlot {
    /// Slot name, unique among the stage's inputs.
    pub name: String,
    /// Accepted element type; `None` accepts any.
    pub pixel: Option<PixelType>,
}

impl InputSlot {
    /// An input accepting any element type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pixel: None,
        }
    }

    /// An input accepting only `pixel`.
    pub fn typed(name: impl Into<String>, pixel: PixelType) -> Self {
        Self {
            name: name.into(),
            pixel: Some(pixel),
        }
    }
}

/// Declaration of one output slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputSlot {
    /// Slot name, unique among the stage's outputs.
    pub name: String,
    /// Element type of the produced container.
    pub pixel: PixelType,
}

impl OutputSlot {
    /// An output of the given element type.
    pub fn new(name: impl Into<String>, pixel: PixelType) -> Self {
        Self {
            name: name.into(),
            pixel,
        }
    }

    /// A scalar output.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, PixelType::Scalar)
    }
}

/// Role of a stage in the graph, derived from its slot counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    /// No inputs: produces data from an external dataset or generator.
    Source,
    /// Inputs and outputs: transforms data.
    Filter,
    /// No outputs: consumes data for an external side effect.
    Sink,
}

impl StageKind {
    /// Classify a stage with `inputs` input and `outputs` output slots.
    pub fn classify(inputs: usize, outputs: usize) -> Self {
        match (inputs, outputs) {
            (_, 0) => Self::Sink,
            (0, _) => Self::Source,
            _ => Self::Filter,
        }
    }
}

/// A pluggable processing stage.
///
/// # Contract
///
/// - `inputs()`, `outputs()` and `parameters()` are called once, when the
///   stage is added to a pipeline. The slot lists must not change later.
/// - `output_information()` and `input_region()` are pure functions of
///   their arguments.
/// - `execute()` reads only its inputs and parameters and writes only its
///   outputs. It must cover at least the requested region of every
///   output; producing less is an error, never a silent degradation.
///
/// # Object safety
///
/// The trait is object-safe; pipelines store stages as `Box<dyn Stage>`.
///
/// # Examples
///
/// A pointwise filter adding one to every sample:
///
/// ```
/// use tessera_core::{ProcessingError, PixelType};
/// use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};
///
/// struct AddOne;
///
/// impl Stage for AddOne {
///     fn name(&self) -> &str { "add_one" }
///
///     fn inputs(&self) -> Vec<InputSlot> {
///         vec![InputSlot::typed("input", PixelType::Scalar)]
///     }
///
///     fn outputs(&self) -> Vec<OutputSlot> {
///         vec![OutputSlot::scalar("output")]
///     }
///
///     fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
///         let input = ctx.input(0)?;
///         let out = ctx.output(0)?;
///         let region = out.requested().clone();
///         out.buffer_mut().copy_region_from(input.buffer(), &region)?;
///         out.buffer_mut().as_mut_slice().iter_mut().for_each(|v| *v += 1.0);
///         Ok(())
///     }
/// }
///
/// assert_eq!(AddOne.name(), "add_one");
/// ```
pub trait Stage: Send + 'static {
    /// Human-readable name for errors and logs.
    fn name(&self) -> &str;

    /// Input slots, in order. Default: none (a source).
    fn inputs(&self) -> Vec<InputSlot> {
        Vec::new()
    }

    /// Output slots, in order. Empty for sinks.
    fn outputs(&self) -> Vec<OutputSlot>;

    /// Declared parameters with their defaults.
    ///
    /// Only these names can later be set through the pipeline, and only
    /// with values of the same kind.
    fn parameters(&self) -> ParamSet {
        ParamSet::new()
    }

    /// Reject parameter values the stage cannot work with.
    ///
    /// Called before a new value is stored. The default accepts everything.
    fn validate_parameter(&self, _name: &str, _value: &ParamValue) -> Result<(), String> {
        Ok(())
    }

    /// Largest possible region of every output, given the largest possible
    /// regions of the inputs.
    ///
    /// The default passes the first input's region through to every output
    /// after checking all inputs agree in dimensionality. Sources must
    /// override this with the extent of their dataset; geometry-changing
    /// filters override it with their transformed extent.
    fn output_information(
        &self,
        inputs: &[Region],
        _params: &ParamSet,
    ) -> Result<Vec<Region>, RegionError> {
        let Some(first) = inputs.first() else {
            return Ok(Vec::new());
        };
        for other in &inputs[1..] {
            if other.dims() != first.dims() {
                return Err(RegionError::DimensionMismatch {
                    expected: first.dims(),
                    got: other.dims(),
                });
            }
        }
        Ok(vec![first.clone(); self.outputs().len()])
    }

    /// Region of input `input` needed to produce `requested` on output
    /// `output`: the padding (halo) function.
    ///
    /// May extend past the input's data edges; the negotiator clamps.
    /// The default is the identity, correct for pointwise stages.
    fn input_region(
        &self,
        _input: usize,
        _output: usize,
        requested: &Region,
        _params: &ParamSet,
    ) -> Region {
        requested.clone()
    }

    /// Run the algorithm over the requested regions.
    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PassThrough;

    impl Stage for PassThrough {
        fn name(&self) -> &str {
            "pass"
        }
        fn inputs(&self) -> Vec<InputSlot> {
            vec![InputSlot::new("a"), InputSlot::new("b")]
        }
        fn outputs(&self) -> Vec<OutputSlot> {
            vec![OutputSlot::scalar("out")]
        }
        fn execute(&self, _ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
            Ok(())
        }
    }

    #[test]
    fn classify_by_slot_counts() {
        assert_eq!(StageKind::classify(0, 1), StageKind::Source);
        assert_eq!(StageKind::classify(2, 1), StageKind::Filter);
        assert_eq!(StageKind::classify(1, 0), StageKind::Sink);
    }

    #[test]
    fn default_information_passes_first_input_through() {
        let a = Region::from_extent(&[8, 8]);
        let out = PassThrough
            .output_information(&[a.clone(), a.clone()], &ParamSet::new())
            .unwrap();
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn default_information_rejects_mixed_dimensionality() {
        let err = PassThrough
            .output_information(
                &[Region::from_extent(&[8, 8]), Region::from_extent(&[8])],
                &ParamSet::new(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RegionError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn default_padding_is_identity() {
        let r = Region::new(&[3, 4], &[5, 6]).unwrap();
        assert_eq!(PassThrough.input_region(0, 0, &r, &ParamSet::new()), r);
    }
}
