//! Execution context passed to [`Stage::execute`](crate::Stage::execute).

use tessera_core::{Buffer, ParamSet, PixelType, ProcessingError, Region, RegionError};

/// Read-only view of one connected input during execution.
#[derive(Clone, Copy, Debug)]
pub struct InputView<'a> {
    buffer: &'a Buffer,
    requested: &'a Region,
}

impl<'a> InputView<'a> {
    /// View `buffer`, which covers at least `requested`.
    pub fn new(buffer: &'a Buffer, requested: &'a Region) -> Self {
        Self { buffer, requested }
    }

    /// The producer's buffered samples.
    pub fn buffer(&self) -> &'a Buffer {
        self.buffer
    }

    /// The region this stage asked for on this input.
    ///
    /// The buffer may hold more than this.
    pub fn requested(&self) -> &'a Region {
        self.requested
    }

    /// Shorthand for `buffer().value(index)`.
    pub fn value(&self, index: &[i64]) -> Option<f32> {
        self.buffer.value(index)
    }
}

/// One output being produced by the executing stage.
///
/// The engine pre-allocates a zeroed buffer over exactly the requested
/// region. A stage that finds it cheaper to produce more (for example a
/// reader that always decodes whole tiles) may call
/// [`produce_larger`](Self::produce_larger) to widen it, up to the
/// output's largest possible region.
#[derive(Debug)]
pub struct OutputTarget {
    name: String,
    requested: Region,
    largest: Region,
    buffer: Buffer,
    max_cells: Option<usize>,
}

impl OutputTarget {
    /// Wrap a pre-allocated buffer for output `name`.
    pub fn new(
        name: impl Into<String>,
        requested: Region,
        largest: Region,
        buffer: Buffer,
        max_cells: Option<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            requested,
            largest,
            buffer,
            max_cells,
        }
    }

    /// The output slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The region that must be covered when `execute` returns.
    pub fn requested(&self) -> &Region {
        &self.requested
    }

    /// The output's largest possible region.
    pub fn largest(&self) -> &Region {
        &self.largest
    }

    /// Element type of the output.
    pub fn pixel_type(&self) -> PixelType {
        self.buffer.pixel_type()
    }

    /// The buffer being written.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The buffer being written, mutably.
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Replace the buffer with a zeroed one over `region`.
    ///
    /// # Errors
    ///
    /// `region` must contain the requested region and lie within the
    /// largest possible region, otherwise [`RegionError::OutsideBuffer`].
    /// Allocation honours the pipeline's buffer ceiling.
    pub fn produce_larger(&mut self, region: Region) -> Result<(), ProcessingError> {
        if !region.contains(&self.requested) {
            return Err(RegionError::OutsideBuffer {
                region: self.requested.clone(),
                buffer: region,
            }
            .into());
        }
        if !self.largest.contains(&region) {
            return Err(RegionError::OutsideBuffer {
                region,
                buffer: self.largest.clone(),
            }
            .into());
        }
        self.buffer = Buffer::allocate_limited(region, self.buffer.pixel_type(), self.max_cells)?;
        Ok(())
    }

    /// Consume the target, returning the produced buffer.
    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }
}

/// Everything a stage sees while it executes.
///
/// Inputs and parameters are borrowed for the whole context lifetime, so
/// a stage can hold an input view while writing an output.
pub struct ExecuteContext<'a> {
    stage: &'a str,
    inputs: &'a [InputView<'a>],
    outputs: &'a mut [OutputTarget],
    params: &'a ParamSet,
}

impl<'a> ExecuteContext<'a> {
    /// Assemble a context. Called by the engine.
    pub fn new(
        stage: &'a str,
        inputs: &'a [InputView<'a>],
        outputs: &'a mut [OutputTarget],
        params: &'a ParamSet,
    ) -> Self {
        Self {
            stage,
            inputs,
            outputs,
            params,
        }
    }

    /// Name of the executing stage.
    pub fn stage_name(&self) -> &str {
        self.stage
    }

    /// Number of connected inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Input `slot`.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::InvalidInput`] if the slot does not exist.
    pub fn input(&self, slot: usize) -> Result<InputView<'a>, ProcessingError> {
        self.inputs
            .get(slot)
            .copied()
            .ok_or_else(|| ProcessingError::InvalidInput {
                reason: format!("stage '{}' has no input {slot}", self.stage),
            })
    }

    /// All inputs, in slot order.
    pub fn inputs(&self) -> &'a [InputView<'a>] {
        self.inputs
    }

    /// Output `slot`, mutably.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::ExecutionFailed`] if the slot does not exist.
    pub fn output(&mut self, slot: usize) -> Result<&mut OutputTarget, ProcessingError> {
        let stage = self.stage;
        self.outputs
            .get_mut(slot)
            .ok_or_else(|| ProcessingError::ExecutionFailed {
                reason: format!("stage '{stage}' has no output {slot}"),
            })
    }

    /// All outputs, mutably.
    pub fn outputs_mut(&mut self) -> &mut [OutputTarget] {
        &mut *self.outputs
    }

    /// Current parameter values.
    pub fn params(&self) -> &'a ParamSet {
        self.params
    }

    /// A required `Float` parameter.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::ExecutionFailed`] if missing or of another kind.
    pub fn float(&self, name: &str) -> Result<f64, ProcessingError> {
        self.params
            .float(name)
            .ok_or_else(|| self.missing_param(name, "float"))
    }

    /// A required `Int` parameter.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::ExecutionFailed`] if missing or of another kind.
    pub fn int(&self, name: &str) -> Result<i64, ProcessingError> {
        self.params
            .int(name)
            .ok_or_else(|| self.missing_param(name, "int"))
    }

    /// A required `Bool` parameter.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::ExecutionFailed`] if missing or of another kind.
    pub fn bool(&self, name: &str) -> Result<bool, ProcessingError> {
        self.params
            .bool(name)
            .ok_or_else(|| self.missing_param(name, "bool"))
    }

    fn missing_param(&self, name: &str, kind: &str) -> ProcessingError {
        ProcessingError::ExecutionFailed {
            reason: format!("stage '{}' has no {kind} parameter '{name}'", self.stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(requested: Region, largest: Region) -> OutputTarget {
        let buffer = Buffer::allocate(requested.clone(), PixelType::Scalar).unwrap();
        OutputTarget::new("out", requested, largest, buffer, None)
    }

    #[test]
    fn produce_larger_accepts_regions_between_requested_and_largest() {
        let requested = Region::new(&[2, 2], &[2, 2]).unwrap();
        let largest = Region::from_extent(&[8, 8]);
        let mut t = target(requested, largest);
        t.produce_larger(Region::from_extent(&[4, 4])).unwrap();
        assert_eq!(t.buffer().region(), &Region::from_extent(&[4, 4]));
    }

    #[test]
    fn produce_larger_rejects_shrinking_or_overflowing() {
        let requested = Region::new(&[2, 2], &[2, 2]).unwrap();
        let largest = Region::from_extent(&[8, 8]);
        let mut t = target(requested, largest);
        assert!(t
            .produce_larger(Region::new(&[2, 2], &[1, 1]).unwrap())
            .is_err());
        assert!(t.produce_larger(Region::from_extent(&[9, 9])).is_err());
        assert_eq!(t.buffer().region().extent(), &[2, 2]);
    }

    #[test]
    fn input_and_output_borrow_together() {
        let region = Region::from_extent(&[3]);
        let src = Buffer::filled(region.clone(), PixelType::Scalar, 2.0).unwrap();
        let views = [InputView::new(&src, &region)];
        let mut outputs = [target(region.clone(), region.clone())];
        let params = ParamSet::new().with("gain", 3.0);
        let mut ctx = ExecuteContext::new("scale", &views, &mut outputs, &params);

        let gain = ctx.float("gain").unwrap() as f32;
        let input = ctx.input(0).unwrap();
        let out = ctx.output(0).unwrap();
        for (o, i) in out
            .buffer_mut()
            .as_mut_slice()
            .iter_mut()
            .zip(input.buffer().as_slice())
        {
            *o = i * gain;
        }
        assert_eq!(outputs[0].buffer().as_slice(), &[6.0, 6.0, 6.0]);
    }

    #[test]
    fn missing_slots_and_params_are_errors() {
        let views: [InputView<'_>; 0] = [];
        let mut outputs: [OutputTarget; 0] = [];
        let params = ParamSet::new();
        let mut ctx = ExecuteContext::new("empty", &views, &mut outputs, &params);
        assert!(ctx.input(0).is_err());
        assert!(ctx.output(0).is_err());
        assert!(ctx.float("gain").is_err());
        assert_eq!(ctx.input_count(), 0);
    }
}
