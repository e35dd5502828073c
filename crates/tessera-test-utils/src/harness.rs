//! Run a single stage's `execute` outside a pipeline.
//!
//! Builds the [`ExecuteContext`] by hand from caller-supplied buffers, so
//! stage unit tests do not need a graph.

use tessera_core::{Buffer, ParamSet, ProcessingError, Region};
use tessera_stage::{ExecuteContext, InputView, OutputTarget, Stage};

/// One output to produce: `requested` within `largest`.
#[derive(Clone, Debug)]
pub struct OutputRequest {
    pub requested: Region,
    pub largest: Region,
}

impl OutputRequest {
    pub fn new(requested: Region, largest: Region) -> Self {
        Self { requested, largest }
    }

    /// Request all of `largest`.
    pub fn whole(largest: Region) -> Self {
        Self {
            requested: largest.clone(),
            largest,
        }
    }
}

/// Execute `stage` once with its declared default parameters.
///
/// Each input is a buffer and the region the stage may read from it.
/// Returns the produced buffers in output-slot order.
pub fn run_stage(
    stage: &dyn Stage,
    inputs: &[(&Buffer, Region)],
    outputs: &[OutputRequest],
) -> Result<Vec<Buffer>, ProcessingError> {
    run_stage_with(stage, &stage.parameters(), inputs, outputs)
}

/// [`run_stage`] with explicit parameters.
pub fn run_stage_with(
    stage: &dyn Stage,
    params: &ParamSet,
    inputs: &[(&Buffer, Region)],
    outputs: &[OutputRequest],
) -> Result<Vec<Buffer>, ProcessingError> {
    let mut targets = Vec::with_capacity(outputs.len());
    for (slot, request) in stage.outputs().iter().zip(outputs) {
        let buffer = Buffer::allocate(request.requested.clone(), slot.pixel)?;
        targets.push(OutputTarget::new(
            slot.name.clone(),
            request.requested.clone(),
            request.largest.clone(),
            buffer,
            None,
        ));
    }
    let views: Vec<InputView<'_>> = inputs
        .iter()
        .map(|(buffer, region)| InputView::new(buffer, region))
        .collect();
    {
        let mut ctx = ExecuteContext::new(stage.name(), &views, &mut targets, params);
        stage.execute(&mut ctx)?;
    }
    Ok(targets.into_iter().map(OutputTarget::into_buffer).collect())
}
