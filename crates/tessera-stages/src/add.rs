//! Pointwise sum of two scalar images.

use tessera_core::{ParamSet, PixelType, ProcessingError, Region, RegionError};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

/// `output = a + b`, defined where both inputs overlap.
///
/// Both inputs only accept scalar producers; connecting anything else is
/// rejected when the edge is made.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddImages;

impl AddImages {
    /// Create the stage.
    pub fn new() -> Self {
        Self
    }
}

impl Stage for AddImages {
    fn name(&self) -> &str {
        "AddImages"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![
            InputSlot::typed("a", PixelType::Scalar),
            InputSlot::typed("b", PixelType::Scalar),
        ]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn output_information(
        &self,
        inputs: &[Region],
        _params: &ParamSet,
    ) -> Result<Vec<Region>, RegionError> {
        match inputs {
            [a, b] => Ok(vec![a.intersection(b)?]),
            _ => Err(RegionError::InvariantViolated {
                stage: self.name().to_string(),
                slot: "*".into(),
                reason: format!("expected 2 input regions, got {}", inputs.len()),
            }),
        }
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let a = ctx.input(0)?;
        let b = ctx.input(1)?;
        let out = ctx.output(0)?;
        let region = out.requested().clone();
        let len = region.row_len();
        for row in region.rows() {
            let (Some(ra), Some(rb)) = (a.buffer().row(&row, len), b.buffer().row(&row, len))
            else {
                return Err(ProcessingError::InvalidInput {
                    reason: format!("inputs do not cover the row at {row:?}"),
                });
            };
            let dst = out
                .buffer_mut()
                .row_mut(&row, len)
                .ok_or_else(|| crate::missing_sample(&row))?;
            for ((d, x), y) in dst.iter_mut().zip(ra).zip(rb) {
                *d = x + y;
            }
        }
        Ok(())
    }
}
