//! Restrict the data to a sub-box.

use tessera_core::{ParamSet, ParamValue, PixelType, ProcessingError, Region, RegionError};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

/// Passes through the part of its input inside a window.
///
/// Coordinates are kept: the output at index `i` is the input at `i`.
/// Only the largest possible region shrinks, to the window clipped to
/// the input's data.
#[derive(Clone, Debug)]
pub struct Crop {
    window: Region,
    pixel: PixelType,
}

impl Crop {
    /// Keep only `window`.
    pub fn new(window: &Region) -> Self {
        Self {
            window: window.clone(),
            pixel: PixelType::Scalar,
        }
    }

    /// Accept and produce `pixel` samples instead of scalars.
    pub fn with_pixel(mut self, pixel: PixelType) -> Self {
        self.pixel = pixel;
        self
    }

    fn window_from(&self, params: &ParamSet) -> Result<Region, RegionError> {
        let origin = params.int_list("origin").unwrap_or(self.window.origin());
        let extent = params.int_list("extent").unwrap_or_default();
        if origin.len() != extent.len() {
            return Err(RegionError::DimensionMismatch {
                expected: origin.len(),
                got: extent.len(),
            });
        }
        let extent = extent
            .iter()
            .map(|&e| u64::try_from(e))
            .collect::<Result<Vec<u64>, _>>()
            .map_err(|_| RegionError::InvariantViolated {
                stage: self.name().to_string(),
                slot: "output".into(),
                reason: format!("negative crop extent {extent:?}"),
            })?;
        Region::new(origin, &extent)
    }
}

impl Stage for Crop {
    fn name(&self) -> &str {
        "Crop"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::typed("input", self.pixel)]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("output", self.pixel)]
    }

    fn parameters(&self) -> ParamSet {
        let extent: Vec<i64> = self.window.extent().iter().map(|&e| e as i64).collect();
        ParamSet::new()
            .with("origin", self.window.origin().to_vec())
            .with("extent", extent)
    }

    fn validate_parameter(&self, name: &str, value: &ParamValue) -> Result<(), String> {
        match (name, value.as_int_list()) {
            ("extent", Some(extent)) if extent.iter().any(|&e| e < 0) => {
                Err(format!("extent must be non-negative, got {extent:?}"))
            }
            _ => Ok(()),
        }
    }

    fn output_information(
        &self,
        inputs: &[Region],
        params: &ParamSet,
    ) -> Result<Vec<Region>, RegionError> {
        let input = crate::single_input(self.name(), inputs)?;
        Ok(vec![self.window_from(params)?.crop_to(input)?])
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let input = ctx.input(0)?;
        let out = ctx.output(0)?;
        let region = out.requested().clone();
        out.buffer_mut().copy_region_from(input.buffer(), &region)?;
        Ok(())
    }
}
