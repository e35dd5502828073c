//! Pointwise affine map `v * scale + shift`.

use tessera_core::{ParamSet, ParamValue, PixelType, ProcessingError};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

/// Applies `v * scale + shift` to every component of every sample.
///
/// Pointwise: needs exactly the region it produces, and its output has
/// the same largest region as its input.
#[derive(Clone, Debug)]
pub struct ShiftScale {
    pixel: PixelType,
    shift: f64,
    scale: f64,
}

impl ShiftScale {
    /// A scalar stage with the given initial parameters.
    pub fn new(shift: f64, scale: f64) -> Self {
        Self {
            pixel: PixelType::Scalar,
            shift,
            scale,
        }
    }

    /// Accept and produce `pixel` samples instead of scalars.
    pub fn with_pixel(mut self, pixel: PixelType) -> Self {
        self.pixel = pixel;
        self
    }
}

impl Stage for ShiftScale {
    fn name(&self) -> &str {
        "ShiftScale"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::typed("input", self.pixel)]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("output", self.pixel)]
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new()
            .with("shift", self.shift)
            .with("scale", self.scale)
    }

    fn validate_parameter(&self, name: &str, value: &ParamValue) -> Result<(), String> {
        match value.as_float() {
            Some(v) if !v.is_finite() => Err(format!("{name} must be finite, got {v}")),
            _ => Ok(()),
        }
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let shift = ctx.float("shift")? as f32;
        let scale = ctx.float("scale")? as f32;
        let input = ctx.input(0)?;
        let out = ctx.output(0)?;
        let region = out.requested().clone();
        out.buffer_mut().copy_region_from(input.buffer(), &region)?;
        for v in out.buffer_mut().as_mut_slice() {
            *v = *v * scale + shift;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Buffer, Region};
    use tessera_test_utils::{run_stage, OutputRequest};

    #[test]
    fn maps_every_sample() {
        let input = Buffer::from_vec(
            Region::from_extent(&[4]),
            PixelType::Scalar,
            vec![0.0, 1.0, 2.0, 3.0],
        )
        .unwrap();
        let stage = ShiftScale::new(1.0, 2.0);
        let requested = Region::new(&[1], &[2]).unwrap();
        let out = run_stage(
            &stage,
            &[(&input, requested.clone())],
            &[OutputRequest::new(requested, Region::from_extent(&[4]))],
        )
        .unwrap();
        assert_eq!(out[0].as_slice(), &[3.0, 5.0]);
    }

    #[test]
    fn vector_stage_maps_all_components() {
        let pixel = PixelType::Vector { components: 2 };
        let region = Region::from_extent(&[2]);
        let input = Buffer::from_vec(region.clone(), pixel, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let stage = ShiftScale::new(0.0, -1.0).with_pixel(pixel);
        assert_eq!(stage.inputs()[0].pixel, Some(pixel));
        let out = run_stage(
            &stage,
            &[(&input, region.clone())],
            &[OutputRequest::whole(region)],
        )
        .unwrap();
        assert_eq!(out[0].as_slice(), &[-1.0, -2.0, -3.0, -4.0]);
    }

    #[test]
    fn rejects_infinite_scale() {
        let stage = ShiftScale::new(0.0, 1.0);
        assert!(stage
            .validate_parameter("scale", &ParamValue::Float(f64::INFINITY))
            .is_err());
    }
}
