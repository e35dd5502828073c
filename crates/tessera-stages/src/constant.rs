//! Source filling a fixed box with one value.

use tessera_core::{ParamSet, ParamValue, PixelType, ProcessingError, Region, RegionError};
use tessera_stage::{ExecuteContext, OutputSlot, Stage};

/// Source whose every sample is the `value` parameter.
///
/// The box and the pixel type are fixed at construction. The value is a
/// parameter, so changing it invalidates everything downstream.
///
/// # Construction
///
/// ```
/// use tessera_core::{PixelType, Region};
/// use tessera_stages::ConstantSource;
///
/// let flat = ConstantSource::new(&[128, 128], 10.0);
/// let offset = ConstantSource::over(Region::new(&[-4, -4], &[8, 8]).unwrap(), 0.5)
///     .with_pixel(PixelType::Vector { components: 3 });
/// ```
#[derive(Clone, Debug)]
pub struct ConstantSource {
    region: Region,
    pixel: PixelType,
    value: f64,
}

impl ConstantSource {
    /// A scalar source over `[0, extent)`.
    pub fn new(extent: &[u64], value: f64) -> Self {
        Self::over(Region::from_extent(extent), value)
    }

    /// A scalar source over `region`.
    pub fn over(region: Region, value: f64) -> Self {
        Self {
            region,
            pixel: PixelType::Scalar,
            value,
        }
    }

    /// Produce `pixel` samples, every component set to the value.
    pub fn with_pixel(mut self, pixel: PixelType) -> Self {
        self.pixel = pixel;
        self
    }
}

impl Stage for ConstantSource {
    fn name(&self) -> &str {
        "ConstantSource"
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("output", self.pixel)]
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new().with("value", self.value)
    }

    fn validate_parameter(&self, name: &str, value: &ParamValue) -> Result<(), String> {
        match (name, value.as_float()) {
            ("value", Some(v)) if !v.is_finite() => Err(format!("value must be finite, got {v}")),
            _ => Ok(()),
        }
    }

    fn output_information(
        &self,
        _inputs: &[Region],
        _params: &ParamSet,
    ) -> Result<Vec<Region>, RegionError> {
        Ok(vec![self.region.clone()])
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let value = ctx.float("value")? as f32;
        ctx.output(0)?.buffer_mut().fill(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_test_utils::{run_stage, OutputRequest};

    #[test]
    fn fills_only_the_requested_region() {
        let stage = ConstantSource::new(&[4, 4], 10.0);
        let requested = Region::new(&[1, 1], &[2, 3]).unwrap();
        let out = run_stage(
            &stage,
            &[],
            &[OutputRequest::new(requested.clone(), Region::from_extent(&[4, 4]))],
        )
        .unwrap();
        assert_eq!(out[0].region(), &requested);
        assert_eq!(out[0].as_slice(), &[10.0; 6]);
    }

    #[test]
    fn vector_pixels_fill_every_component() {
        let stage = ConstantSource::new(&[2], 1.5).with_pixel(PixelType::Vector { components: 3 });
        let out = run_stage(&stage, &[], &[OutputRequest::whole(Region::from_extent(&[2]))]).unwrap();
        assert_eq!(out[0].as_slice(), &[1.5; 6]);
    }

    #[test]
    fn largest_region_is_the_configured_box() {
        let region = Region::new(&[-2, 3], &[5, 1]).unwrap();
        let stage = ConstantSource::over(region.clone(), 0.0);
        assert_eq!(
            stage.output_information(&[], &stage.parameters()).unwrap(),
            vec![region]
        );
    }

    #[test]
    fn rejects_non_finite_value() {
        let stage = ConstantSource::new(&[1], 0.0);
        assert!(stage
            .validate_parameter("value", &ParamValue::Float(f64::NAN))
            .is_err());
        assert!(stage
            .validate_parameter("value", &ParamValue::Float(2.0))
            .is_ok());
    }
}
