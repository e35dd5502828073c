//! Box-filter mean over a cubic neighbourhood.

use tessera_core::{ParamSet, ParamValue, PixelType, ProcessingError, Region};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

/// Mean of the `(2 * radius + 1)^d` neighbourhood of every sample.
///
/// Asks its input for a halo of `radius` on every axis. Neighbours past
/// the edge of the data are clamped to the nearest edge sample, so the
/// result at an index never depends on which region was requested: a
/// tiled update matches an untiled one exactly.
#[derive(Clone, Copy, Debug)]
pub struct BoxMean {
    radius: u64,
}

impl BoxMean {
    /// A box of half-width `radius`.
    pub fn new(radius: u64) -> Self {
        Self { radius }
    }
}

fn radius_of(params: &ParamSet) -> u64 {
    params.int("radius").map_or(0, |r| r.max(0) as u64)
}

impl Stage for BoxMean {
    fn name(&self) -> &str {
        "BoxMean"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::typed("input", PixelType::Scalar)]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new().with("radius", self.radius as i64)
    }

    fn validate_parameter(&self, name: &str, value: &ParamValue) -> Result<(), String> {
        match (name, value.as_int()) {
            ("radius", Some(r)) if r < 0 => Err(format!("radius must be >= 0, got {r}")),
            _ => Ok(()),
        }
    }

    fn input_region(&self, _: usize, _: usize, requested: &Region, params: &ParamSet) -> Region {
        requested.dilate_uniform(radius_of(params))
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let radius = radius_of(ctx.params());
        let input = ctx.input(0)?;
        let out = ctx.output(0)?;
        let bounds = out.largest().clone();
        let region = out.requested().clone();
        let dims = region.dims();

        // Offsets of the neighbourhood, relative to the centre.
        let kernel = Region::new(&vec![-(radius as i64); dims], &vec![2 * radius + 1; dims])?;
        let count = kernel.cell_count() as f64;

        let mut neighbour = vec![0i64; dims];
        let samples = out.buffer_mut().as_mut_slice();
        for (sample, index) in samples.iter_mut().zip(region.indices()) {
            let mut sum = 0.0f64;
            for offset in kernel.indices() {
                for a in 0..dims {
                    neighbour[a] = (index[a] + offset[a]).clamp(bounds.start(a), bounds.end(a) - 1);
                }
                let value = input
                    .value(&neighbour)
                    .ok_or_else(|| crate::missing_sample(&neighbour))?;
                sum += f64::from(value);
            }
            *sample = (sum / count) as f32;
        }
        Ok(())
    }
}
