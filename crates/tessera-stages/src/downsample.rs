//! Integer-factor reduction by block averaging.

use tessera_core::{ParamSet, ParamValue, PixelType, ProcessingError, Region, RegionError};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

/// Output index `i` is the mean of the input block `[i * factor, (i + 1) * factor)`.
///
/// Only blocks that lie wholly inside the input's data produce output,
/// so the largest output region on each axis runs from
/// `ceil(start / factor)` to `floor(end / factor)`.
#[derive(Clone, Copy, Debug)]
pub struct Downsample {
    factor: u64,
}

impl Downsample {
    /// Reduce every axis by `factor`.
    pub fn new(factor: u64) -> Self {
        Self { factor }
    }
}

fn factor_of(params: &ParamSet) -> i64 {
    params.int("factor").map_or(1, |f| f.max(1))
}

impl Stage for Downsample {
    fn name(&self) -> &str {
        "Downsample"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::typed("input", PixelType::Scalar)]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new().with("factor", self.factor as i64)
    }

    fn validate_parameter(&self, name: &str, value: &ParamValue) -> Result<(), String> {
        match (name, value.as_int()) {
            ("factor", Some(f)) if f < 1 => Err(format!("factor must be >= 1, got {f}")),
            _ => Ok(()),
        }
    }

    fn output_information(
        &self,
        inputs: &[Region],
        params: &ParamSet,
    ) -> Result<Vec<Region>, RegionError> {
        let input = crate::single_input(self.name(), inputs)?;
        let f = factor_of(params);
        let mut origin = Vec::with_capacity(input.dims());
        let mut extent = Vec::with_capacity(input.dims());
        for a in 0..input.dims() {
            let start = input.start(a).div_euclid(f) + i64::from(input.start(a).rem_euclid(f) != 0);
            let end = input.end(a).div_euclid(f);
            origin.push(start);
            extent.push(u64::try_from(end - start).unwrap_or(0));
        }
        if input.is_empty() || extent.contains(&0) {
            return Ok(vec![Region::empty_at(&origin)]);
        }
        Ok(vec![Region::new(&origin, &extent)?])
    }

    fn input_region(&self, _: usize, _: usize, requested: &Region, params: &ParamSet) -> Region {
        let f = factor_of(params);
        let origin: Vec<i64> = requested.origin().iter().map(|&o| o * f).collect();
        if requested.is_empty() {
            return Region::empty_at(&origin);
        }
        let extent: Vec<u64> = requested.extent().iter().map(|&e| e * f as u64).collect();
        Region::new(&origin, &extent).unwrap_or_else(|_| Region::empty_at(&origin))
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let f = factor_of(ctx.params());
        let input = ctx.input(0)?;
        let out = ctx.output(0)?;
        let region = out.requested().clone();
        let dims = region.dims();

        let block = Region::new(&vec![0; dims], &vec![f as u64; dims])?;
        let count = block.cell_count() as f64;

        let mut source = vec![0i64; dims];
        let samples = out.buffer_mut().as_mut_slice();
        for (sample, index) in samples.iter_mut().zip(region.indices()) {
            let mut sum = 0.0f64;
            for offset in block.indices() {
                for a in 0..dims {
                    source[a] = index[a] * f + offset[a];
                }
                let value = input
                    .value(&source)
                    .ok_or_else(|| crate::missing_sample(&source))?;
                sum += f64::from(value);
            }
            *sample = (sum / count) as f32;
        }
        Ok(())
    }
}
