//! Seeded uniform noise source.
//!
//! Every sample is drawn from a ChaCha8 stream seeded with the `seed`
//! parameter, at a stream position derived from the sample's linear
//! offset in the source box. A sample therefore has the same value no
//! matter which region is requested, so tiled and untiled updates agree
//! bit for bit.
//!
//! Constructed via the builder pattern: [`NoiseSource::builder`].

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tessera_core::{ParamSet, ParamValue, ProcessingError, Region, RegionError};
use tessera_stage::{ExecuteContext, OutputSlot, Stage};

/// Scalar source of uniform noise in `[low, high)`.
#[derive(Clone, Debug)]
pub struct NoiseSource {
    region: Region,
    seed: u64,
    low: f64,
    high: f64,
}

/// Builder for [`NoiseSource`].
///
/// Required field: `extent`.
#[derive(Clone, Debug)]
pub struct NoiseSourceBuilder {
    extent: Option<Vec<u64>>,
    seed: u64,
    low: f64,
    high: f64,
}

impl NoiseSource {
    /// Create a new builder. Defaults: seed 0, range `[0, 1)`.
    pub fn builder() -> NoiseSourceBuilder {
        NoiseSourceBuilder {
            extent: None,
            seed: 0,
            low: 0.0,
            high: 1.0,
        }
    }

    /// A uniform sample in `[0, 1)` at word position `offset * 2`.
    fn unit(rng: &mut ChaCha8Rng, offset: usize) -> f64 {
        rng.set_word_pos(offset as u128 * 2);
        // 53 high bits fill an f64 mantissa exactly.
        (rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

impl NoiseSourceBuilder {
    /// Set the size of the box `[0, extent)`.
    pub fn extent(mut self, extent: &[u64]) -> Self {
        self.extent = Some(extent.to_vec());
        self
    }

    /// Set the seed (default: 0).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the value range (default: `[0, 1)`).
    pub fn range(mut self, low: f64, high: f64) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    /// Build the source, validating all configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - `extent` is not set or has no axes
    /// - `low` or `high` is not finite
    /// - `low > high`
    pub fn build(self) -> Result<NoiseSource, String> {
        let extent = self.extent.ok_or_else(|| "extent is required".to_string())?;
        if extent.is_empty() {
            return Err("extent must have at least one axis".into());
        }
        check_range(self.low, self.high)?;
        Ok(NoiseSource {
            region: Region::from_extent(&extent),
            seed: self.seed,
            low: self.low,
            high: self.high,
        })
    }
}

fn check_range(low: f64, high: f64) -> Result<(), String> {
    if !low.is_finite() || !high.is_finite() {
        return Err(format!("range must be finite, got [{low}, {high})"));
    }
    if low > high {
        return Err(format!("low {low} exceeds high {high}"));
    }
    Ok(())
}

impl Stage for NoiseSource {
    fn name(&self) -> &str {
        "NoiseSource"
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new()
            .with("seed", self.seed as i64)
            .with("low", self.low)
            .with("high", self.high)
    }

    fn validate_parameter(&self, name: &str, value: &ParamValue) -> Result<(), String> {
        match (name, value.as_float()) {
            ("low" | "high", Some(v)) if !v.is_finite() => {
                Err(format!("{name} must be finite, got {v}"))
            }
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
        let seed = ctx.int("seed")? as u64;
        let low = ctx.float("low")?;
        let high = ctx.float("high")?;
        check_range(low, high).map_err(|reason| ProcessingError::ExecutionFailed { reason })?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let out = ctx.output(0)?;
        let region = out.requested().clone();
        let samples = out.buffer_mut().as_mut_slice();
        for (sample, index) in samples.iter_mut().zip(region.indices()) {
            let offset = self.region.linear_offset(&index).ok_or_else(|| {
                RegionError::OutsideBuffer {
                    region: region.clone(),
                    buffer: self.region.clone(),
                }
            })?;
            *sample = (low + (high - low) * NoiseSource::unit(&mut rng, offset)) as f32;
        }
        Ok(())
    }
}
