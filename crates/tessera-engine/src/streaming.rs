//! Memory-bounded updates by spatial tiling.
//!
//! A streamed update splits the requested region into slabs along one
//! axis and runs one ordinary update per slab. Every stage upstream then
//! only ever holds a slab plus its halo, while the terminal's slabs are
//! copied into one assembled buffer.

use log::{debug, warn};

use crate::pipeline::Pipeline;
use crate::update::UpdateReport;
use tessera_core::{Buffer, OutputRef, Region, RegionError, UpdateError};

/// Result of [`Pipeline::update_streamed`].
#[derive(Clone, Debug)]
pub struct StreamedOutput {
    /// The terminal's samples over the whole requested region.
    pub buffer: Buffer,
    /// One report per tile, in tile order.
    pub reports: Vec<UpdateReport>,
}

impl StreamedOutput {
    /// Number of tiles the request was split into.
    pub fn tiles(&self) -> usize {
        self.reports.len()
    }
}

impl Pipeline {
    /// Update `region` of `output` (default: all of it) tile by tile.
    ///
    /// `tiles` overrides the configured tile count. Tiles are cut along
    /// the configured streaming axis. Cancellation is checked before each
    /// tile as well as before each stage.
    ///
    /// The per-buffer ceiling of the configuration applies to the stage
    /// buffers of each tile, not to the assembled result.
    ///
    /// # Errors
    ///
    /// Any error of [`update_region`](Self::update_region) for a tile, or
    /// [`UpdateError::Cancelled`] with the number of tiles not run.
    pub fn update_streamed(
        &mut self,
        output: OutputRef,
        region: Option<Region>,
        tiles: Option<usize>,
    ) -> Result<StreamedOutput, UpdateError> {
        self.update_output_information(output.stage)?;
        let container = self.output(output)?;
        let pixel = container.pixel_type();
        let largest = container
            .largest_region()
            .cloned()
            .ok_or_else(|| RegionError::InvariantViolated {
                stage: output.stage.to_string(),
                slot: container.name().to_string(),
                reason: "largest region unknown".into(),
            })?;

        let requested = region.unwrap_or_else(|| largest.clone());
        let full = requested.crop_to(&largest)?;
        if full.is_empty() && requested != largest {
            return Err(RegionError::EmptyRequest {
                requested,
                available: largest,
            }
            .into());
        }

        let count = tiles.unwrap_or(self.config().streaming.tiles).max(1);
        let pieces = full.split(count, self.config().streaming.axis);
        let mut buffer =
            Buffer::allocate(full.clone(), pixel).map_err(|source| UpdateError::Resource {
                stage: self
                    .stage_name(output.stage)
                    .map_or_else(|_| output.stage.to_string(), str::to_string),
                source,
            })?;

        let cancel = self.cancel_token();
        let mut reports = Vec::with_capacity(pieces.len());
        for (i, tile) in pieces.iter().enumerate() {
            if cancel.is_cancelled() {
                let skipped = pieces.len() - i;
                warn!("streamed update cancelled with {skipped} tiles left");
                return Err(UpdateError::Cancelled { skipped });
            }
            debug!("tile {}/{}: {tile}", i + 1, pieces.len());
            let report = self.update_region(output, tile.clone())?;
            let produced = self
                .output(output)?
                .buffer()
                .ok_or_else(|| RegionError::Unsatisfied {
                    stage: output.stage.to_string(),
                    slot: output.slot.to_string(),
                    requested: tile.clone(),
                    produced: Region::empty(tile.dims()),
                })?;
            buffer.copy_region_from(produced, tile)?;
            reports.push(report);
        }
        Ok(StreamedOutput { buffer, reports })
    }
}
