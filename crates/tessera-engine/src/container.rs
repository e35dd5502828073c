//! Data containers: the outputs a stage owns.

use tessera_core::{Buffer, PixelType, Region, StageId, Stamp};

/// One output of a stage: a buffer plus the three regions that describe it.
///
/// - `largest`: everything the producer could generate, learned by the
///   information pass.
/// - `requested`: what downstream needs, set by the region pass.
/// - buffered: what is actually materialized (the buffer's own region).
///
/// After a successful update `largest ⊇ buffered ⊇ requested`.
#[derive(Debug)]
pub struct DataContainer {
    owner: StageId,
    name: String,
    pixel: PixelType,
    largest: Option<Region>,
    requested: Option<Region>,
    buffer: Option<Buffer>,
    generation: Stamp,
}

impl DataContainer {
    pub(crate) fn new(owner: StageId, name: String, pixel: PixelType) -> Self {
        Self {
            owner,
            name,
            pixel,
            largest: None,
            requested: None,
            buffer: None,
            generation: Stamp::NEVER,
        }
    }

    /// The producing stage.
    pub fn owner(&self) -> StageId {
        self.owner
    }

    /// Output slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type.
    pub fn pixel_type(&self) -> PixelType {
        self.pixel
    }

    /// Largest possible region, once known.
    pub fn largest_region(&self) -> Option<&Region> {
        self.largest.as_ref()
    }

    /// Region downstream asked for in the last update that reached it.
    pub fn requested_region(&self) -> Option<&Region> {
        self.requested.as_ref()
    }

    /// Region actually materialized.
    pub fn buffered_region(&self) -> Option<&Region> {
        self.buffer.as_ref().map(Buffer::region)
    }

    /// The materialized samples. Never triggers computation.
    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Clock value of the last successful production.
    pub fn generation(&self) -> Stamp {
        self.generation
    }

    /// Whether the buffer covers the requested region.
    ///
    /// An unset request is trivially satisfied; an unset buffer satisfies
    /// nothing, not even an empty request.
    pub fn satisfies_request(&self) -> bool {
        match (&self.requested, &self.buffer) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(req), Some(buf)) => buf.region().contains(req),
        }
    }

    pub(crate) fn set_largest(&mut self, region: Region) {
        self.largest = Some(region);
    }

    pub(crate) fn set_requested(&mut self, region: Region) {
        self.requested = Some(region);
    }

    pub(crate) fn store(&mut self, buffer: Buffer, generation: Stamp) {
        self.buffer = Some(buffer);
        self.generation = generation;
    }

    /// Drop the buffer and the request; stamps are kept.
    pub(crate) fn release(&mut self) -> usize {
        self.requested = None;
        self.buffer.take().map_or(0, |b| b.byte_len())
    }
}
