//! Source serving an in-memory buffer.
//!
//! The buffer lives behind an [`ArrayHandle`] shared between the source
//! and the caller. Swapping it through the handle changes what the next
//! execution serves but does not invalidate anything by itself: follow a
//! swap with `Pipeline::touch` on the source.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tessera_core::{
    Buffer, ConfigError, ParamSet, PixelType, ProcessingError, Region, RegionError,
};
use tessera_stage::{ExecuteContext, OutputSlot, Stage};

/// Shared handle to the data behind an [`ArraySource`].
#[derive(Clone, Debug)]
pub struct ArrayHandle {
    data: Arc<Mutex<Buffer>>,
    pixel: PixelType,
}

impl ArrayHandle {
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Region covered by the current data.
    pub fn region(&self) -> Region {
        self.lock().region().clone()
    }

    /// Pixel type every replacement must keep.
    pub fn pixel_type(&self) -> PixelType {
        self.pixel
    }

    /// A copy of the current data.
    pub fn snapshot(&self) -> Buffer {
        self.lock().clone()
    }

    /// Swap in new data, returning the old buffer.
    ///
    /// The region may change; the pixel type may not.
    ///
    /// # Errors
    ///
    /// [`ConfigError::PixelTypeMismatch`] if `buffer` has a different
    /// pixel type. The current data is kept.
    pub fn replace(&self, buffer: Buffer) -> Result<Buffer, ConfigError> {
        if buffer.pixel_type() != self.pixel {
            return Err(ConfigError::PixelTypeMismatch {
                stage: "ArraySource".into(),
                slot: "output".into(),
                expected: self.pixel,
                got: buffer.pixel_type(),
            });
        }
        Ok(std::mem::replace(&mut *self.lock(), buffer))
    }
}

/// Source serving the samples of a [`Buffer`].
///
/// Its largest possible region is the buffer's region, re-read on every
/// update, so a replaced buffer of a different size is picked up.
#[derive(Debug)]
pub struct ArraySource {
    handle: ArrayHandle,
}

impl ArraySource {
    /// Serve `buffer`.
    pub fn new(buffer: Buffer) -> Self {
        let pixel = buffer.pixel_type();
        Self {
            handle: ArrayHandle {
                data: Arc::new(Mutex::new(buffer)),
                pixel,
            },
        }
    }

    /// Serve scalar `data` laid out row-major over `region`.
    ///
    /// # Errors
    ///
    /// [`RegionError::LengthMismatch`] if `data` does not have one sample
    /// per index of `region`.
    pub fn from_vec(region: Region, data: Vec<f32>) -> Result<Self, RegionError> {
        Ok(Self::new(Buffer::from_vec(region, PixelType::Scalar, data)?))
    }

    /// A handle sharing this source's data.
    pub fn handle(&self) -> ArrayHandle {
        self.handle.clone()
    }
}

impl Stage for ArraySource {
    fn name(&self) -> &str {
        "ArraySource"
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("output", self.handle.pixel)]
    }

    fn output_information(
        &self,
        _inputs: &[Region],
        _params: &ParamSet,
    ) -> Result<Vec<Region>, RegionError> {
        Ok(vec![self.handle.region()])
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let data = self.handle.lock();
        let out = ctx.output(0)?;
        let region = out.requested().clone();
        out.buffer_mut().copy_region_from(&data, &region)?;
        Ok(())
    }
}
