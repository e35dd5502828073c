//! Typed multi-dimensional sample storage.
//!
//! A [`Buffer`] is the materialized contents of a data container over
//! some region. Samples are `f32`, stored row-major with the last axis
//! fastest and `components` interleaved values per index.

use std::fmt;

use crate::error::{ProcessingError, RegionError, ResourceError};
use crate::region::Region;

/// Element type carried by a container.
///
/// Connections between stages are type-checked against this: an input
/// slot that declares a pixel type only accepts outputs of that type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// One `f32` per index.
    Scalar,
    /// A fixed number of `f32` components per index (e.g. 3 for RGB).
    Vector {
        /// Number of components per index.
        components: u32,
    },
}

impl PixelType {
    /// Number of `f32` slots per index.
    pub fn components(&self) -> u32 {
        match self {
            Self::Scalar => 1,
            Self::Vector { components } => *components,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Vector { components } => write!(f, "vector[{components}]"),
        }
    }
}

/// Samples of one pixel type over one region.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    region: Region,
    pixel: PixelType,
    data: Vec<f32>,
}

impl Buffer {
    /// Allocate a zero-filled buffer over `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::SizeOverflow`] if the sample count does not
    /// fit in memory addressing, or [`ResourceError::AllocationFailed`] if
    /// the allocator refuses the request.
    pub fn allocate(region: Region, pixel: PixelType) -> Result<Self, ResourceError> {
        Self::allocate_limited(region, pixel, None)
    }

    /// Like [`allocate`](Self::allocate), refusing regions with more than
    /// `max_cells` indices.
    ///
    /// # Errors
    ///
    /// Additionally returns [`ResourceError::LimitExceeded`] when the
    /// region is larger than `max_cells`.
    pub fn allocate_limited(
        region: Region,
        pixel: PixelType,
        max_cells: Option<usize>,
    ) -> Result<Self, ResourceError> {
        let cells = region.cell_count();
        if let Some(limit) = max_cells {
            if cells > limit as u64 {
                return Err(ResourceError::LimitExceeded { cells, limit });
            }
        }
        let len = usize::try_from(cells)
            .ok()
            .and_then(|c| c.checked_mul(pixel.components() as usize))
            .ok_or(ResourceError::SizeOverflow { cells })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| ResourceError::AllocationFailed {
                bytes: len.saturating_mul(std::mem::size_of::<f32>()),
            })?;
        data.resize(len, 0.0);
        Ok(Self {
            region,
            pixel,
            data,
        })
    }

    /// Allocate a buffer with every sample set to `value`.
    ///
    /// # Errors
    ///
    /// Same as [`allocate`](Self::allocate).
    pub fn filled(region: Region, pixel: PixelType, value: f32) -> Result<Self, ResourceError> {
        let mut buf = Self::allocate(region, pixel)?;
        buf.fill(value);
        Ok(buf)
    }

    /// Wrap existing samples.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::LengthMismatch`] unless
    /// `data.len() == region.cell_count() * components`.
    pub fn from_vec(region: Region, pixel: PixelType, data: Vec<f32>) -> Result<Self, RegionError> {
        let expected = (region.cell_count() as usize).saturating_mul(pixel.components() as usize);
        if data.len() != expected {
            return Err(RegionError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            region,
            pixel,
            data,
        })
    }

    /// The region these samples cover.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Element type.
    pub fn pixel_type(&self) -> PixelType {
        self.pixel
    }

    /// Samples per index.
    pub fn components(&self) -> usize {
        self.pixel.components() as usize
    }

    /// Total number of `f32` samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the sample storage in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// All samples, row-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// All samples, row-major, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the buffer, returning its samples.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Set every sample to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Offset of the first sample for `index`, or `None` if outside.
    pub fn offset_of(&self, index: &[i64]) -> Option<usize> {
        Some(self.region.linear_offset(index)? * self.components())
    }

    /// The components stored at `index`.
    pub fn get(&self, index: &[i64]) -> Option<&[f32]> {
        let start = self.offset_of(index)?;
        self.data.get(start..start + self.components())
    }

    /// The components stored at `index`, mutably.
    pub fn get_mut(&mut self, index: &[i64]) -> Option<&mut [f32]> {
        let start = self.offset_of(index)?;
        let n = self.components();
        self.data.get_mut(start..start + n)
    }

    /// First component at `index`. Convenient for scalar buffers.
    pub fn value(&self, index: &[i64]) -> Option<f32> {
        self.get(index).and_then(|c| c.first().copied())
    }

    /// The samples of one row (see [`Region::rows`]) starting at `row_start`
    /// and spanning `len` indices along the last axis.
    pub fn row(&self, row_start: &[i64], len: u64) -> Option<&[f32]> {
        let start = self.offset_of(row_start)?;
        let end = start + (len as usize) * self.components();
        self.row_bounds_ok(row_start, len)?;
        self.data.get(start..end)
    }

    /// Mutable counterpart of [`row`](Self::row).
    pub fn row_mut(&mut self, row_start: &[i64], len: u64) -> Option<&mut [f32]> {
        let start = self.offset_of(row_start)?;
        let end = start + (len as usize) * self.components();
        self.row_bounds_ok(row_start, len)?;
        self.data.get_mut(start..end)
    }

    /// Copy the samples of `region` from `src` into `self`.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::OutsideBuffer`] unless both buffers contain
    /// `region`, and [`RegionError::LengthMismatch`] if their pixel types
    /// disagree in component count.
    pub fn copy_region_from(&mut self, src: &Buffer, region: &Region) -> Result<(), RegionError> {
        if src.components() != self.components() {
            return Err(RegionError::LengthMismatch {
                expected: self.components(),
                got: src.components(),
            });
        }
        for holder in [self.region(), src.region()] {
            if !holder.contains(region) {
                return Err(RegionError::OutsideBuffer {
                    region: region.clone(),
                    buffer: holder.clone(),
                });
            }
        }
        let len = region.row_len();
        let holder = self.region.clone();
        let outside = || RegionError::OutsideBuffer {
            region: region.clone(),
            buffer: holder.clone(),
        };
        for row_start in region.rows() {
            let from = src.row(&row_start, len).ok_or_else(outside)?;
            let to = self.row_mut(&row_start, len).ok_or_else(outside)?;
            to.copy_from_slice(from);
        }
        Ok(())
    }

    /// A new buffer holding a copy of `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::Region`] unless `self` contains `region`,
    /// or [`ProcessingError::Resource`] if the copy cannot be allocated.
    pub fn extract(&self, region: &Region) -> Result<Buffer, ProcessingError> {
        if !self.region.contains(region) {
            return Err(RegionError::OutsideBuffer {
                region: region.clone(),
                buffer: self.region.clone(),
            }
            .into());
        }
        let mut out = Buffer::allocate(region.clone(), self.pixel)?;
        out.copy_region_from(self, region)?;
        Ok(out)
    }

    fn row_bounds_ok(&self, row_start: &[i64], len: u64) -> Option<()> {
        let last = self.region.dims().checked_sub(1)?;
        let end = row_start[last].checked_add(i64::try_from(len).ok()?)?;
        (end <= self.region.end(last)).then_some(())
    }
}
