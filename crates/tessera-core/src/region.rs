//! Axis-aligned regions of an integer index space.
//!
//! A [`Region`] is the unit of negotiation in the pipeline: consumers
//! request regions, producers advertise their largest possible region,
//! and buffers remember which region they hold.

use std::fmt;

use crate::error::RegionError;
use crate::id::{Coord, Extent};

/// An axis-aligned box over integer index space.
///
/// Described by an origin (one index per axis) and an extent (one size
/// per axis). The box covers `origin[a] .. origin[a] + extent[a]` on each
/// axis `a`, end exclusive. A region with any zero-sized axis (or with
/// zero axes) is empty.
///
/// Regions are immutable values; every operation returns a new region.
///
/// # Examples
///
/// ```
/// use tessera_core::Region;
///
/// let image = Region::from_extent(&[128, 128]);
/// let tile = Region::new(&[120, 0], &[16, 16]).unwrap();
/// let clipped = tile.crop_to(&image).unwrap();
/// assert_eq!(clipped, Region::new(&[120, 0], &[8, 16]).unwrap());
/// assert!(image.contains(&clipped));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    origin: Coord,
    extent: Extent,
}

impl Region {
    /// Build a region from an origin and an extent of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DimensionMismatch`] if the slices differ in length.
    pub fn new(origin: &[i64], extent: &[u64]) -> Result<Self, RegionError> {
        if origin.len() != extent.len() {
            return Err(RegionError::DimensionMismatch {
                expected: origin.len(),
                got: extent.len(),
            });
        }
        Ok(Self {
            origin: Coord::from_slice(origin),
            extent: Extent::from_slice(extent),
        })
    }

    /// A region anchored at the zero index with the given extent.
    pub fn from_extent(extent: &[u64]) -> Self {
        Self {
            origin: std::iter::repeat(0).take(extent.len()).collect(),
            extent: Extent::from_slice(extent),
        }
    }

    /// An empty region with `dims` axes, anchored at the zero index.
    pub fn empty(dims: usize) -> Self {
        Self::empty_at(&vec![0; dims])
    }

    /// An empty region anchored at `origin`.
    pub fn empty_at(origin: &[i64]) -> Self {
        Self {
            origin: Coord::from_slice(origin),
            extent: std::iter::repeat(0).take(origin.len()).collect(),
        }
    }

    /// Number of axes.
    pub fn dims(&self) -> usize {
        self.origin.len()
    }

    /// First index on every axis.
    pub fn origin(&self) -> &[i64] {
        &self.origin
    }

    /// Size on every axis.
    pub fn extent(&self) -> &[u64] {
        &self.extent
    }

    /// First index on `axis` (inclusive).
    pub fn start(&self, axis: usize) -> i64 {
        self.origin[axis]
    }

    /// One past the last index on `axis` (exclusive).
    pub fn end(&self, axis: usize) -> i64 {
        let len = i64::try_from(self.extent[axis]).unwrap_or(i64::MAX);
        self.origin[axis].saturating_add(len)
    }

    /// Whether the region covers no index at all.
    pub fn is_empty(&self) -> bool {
        self.extent.is_empty() || self.extent.iter().any(|&e| e == 0)
    }

    /// Number of indices covered. Saturates at `u64::MAX`.
    pub fn cell_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.extent.iter().fold(1u64, |acc, &e| acc.saturating_mul(e))
    }

    /// Whether `index` lies inside the region.
    pub fn contains_index(&self, index: &[i64]) -> bool {
        index.len() == self.dims()
            && !self.is_empty()
            && (0..self.dims()).all(|a| index[a] >= self.start(a) && index[a] < self.end(a))
    }

    /// Whether every index of `other` lies inside `self`.
    ///
    /// An empty `other` is contained in any region of the same
    /// dimensionality. Regions of different dimensionality never
    /// contain each other.
    pub fn contains(&self, other: &Region) -> bool {
        if self.dims() != other.dims() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        (0..self.dims()).all(|a| other.start(a) >= self.start(a) && other.end(a) <= self.end(a))
    }

    /// The indices common to both regions (possibly empty).
    ///
    /// A disjoint pair yields an empty region anchored at the
    /// per-axis maximum of the two origins.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DimensionMismatch`] if the regions differ in
    /// dimensionality.
    pub fn intersection(&self, other: &Region) -> Result<Region, RegionError> {
        self.check_dims(other)?;
        let mut origin = Coord::with_capacity(self.dims());
        let mut extent = Extent::with_capacity(self.dims());
        let disjoint = self.is_empty() || other.is_empty();
        for a in 0..self.dims() {
            let lo = self.start(a).max(other.start(a));
            let hi = self.end(a).min(other.end(a));
            origin.push(lo);
            extent.push(if disjoint || hi <= lo { 0 } else { (hi - lo) as u64 });
        }
        if extent.iter().any(|&e| e == 0) {
            extent.iter_mut().for_each(|e| *e = 0);
        }
        Ok(Region { origin, extent })
    }

    /// The part of `self` that lies inside `bounds`.
    ///
    /// Equivalent to [`intersection`](Self::intersection); named for the
    /// common use of clamping a request to what a producer can supply.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DimensionMismatch`] on differing dimensionality.
    pub fn crop_to(&self, bounds: &Region) -> Result<Region, RegionError> {
        self.intersection(bounds)
    }

    /// The smallest region containing both `self` and `other`.
    ///
    /// Empty operands are ignored, so the empty region is the identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DimensionMismatch`] on differing dimensionality.
    pub fn union(&self, other: &Region) -> Result<Region, RegionError> {
        self.check_dims(other)?;
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(other.clone());
        }
        let mut origin = Coord::with_capacity(self.dims());
        let mut extent = Extent::with_capacity(self.dims());
        for a in 0..self.dims() {
            let lo = self.start(a).min(other.start(a));
            let hi = self.end(a).max(other.end(a));
            origin.push(lo);
            extent.push((hi - lo) as u64);
        }
        Ok(Region { origin, extent })
    }

    /// Grow the region by `radius[a]` indices on both sides of every axis.
    ///
    /// An empty region stays empty: padding nothing needs nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DimensionMismatch`] if `radius` has the wrong length.
    pub fn dilate(&self, radius: &[u64]) -> Result<Region, RegionError> {
        if radius.len() != self.dims() {
            return Err(RegionError::DimensionMismatch {
                expected: self.dims(),
                got: radius.len(),
            });
        }
        if self.is_empty() {
            return Ok(self.clone());
        }
        let mut out = self.clone();
        for (a, &r) in radius.iter().enumerate() {
            let r_signed = i64::try_from(r).unwrap_or(i64::MAX);
            out.origin[a] = out.origin[a].saturating_sub(r_signed);
            out.extent[a] = out.extent[a].saturating_add(r.saturating_mul(2));
        }
        Ok(out)
    }

    /// [`dilate`](Self::dilate) with the same radius on every axis.
    pub fn dilate_uniform(&self, radius: u64) -> Region {
        let radii = vec![radius; self.dims()];
        // Lengths agree by construction.
        self.dilate(&radii).unwrap_or_else(|_| self.clone())
    }

    /// Row-major position of `index` within the region, last axis fastest.
    ///
    /// Returns `None` if the index lies outside the region.
    pub fn linear_offset(&self, index: &[i64]) -> Option<usize> {
        if !self.contains_index(index) {
            return None;
        }
        let mut offset: u64 = 0;
        for a in 0..self.dims() {
            let rel = (index[a] - self.origin[a]) as u64;
            offset = offset.checked_mul(self.extent[a])?.checked_add(rel)?;
        }
        usize::try_from(offset).ok()
    }

    /// Divide the region into at most `pieces` contiguous slabs along `axis`.
    ///
    /// Slabs are as even as possible, with the remainder in the last one.
    /// The slabs are disjoint and their union is `self`. An empty region,
    /// an out-of-range axis, or `pieces <= 1` yields `[self]`.
    pub fn split(&self, pieces: usize, axis: usize) -> Vec<Region> {
        if self.is_empty() || axis >= self.dims() || pieces <= 1 {
            return vec![self.clone()];
        }
        let len = self.extent[axis];
        let pieces = (pieces as u64).min(len);
        let per_piece = len.div_ceil(pieces);
        let mut out = Vec::with_capacity(pieces as usize);
        let mut start = 0u64;
        while start < len {
            let size = per_piece.min(len - start);
            let mut slab = self.clone();
            slab.origin[axis] = self.origin[axis] + start as i64;
            slab.extent[axis] = size;
            out.push(slab);
            start += size;
        }
        out
    }

    /// Every index of the region in row-major order.
    pub fn indices(&self) -> RegionIter<'_> {
        RegionIter::new(self, self.dims())
    }

    /// The first index of every row, where a row is the contiguous run
    /// along the last axis of length `extent[dims - 1]`.
    pub fn rows(&self) -> RegionIter<'_> {
        RegionIter::new(self, self.dims().saturating_sub(1))
    }

    /// Length of one row (see [`rows`](Self::rows)); zero for empty regions.
    pub fn row_len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.extent[self.dims() - 1]
        }
    }

    fn check_dims(&self, other: &Region) -> Result<(), RegionError> {
        if self.dims() != other.dims() {
            return Err(RegionError::DimensionMismatch {
                expected: self.dims(),
                got: other.dims(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for a in 0..self.dims() {
            if a > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}..{}", self.start(a), self.end(a))?;
        }
        write!(f, "]")
    }
}

/// Odometer over the leading axes of a region.
///
/// Created by [`Region::indices`] (all axes) and [`Region::rows`] (all
/// but the last). Axes not iterated stay at the region origin.
#[derive(Debug)]
pub struct RegionIter<'a> {
    region: &'a Region,
    axes: usize,
    next: Option<Coord>,
}

impl<'a> RegionIter<'a> {
    fn new(region: &'a Region, axes: usize) -> Self {
        let next = if region.is_empty() {
            None
        } else {
            Some(region.origin.clone())
        };
        Self { region, axes, next }
    }
}

impl Iterator for RegionIter<'_> {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        for a in (0..self.axes).rev() {
            advanced[a] += 1;
            if advanced[a] < self.region.end(a) {
                self.next = Some(advanced);
                return Some(current);
            }
            advanced[a] = self.region.start(a);
        }
        Some(current)
    }
}
