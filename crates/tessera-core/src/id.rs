//! Strongly-typed identifiers, the [`Stamp`] version type, and the
//! [`Coord`] / [`Extent`] aliases.

use smallvec::SmallVec;
use std::fmt;

/// Identifies a stage within a pipeline graph.
///
/// Stages are appended to the graph arena and assigned sequential IDs.
/// `StageId(n)` is the n-th stage added; IDs are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub u32);

impl StageId {
    /// Arena index of this stage.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StageId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Non-owning reference to a stage's output container.
///
/// Consumers hold an `OutputRef` in their input slots; the container
/// itself is owned by the producing stage. Resolving an `OutputRef`
/// always goes through the graph, so a reference never keeps data alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    /// The producing stage.
    pub stage: StageId,
    /// Output slot index on the producing stage.
    pub slot: usize,
}

impl OutputRef {
    /// Reference output `slot` of `stage`.
    pub fn new(stage: StageId, slot: usize) -> Self {
        Self { stage, slot }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.stage, self.slot)
    }
}

/// A value of the [`VersionClock`](crate::VersionClock).
///
/// Stamps order mutations: a larger stamp was issued later. `Stamp(0)`
/// is never issued by a clock and marks "never happened".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stamp(pub u64);

impl Stamp {
    /// The stamp carried by containers that were never generated.
    pub const NEVER: Stamp = Stamp(0);

    /// Whether this stamp was ever issued by a clock.
    pub fn is_never(self) -> bool {
        self == Self::NEVER
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Stamp {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// An index into a multi-dimensional index space.
///
/// Uses `SmallVec<[i64; 4]>` so regions of up to four dimensions never
/// touch the heap. Higher-dimensional indices spill transparently.
pub type Coord = SmallVec<[i64; 4]>;

/// Per-axis sizes of a region. Same inline capacity as [`Coord`].
pub type Extent = SmallVec<[u64; 4]>;
