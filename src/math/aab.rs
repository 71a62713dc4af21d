// Copyright voxel-core contributors, MIT License.

//! Axis-aligned bounding boxes: [`Aab`] for float (world/model) space and
//! [`GridAab`] for half-open integer grids (chunk-local and model-space
//! block bounds).

use cgmath::{EuclideanSpace as _, Point3, Vector3};

use super::{FreeCoordinate, GridCoordinate, GridPoint, GridVector};

/// A floating-point axis-aligned box, used for world-space queries (R-tree
/// nodes, ray/box casts).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aab {
    lower: Point3<FreeCoordinate>,
    upper: Point3<FreeCoordinate>,
}

impl Aab {
    pub fn new(lower: Point3<FreeCoordinate>, upper: Point3<FreeCoordinate>) -> Self {
        debug_assert!(lower.x <= upper.x && lower.y <= upper.y && lower.z <= upper.z);
        Self { lower, upper }
    }

    pub fn lower(&self) -> Point3<FreeCoordinate> {
        self.lower
    }
    pub fn upper(&self) -> Point3<FreeCoordinate> {
        self.upper
    }

    pub fn size(&self) -> Vector3<FreeCoordinate> {
        self.upper - self.lower
    }

    pub fn volume(&self) -> FreeCoordinate {
        let s = self.size();
        (s.x * s.y * s.z).max(0.0)
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Aab) -> Aab {
        Aab::new(
            Point3::new(
                self.lower.x.min(other.lower.x),
                self.lower.y.min(other.lower.y),
                self.lower.z.min(other.lower.z),
            ),
            Point3::new(
                self.upper.x.max(other.upper.x),
                self.upper.y.max(other.upper.y),
                self.upper.z.max(other.upper.z),
            ),
        )
    }

    /// Volume "wasted" by merging `self` and `other`: the merged box's
    /// volume minus the sum of the two original volumes. Used by the
    /// R-tree's quadratic-split heuristic.
    pub fn merge_waste(&self, other: &Aab) -> FreeCoordinate {
        self.union(other).volume() - self.volume() - other.volume()
    }

    pub fn intersects(&self, other: &Aab) -> bool {
        self.lower.x < other.upper.x
            && self.upper.x > other.lower.x
            && self.lower.y < other.upper.y
            && self.upper.y > other.lower.y
            && self.lower.z < other.upper.z
            && self.upper.z > other.lower.z
    }

    pub fn contains(&self, other: &Aab) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && self.lower.z <= other.lower.z
            && self.upper.x >= other.upper.x
            && self.upper.y >= other.upper.y
            && self.upper.z >= other.upper.z
    }

    pub fn expanded(&self, margin: FreeCoordinate) -> Aab {
        let m = Vector3::new(margin, margin, margin);
        Aab::new(self.lower - m, self.upper + m)
    }

    pub fn translated(&self, offset: Vector3<FreeCoordinate>) -> Aab {
        Aab::new(self.lower + offset, self.upper + offset)
    }
}

/// A half-open integer box: `[lower, upper)` on each axis. `upper` is
/// exclusive, matching `spec.md`'s "local AABB in chunk coordinates
/// (half-open, max exclusive)".
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct GridAab {
    lower: GridPoint,
    /// Exclusive upper bound.
    upper: GridPoint,
}

impl GridAab {
    /// Constructs a box from an inclusive lower corner and a size.
    pub fn new(lower: impl Into<GridPoint>, size: impl Into<GridVector>) -> Self {
        let lower = lower.into();
        let size = size.into();
        Self {
            lower,
            upper: lower + size,
        }
    }

    /// Constructs a box directly from half-open bounds.
    pub fn from_bounds(lower: GridPoint, upper: GridPoint) -> Self {
        Self { lower, upper }
    }

    /// An empty box at the origin, suitable as a fold starting point before
    /// the first block is inserted.
    pub fn empty_at(origin: GridPoint) -> Self {
        Self {
            lower: origin,
            upper: origin,
        }
    }

    pub fn lower(&self) -> GridPoint {
        self.lower
    }

    /// Exclusive upper bound.
    pub fn upper(&self) -> GridPoint {
        self.upper
    }

    pub fn size(&self) -> GridVector {
        self.upper - self.lower
    }

    /// Side length cap used when generating arbitrary boxes for fuzzing;
    /// keeps fuzz-generated shapes within a size an octree/chunk map can
    /// actually allocate for in a single test run.
    #[cfg(feature = "fuzzing")]
    const ARBITRARY_MAX_SIZE: GridCoordinate = 64;

    pub fn is_empty(&self) -> bool {
        self.lower.x >= self.upper.x || self.lower.y >= self.upper.y || self.lower.z >= self.upper.z
    }

    pub fn volume(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            let s = self.size();
            (s.x as usize) * (s.y as usize) * (s.z as usize)
        }
    }

    pub fn contains_cube(&self, cube: GridPoint) -> bool {
        cube.x >= self.lower.x
            && cube.y >= self.lower.y
            && cube.z >= self.lower.z
            && cube.x < self.upper.x
            && cube.y < self.upper.y
            && cube.z < self.upper.z
    }

    /// Smallest box containing both `self` and a single cube. If `self` is
    /// empty, the result is the 1×1×1 box at `cube`.
    pub fn including(&self, cube: GridPoint) -> GridAab {
        if self.is_empty() {
            return GridAab::new(cube, GridVector::new(1, 1, 1));
        }
        GridAab::from_bounds(
            GridPoint::new(
                self.lower.x.min(cube.x),
                self.lower.y.min(cube.y),
                self.lower.z.min(cube.z),
            ),
            GridPoint::new(
                self.upper.x.max(cube.x + 1),
                self.upper.y.max(cube.y + 1),
                self.upper.z.max(cube.z + 1),
            ),
        )
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &GridAab) -> GridAab {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        GridAab::from_bounds(
            GridPoint::new(
                self.lower.x.min(other.lower.x),
                self.lower.y.min(other.lower.y),
                self.lower.z.min(other.lower.z),
            ),
            GridPoint::new(
                self.upper.x.max(other.upper.x),
                self.upper.y.max(other.upper.y),
                self.upper.z.max(other.upper.z),
            ),
        )
    }

    /// Shifts the box by `offset`, used to rebase stored bounds when a
    /// resizable shape's coordinate offset changes (`spec.md` §4.7).
    pub fn translated(&self, offset: GridVector) -> GridAab {
        GridAab::from_bounds(self.lower + offset, self.upper + offset)
    }

    /// Expand the box by `margin` cells on every face.
    pub fn expanded(&self, margin: GridCoordinate) -> GridAab {
        if self.is_empty() {
            return *self;
        }
        let m = GridVector::new(margin, margin, margin);
        GridAab::from_bounds(self.lower - m, self.upper + m)
    }

    pub fn intersects(&self, other: &GridAab) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.lower.x < other.upper.x
            && self.upper.x > other.lower.x
            && self.lower.y < other.upper.y
            && self.upper.y > other.lower.y
            && self.lower.z < other.upper.z
            && self.upper.z > other.lower.z
    }

    /// Iterates over every cube contained in the box, in Z-major,
    /// Y-middle, X-minor order (matching the teacher's `interior_iter`
    /// convention).
    pub fn interior_iter(&self) -> impl Iterator<Item = GridPoint> + '_ {
        let (lx, ux) = (self.lower.x, self.upper.x);
        let (ly, uy) = (self.lower.y, self.upper.y);
        let (lz, uz) = (self.lower.z, self.upper.z);
        (lz..uz).flat_map(move |z| {
            (ly..uy).flat_map(move |y| (lx..ux).map(move |x| GridPoint::new(x, y, z)))
        })
    }
}

/// Generates boxes with a bounded, nonzero size so fuzz targets exercise
/// chunk/octree allocation instead of spending all their budget on
/// degenerate empty boxes.
#[cfg(feature = "fuzzing")]
impl<'a> arbitrary::Arbitrary<'a> for GridAab {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let lower = GridPoint::new(
            i16::arbitrary(u)? as GridCoordinate,
            i16::arbitrary(u)? as GridCoordinate,
            i16::arbitrary(u)? as GridCoordinate,
        );
        let size_component = |u: &mut arbitrary::Unstructured<'a>| -> arbitrary::Result<GridCoordinate> {
            Ok(1 + (u8::arbitrary(u)? as GridCoordinate) % Self::ARBITRARY_MAX_SIZE)
        };
        let size = GridVector::new(size_component(u)?, size_component(u)?, size_component(u)?);
        Ok(GridAab::new(lower, size))
    }
}
