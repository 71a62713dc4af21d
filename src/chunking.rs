// Copyright voxel-core contributors, MIT License.

//! Coordinate math for partitioning a shape's block grid into fixed-size
//! chunks, each owning one octree (`spec.md` §2, §4.2).
//!
//! Grounded on `all-is-cubes`'s `chunking.rs` (`ChunkPos`/`cube_to_chunk`
//! pattern), trimmed of its view-distance/`ChunkChart` machinery, which has
//! no counterpart in this crate — there is no renderer here to decide how
//! far to stream chunks.

use cgmath::Vector3;

use crate::math::{GridAab, GridCoordinate, GridPoint, GridVector};

/// Chunks are cubes of this many blocks on a side.
pub const CHUNK_SIZE: GridCoordinate = 16;

/// A chunk's position, in chunk-grid coordinates (one unit per
/// [`CHUNK_SIZE`] blocks), not block coordinates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ChunkPos(pub GridPoint);

impl ChunkPos {
    pub fn new(x: GridCoordinate, y: GridCoordinate, z: GridCoordinate) -> Self {
        Self(GridPoint::new(x, y, z))
    }

    /// The chunk's origin in block coordinates.
    pub fn block_origin(self) -> GridPoint {
        self.0 * CHUNK_SIZE
    }

    /// The chunk's block-coordinate bounding box (half-open,
    /// `CHUNK_SIZE` on each side).
    pub fn bounds(self) -> GridAab {
        GridAab::new(self.block_origin(), GridVector::new(CHUNK_SIZE, CHUNK_SIZE, CHUNK_SIZE))
    }

    /// The 6 face-adjacent neighboring chunk positions, in the packed
    /// [`crate::math::Face6`] order.
    pub fn adjacent(self) -> [ChunkPos; 6] {
        use crate::math::Face6;
        let mut out = [self; 6];
        for face in Face6::ALL {
            out[face.packed_index() as usize] = ChunkPos(self.0 + face.normal_vector());
        }
        out
    }

    /// All 26 face/edge/corner-adjacent neighboring chunk positions, in
    /// [`crate::math::Neighbor26::ALL`] order.
    pub fn adjacent26(self) -> [ChunkPos; 26] {
        use crate::math::Neighbor26;
        let mut out = [self; 26];
        for (i, dir) in Neighbor26::ALL.iter().enumerate() {
            out[i] = ChunkPos(self.0 + dir.step());
        }
        out
    }
}

/// Converts a block coordinate to the chunk position containing it.
/// [`CHUNK_SIZE`] is a power of two, so this is an arithmetic shift rather
/// than a division, which matters because block coordinates are signed and
/// truncating division rounds toward zero instead of flooring.
pub fn cube_to_chunk(cube: GridPoint) -> ChunkPos {
    ChunkPos(GridPoint::new(
        cube.x.div_euclid(CHUNK_SIZE),
        cube.y.div_euclid(CHUNK_SIZE),
        cube.z.div_euclid(CHUNK_SIZE),
    ))
}

/// The block's position local to its containing chunk, in `[0, CHUNK_SIZE)`
/// on each axis.
pub fn cube_to_chunk_local(cube: GridPoint) -> GridPoint {
    GridPoint::new(
        cube.x.rem_euclid(CHUNK_SIZE),
        cube.y.rem_euclid(CHUNK_SIZE),
        cube.z.rem_euclid(CHUNK_SIZE),
    )
}

/// Every chunk position overlapping `bounds`, in Z-major, Y-middle,
/// X-minor order.
pub fn chunks_overlapping(bounds: GridAab) -> impl Iterator<Item = ChunkPos> {
    let lower_chunk = cube_to_chunk(bounds.lower());
    let inclusive_upper = bounds.upper() - Vector3::new(1, 1, 1);
    let upper_chunk = cube_to_chunk(inclusive_upper);
    GridAab::from_bounds(lower_chunk.0, upper_chunk.0 + Vector3::new(1, 1, 1))
        .interior_iter()
        .map(ChunkPos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_to_chunk_handles_negative_coordinates() {
        assert_eq!(cube_to_chunk(GridPoint::new(-1, 0, 0)), ChunkPos::new(-1, 0, 0));
        assert_eq!(cube_to_chunk(GridPoint::new(-16, 0, 0)), ChunkPos::new(-1, 0, 0));
        assert_eq!(cube_to_chunk(GridPoint::new(-17, 0, 0)), ChunkPos::new(-2, 0, 0));
        assert_eq!(cube_to_chunk(GridPoint::new(15, 0, 0)), ChunkPos::new(0, 0, 0));
        assert_eq!(cube_to_chunk(GridPoint::new(16, 0, 0)), ChunkPos::new(1, 0, 0));
    }

    #[test]
    fn cube_to_chunk_local_stays_in_range() {
        let local = cube_to_chunk_local(GridPoint::new(-1, 33, 5));
        assert_eq!(local, GridPoint::new(15, 1, 5));
    }

    #[test]
    fn chunks_overlapping_covers_block_bounds() {
        let bounds = GridAab::new(GridPoint::new(-1, 0, 0), GridVector::new(18, 1, 1));
        let chunks: Vec<_> = chunks_overlapping(bounds).collect();
        assert_eq!(chunks, vec![ChunkPos::new(-1, 0, 0), ChunkPos::new(0, 0, 0), ChunkPos::new(1, 0, 0)]);
    }

    #[test]
    fn adjacent_uses_packed_face_order() {
        let c = ChunkPos::new(0, 0, 0);
        let adj = c.adjacent();
        assert_eq!(adj[0], ChunkPos::new(1, 0, 0)); // PX
        assert_eq!(adj[1], ChunkPos::new(-1, 0, 0)); // NX
        assert_eq!(adj[4], ChunkPos::new(0, 1, 0)); // PY
        assert_eq!(adj[5], ChunkPos::new(0, -1, 0)); // NY
    }

    #[test]
    fn adjacent26_covers_every_cube_in_the_3x3x3_minus_center() {
        let c = ChunkPos::new(0, 0, 0);
        let adj = c.adjacent26();
        assert_eq!(adj.len(), 26);
        let corner = ChunkPos::new(1, 1, 1);
        assert!(adj.contains(&corner));
        assert!(!adj.contains(&c));
    }
}
