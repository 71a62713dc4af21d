// Copyright voxel-core contributors, MIT License.

//! A single chunk: one [`Octree`] of palette-indexed blocks, an optional
//! per-voxel light grid, links to its 26 face/edge/corner-adjacent neighbor
//! chunks, and the buffer regions holding its baked geometry (`spec.md` §2,
//! §4.2).

use crate::chunking::{ChunkPos, CHUNK_SIZE};
use crate::lighting::Light;
use crate::math::{GridAab, GridPoint, GridVector, Neighbor26};
use crate::octree::Octree;
use crate::palette::{PaletteEntry, AIR_BLOCK_INDEX};
use crate::vbuffer::BufferRegion;

/// `CHUNK_SIZE` is a power of two already, so the octree covering one
/// chunk needs no rounding.
const CHUNK_OCTREE_EXTENT: crate::math::GridCoordinate = CHUNK_SIZE;

const LIGHT_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// The four buffer regions a chunk's mesh occupies: opaque and
/// transparent geometry, each as a vertex run and an index run
/// (`spec.md` §3/§6).
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkBufferRegions {
    pub opaque_vertices: Option<BufferRegion>,
    pub opaque_indices: Option<BufferRegion>,
    pub transparent_vertices: Option<BufferRegion>,
    pub transparent_indices: Option<BufferRegion>,
}

/// One `CHUNK_SIZE`-cubed region of a [`crate::shape::Shape`]'s block
/// grid.
pub struct Chunk {
    pos: ChunkPos,
    blocks: Octree<PaletteEntry>,
    light: Option<Box<[Light; LIGHT_VOLUME]>>,
    /// The 26 face/edge/corner-adjacent neighbor chunks' positions, indexed
    /// by [`Neighbor26::index`], always present conceptually; whether they
    /// exist in the shape's chunk map is a question for the shape, not the
    /// chunk.
    neighbors: [Option<ChunkPos>; 26],
    regions: ChunkBufferRegions,
    /// Set whenever a block changes and cleared once the mesher has
    /// rebuilt this chunk's geometry.
    dirty: bool,
    block_count: u32,
}

impl Chunk {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            blocks: Octree::new(GridPoint::new(0, 0, 0), CHUNK_OCTREE_EXTENT, AIR_BLOCK_INDEX)
                .expect("CHUNK_SIZE must be a valid octree extent"),
            light: None,
            neighbors: [None; 26],
            regions: ChunkBufferRegions::default(),
            dirty: true,
            block_count: 0,
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn bounds(&self) -> GridAab {
        self.pos.bounds()
    }

    /// Reads the palette entry at a position local to this chunk,
    /// `[0, CHUNK_SIZE)` on each axis.
    pub fn get_local(&self, local: GridPoint) -> PaletteEntry {
        self.blocks.get(local)
    }

    /// Writes the palette entry at a local position, returning whether it
    /// changed, and updating the occupied-block count and dirty flag.
    pub fn set_local(&mut self, local: GridPoint, entry: PaletteEntry) -> bool {
        let previous = self.blocks.get(local);
        if previous == entry {
            return false;
        }
        self.blocks.set(local, entry);
        match (previous == AIR_BLOCK_INDEX, entry == AIR_BLOCK_INDEX) {
            (true, false) => self.block_count += 1,
            (false, true) => self.block_count -= 1,
            _ => {}
        }
        self.dirty = true;
        true
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn neighbor(&self, dir: Neighbor26) -> Option<ChunkPos> {
        self.neighbors[dir.index() as usize]
    }

    pub fn set_neighbor(&mut self, dir: Neighbor26, neighbor: Option<ChunkPos>) {
        self.neighbors[dir.index() as usize] = neighbor;
    }

    pub fn regions(&self) -> &ChunkBufferRegions {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut ChunkBufferRegions {
        &mut self.regions
    }

    pub fn has_light_grid(&self) -> bool {
        self.light.is_some()
    }

    /// Lazily allocates the per-voxel light grid the first time lighting
    /// touches this chunk; shapes with lighting disabled never call this.
    fn light_mut(&mut self) -> &mut [Light; LIGHT_VOLUME] {
        self.light.get_or_insert_with(|| Box::new([Light::DARK; LIGHT_VOLUME]))
    }

    fn light_index(local: GridPoint) -> usize {
        debug_assert!((0..CHUNK_SIZE).contains(&local.x));
        debug_assert!((0..CHUNK_SIZE).contains(&local.y));
        debug_assert!((0..CHUNK_SIZE).contains(&local.z));
        let s = CHUNK_SIZE as usize;
        local.x as usize + (local.y as usize) * s + (local.z as usize) * s * s
    }

    pub fn light_local(&self, local: GridPoint) -> Light {
        match &self.light {
            Some(grid) => grid[Self::light_index(local)],
            None => Light::DARK,
        }
    }

    pub fn set_light_local(&mut self, local: GridPoint, light: Light) {
        let index = Self::light_index(local);
        self.light_mut()[index] = light;
    }

    /// Block-coordinate bounds of this chunk, for octree visits and
    /// bounding-box math that operate in shape coordinates instead of
    /// chunk-local ones.
    pub fn local_bounds(&self) -> GridAab {
        GridAab::new(GridPoint::new(0, 0, 0), GridVector::new(CHUNK_SIZE, CHUNK_SIZE, CHUNK_SIZE))
    }

    /// Every cell in this chunk holding a non-air block or non-dark light,
    /// as `(chunk-local position, palette entry, light)` — used to move a
    /// chunk's contents wholesale (`crate::shape::Shape`'s offset rebase)
    /// without reaching into the octree's internal node structure.
    pub fn non_default_cells(&self) -> impl Iterator<Item = (GridPoint, PaletteEntry, Light)> + '_ {
        self.local_bounds().interior_iter().filter_map(move |local| {
            let entry = self.get_local(local);
            let light = self.light_local(local);
            if entry != AIR_BLOCK_INDEX || light != Light::DARK {
                Some((local, entry, light))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_empty_and_dirty() {
        let c = Chunk::new(ChunkPos::new(0, 0, 0));
        assert!(c.is_empty());
        assert!(c.is_dirty());
        assert_eq!(c.get_local(GridPoint::new(0, 0, 0)), AIR_BLOCK_INDEX);
    }

    #[test]
    fn set_local_tracks_block_count() {
        let mut c = Chunk::new(ChunkPos::new(0, 0, 0));
        c.clear_dirty();
        assert!(c.set_local(GridPoint::new(1, 1, 1), 5));
        assert_eq!(c.block_count(), 1);
        assert!(c.is_dirty());
        c.clear_dirty();
        assert!(!c.set_local(GridPoint::new(1, 1, 1), 5), "no-op on unchanged value");
        assert!(!c.is_dirty());
        assert!(c.set_local(GridPoint::new(1, 1, 1), AIR_BLOCK_INDEX));
        assert_eq!(c.block_count(), 0);
    }

    #[test]
    fn light_grid_allocates_lazily() {
        let mut c = Chunk::new(ChunkPos::new(0, 0, 0));
        assert!(!c.has_light_grid());
        assert_eq!(c.light_local(GridPoint::new(2, 2, 2)), Light::DARK);
        assert!(!c.has_light_grid(), "a pure read must not allocate");
        c.set_light_local(GridPoint::new(2, 2, 2), Light { sun: 15, r: 0, g: 0, b: 0 });
        assert!(c.has_light_grid());
        assert_eq!(c.light_local(GridPoint::new(2, 2, 2)).sun, 15);
    }

    #[test]
    fn neighbor_links_round_trip_through_packed_direction_index() {
        let mut c = Chunk::new(ChunkPos::new(0, 0, 0));
        let py: crate::math::Neighbor26 = crate::math::Face6::PY.into();
        c.set_neighbor(py, Some(ChunkPos::new(0, 1, 0)));
        assert_eq!(c.neighbor(py), Some(ChunkPos::new(0, 1, 0)));
        assert_eq!(c.neighbor(py.opposite()), None);
    }

    #[test]
    fn non_default_cells_reports_only_occupied_or_lit_positions() {
        let mut c = Chunk::new(ChunkPos::new(0, 0, 0));
        c.clear_dirty();
        c.set_local(GridPoint::new(1, 2, 3), 7);
        c.set_light_local(GridPoint::new(4, 5, 6), Light { sun: 3, r: 0, g: 0, b: 0 });
        let cells: Vec<_> = c.non_default_cells().collect();
        assert_eq!(cells.len(), 2);
        assert!(cells.contains(&(GridPoint::new(1, 2, 3), 7, Light::DARK)));
        assert!(cells.contains(&(GridPoint::new(4, 5, 6), AIR_BLOCK_INDEX, Light { sun: 3, r: 0, g: 0, b: 0 })));
    }

    #[test]
    fn all_26_neighbor_slots_are_independently_addressable() {
        let mut c = Chunk::new(ChunkPos::new(0, 0, 0));
        for dir in crate::math::Neighbor26::ALL {
            c.set_neighbor(dir, Some(ChunkPos(ChunkPos::new(0, 0, 0).0 + dir.step())));
        }
        for dir in crate::math::Neighbor26::ALL {
            assert_eq!(c.neighbor(dir), Some(ChunkPos(ChunkPos::new(0, 0, 0).0 + dir.step())));
        }
    }
}
