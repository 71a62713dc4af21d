// Copyright voxel-core contributors, MIT License.

//! [`Shape`]: the top-level voxel object — a palette-indexed block grid
//! partitioned into chunks, each owning an octree, plus the baked
//! lighting grid, pending edit transaction, undo history, and named
//! points of interest that hang off it (`spec.md` §1/§2/§4).
//!
//! Grounded on `all-is-cubes`'s `Space` (the chunk map, palette-as-block-
//! set, and `Grid`/bounding-box bookkeeping) generalized from its
//! block-definition palette to this crate's flat color palette, and
//! narrowed to the block-grid/transform/POI surface this spec actually
//! needs — no behaviors, no light-update-queue tick budget (lighting here
//! is synchronous and incremental per edit, not amortized across frames).

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::atlas::ColorAtlas;
use crate::chunk::Chunk;
use crate::chunking::{cube_to_chunk, cube_to_chunk_local, ChunkPos};
use crate::history::History;
use crate::lighting::{Light, LightField, LightingOptions, VoxelOpacity};
use crate::math::{Face6, FreeCoordinate, GridAab, GridPoint, GridVector, Neighbor26, Rgb, Rgba};
use crate::mesh::MesherInput;
use crate::palette::{Palette, PaletteEntry, AIR_BLOCK_INDEX};
use crate::transaction::Transaction;

static NEXT_TRANSFORM_ID: Lazy<Mutex<u64>> = Lazy::new(|| Mutex::new(1));
static NEXT_SHAPE_ID: Lazy<Mutex<u64>> = Lazy::new(|| Mutex::new(1));

fn next_id(counter: &Lazy<Mutex<u64>>) -> u64 {
    let mut guard = counter.lock().unwrap();
    let id = *guard;
    *guard += 1;
    id
}

/// An opaque, refcounted handle to a transform (the shape's root
/// transform, or its pivot). Transforms themselves — the actual
/// translation/rotation/scale a renderer or physics layer applies — are
/// out of scope here; this crate only hands out stable identities for
/// external code to attach that state to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TransformHandle(u64);

/// A named point of interest: a single cube position tagged with a
/// caller-chosen name (an attachment point, a snap target, ...).
pub type PoiName = String;

/// Errors from [`Shape`] edits and queries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ShapeError {
    #[error("transform handle is not owned by this shape")]
    UnknownTransform,
    #[error("point of interest {0:?} is not defined")]
    UnknownPoi(&'static str),
}

/// The top-level voxel object: a chunked, palette-indexed block grid
/// with optional baked lighting, a pending transaction, and an optional
/// undo history.
pub struct Shape {
    id: u64,
    palette: Palette,
    atlas: ColorAtlas,
    /// Keyed by internal (offset-adjusted) chunk position.
    chunks: HashMap<ChunkPos, Chunk>,
    lighting: Option<LightingOptions>,
    /// Internal (offset-adjusted) bounding box of occupied blocks.
    model_bounds: GridAab,
    root_transform: TransformHandle,
    pivot: Option<TransformHandle>,
    transform_refcounts: HashMap<u64, u32>,
    /// Internal (offset-adjusted) positions.
    pois: HashMap<String, GridPoint>,
    /// Staged edits, in user (shape-space) coordinates.
    pending: Transaction,
    history: Option<History>,
    /// `internal = user + offset` (`spec.md` §4.7). Zero until a resizable
    /// shape's edit forces it to grow, or permanently zero for a
    /// fixed-size shape.
    offset: GridVector,
    /// `Some(extent)` for a fixed-size shape with a hard allocated extent
    /// at internal-space origin `(0, 0, 0)`; `None` for a resizable shape
    /// that grows (and shifts `offset`) to accommodate out-of-range edits.
    fixed_extent: Option<GridVector>,
}

impl Shape {
    /// Creates an empty, resizable shape. `shared_palette` controls
    /// whether this shape's colors release their atlas slot immediately
    /// on reaching zero references, or retain it for likely reuse
    /// (`spec.md` §4.1).
    pub fn new(shared_palette: bool) -> Self {
        let id = next_id(&NEXT_SHAPE_ID);
        let mut transform_refcounts = HashMap::new();
        let root_id = next_id(&NEXT_TRANSFORM_ID);
        transform_refcounts.insert(root_id, 1);
        Self {
            id,
            palette: Palette::new(shared_palette),
            atlas: ColorAtlas::new(),
            chunks: HashMap::new(),
            lighting: None,
            model_bounds: GridAab::empty_at(GridPoint::new(0, 0, 0)),
            root_transform: TransformHandle(root_id),
            pivot: None,
            transform_refcounts,
            pois: HashMap::new(),
            pending: Transaction::new(),
            history: Some(History::new()),
            offset: GridVector::new(0, 0, 0),
            fixed_extent: None,
        }
    }

    /// Creates an empty, fixed-size shape with origin `(0, 0, 0)` and the
    /// given allocated extent. Edits outside `[0, extent)` are dropped
    /// with a warning rather than growing the shape (`spec.md` §3/§4.7).
    pub fn new_fixed(shared_palette: bool, extent: GridVector) -> Self {
        let mut shape = Self::new(shared_palette);
        shape.fixed_extent = Some(extent);
        shape
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this shape grows (shifting [`Self::offset`]) to accommodate
    /// out-of-range edits, as opposed to a fixed-size shape with a hard
    /// allocated extent.
    pub fn is_resizable(&self) -> bool {
        self.fixed_extent.is_none()
    }

    /// The current `internal = user + offset` translation (`spec.md`
    /// §4.7). Always `(0, 0, 0)` for a fixed-size shape.
    pub fn offset(&self) -> GridVector {
        self.offset
    }

    fn to_internal(&self, cube: GridPoint) -> GridPoint {
        cube + self.offset
    }

    fn to_user(&self, cube: GridPoint) -> GridPoint {
        cube - self.offset
    }

    /// Enables baked lighting with the given propagation options. Has no
    /// effect on chunks' already-allocated light grids; lighting stays
    /// dark until edits (or an explicit full rebake, left to the caller)
    /// seed it.
    pub fn enable_lighting(&mut self, options: LightingOptions) {
        self.lighting = Some(options);
    }

    pub fn disable_lighting(&mut self) {
        self.lighting = None;
    }

    pub fn lighting_enabled(&self) -> bool {
        self.lighting.is_some()
    }

    pub fn lighting_options(&self) -> Option<LightingOptions> {
        self.lighting
    }

    // --- Transforms -----------------------------------------------------

    pub fn root_transform(&self) -> TransformHandle {
        self.root_transform
    }

    pub fn pivot(&self) -> Option<TransformHandle> {
        self.pivot
    }

    /// Allocates a fresh transform handle with one reference, for use as
    /// this shape's pivot or for external bookkeeping.
    pub fn create_transform(&mut self) -> TransformHandle {
        let id = next_id(&NEXT_TRANSFORM_ID);
        self.transform_refcounts.insert(id, 1);
        TransformHandle(id)
    }

    pub fn retain_transform(&mut self, handle: TransformHandle) -> Result<(), ShapeError> {
        *self
            .transform_refcounts
            .get_mut(&handle.0)
            .ok_or(ShapeError::UnknownTransform)? += 1;
        Ok(())
    }

    /// Drops one reference to `handle`, forgetting it once unreferenced.
    /// A no-op error if the handle isn't this shape's.
    pub fn release_transform(&mut self, handle: TransformHandle) -> Result<(), ShapeError> {
        let count = self
            .transform_refcounts
            .get_mut(&handle.0)
            .ok_or(ShapeError::UnknownTransform)?;
        *count -= 1;
        if *count == 0 {
            self.transform_refcounts.remove(&handle.0);
        }
        Ok(())
    }

    pub fn set_pivot(&mut self, handle: Option<TransformHandle>) -> Result<(), ShapeError> {
        if let Some(h) = handle {
            if !self.transform_refcounts.contains_key(&h.0) {
                return Err(ShapeError::UnknownTransform);
            }
        }
        self.pivot = handle;
        Ok(())
    }

    // --- Points of interest ----------------------------------------------

    pub fn set_poi(&mut self, name: impl Into<String>, cube: GridPoint) {
        self.pois.insert(name.into(), self.to_internal(cube));
    }

    pub fn remove_poi(&mut self, name: &str) -> Option<GridPoint> {
        let cube = self.pois.remove(name)?;
        Some(self.to_user(cube))
    }

    pub fn poi(&self, name: &str) -> Option<GridPoint> {
        self.pois.get(name).map(|&cube| self.to_user(cube))
    }

    /// Looks up a point of interest by a statically-known name, erroring
    /// instead of returning `None` when it isn't defined — for callers
    /// (e.g. attachment-point resolution) where a missing POI is a bug,
    /// not an expected outcome.
    pub fn poi_checked(&self, name: &'static str) -> Result<GridPoint, ShapeError> {
        self.pois
            .get(name)
            .map(|&cube| self.to_user(cube))
            .ok_or(ShapeError::UnknownPoi(name))
    }

    pub fn poi_names(&self) -> impl Iterator<Item = &str> {
        self.pois.keys().map(String::as_str)
    }

    // --- Block grid queries ------------------------------------------------

    /// Reads the block at internal (already offset-adjusted) coordinates,
    /// with no user-space translation. Used by code that already works in
    /// internal space: the mesher, the lighting field, and bounding-box
    /// maintenance.
    fn block_at_internal(&self, cube: GridPoint) -> PaletteEntry {
        let chunk_pos = cube_to_chunk(cube);
        match self.chunks.get(&chunk_pos) {
            Some(chunk) => chunk.get_local(cube_to_chunk_local(cube)),
            None => AIR_BLOCK_INDEX,
        }
    }

    pub fn block_at(&self, cube: GridPoint) -> PaletteEntry {
        self.block_at_internal(self.to_internal(cube))
    }

    fn color_at_internal(&self, cube: GridPoint) -> Rgba {
        self.palette.color(self.block_at_internal(cube)).unwrap_or(Rgba::transparent())
    }

    pub fn color_at(&self, cube: GridPoint) -> Rgba {
        self.palette.color(self.block_at(cube)).unwrap_or(Rgba::transparent())
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn atlas(&self) -> &ColorAtlas {
        &self.atlas
    }

    /// Ensures `color` has a palette entry and sets its emissive flag,
    /// returning the entry. Emissiveness is a property of a color, not of
    /// any one placed block, so this is independent of [`Self::stage_set`]
    /// — mark a color emissive before or after placing blocks of it.
    pub fn set_color_emissive(&mut self, color: Rgba, emissive: bool) -> PaletteEntry {
        let (entry, _new) = self.palette.check_and_add(color);
        let _ = self.palette.set_emissive(entry, emissive);
        entry
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn chunk_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// The tight bounding box of every currently-occupied (non-air)
    /// block, in user (shape-space) coordinates. Empty if the shape has
    /// no blocks.
    pub fn bounding_box(&self) -> GridAab {
        self.model_bounds.translated(-self.offset)
    }

    fn allocated_extent_internal(&self) -> GridAab {
        let mut bounds: Option<GridAab> = None;
        for pos in self.chunks.keys() {
            let b = pos.bounds();
            bounds = Some(match bounds {
                Some(acc) => acc.union(&b),
                None => b,
            });
        }
        bounds.unwrap_or_else(|| GridAab::empty_at(GridPoint::new(0, 0, 0)))
    }

    /// The coarse footprint of every chunk that has ever been allocated,
    /// at chunk granularity, in user (shape-space) coordinates —
    /// independent of whether individual blocks within those chunks are
    /// still occupied. Always contains [`Self::bounding_box`].
    pub fn allocated_extent(&self) -> GridAab {
        self.allocated_extent_internal().translated(-self.offset)
    }

    // --- Editing ------------------------------------------------------------

    /// Stages adding (or repainting) a block at `cube` with `color` into
    /// the pending transaction. Does not touch the block grid until
    /// [`Self::commit`].
    pub fn stage_set(&mut self, cube: GridPoint, color: Rgba) -> PaletteEntry {
        let (entry, _new) = self.palette.check_and_add(color);
        let before = self.block_at(cube);
        self.pending.stage(cube, before, entry);
        entry
    }

    /// Stages removing the block at `cube` (setting it to air).
    pub fn stage_remove(&mut self, cube: GridPoint) {
        let before = self.block_at(cube);
        self.pending.stage(cube, before, AIR_BLOCK_INDEX);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Discards all staged-but-uncommitted edits.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Applies every staged edit, updates the block grid, palette
    /// refcounts, baked lighting (if enabled), and model bounding box,
    /// and — if undo history is enabled — records the transaction.
    /// Returns `false` if there was nothing pending.
    pub fn commit(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let tx = std::mem::take(&mut self.pending);
        self.apply_transaction(&tx);
        if let Some(history) = &mut self.history {
            history.push(tx);
        }
        true
    }

    /// Convenience: stages and immediately commits a single block set.
    pub fn set_block(&mut self, cube: GridPoint, color: Rgba) {
        self.stage_set(cube, color);
        self.commit();
    }

    /// Convenience: stages and immediately commits a single block
    /// removal.
    pub fn remove_block(&mut self, cube: GridPoint) {
        self.stage_remove(cube);
        self.commit();
    }

    pub fn enable_history(&mut self) {
        self.history = Some(History::new());
    }

    pub fn disable_history(&mut self) {
        self.history = None;
    }

    pub fn can_undo(&self) -> bool {
        self.history.as_ref().is_some_and(History::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.history.as_ref().is_some_and(History::can_redo)
    }

    pub fn undo(&mut self) -> bool {
        let Some(history) = &mut self.history else {
            return false;
        };
        let Some(tx) = history.undo().cloned() else {
            return false;
        };
        self.apply_transaction(&tx.inverse());
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(history) = &mut self.history else {
            return false;
        };
        let Some(tx) = history.redo().cloned() else {
            return false;
        };
        self.apply_transaction(&tx);
        true
    }

    /// Translates `tx`'s user-space changes into internal (offset-adjusted)
    /// space, growing [`Self::offset`] first if a resizable shape's edit
    /// would otherwise land at a negative internal coordinate (`spec.md`
    /// §4.7: "An expansion that would push the model origin below (0,0,0)
    /// shifts the entire shape by an offset vector"). A fixed-size shape
    /// never grows; edits landing outside `fixed_extent` are dropped with
    /// a warning rather than applied.
    fn internal_changes(&mut self, tx: &Transaction) -> Vec<(GridPoint, PaletteEntry, PaletteEntry)> {
        if self.fixed_extent.is_none() {
            let mut growth = GridVector::new(0, 0, 0);
            for change in tx.iter() {
                let internal = self.to_internal(change.cube());
                growth.x = growth.x.max((-internal.x).max(0));
                growth.y = growth.y.max((-internal.y).max(0));
                growth.z = growth.z.max((-internal.z).max(0));
            }
            if growth != GridVector::new(0, 0, 0) {
                self.rebase(growth);
            }
        }

        let mut out = Vec::with_capacity(tx.len());
        for change in tx.iter() {
            let internal = self.to_internal(change.cube());
            if let Some(extent) = self.fixed_extent {
                let in_bounds = internal.x >= 0
                    && internal.y >= 0
                    && internal.z >= 0
                    && internal.x < extent.x
                    && internal.y < extent.y
                    && internal.z < extent.z;
                if !in_bounds {
                    log::warn!(
                        "edit at {:?} is outside this shape's fixed extent {:?}; dropping",
                        change.cube(),
                        extent
                    );
                    continue;
                }
            }
            out.push((internal, change.before, change.after));
        }
        out
    }

    /// Shifts every stored internal-space coordinate — chunk contents,
    /// lighting, model bounds, and points of interest — by `delta`, and
    /// grows [`Self::offset`] by the same amount. `delta` need not be
    /// chunk-aligned, so chunks are rebuilt from each chunk's
    /// [`Chunk::non_default_cells`] rather than re-keyed in place.
    fn rebase(&mut self, delta: GridVector) {
        let old_chunks = std::mem::take(&mut self.chunks);
        for (pos, chunk) in old_chunks {
            let chunk_origin = pos.block_origin();
            for (local, entry, light) in chunk.non_default_cells() {
                let new_cube = GridPoint::new(
                    chunk_origin.x + local.x + delta.x,
                    chunk_origin.y + local.y + delta.y,
                    chunk_origin.z + local.z + delta.z,
                );
                let new_pos = cube_to_chunk(new_cube);
                let new_local = cube_to_chunk_local(new_cube);
                let dest = self.get_or_create_chunk(new_pos);
                if entry != AIR_BLOCK_INDEX {
                    dest.set_local(new_local, entry);
                }
                if light != Light::DARK {
                    dest.set_light_local(new_local, light);
                }
            }
        }

        self.model_bounds = self.model_bounds.translated(delta);
        for cube in self.pois.values_mut() {
            *cube = GridPoint::new(cube.x + delta.x, cube.y + delta.y, cube.z + delta.z);
        }
        self.offset = self.offset + delta;
    }

    /// Applies every entry of `tx` to the block grid, palette refcounts,
    /// baked lighting, and bounding box. Used for normal commits, undo
    /// (with `tx.inverse()`), and redo (with `tx` again).
    fn apply_transaction(&mut self, tx: &Transaction) {
        let changes = self.internal_changes(tx);

        let mut added_light_sources: Vec<(GridPoint, Rgb)> = Vec::new();
        let mut removed_light_sources: Vec<GridPoint> = Vec::new();

        for &(cube, before, after) in &changes {
            if after != AIR_BLOCK_INDEX {
                // `increment`/`decrement` only fail on an unallocated
                // entry, which `check_and_add` never hands back.
                let _ = self.palette.increment(&mut self.atlas, after);
            }
            let was_emissive = before != AIR_BLOCK_INDEX && self.palette.is_emissive(before);
            if was_emissive {
                removed_light_sources.push(cube);
            }
            self.apply_one(cube, after);
            if after != AIR_BLOCK_INDEX && self.palette.is_emissive(after) {
                if let Some(color) = self.palette.color(after) {
                    added_light_sources.push((cube, color.rgb()));
                }
            }
        }

        self.recompute_model_bounds(&changes);

        if let Some(options) = self.lighting {
            let propagator = crate::lighting::LightPropagator::new(options);
            for cube in removed_light_sources {
                propagator.remove_and_refill(self, cube, crate::lighting::Channel::R.bit() | crate::lighting::Channel::G.bit() | crate::lighting::Channel::B.bit());
            }
            for (cube, color) in added_light_sources {
                propagator.propagate_emission(self, cube, color);
            }
            for &(cube, before, after) in &changes {
                let became_opaque = after != AIR_BLOCK_INDEX && self.palette.color(after).is_some_and(Rgba::is_opaque);
                let was_opaque = before != AIR_BLOCK_INDEX && self.palette.color(before).is_some_and(Rgba::is_opaque);
                if became_opaque && !was_opaque {
                    propagator.remove_and_refill(self, cube, crate::lighting::Channel::Sun.bit());
                } else if was_opaque && !became_opaque {
                    let column = GridPoint::new(cube.x, self.model_bounds.upper().y.max(cube.y + 1) - 1, cube.z);
                    propagator.propagate_sunlight(self, [column]);
                }
            }
        }
    }

    /// Creates the chunk at `pos` if it doesn't already exist, linking it
    /// to every already-present neighbor among its 26 face/edge/corner
    /// directions (`spec.md` §2/§3) on both sides. A no-op if the chunk
    /// already exists.
    fn create_chunk(&mut self, pos: ChunkPos) {
        if self.chunks.contains_key(&pos) {
            return;
        }
        self.chunks.insert(pos, Chunk::new(pos));
        for dir in Neighbor26::ALL {
            let neighbor_pos = ChunkPos(pos.0 + dir.step());
            if !self.chunks.contains_key(&neighbor_pos) {
                continue;
            }
            if let Some(chunk) = self.chunks.get_mut(&pos) {
                chunk.set_neighbor(dir, Some(neighbor_pos));
            }
            if let Some(neighbor) = self.chunks.get_mut(&neighbor_pos) {
                neighbor.set_neighbor(dir.opposite(), Some(pos));
            }
        }
    }

    fn get_or_create_chunk(&mut self, pos: ChunkPos) -> &mut Chunk {
        self.create_chunk(pos);
        self.chunks.get_mut(&pos).expect("just created above")
    }

    /// Writes a single entry at internal (already offset-adjusted, and —
    /// for a fixed-size shape — already bounds-checked) coordinates.
    fn apply_one(&mut self, cube: GridPoint, new_entry: PaletteEntry) {
        let chunk_pos = cube_to_chunk(cube);
        let local = cube_to_chunk_local(cube);
        let chunk = self.get_or_create_chunk(chunk_pos);
        let old_entry = chunk.get_local(local);
        if old_entry == new_entry {
            return;
        }
        chunk.set_local(local, new_entry);
        if old_entry != AIR_BLOCK_INDEX {
            let _ = self.palette.decrement(&mut self.atlas, old_entry);
        }
    }

    fn recompute_model_bounds(&mut self, changes: &[(GridPoint, PaletteEntry, PaletteEntry)]) {
        let mut any_removed = false;
        for &(cube, _before, after) in changes {
            if after != AIR_BLOCK_INDEX {
                self.model_bounds = self.model_bounds.including(cube);
            }
            if after == AIR_BLOCK_INDEX {
                any_removed = true;
            }
        }
        if any_removed {
            self.shrink_model_bounds();
        }
    }

    /// Shrinks the cached bounding box face by face as long as the slab
    /// of cubes along that face is entirely air. Kept as a straightforward
    /// O(volume)-per-face scan rather than a tighter incremental scheme:
    /// shrink events are rare relative to edits, and the box this scans
    /// is already just the occupied region, not the whole shape.
    fn shrink_model_bounds(&mut self) {
        if self.model_bounds.is_empty() {
            return;
        }
        loop {
            let mut bounds = self.model_bounds;
            let mut changed = false;
            for face in Face6::ALL {
                if bounds.is_empty() {
                    break;
                }
                if self.face_slab_is_empty(bounds, face) {
                    bounds = shrink_face(bounds, face);
                    changed = true;
                }
            }
            self.model_bounds = bounds;
            if !changed {
                break;
            }
        }
    }

    fn face_slab_is_empty(&self, bounds: GridAab, face: Face6) -> bool {
        face_slab(bounds, face).interior_iter().all(|cube| self.block_at_internal(cube) == AIR_BLOCK_INDEX)
    }
}

fn face_slab(bounds: GridAab, face: Face6) -> GridAab {
    let lower = bounds.lower();
    let upper = bounds.upper();
    match face {
        Face6::PX => GridAab::from_bounds(GridPoint::new(upper.x - 1, lower.y, lower.z), upper),
        Face6::NX => GridAab::from_bounds(lower, GridPoint::new(lower.x + 1, upper.y, upper.z)),
        Face6::PY => GridAab::from_bounds(GridPoint::new(lower.x, upper.y - 1, lower.z), upper),
        Face6::NY => GridAab::from_bounds(lower, GridPoint::new(upper.x, lower.y + 1, upper.z)),
        Face6::PZ => GridAab::from_bounds(GridPoint::new(lower.x, lower.y, upper.z - 1), upper),
        Face6::NZ => GridAab::from_bounds(lower, GridPoint::new(upper.x, upper.y, lower.z + 1)),
    }
}

fn shrink_face(bounds: GridAab, face: Face6) -> GridAab {
    let mut lower = bounds.lower();
    let mut upper = bounds.upper();
    match face {
        Face6::PX => upper.x -= 1,
        Face6::NX => lower.x += 1,
        Face6::PY => upper.y -= 1,
        Face6::NY => lower.y += 1,
        Face6::PZ => upper.z -= 1,
        Face6::NZ => lower.z += 1,
    }
    if lower.x >= upper.x || lower.y >= upper.y || lower.z >= upper.z {
        GridAab::empty_at(lower)
    } else {
        GridAab::from_bounds(lower, upper)
    }
}

impl MesherInput for Shape {
    fn block_at(&self, cube: GridPoint) -> PaletteEntry {
        self.block_at_internal(cube)
    }

    fn color_of(&self, entry: PaletteEntry) -> Rgba {
        self.palette.color(entry).unwrap_or(Rgba::transparent())
    }

    fn light_at(&self, cube: GridPoint) -> Light {
        LightField::light_at(self, cube)
    }

    fn offset(&self) -> GridVector {
        self.offset
    }
}

impl LightField for Shape {
    fn bounds(&self) -> GridAab {
        self.allocated_extent_internal().expanded(1)
    }

    fn opacity_at(&self, cube: GridPoint) -> VoxelOpacity {
        let color = self.color_at_internal(cube);
        if color.is_invisible() {
            VoxelOpacity::Empty
        } else if color.is_opaque() {
            VoxelOpacity::Opaque
        } else {
            VoxelOpacity::Translucent(color.alpha())
        }
    }

    fn emission_at(&self, cube: GridPoint) -> Option<Rgb> {
        let entry = self.block_at_internal(cube);
        if entry == AIR_BLOCK_INDEX || !self.palette.is_emissive(entry) {
            return None;
        }
        self.palette.color(entry).map(Rgba::rgb)
    }

    fn light_at(&self, cube: GridPoint) -> Light {
        let chunk_pos = cube_to_chunk(cube);
        match self.chunks.get(&chunk_pos) {
            Some(chunk) => chunk.light_local(cube_to_chunk_local(cube)),
            None => Light::DARK,
        }
    }

    fn set_light_at(&mut self, cube: GridPoint, light: Light) {
        let chunk_pos = cube_to_chunk(cube);
        let chunk = self.get_or_create_chunk(chunk_pos);
        chunk.set_light_local(cube_to_chunk_local(cube), light);
    }
}

/// World-space (float) bounding box of the shape, for broad-phase
/// queries against an external spatial index (e.g. [`crate::rtree`]).
/// Model-space coordinates are taken at face value; applying the
/// shape's actual transform is the caller's responsibility, since
/// transforms are an opaque external concern here.
pub fn world_bounds(model_bounds: GridAab) -> crate::math::Aab {
    let lower = model_bounds.lower();
    let upper = model_bounds.upper();
    crate::math::Aab::new(
        cgmath::Point3::new(lower.x as FreeCoordinate, lower.y as FreeCoordinate, lower.z as FreeCoordinate),
        cgmath::Point3::new(upper.x as FreeCoordinate, upper.y as FreeCoordinate, upper.z as FreeCoordinate),
    )
}
