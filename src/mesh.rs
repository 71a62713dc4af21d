// Copyright voxel-core contributors, MIT License.

//! The chunk mesher: walks a chunk's blocks, emits one quad per visible
//! face with ambient occlusion and smoothed per-vertex lighting, and
//! writes the result into shared [`crate::vbuffer`] buffers (`spec.md`
//! §4.4/§6).

use std::collections::HashMap;

use crate::chunking::ChunkPos;
use crate::lighting::{Light, SunlightMode};
use crate::math::{Face6, GridPoint, GridVector, Rgba};
use crate::palette::PaletteEntry;
use crate::vbuffer::{Buffer, BufferRegion, Writer};

/// A single packed mesh vertex: model-space position (float x/y/z, already
/// adjusted for any shape resize offset — nothing further to translate),
/// straight color, and packed metadata.
///
/// `meta` bit layout, low to high: `R(4) | G(4) | B(4) | ambient(4) |
/// faceIndex(3) | AO(2)` — emissive tint, a coarse ambient term, which of
/// the six packed faces this vertex belongs to, and its ambient-occlusion
/// level.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub meta: u32,
}

fn pack_meta(ao: u8, face: Face6, ambient: u8, emissive: Light) -> u32 {
    debug_assert!(ao <= 3);
    debug_assert!(ambient <= 15);
    let r = emissive.r.min(15) as u32;
    let g = emissive.g.min(15) as u32;
    let b = emissive.b.min(15) as u32;
    (ao as u32)
        | ((face.packed_index() as u32) << 2)
        | ((ambient as u32) << 5)
        | (r << 9)
        | (g << 13)
        | (b << 17)
}

/// How the two possible diagonal triangulations of a face's quad are
/// chosen, to avoid the anisotropic-AO artifact of always splitting the
/// same way. Mode 3 (the default) tries each criterion in turn and falls
/// through to the next when its inputs are tied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TriangleShiftMode {
    /// Always split the same way (0-1-2, 0-2-3).
    Fixed,
    SunlightDelta,
    LuminanceDelta,
    /// Sunlight delta, then luminance delta, then AO sum.
    Cascade,
}

impl Default for TriangleShiftMode {
    fn default() -> Self {
        TriangleShiftMode::Cascade
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MesherOptions {
    pub sunlight_mode: SunlightMode,
    pub triangle_shift_mode: TriangleShiftMode,
}

impl Default for MesherOptions {
    fn default() -> Self {
        Self {
            sunlight_mode: SunlightMode::Min,
            triangle_shift_mode: TriangleShiftMode::Cascade,
        }
    }
}

/// Read-only access to block and light data in absolute (shape, not
/// chunk-local) coordinates, crossing chunk boundaries transparently.
/// Implemented by [`crate::shape::Shape`].
pub trait MesherInput {
    fn block_at(&self, cube: GridPoint) -> PaletteEntry;
    fn color_of(&self, entry: PaletteEntry) -> Rgba;
    fn light_at(&self, cube: GridPoint) -> Light;

    /// The shape-wide resize offset to subtract from internal coordinates
    /// to recover model-space (user-visible) ones (`spec.md` §4.7).
    /// Inputs with no such offset (tests, fixed single-chunk worlds) can
    /// rely on the zero default.
    fn offset(&self) -> GridVector {
        GridVector::new(0, 0, 0)
    }
}

/// The two vertex/index buffer pairs a chunk's mesh is split across:
/// opaque geometry (depth-tested, no blending) and transparent geometry
/// (drawn back-to-front, blended).
pub struct MeshBuffers {
    pub opaque_vertices: Buffer,
    pub opaque_indices: Buffer,
    pub transparent_vertices: Buffer,
    pub transparent_indices: Buffer,
}

impl Default for MeshBuffers {
    fn default() -> Self {
        Self {
            opaque_vertices: Buffer::new(),
            opaque_indices: Buffer::new(),
            transparent_vertices: Buffer::new(),
            transparent_indices: Buffer::new(),
        }
    }
}

/// Regions a chunk's mesh currently occupies, returned by [`mesh_chunk`]
/// for the caller to store back onto the chunk.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeshRegions {
    pub opaque_vertices: Option<BufferRegion>,
    pub opaque_indices: Option<BufferRegion>,
    pub transparent_vertices: Option<BufferRegion>,
    pub transparent_indices: Option<BufferRegion>,
}

struct Emitted {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    dedup: HashMap<u64, u32>,
}

impl Emitted {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            dedup: HashMap::new(),
        }
    }

    fn push_vertex(&mut self, key: u64, vertex: Vertex) -> u32 {
        if let Some(&index) = self.dedup.get(&key) {
            return index;
        }
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        self.dedup.insert(key, index);
        index
    }
}

fn dedup_key(local: GridPoint, color_index: PaletteEntry, ao: u8, face: Face6, ambient: u8) -> u64 {
    (local.x as u64 & 0x3f)
        | ((local.y as u64 & 0x3f) << 6)
        | ((local.z as u64 & 0x3f) << 12)
        | ((color_index as u64) << 18)
        | ((ao as u64) << 26)
        | ((face.packed_index() as u64) << 28)
        | ((ambient as u64) << 31)
}

/// Whether `cube` holds any non-invisible ("solid": opaque or transparent)
/// block — used both for AO sampling and to cull a transparent-stream
/// face against any solid neighbor.
fn occupied<I: MesherInput>(input: &I, cube: GridPoint) -> bool {
    let entry = input.block_at(cube);
    !input.color_of(entry).is_invisible()
}

/// Whether `cube` holds an opaque block — used to cull an opaque-stream
/// face, which only a fully opaque neighbor may hide (`spec.md` §4.4: a
/// transparent neighbor like glass must not cull an opaque face next to
/// it).
fn opaque_neighbor<I: MesherInput>(input: &I, cube: GridPoint) -> bool {
    let entry = input.block_at(cube);
    input.color_of(entry).is_opaque()
}

/// Ambient occlusion level `0..=3` for one quad corner, following the
/// standard three-neighbor-sample formula: if both edge-adjacent cubes
/// are occupied the corner is fully occluded regardless of the diagonal.
fn corner_ao(side_a: bool, side_b: bool, corner: bool) -> u8 {
    if side_a && side_b {
        3
    } else {
        side_a as u8 + side_b as u8 + corner as u8
    }
}

fn sample_sunlight(mode: SunlightMode, samples: [u8; 4]) -> u8 {
    match mode {
        SunlightMode::Min => *samples.iter().min().unwrap(),
        SunlightMode::Max => *samples.iter().max().unwrap(),
        SunlightMode::Mean => (samples.iter().map(|&s| s as u32).sum::<u32>() / 4) as u8,
    }
}

/// Meshes one chunk's blocks into opaque/transparent vertex and index
/// buffers. Regions are reallocated (restarting emission, since this
/// allocator does not preserve data across a relocation — see
/// [`crate::vbuffer::Buffer::reallocate`]) as many times as growth
/// requires, which is why this takes the previous regions by value
/// rather than mutating them in place.
pub fn mesh_chunk<I: MesherInput>(
    input: &I,
    chunk_pos: ChunkPos,
    buffers: &mut MeshBuffers,
    previous: MeshRegions,
    options: &MesherOptions,
) -> MeshRegions {
    let origin = chunk_pos.block_origin();
    let local_bounds = chunk_pos.bounds();

    if let Some(r) = previous.opaque_vertices {
        buffers.opaque_vertices.free(r);
    }
    if let Some(r) = previous.opaque_indices {
        buffers.opaque_indices.free(r);
    }
    if let Some(r) = previous.transparent_vertices {
        buffers.transparent_vertices.free(r);
    }
    if let Some(r) = previous.transparent_indices {
        buffers.transparent_indices.free(r);
    }

    let mut opaque = Emitted::new();
    let mut transparent = Emitted::new();

    for cube in local_bounds.interior_iter() {
        let entry = input.block_at(cube);
        let color = input.color_of(entry);
        if color.is_invisible() {
            continue;
        }
        for face in Face6::ALL {
            let neighbor = cube + face.normal_vector();
            let culled = if color.is_opaque() {
                opaque_neighbor(input, neighbor)
            } else {
                occupied(input, neighbor)
            };
            if culled {
                continue;
            }
            let target = if color.is_opaque() { &mut opaque } else { &mut transparent };
            emit_quad(input, cube, origin, entry, color, face, target, options);
        }
    }

    let opaque_regions = write_mesh(&mut buffers.opaque_vertices, &mut buffers.opaque_indices, &opaque);
    let transparent_regions = write_mesh(&mut buffers.transparent_vertices, &mut buffers.transparent_indices, &transparent);

    MeshRegions {
        opaque_vertices: opaque_regions.0,
        opaque_indices: opaque_regions.1,
        transparent_vertices: transparent_regions.0,
        transparent_indices: transparent_regions.1,
    }
}

fn write_mesh(vertex_buffer: &mut Buffer, index_buffer: &mut Buffer, emitted: &Emitted) -> (Option<BufferRegion>, Option<BufferRegion>) {
    if emitted.vertices.is_empty() {
        return (None, None);
    }
    let v_region = {
        let mut w = Writer::new(vertex_buffer);
        for _ in &emitted.vertices {
            w.get_next_space();
        }
        w.done()
    };
    let i_region = {
        let mut w = Writer::new(index_buffer);
        for _ in &emitted.indices {
            w.get_next_space();
        }
        w.done()
    };
    (v_region, i_region)
}

#[allow(clippy::too_many_arguments)]
fn emit_quad<I: MesherInput>(
    input: &I,
    cube: GridPoint,
    chunk_origin: GridPoint,
    entry: PaletteEntry,
    color: Rgba,
    face: Face6,
    target: &mut Emitted,
    options: &MesherOptions,
) {
    let (tangent_b, tangent_c) = tangents_for(face);
    let local = cube - chunk_origin;
    let model_origin = cube - input.offset();
    let outward = cube + face.normal_vector();

    let mut corners = [(0u8, Light::DARK); 4];
    let mut positions = [[0.0f32; 3]; 4];
    let signs: [(i32, i32); 4] = [(-1, -1), (1, -1), (1, 1), (-1, 1)];
    for (i, &(sb, sc)) in signs.iter().enumerate() {
        let side_a = outward + tangent_b * sb;
        let side_b = outward + tangent_c * sc;
        let corner = outward + tangent_b * sb + tangent_c * sc;
        let ao = corner_ao(occupied(input, side_a), occupied(input, side_b), occupied(input, corner));
        let samples = [
            input.light_at(cube).sun,
            input.light_at(side_a).sun,
            input.light_at(side_b).sun,
            input.light_at(corner).sun,
        ];
        let sun = sample_sunlight(options.sunlight_mode, samples);
        let emissive = input.light_at(outward);
        corners[i] = (ao, Light { sun, ..emissive });

        let face_offset = if face.is_positive() { 1.0 } else { 0.0 };
        let mut pos = [model_origin.x as f32, model_origin.y as f32, model_origin.z as f32];
        pos[face.axis_number()] += face_offset;
        let tb = tangent_b * sb.max(0);
        let tc = tangent_c * sc.max(0);
        pos[0] += (tb.x + tc.x) as f32;
        pos[1] += (tb.y + tc.y) as f32;
        pos[2] += (tb.z + tc.z) as f32;
        positions[i] = pos;
    }

    let mut vertex_indices = [0u32; 4];
    for i in 0..4 {
        let (ao, light) = corners[i];
        let ambient = light.sun;
        let key = dedup_key(GridPoint::new(local.x, local.y, local.z), entry, ao, face, ambient);
        let vertex = Vertex {
            position: positions[i],
            color: [color.red(), color.green(), color.blue(), color.alpha()],
            meta: pack_meta(ao, face, ambient, light),
        };
        vertex_indices[i] = target.push_vertex(key, vertex);
    }

    if should_shift_diagonal(&corners, options.triangle_shift_mode) {
        target.indices.extend_from_slice(&[vertex_indices[0], vertex_indices[1], vertex_indices[2]]);
        target.indices.extend_from_slice(&[vertex_indices[0], vertex_indices[2], vertex_indices[3]]);
    } else {
        target.indices.extend_from_slice(&[vertex_indices[0], vertex_indices[1], vertex_indices[3]]);
        target.indices.extend_from_slice(&[vertex_indices[1], vertex_indices[2], vertex_indices[3]]);
    }
}

fn tangents_for(face: Face6) -> (crate::math::GridVector, crate::math::GridVector) {
    use crate::math::GridVector;
    match face.axis_number() {
        0 => (GridVector::new(0, 1, 0), GridVector::new(0, 0, 1)),
        1 => (GridVector::new(1, 0, 0), GridVector::new(0, 0, 1)),
        _ => (GridVector::new(1, 0, 0), GridVector::new(0, 1, 0)),
    }
}

/// Decides whether to split the quad along corners 0-2 (`true`) or 1-3
/// (`false`), trying sunlight difference, then luminance difference, then
/// raw AO sum, falling through whenever a criterion is tied.
fn should_shift_diagonal(corners: &[(u8, Light); 4], mode: TriangleShiftMode) -> bool {
    let sun_02 = corners[0].1.sun as i32 + corners[2].1.sun as i32;
    let sun_13 = corners[1].1.sun as i32 + corners[3].1.sun as i32;

    let try_sunlight = || (sun_02 != sun_13).then(|| sun_02 > sun_13);
    let try_luminance = || {
        let lum = |l: Light| l.r as i32 + l.g as i32 + l.b as i32;
        let l02 = lum(corners[0].1) + lum(corners[2].1);
        let l13 = lum(corners[1].1) + lum(corners[3].1);
        (l02 != l13).then(|| l02 > l13)
    };
    let try_ao = || {
        let ao_02 = corners[0].0 as i32 + corners[2].0 as i32;
        let ao_13 = corners[1].0 as i32 + corners[3].0 as i32;
        ao_02 <= ao_13
    };

    match mode {
        TriangleShiftMode::Fixed => true,
        TriangleShiftMode::SunlightDelta => try_sunlight().unwrap_or(true),
        TriangleShiftMode::LuminanceDelta => try_luminance().unwrap_or(true),
        TriangleShiftMode::Cascade => try_sunlight().or_else(try_luminance).unwrap_or_else(try_ao),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::GridVector;
    use std::collections::HashMap as StdHashMap;

    struct FlatWorld {
        blocks: StdHashMap<(i32, i32, i32), PaletteEntry>,
        colors: StdHashMap<PaletteEntry, Rgba>,
        offset: GridVector,
    }

    impl FlatWorld {
        fn new() -> Self {
            let mut colors = StdHashMap::new();
            colors.insert(255u8, Rgba::transparent());
            colors.insert(0u8, Rgba::new(1.0, 1.0, 1.0, 1.0));
            colors.insert(1u8, Rgba::new(0.0, 0.5, 1.0, 0.25));
            Self {
                blocks: StdHashMap::new(),
                colors,
                offset: GridVector::new(0, 0, 0),
            }
        }
        fn set(&mut self, p: GridPoint, entry: PaletteEntry) {
            self.blocks.insert((p.x, p.y, p.z), entry);
        }
    }

    impl MesherInput for FlatWorld {
        fn block_at(&self, cube: GridPoint) -> PaletteEntry {
            *self.blocks.get(&(cube.x, cube.y, cube.z)).unwrap_or(&255)
        }
        fn color_of(&self, entry: PaletteEntry) -> Rgba {
            self.colors.get(&entry).copied().unwrap_or(Rgba::transparent())
        }
        fn light_at(&self, _cube: GridPoint) -> Light {
            Light { sun: 15, r: 0, g: 0, b: 0 }
        }
        fn offset(&self) -> GridVector {
            self.offset
        }
    }

    #[test]
    fn single_block_emits_six_visible_faces() {
        let mut world = FlatWorld::new();
        world.set(GridPoint::new(1, 1, 1), 0);
        let mut buffers = MeshBuffers::default();
        let regions = mesh_chunk(&world, ChunkPos::new(0, 0, 0), &mut buffers, MeshRegions::default(), &MesherOptions::default());
        let indices_len = buffers.opaque_indices.length_of(regions.opaque_indices.unwrap());
        assert_eq!(indices_len, 6 * 6); // 6 faces * 2 triangles * 3 indices
    }

    #[test]
    fn adjacent_blocks_hide_shared_face() {
        let mut world = FlatWorld::new();
        world.set(GridPoint::new(1, 1, 1), 0);
        world.set(GridPoint::new(2, 1, 1), 0);
        let mut buffers = MeshBuffers::default();
        let regions = mesh_chunk(&world, ChunkPos::new(0, 0, 0), &mut buffers, MeshRegions::default(), &MesherOptions::default());
        let indices_len = buffers.opaque_indices.length_of(regions.opaque_indices.unwrap());
        // 2 blocks * 6 faces - 2 shared faces = 10 visible faces
        assert_eq!(indices_len, 10 * 6);
    }

    #[test]
    fn remeshing_frees_previous_regions() {
        let mut world = FlatWorld::new();
        world.set(GridPoint::new(1, 1, 1), 0);
        let mut buffers = MeshBuffers::default();
        let first = mesh_chunk(&world, ChunkPos::new(0, 0, 0), &mut buffers, MeshRegions::default(), &MesherOptions::default());
        world.set(GridPoint::new(1, 1, 1), 255);
        let second = mesh_chunk(&world, ChunkPos::new(0, 0, 0), &mut buffers, first, &MesherOptions::default());
        assert!(second.opaque_vertices.is_none());
    }

    #[test]
    fn corner_ao_is_zero_with_no_occupied_neighbors_and_three_when_both_sides_occupied() {
        assert_eq!(corner_ao(false, false, false), 0);
        assert_eq!(corner_ao(true, false, false), 1);
        assert_eq!(corner_ao(false, true, false), 1);
        assert_eq!(corner_ao(false, false, true), 1);
        assert_eq!(corner_ao(true, true, false), 3);
        assert_eq!(corner_ao(true, false, true), 3);
        assert_eq!(corner_ao(false, true, true), 3);
        assert_eq!(corner_ao(true, true, true), 3);
    }

    #[test]
    fn opaque_face_against_transparent_neighbor_is_not_culled() {
        let mut world = FlatWorld::new();
        world.set(GridPoint::new(1, 1, 1), 0); // opaque
        world.set(GridPoint::new(2, 1, 1), 1); // transparent (glass)
        let mut buffers = MeshBuffers::default();
        let regions = mesh_chunk(&world, ChunkPos::new(0, 0, 0), &mut buffers, MeshRegions::default(), &MesherOptions::default());
        // The opaque block's +X face against glass must still be emitted:
        // all 6 of its faces are visible, plus 5 of the transparent block's
        // (its -X face is culled by the opaque neighbor).
        let opaque_indices = buffers.opaque_indices.length_of(regions.opaque_indices.unwrap());
        assert_eq!(opaque_indices, 6 * 6);
        let transparent_indices = buffers.transparent_indices.length_of(regions.transparent_indices.unwrap());
        assert_eq!(transparent_indices, 5 * 6);
    }

    #[test]
    fn vertex_positions_are_model_space_after_shape_offset() {
        let mut world = FlatWorld::new();
        world.offset = GridVector::new(1, 0, 0);
        world.set(GridPoint::new(5, 1, 1), 0);
        let mut target = Emitted::new();
        emit_quad(
            &world,
            GridPoint::new(5, 1, 1),
            ChunkPos::new(0, 0, 0).block_origin(),
            0,
            Rgba::new(1.0, 1.0, 1.0, 1.0),
            Face6::PX,
            &mut target,
            &MesherOptions::default(),
        );
        // Internal cube (5,1,1) minus offset (1,0,0) = model-space (4,1,1);
        // the +X face sits at model-space x = 5, never the raw internal x
        // of 6.
        assert!(target.vertices.iter().all(|v| v.position[0] == 5.0));
    }

    #[test]
    fn tangents_are_orthogonal_to_face_normal() {
        for face in Face6::ALL {
            let (b, c) = tangents_for(face);
            let n = face.normal_vector();
            let dot = |a: GridVector, b: GridVector| a.x * b.x + a.y * b.y + a.z * b.z;
            assert_eq!(dot(n, b), 0);
            assert_eq!(dot(n, c), 0);
        }
    }
}
