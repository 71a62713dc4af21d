// Copyright voxel-core contributors, MIT License.

//! End-to-end scenarios exercising the block grid, mesher, vertex buffer
//! allocator, and lighting propagator together, the way a single edit
//! actually flows through the whole stack.

use pretty_assertions::assert_eq;
use voxel_core::chunking::ChunkPos;
use voxel_core::lighting::{Channel, LightField, LightingOptions, LightPropagator};
use voxel_core::math::{GridPoint, Rgba};
use voxel_core::mesh::{mesh_chunk, MeshBuffers, MeshRegions, MesherOptions};
use voxel_core::shape::Shape;

fn red() -> Rgba {
    Rgba::new(1.0, 0.0, 0.0, 1.0)
}

#[test]
fn single_block_add_produces_one_cube_of_geometry() {
    let mut shape = Shape::new(true);
    shape.set_block(GridPoint::new(0, 0, 0), red());

    let entry = shape.block_at(GridPoint::new(0, 0, 0));
    assert_eq!(shape.palette().refcount(entry), 1);
    assert_eq!(shape.bounding_box().lower(), GridPoint::new(0, 0, 0));
    assert_eq!(shape.bounding_box().upper(), GridPoint::new(1, 1, 1));

    let mut buffers = MeshBuffers::default();
    let regions = mesh_chunk(&shape, ChunkPos::new(0, 0, 0), &mut buffers, MeshRegions::default(), &MesherOptions::default());

    let v = regions.opaque_vertices.expect("solid block should produce opaque geometry");
    let i = regions.opaque_indices.expect("solid block should produce indices");
    assert_eq!(buffers.opaque_vertices.length_of(v), 24, "6 faces * 4 unshared corners");
    assert_eq!(buffers.opaque_indices.length_of(i), 36, "6 faces * 2 triangles * 3 indices");
    assert!(regions.transparent_vertices.is_none());
}

#[test]
fn remove_then_readd_same_cell_remeshes_to_the_same_geometry_size() {
    let mut shape = Shape::new(true);
    shape.set_block(GridPoint::new(0, 0, 0), red());

    let mut buffers = MeshBuffers::default();
    let first = mesh_chunk(&shape, ChunkPos::new(0, 0, 0), &mut buffers, MeshRegions::default(), &MesherOptions::default());

    shape.remove_block(GridPoint::new(0, 0, 0));
    let emptied = mesh_chunk(&shape, ChunkPos::new(0, 0, 0), &mut buffers, first, &MesherOptions::default());
    assert!(emptied.opaque_vertices.is_none(), "an empty chunk should free its geometry entirely");
    assert_eq!(buffers.opaque_vertices.used(), 0);
    assert_eq!(buffers.opaque_indices.used(), 0);

    shape.set_block(GridPoint::new(0, 0, 0), red());
    let second = mesh_chunk(&shape, ChunkPos::new(0, 0, 0), &mut buffers, emptied, &MesherOptions::default());
    let v = second.opaque_vertices.unwrap();
    let i = second.opaque_indices.unwrap();
    assert_eq!(buffers.opaque_vertices.length_of(v), 24);
    assert_eq!(buffers.opaque_indices.length_of(i), 36);
}

#[test]
fn amend_in_one_transaction_applies_only_the_final_paint() {
    let mut shape = Shape::new(true);
    let blue = Rgba::new(0.0, 0.0, 1.0, 1.0);

    shape.stage_set(GridPoint::new(2, 2, 2), red());
    let entry_a = shape.palette().find(red()).unwrap();
    shape.stage_set(GridPoint::new(2, 2, 2), blue);
    assert_eq!(shape.pending_len(), 1, "restaging the same cube amends in place");
    shape.commit();

    assert_eq!(shape.color_at(GridPoint::new(2, 2, 2)), blue);
    assert_eq!(shape.palette().refcount(entry_a), 0);
    let entry_b = shape.palette().find(blue).unwrap();
    assert_eq!(shape.palette().refcount(entry_b), 1);
}

#[test]
fn undo_of_remove_restores_model_palette_and_bounds() {
    let mut shape = Shape::new(true);
    shape.set_block(GridPoint::new(0, 0, 0), red());
    shape.set_block(GridPoint::new(1, 0, 0), red());
    let bounds_before = shape.bounding_box();
    let entry = shape.block_at(GridPoint::new(1, 0, 0));

    shape.remove_block(GridPoint::new(1, 0, 0));
    assert_eq!(shape.block_at(GridPoint::new(1, 0, 0)), voxel_core::AIR_BLOCK_INDEX);

    assert!(shape.undo());
    assert_eq!(shape.block_at(GridPoint::new(1, 0, 0)), entry);
    assert_eq!(shape.palette().refcount(entry), 2);
    assert_eq!(shape.bounding_box(), bounds_before);
}

#[test]
fn sunlight_flows_around_and_under_an_overhang() {
    let mut shape = Shape::new(true);
    shape.enable_lighting(LightingOptions::default());
    // A 3x3x3 room with a single overhanging block at (1,2,1): a roof tile
    // with open sides, floor and walls left as air.
    shape.set_block(GridPoint::new(1, 2, 1), Rgba::new(0.6, 0.6, 0.6, 1.0));

    // Seed one cube above the room's roof line, the way `Shape`'s own
    // incremental relighting does, so the seed never lands on the
    // overhang block itself.
    let propagator = LightPropagator::new(LightingOptions::default());
    for x in 0..3 {
        for z in 0..3 {
            propagator.propagate_sunlight(&mut shape, [GridPoint::new(x, 3, z)]);
        }
    }

    for x in 0..3 {
        for z in 0..3 {
            if (x, z) == (1, 1) {
                continue;
            }
            assert_eq!(
                LightField::light_at(&shape, GridPoint::new(x, 2, z)).sun,
                voxel_core::lighting::MAX_LIGHT,
                "open roof cells should be fully lit at ({x}, 2, {z})"
            );
        }
    }
    // Directly under the overhang, light must sneak in horizontally from an
    // open column. Every column neighboring (1, *, 1) is lit to MAX_LIGHT by
    // a free vertical descent (only (1, 2, 1) itself is blocked), so the one
    // unavoidable horizontal hop into the shadowed column costs exactly one
    // step — MAX_LIGHT - 1, not MAX_LIGHT.
    assert_eq!(
        LightField::light_at(&shape, GridPoint::new(1, 1, 1)).sun,
        voxel_core::lighting::MAX_LIGHT - 1
    );
    assert_eq!(
        LightField::light_at(&shape, GridPoint::new(1, 0, 1)).sun,
        voxel_core::lighting::MAX_LIGHT - 1
    );
    // An open column right beside it should stay fully lit all the way down.
    assert_eq!(LightField::light_at(&shape, GridPoint::new(0, 1, 1)).sun, voxel_core::lighting::MAX_LIGHT);
    assert_eq!(LightField::light_at(&shape, GridPoint::new(0, 0, 1)).sun, voxel_core::lighting::MAX_LIGHT);
}

#[test]
fn emissive_block_lights_first_ring_uniformly_and_falls_off_on_the_second() {
    let mut shape = Shape::new(true);
    shape.enable_lighting(LightingOptions::default());
    let glow = Rgba::new(1.0, 0.0, 0.0, 1.0);
    shape.set_color_emissive(glow, true);
    shape.set_block(GridPoint::new(0, 0, 0), glow);

    for n in first_ring(GridPoint::new(0, 0, 0)) {
        assert_eq!(LightField::light_at(&shape, n).r, voxel_core::lighting::MAX_LIGHT, "{n:?}");
    }
    assert_eq!(LightField::light_at(&shape, GridPoint::new(2, 0, 0)).r, voxel_core::lighting::MAX_LIGHT - 1);

    let propagator = LightPropagator::new(LightingOptions::default());
    propagator.remove_and_refill(&mut shape, GridPoint::new(0, 0, 0), Channel::R.bit() | Channel::G.bit() | Channel::B.bit());
    for n in first_ring(GridPoint::new(0, 0, 0)) {
        assert_eq!(LightField::light_at(&shape, n).r, 0, "{n:?} should go dark once the only source is removed");
    }
}

fn first_ring(center: GridPoint) -> Vec<GridPoint> {
    let mut out = Vec::new();
    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                out.push(GridPoint::new(center.x + dx, center.y + dy, center.z + dz));
            }
        }
    }
    out
}
