// Copyright voxel-core contributors, MIT License.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use voxel_core::chunking::{ChunkPos, CHUNK_SIZE};
use voxel_core::math::{GridPoint, Rgba};
use voxel_core::mesh::{mesh_chunk, MeshBuffers, MeshRegions, MesherOptions};
use voxel_core::shape::Shape;

criterion_group!(benches, mesh_benches);
criterion_main!(benches);

fn mesh_benches(c: &mut Criterion) {
    let options = MesherOptions::default();

    c.bench_function("chunk, solid", |b| {
        let shape = filled_chunk(|_, _, _| true);
        b.iter_batched_ref(
            || (MeshBuffers::default(), MeshRegions::default()),
            |(buffers, regions)| {
                *regions = mesh_chunk(&shape, ChunkPos::new(0, 0, 0), buffers, MeshRegions::default(), &options)
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("chunk, checkerboard", |b| {
        let shape = filled_chunk(|x, y, z| (x + y + z).rem_euclid(2) == 0);
        b.iter_batched_ref(
            || (MeshBuffers::default(), MeshRegions::default()),
            |(buffers, regions)| {
                *regions = mesh_chunk(&shape, ChunkPos::new(0, 0, 0), buffers, MeshRegions::default(), &options)
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("chunk, remesh reuses buffers", |b| {
        let shape = filled_chunk(|x, y, z| (x + y + z).rem_euclid(2) == 0);
        let mut buffers = MeshBuffers::default();
        let first = mesh_chunk(&shape, ChunkPos::new(0, 0, 0), &mut buffers, MeshRegions::default(), &options);
        b.iter_batched_ref(
            || first,
            |regions| mesh_chunk(&shape, ChunkPos::new(0, 0, 0), &mut buffers, *regions, &options),
            BatchSize::SmallInput,
        );
    });
}

fn filled_chunk(occupied: impl Fn(i32, i32, i32) -> bool) -> Shape {
    let mut shape = Shape::new(true);
    let white = Rgba::new(1.0, 1.0, 1.0, 1.0);
    for z in 0..CHUNK_SIZE {
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                if occupied(x, y, z) {
                    shape.stage_set(GridPoint::new(x, y, z), white);
                }
            }
        }
    }
    shape.commit();
    shape
}
