// Copyright voxel-core contributors, MIT License.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use voxel_core::lighting::{Channel, LightingOptions, LightPropagator};
use voxel_core::math::{GridPoint, Rgb, Rgba};
use voxel_core::shape::Shape;

criterion_group!(benches, lighting_benches);
criterion_main!(benches);

const EXTENT: i32 = 32;

fn lighting_benches(c: &mut Criterion) {
    let propagator = LightPropagator::new(LightingOptions::default());

    c.bench_function("sunlight, open room", |b| {
        b.iter_batched_ref(
            || floor_shape(),
            |shape| {
                let column = GridPoint::new(EXTENT / 2, EXTENT - 1, EXTENT / 2);
                propagator.propagate_sunlight(shape, [column])
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("sunlight, room with overhang", |b| {
        b.iter_batched_ref(
            || floor_and_overhang_shape(),
            |shape| {
                let column = GridPoint::new(EXTENT / 2, EXTENT - 1, EXTENT / 2);
                propagator.propagate_sunlight(shape, [column])
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("emission, single torch", |b| {
        b.iter_batched_ref(
            Shape::unlit,
            |shape| propagator.propagate_emission(shape, GridPoint::new(EXTENT / 2, 1, EXTENT / 2), Rgb::new(1.0, 0.6, 0.2)),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("remove_and_refill, torch removed", |b| {
        b.iter_batched_ref(
            || {
                let mut shape = Shape::unlit();
                propagator.propagate_emission(&mut shape, GridPoint::new(EXTENT / 2, 1, EXTENT / 2), Rgb::new(1.0, 0.6, 0.2));
                shape
            },
            |shape| propagator.remove_and_refill(shape, GridPoint::new(EXTENT / 2, 1, EXTENT / 2), Channel::R.bit() | Channel::G.bit() | Channel::B.bit()),
            BatchSize::SmallInput,
        );
    });
}

trait ShapeExt {
    fn unlit() -> Shape;
}
impl ShapeExt for Shape {
    fn unlit() -> Shape {
        let mut shape = Shape::new(true);
        shape.enable_lighting(LightingOptions::default());
        // Touch bounds so the shape's LightField extent covers the room
        // before any propagation runs.
        shape.set_block(GridPoint::new(0, 0, 0), Rgba::new(1.0, 1.0, 1.0, 1.0));
        shape.set_block(GridPoint::new(EXTENT - 1, EXTENT - 1, EXTENT - 1), Rgba::new(1.0, 1.0, 1.0, 1.0));
        shape.remove_block(GridPoint::new(0, 0, 0));
        shape.remove_block(GridPoint::new(EXTENT - 1, EXTENT - 1, EXTENT - 1));
        shape
    }
}

fn floor_shape() -> Shape {
    let mut shape = Shape::unlit();
    let stone = Rgba::new(0.5, 0.5, 0.5, 1.0);
    for z in 0..EXTENT {
        for x in 0..EXTENT {
            shape.stage_set(GridPoint::new(x, 0, z), stone);
        }
    }
    shape.commit();
    shape
}

fn floor_and_overhang_shape() -> Shape {
    let mut shape = floor_shape();
    let stone = Rgba::new(0.5, 0.5, 0.5, 1.0);
    for z in EXTENT / 2 - 2..EXTENT / 2 + 2 {
        for x in EXTENT / 2 - 2..EXTENT / 2 + 2 {
            shape.stage_set(GridPoint::new(x, EXTENT - 2, z), stone);
        }
    }
    shape.commit();
    shape
}
