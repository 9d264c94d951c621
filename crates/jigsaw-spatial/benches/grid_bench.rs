//! Criterion benchmarks for the uniform grid.

use criterion::{Criterion, criterion_group, criterion_main};
use jigsaw_spatial::UniformGrid;
use std::hint::black_box;

/// 1000 items laid out like a scattered 40x25 puzzle table.
fn populated_grid() -> UniformGrid<u32> {
    let mut grid = UniformGrid::for_piece_size(48.0);
    for id in 0..1000u32 {
        let x = (id % 40) as f32 * 61.0 + (id % 7) as f32 * 13.0;
        let y = (id / 40) as f32 * 57.0 - (id % 5) as f32 * 9.0;
        grid.insert(id, (x, y));
    }
    grid
}

fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("uniform_grid");
    group.sample_size(50);

    group.bench_function("query_radius_1000_items", |b| {
        let grid = populated_grid();
        b.iter(|| black_box(grid.query_radius(black_box((1200.0, 700.0)), 150.0)));
    });

    // One drag-move frame for a 25-piece group.
    group.bench_function("update_25_items", |b| {
        let mut grid = populated_grid();
        let mut offset = 0.0f32;
        b.iter(|| {
            offset += 3.0;
            for id in 0..25u32 {
                grid.update(id, (id as f32 * 61.0 + offset, offset * 0.5));
            }
        });
    });

    group.bench_function("rebuild_1000_items", |b| {
        let mut grid = populated_grid();
        let items: Vec<(u32, (f32, f32))> = (0..1000u32)
            .map(|id| (id, ((id % 40) as f32 * 61.0, (id / 40) as f32 * 57.0)))
            .collect();
        b.iter(|| grid.rebuild(items.iter().copied()));
    });

    group.finish();
}

criterion_group!(benches, bench_grid);
criterion_main!(benches);
