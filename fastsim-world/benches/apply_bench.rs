//! Benchmarks for snapshot application and transform lookup

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fastsim_world::{Id, Pose3D, Snapshot, Time, UpdateRequest};
use std::sync::Arc;

/// A root with `width` boxes directly below it and one chain `depth` deep
fn populated_world(width: usize, depth: usize) -> Arc<Snapshot> {
    let mut req = UpdateRequest::new();
    for i in 0..width {
        let id = format!("box{}", i);
        req.set_type(id.as_str(), "box");
        req.set_pose("world", id.as_str(), Pose3D::from_translation(i as f64, 0.0, 0.0), Time::ZERO);
    }

    let mut parent = "world".to_string();
    for i in 0..depth {
        let id = format!("link{}", i);
        req.set_type(id.as_str(), "link");
        req.set_pose(parent.as_str(), id.as_str(), Pose3D::from_xyz_rpy(0.1, 0.0, 0.0, 0.0, 0.0, 0.05), Time::ZERO);
        parent = id;
    }

    Snapshot::with_root(Id::new("world"))
        .apply(&req)
        .expect("benchmark world is valid")
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_single_pose");
    for width in [10, 100, 1000] {
        let world = populated_world(width, 0);
        let mut req = UpdateRequest::new();
        req.set_pose("world", "box0", Pose3D::from_translation(5.0, 0.0, 0.0), Time(1.0));

        group.bench_with_input(BenchmarkId::from_parameter(width), &world, |b, world| {
            b.iter(|| {
                let next = world.apply(black_box(&req)).unwrap();
                black_box(next);
            })
        });
    }
    group.finish();

    let world = populated_world(100, 0);
    c.bench_function("apply_empty", |b| {
        b.iter(|| {
            let next = world.apply(black_box(&UpdateRequest::new())).unwrap();
            black_box(next);
        })
    });
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_chain");
    for depth in [1, 10, 50] {
        let world = populated_world(10, depth);
        let leaf = Id::new(format!("link{}", depth - 1));
        let root = Id::new("world");

        group.bench_with_input(BenchmarkId::from_parameter(depth), &world, |b, world| {
            b.iter(|| {
                let pose = world.transform(black_box(&leaf), black_box(&root)).unwrap();
                black_box(pose);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apply, bench_transform);
criterion_main!(benches);
