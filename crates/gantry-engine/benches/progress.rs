//! Benchmarks for the progress monitor hot path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gantry_engine::ProgressMonitor;

fn bench_worked(c: &mut Criterion) {
    c.bench_function("monitor_worked_1k", |b| {
        b.iter(|| {
            let monitor = ProgressMonitor::new();
            monitor.begin_task("bench", 1000.0).unwrap();
            for _ in 0..1000 {
                monitor.worked(black_box(1.0)).unwrap();
            }
            monitor.done();
        })
    });
}

fn bench_sub_monitor_chain(c: &mut Criterion) {
    c.bench_function("sub_monitor_forwarding", |b| {
        b.iter(|| {
            let root = ProgressMonitor::new();
            root.begin_task("bench", 100.0).unwrap();
            for _ in 0..10 {
                let sub = root.create_sub_monitor(10.0).unwrap();
                sub.begin_task("chunk", 50.0).unwrap();
                for _ in 0..50 {
                    sub.worked(black_box(1.0)).unwrap();
                }
                sub.done();
            }
            root.done();
        })
    });
}

criterion_group!(benches, bench_worked, bench_sub_monitor_chain);
criterion_main!(benches);
