use core_types::{Bounds, Rect};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use spatial::SpatialIndex;

const ANNOTATIONS: usize = 5_000;

// three-line highlights laid out down a long page
fn make_rects(i: usize) -> Vec<Rect> {
    let y = i as f32 * 24.0;
    let x = (i % 17) as f32 * 13.0;
    vec![
        Rect::new(x, y, 600.0 - x, 18.0),
        Rect::new(0.0, y + 18.0, 600.0, 18.0),
        Rect::new(0.0, y + 36.0, 120.0, 18.0),
    ]
}

fn filled() -> SpatialIndex {
    let mut index = SpatialIndex::new();
    index.set((0..ANNOTATIONS).map(|i| (i.to_string(), make_rects(i))), true);
    index
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("bench_index_insert", |b| {
        b.iter(|| black_box(filled().entry_count()));
    });
}

fn bench_get_at(c: &mut Criterion) {
    let index = filled();
    c.bench_function("bench_index_get_at", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 7) % ANNOTATIONS;
            black_box(index.get_at(300.0, i as f32 * 24.0 + 20.0));
        });
    });
}

fn bench_viewport_query(c: &mut Criterion) {
    let index = filled();
    c.bench_function("bench_index_viewport", |b| {
        b.iter(|| black_box(index.get_intersecting(&Bounds::new(0.0, 40_000.0, 800.0, 40_900.0)).len()));
    });
}

fn bench_update(c: &mut Criterion) {
    c.bench_function("bench_index_update", |b| {
        b.iter_batched(
            filled,
            |mut index| {
                for i in (0..ANNOTATIONS).step_by(50) {
                    index.update(&i.to_string(), make_rects(i + 1));
                }
                black_box(index.entry_count())
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_insert, bench_get_at, bench_viewport_query, bench_update);
criterion_main!(benches);
