use cardio_prep::data::{LabelRow, LabelTable, MatFile};
use cardio_prep::record::Label;
use cardio_prep::split::stratified_split;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn make_table(count: usize) -> LabelTable {
    let rows = (0..count)
        .map(|idx| {
            let label = if idx % 5 < 3 {
                Label::Abnormal
            } else {
                Label::Normal
            };
            LabelRow::new(format!("a{idx:05}"), label)
        })
        .collect();
    LabelTable::new(rows).unwrap()
}

fn benchmark_stratified_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("stratified_split");
    for size in [100_usize, 1_000, 10_000] {
        let table = make_table(size);
        group.throughput(criterion::Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| {
                let split = stratified_split(table, 0.30, 42).unwrap();
                black_box(split);
            });
        });
    }
    group.finish();
}

fn benchmark_mat_write(c: &mut Criterion) {
    // 20 s of ECG+PCG at 2 kHz
    let signal: Vec<f32> = (0..40_000).map(|i| (i as f32 * 0.01).sin()).collect();
    let record = MatFile::new()
        .with_single_row("ecg", &signal)
        .with_single_row("pcg", &signal)
        .with_double_scalar("fs", 2000.0);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a0001.mat");

    let mut group = c.benchmark_group("mat_write_record");
    for compress in [false, true] {
        group.bench_with_input(BenchmarkId::from_parameter(compress), &compress, |b, &compress| {
            b.iter(|| {
                record.write(&path, compress).unwrap();
                black_box(&path);
            });
        });
    }
    group.finish();
}

fn criterion_benchmark(c: &mut Criterion) {
    benchmark_stratified_split(c);
    benchmark_mat_write(c);
}

criterion_group!(name = benches; config = Criterion::default().sample_size(50); targets = criterion_benchmark);
criterion_main!(benches);
