use agsearch::{default_config, Engine};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::{fs::File, io::Write, path::Path};
use tempfile::tempdir;

fn create_test_files(dir: &Path, file_count: usize, lines_per_file: usize) -> std::io::Result<()> {
    for i in 0..file_count {
        let file_path = dir.join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(
                file,
                "Line {} TODO: fix bug {} FIXME: optimize line {} NOTE: important task {}",
                j, j, j, j
            )?;
        }
    }
    Ok(())
}

fn bench_patterns(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), 50, 100).unwrap();

    let patterns = [
        "TODO",
        r"TODO:.*\d+",
        r"FIXME:.*bug.*line \d+",
        r"NOTE:.*important.*\d+",
    ];

    let engine = Engine::init(default_config()).unwrap();
    let mut group = c.benchmark_group("Patterns");
    for (i, pattern) in patterns.iter().enumerate() {
        group.bench_function(format!("pattern_{}", i), |b| {
            b.iter(|| black_box(engine.search(pattern, &[dir.path()]).unwrap()));
        });
    }
    group.finish();
    engine.finish();
}

fn bench_worker_scaling(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), 500, 50).unwrap();

    let mut group = c.benchmark_group("Worker Scaling");
    for workers in [1, 2, 4, 8] {
        let mut config = default_config();
        config.num_workers = workers;
        let engine = Engine::init(config).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| black_box(engine.search("TODO", &[dir.path()]).unwrap()));
        });
        engine.finish();
    }
    group.finish();
}

fn bench_large_file(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("large.txt");
    let mut file = File::create(&path).unwrap();
    let line = "The quick brown fox jumps over the lazy dog with pattern_123\n";
    for _ in 0..(20 * 1024 * 1024 / line.len()) {
        file.write_all(line.as_bytes()).unwrap();
    }
    drop(file);

    let engine = Engine::init(default_config()).unwrap();
    let mut group = c.benchmark_group("Large File");
    group.sample_size(10);
    group.bench_function("chunked_regex", |b| {
        b.iter(|| black_box(engine.search(r"pattern_\d+", &[path.as_path()]).unwrap()));
    });
    group.bench_function("chunked_literal", |b| {
        b.iter(|| black_box(engine.search("lazy dog", &[path.as_path()]).unwrap()));
    });
    group.finish();
    engine.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_patterns, bench_worker_scaling, bench_large_file
}

criterion_main!(benches);
