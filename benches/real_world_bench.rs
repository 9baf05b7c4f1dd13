use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use misplaced_comments::{check_source, fix_source, lexer, Settings};
use std::fs;
use std::path::Path;

fn load_fixture(fixture_path: &str) -> String {
    let path = Path::new("tests/fixtures").join(fixture_path);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read fixture: {path:?}"))
}

/// A module-sized input: the bad fixture repeated until it is a few thousand lines.
fn large_module() -> String {
    load_fixture("bad/bracket_comments.py").repeat(100)
}

fn bench_real_fixtures(c: &mut Criterion) {
    let fixtures = vec![
        ("bracket_comments", "bad/bracket_comments.py"),
        ("long_comments", "bad/long_comments.py"),
        ("directives", "good/ignore_comments.py"),
        ("clean", "good/preceding_comment.py"),
    ];
    let settings = Settings::default();

    let mut group = c.benchmark_group("real_world_fixing");

    for (name, fixture_path) in fixtures {
        let input = load_fixture(fixture_path);
        let size = input.len() as u64;

        group.throughput(Throughput::Bytes(size));
        group.bench_with_input(BenchmarkId::new("fix", name), &input, |b, input| {
            b.iter(|| fix_source(black_box(input), Path::new("bench.py"), &settings).unwrap())
        });
    }

    group.finish();
}

fn bench_tokenize_only(c: &mut Criterion) {
    let input = large_module();

    c.bench_function("tokenize_only", |b| {
        b.iter(|| lexer::tokenize(black_box(&input)).unwrap())
    });
}

fn bench_check_vs_fix(c: &mut Criterion) {
    let input = large_module();
    let settings = Settings::default();

    let mut group = c.benchmark_group("large_module");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("check", |b| {
        b.iter(|| check_source(black_box(&input), Path::new("bench.py"), &settings).unwrap())
    });
    group.bench_function("fix", |b| {
        b.iter(|| fix_source(black_box(&input), Path::new("bench.py"), &settings).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_real_fixtures,
    bench_tokenize_only,
    bench_check_vs_fix
);
criterion_main!(benches);
