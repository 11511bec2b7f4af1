//! Benchmarks for the Conda adapter's hot paths: MatchSpec parsing,
//! version comparison, and candidate ordering over a repodata-sized slate
//! of builds.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use depssmuggler_conda::matchspec::MatchSpec;
use depssmuggler_conda::version::compare;

fn bench_matchspec_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("matchspec_parsing");

    let specs = [
        ("bare_name", "numpy"),
        ("comparator_range", "numpy>=1.20,<2.0"),
        ("channel_and_build", "conda-forge::numpy=1.26.4=py310h5f9d8a6_0"),
        ("or_clause", "numpy==1.20.0|==1.21.0"),
    ];

    for (name, raw) in specs {
        group.bench_with_input(BenchmarkId::from_parameter(name), &raw, |b, raw| {
            b.iter(|| MatchSpec::parse(black_box(raw)));
        });
    }

    group.finish();
}

fn bench_version_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_compare");

    group.bench_function("numeric_releases", |b| b.iter(|| compare(black_box("1.26.4"), black_box("1.25.0"))));
    group.bench_function("prerelease_qualifiers", |b| b.iter(|| compare(black_box("1.0.0rc1"), black_box("1.0.0"))));

    group.finish();
}

fn bench_candidate_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_filtering");

    let spec = MatchSpec::parse("numpy>=1.20,<2.0").unwrap();
    let versions: Vec<String> = (0..200).map(|i| format!("1.{}.0", i % 40)).collect();

    group.bench_function("filter_200_candidates", |b| {
        b.iter(|| versions.iter().filter(|v| spec.matches(black_box(v), "py310_0")).count())
    });

    group.finish();
}

criterion_group!(benches, bench_matchspec_parsing, bench_version_compare, bench_candidate_filtering);
criterion_main!(benches);
