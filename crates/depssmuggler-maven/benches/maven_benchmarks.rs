//! Benchmarks for the Maven adapter's hot paths: coordinate parsing,
//! version comparison, and `maven-metadata.xml` parsing over a
//! realistically sized version list.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use depssmuggler_maven::coordinate;
use depssmuggler_maven::pom::parse_metadata_versions;
use depssmuggler_maven::version::compare;

fn bench_coordinate_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinate_parsing");

    let refs = [
        ("group_artifact", "org.springframework:spring-core"),
        ("group_artifact_version", "org.springframework:spring-core:6.0.9"),
        ("long_group", "com.fasterxml.jackson.core:jackson-databind:2.15.2"),
    ];

    for (name, raw) in refs {
        group.bench_with_input(BenchmarkId::from_parameter(name), &raw, |b, raw| {
            b.iter(|| coordinate::parse_reference(black_box(raw)));
        });
    }

    group.finish();
}

fn bench_version_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_compare");

    group.bench_function("numeric_releases", |b| b.iter(|| compare(black_box("6.0.10"), black_box("6.0.9"))));
    group.bench_function("qualifier_vs_release", |b| b.iter(|| compare(black_box("1.0-rc1"), black_box("1.0"))));

    group.finish();
}

fn bench_metadata_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_parsing");

    let versions_xml: String = {
        let entries: String = (0..300).map(|i| format!("<version>1.{i}.0</version>")).collect();
        format!("<metadata><versioning><versions>{entries}</versions></versioning></metadata>")
    };

    group.bench_function("parse_300_versions", |b| {
        b.iter(|| parse_metadata_versions(black_box(versions_xml.as_bytes())));
    });

    group.finish();
}

criterion_group!(benches, bench_coordinate_parsing, bench_version_compare, bench_metadata_parsing);
criterion_main!(benches);
