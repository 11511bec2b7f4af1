//! Benchmarks for the npm adapter's hot paths: packument JSON parsing,
//! node-semver range matching, and hoisting-tree placement.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use depssmuggler_npm::hoisting::HoistTree;
use depssmuggler_npm::types::Packument;
use node_semver::{Range, Version};

const NPM_REGISTRY_RESPONSE: &str = r#"{
  "name": "express",
  "dist-tags": {"latest": "4.18.2", "next": "5.0.0-beta.1"},
  "versions": {
    "4.17.0": {"dist": {"tarball": "https://registry.npmjs.org/express/-/express-4.17.0.tgz"}},
    "4.18.0": {"dist": {"tarball": "https://registry.npmjs.org/express/-/express-4.18.0.tgz"}},
    "4.18.1": {"dist": {"tarball": "https://registry.npmjs.org/express/-/express-4.18.1.tgz"}},
    "4.18.2": {"dist": {"tarball": "https://registry.npmjs.org/express/-/express-4.18.2.tgz"}}
  },
  "time": {}
}"#;

fn generate_large_packument(count: usize) -> String {
    let mut body = String::from(r#"{"name": "large-package", "dist-tags": {"latest": "0.0.0"}, "versions": {"#);
    for i in 0..count {
        body.push_str(&format!(
            r#""{i}.0.0": {{"dist": {{"tarball": "https://registry.npmjs.org/large-package/-/large-package-{i}.0.0.tgz"}}}}{}"#,
            if i + 1 < count { "," } else { "" }
        ));
    }
    body.push_str(r#"}, "time": {}}"#);
    body
}

fn bench_packument_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("packument_parsing");

    group.bench_function("small_4_versions", |b| {
        b.iter(|| serde_json::from_str::<Packument>(black_box(NPM_REGISTRY_RESPONSE)).unwrap())
    });

    let large = generate_large_packument(200);
    group.bench_function("large_200_versions", |b| {
        b.iter(|| serde_json::from_str::<Packument>(black_box(&large)).unwrap())
    });

    group.finish();
}

fn bench_range_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_matching");

    let latest = Version::parse("4.18.2").unwrap();

    let ranges = [("caret", "^4.18.0"), ("tilde", "~4.18.0"), ("comparator_and", ">=4.17.0 <5.0.0")];
    for (name, range_str) in ranges {
        let range = Range::parse(range_str).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &range, |b, range| {
            b.iter(|| range.satisfies(black_box(&latest)))
        });
    }

    let versions: Vec<Version> = (0..20).map(|i| Version::parse(format!("4.18.{i}")).unwrap()).collect();
    let caret = Range::parse("^4.18.0").unwrap();
    group.bench_function("find_latest_matching_of_20", |b| {
        b.iter(|| versions.iter().filter(|v| caret.satisfies(v)).max().cloned())
    });

    group.finish();
}

fn bench_hoisting(c: &mut Criterion) {
    let mut group = c.benchmark_group("hoisting");

    group.bench_function("place_50_siblings_no_conflicts", |b| {
        b.iter(|| {
            let mut tree = HoistTree::new();
            for i in 0..50 {
                tree.place(&format!("pkg-{i}"), "1.0.0", black_box(&[]), |_| true);
            }
        })
    });

    group.bench_function("place_with_nested_conflict", |b| {
        b.iter(|| {
            let mut tree = HoistTree::new();
            tree.place("lodash", "3.0.0", &[], |_| true);
            for i in 0..20 {
                tree.place(
                    "lodash",
                    "4.17.21",
                    black_box(&[format!("consumer-{i}")]),
                    |existing| existing == "4.17.21",
                );
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_packument_parsing, bench_range_matching, bench_hoisting);
criterion_main!(benches);
