//! Benchmarks for the OS-package adapter's hot paths: RPM/dpkg version
//! comparison (called once per candidate during repodata indexing and
//! resolution) and `primary.xml` parsing (once per repodata refresh).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use depssmuggler_os::version::{compare_dpkg_versions, compare_rpm_versions};

fn bench_rpm_version_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("rpm_version_compare");
    let pairs = [
        ("simple", ("2.4.57-1", "2.4.56-1")),
        ("epoch", ("1:7.4p1-10", "7.4p1-10")),
        ("long_release", ("1.2.3-45.el9_3.1", "1.2.3-45.el9_3.2")),
    ];
    for (name, (a, b)) in pairs {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(a, b), |bencher, (a, b)| {
            bencher.iter(|| compare_rpm_versions(black_box(a), black_box(b)));
        });
    }
    group.finish();
}

fn bench_dpkg_version_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("dpkg_version_compare");
    group.bench_function("tilde_prerelease", |b| {
        b.iter(|| compare_dpkg_versions(black_box("1.0~rc1-1"), black_box("1.0-1")));
    });
    group.finish();
}

criterion_group!(benches, bench_rpm_version_compare, bench_dpkg_version_compare);
criterion_main!(benches);
