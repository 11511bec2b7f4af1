//! Benchmarks for the PyPI adapter's hot paths: PEP 508 requirement
//! parsing, PEP 440 specifier matching, and wheel/sdist artifact selection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use depssmuggler_core::TargetPlatform;
use depssmuggler_pip::types::{select_artifact, ReleaseDigests, ReleaseFile};
use pep508_rs::Requirement;
use std::str::FromStr;

fn bench_pep508_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("pep508_parsing");

    let requirements = [
        ("simple", "requests>=2.28.0"),
        ("with_extras", "flask[async]>=3.0.0"),
        ("complex_version", "django>=4.0,<5.0,!=4.0.1"),
    ];

    for (name, req_str) in requirements {
        group.bench_with_input(BenchmarkId::from_parameter(name), &req_str, |b, req_str| {
            b.iter(|| {
                let _: Result<Requirement, _> = Requirement::from_str(black_box(req_str));
            });
        });
    }

    group.finish();
}

fn bench_pep440_version_matching(c: &mut Criterion) {
    use pep440_rs::{Version, VersionSpecifiers};

    let mut group = c.benchmark_group("pep440_version_matching");

    let latest = Version::from_str("2.28.2").unwrap();
    let simple = VersionSpecifiers::from_str(">=2.28.0").unwrap();
    group.bench_function("simple_specifier", |b| b.iter(|| simple.contains(black_box(&latest))));

    let complex = VersionSpecifiers::from_str(">=2.0,<3.0,!=2.28.1").unwrap();
    group.bench_function("complex_specifier", |b| b.iter(|| complex.contains(black_box(&latest))));

    let versions: Vec<Version> = ["2.0.0", "2.28.0", "2.28.1", "2.28.2", "2.29.0"]
        .iter()
        .map(|v| Version::from_str(v).unwrap())
        .collect();

    group.bench_function("find_latest_matching", |b| {
        b.iter(|| versions.iter().filter(|v| simple.contains(v)).max().cloned())
    });

    group.finish();
}

fn release_file(packagetype: &str, filename: &str) -> ReleaseFile {
    ReleaseFile {
        filename: filename.to_string(),
        url: format!("https://files.pythonhosted.org/packages/{filename}"),
        packagetype: packagetype.to_string(),
        size: Some(1024),
        digests: ReleaseDigests {
            sha256: Some("abc".to_string()),
            md5: None,
        },
        yanked: false,
    }
}

fn bench_artifact_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("artifact_selection");

    let files = vec![
        release_file("sdist", "numpy-1.26.0.tar.gz"),
        release_file("bdist_wheel", "numpy-1.26.0-cp39-cp39-manylinux_2_17_x86_64.whl"),
        release_file("bdist_wheel", "numpy-1.26.0-cp310-cp310-manylinux_2_17_x86_64.whl"),
        release_file("bdist_wheel", "numpy-1.26.0-cp311-cp311-manylinux_2_17_x86_64.whl"),
        release_file("bdist_wheel", "numpy-1.26.0-cp310-cp310-win_amd64.whl"),
        release_file("bdist_wheel", "numpy-1.26.0-cp310-cp310-macosx_11_0_arm64.whl"),
    ];

    let target = TargetPlatform {
        os: Some("linux".into()),
        arch: Some("x86_64".into()),
        python_version: Some("3.10".into()),
    };

    group.bench_function("select_among_six_candidates", |b| {
        b.iter(|| select_artifact(black_box(&files), black_box(&target)))
    });

    let universal = vec![release_file("bdist_wheel", "six-1.16.0-py2.py3-none-any.whl")];
    group.bench_function("select_universal_wheel", |b| {
        b.iter(|| select_artifact(black_box(&universal), black_box(&target)))
    });

    group.finish();
}

criterion_group!(benches, bench_pep508_parsing, bench_pep440_version_matching, bench_artifact_selection);
criterion_main!(benches);
