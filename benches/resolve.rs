//! Benchmarks for version-range parsing and dependency resolution.

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use drover::catalog::{Catalog, PackageInfo, RemoteListing};
use drover::ident::{Dependency, PackageId};
use drover::solve::solve;
use drover::version::VersionRange;

fn bench_range_parsing(c: &mut Criterion) {
    c.bench_function("parse_caret_range", |b| {
        b.iter(|| VersionRange::parse(black_box("^1.4.2")).unwrap())
    });
    c.bench_function("parse_interval_range", |b| {
        b.iter(|| VersionRange::parse(black_box("[1.0.0, 2.5.0)")).unwrap())
    });
}

/// A catalog with a linear dependency chain (`pkg0` -> `pkg1` -> ...)
/// and three versions of every package.
fn chain_catalog(depth: usize) -> Catalog {
    let mut cat = Catalog::open(Path::new(":memory:")).unwrap();
    for i in 0..depth {
        for version in ["1.0.0", "1.1.0", "1.2.0"] {
            let deps = if i + 1 < depth {
                vec![Dependency::parse_depends_string(&format!("pkg{}@^1.0.0", i + 1)).unwrap()]
            } else {
                vec![]
            };
            cat.store(&PackageInfo {
                ident: PackageId::parse(&format!("pkg{i}@{version}")).unwrap(),
                deps,
                description: String::new(),
                remote: RemoteListing::Git {
                    url: "https://example.com/r.git".to_string(),
                    gitref: "main".to_string(),
                    auto_lib: None,
                },
            })
            .unwrap();
        }
    }
    cat
}

fn bench_solve_chain(c: &mut Criterion) {
    let cat = chain_catalog(20);
    let roots = vec![Dependency::parse_depends_string("pkg0@^1.0.0").unwrap()];
    c.bench_function("solve_chain_20", |b| {
        b.iter(|| solve(black_box(&roots), &cat).unwrap())
    });
}

criterion_group!(benches, bench_range_parsing, bench_solve_chain);
criterion_main!(benches);
