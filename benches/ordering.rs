//! Benchmarks for version parsing and migration ordering.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use stratum::migrate::{MigrationKind, MigrationVersion, ResolvedMigration, sort_resolved};

/// Create `count` migrations in reverse order, with a repeatable every tenth.
fn create_migrations(count: usize) -> Vec<ResolvedMigration> {
    (0..count)
        .rev()
        .map(|i| {
            if i % 10 == 0 {
                ResolvedMigration::new(None, "view", format!("R__view_{i}.sql"), Some(i as i32), MigrationKind::SQL)
            } else {
                let version = MigrationVersion::parse(&format!("{}.{}.{}", i / 100, (i / 10) % 10, i % 10)).ok();
                ResolvedMigration::new(version, "step", format!("V{i}__step.sql"), Some(i as i32), MigrationKind::SQL)
            }
        })
        .collect()
}

/// Benchmark version parsing.
fn bench_version_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_parse");

    group.bench_function("simple", |b| b.iter(|| black_box(MigrationVersion::parse("42"))));

    group.bench_function("dotted", |b| b.iter(|| black_box(MigrationVersion::parse("2024.01.15.3"))));

    group.bench_function("underscored", |b| b.iter(|| black_box(MigrationVersion::parse("1_2_3_rc1"))));

    group.finish();
}

/// Benchmark version comparison.
fn bench_version_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_compare");

    let base = MigrationVersion::parse("1.2.10").ok();
    let numeric = MigrationVersion::parse("1.2.9.0").ok();
    group.bench_function("numeric", |b| b.iter(|| black_box(base.cmp(&numeric))));

    let text = MigrationVersion::parse("1.2.beta").ok();
    group.bench_function("mixed", |b| b.iter(|| black_box(base.cmp(&text))));

    group.finish();
}

/// Benchmark sorting discovered migrations into canonical order.
fn bench_sort_resolved(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_resolved");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        let migrations = create_migrations(*size);
        group.bench_with_input(BenchmarkId::new("migrations", size), &migrations, |b, migrations| {
            b.iter(|| {
                let mut sorted = migrations.clone();
                sort_resolved(&mut sorted);
                black_box(sorted)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_version_parse, bench_version_compare, bench_sort_resolved);

criterion_main!(benches);
