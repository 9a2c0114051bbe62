use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tabula_datastore::{Database, InsertOptions, Record};

#[derive(serde::Serialize)]
struct TestRow {
    primary_key: i64,
    string_col: String,
    f64_col: Option<f64>,
}

fn build_test_rows(row_count: usize) -> Vec<Record> {
    (0..row_count)
        .map(|i| {
            Record::from_serialize(&TestRow {
                primary_key: i as i64,
                string_col: format!("string{}", i),
                f64_col: (i % 2 == 0).then(|| i as f64),
            })
            .unwrap()
        })
        .collect()
}

pub fn benchmarks(c: &mut Criterion) {
    // Every iteration opens a handle and writes; info and debug lines would swamp criterion's output.
    tabula_logging::log_to_stderr_at(log::LevelFilter::Warn);

    let rows = build_test_rows(5000);
    let mut group = c.benchmark_group("inserting");
    group.throughput(Throughput::Elements(rows.len() as u64));

    for batch_size in [1, 10, 50, 100, 500] {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, batch_size| {
                let db = Database::open_in_memory().unwrap();
                let opts = InsertOptions {
                    batch_size: Some(*batch_size),
                    ..InsertOptions::with_pk("primary_key")
                };

                b.iter(|| {
                    let mut t = db.table("t").unwrap();
                    t.upsert_all(&rows[..], &opts).unwrap();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
