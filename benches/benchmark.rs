use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use factum::{freeze, Fact, Value};

fn sample() -> Fact {
    Fact::builder_of("Order")
        .arg(1)
        .arg("pending")
        .field("customer", "Alice")
        .field("items", Value::list(vec![Value::from("book"), Value::from("pen")]))
        .field("address__city", "Paris")
        .field("address__zip", 75001)
        .build()
        .unwrap()
}

fn construct(c: &mut Criterion) {
    c.bench_function("construct", |b| b.iter(|| black_box(sample())));
}

fn hash(c: &mut Criterion) {
    c.bench_function("first hash", |b| {
        b.iter_batched(
            sample,
            |fact| black_box(fact.try_hash().unwrap()),
            criterion::BatchSize::SmallInput,
        )
    });
    let mut declared = sample();
    declared.set_identity(1).unwrap();
    declared.try_hash().unwrap();
    c.bench_function("cached hash", |b| b.iter(|| black_box(declared.try_hash().unwrap())));
}

fn freezing(c: &mut Criterion) {
    let nested = Value::list((0..64).map(|i| Value::dict(vec![("n", Value::list(vec![i; 4]))])));
    c.bench_function("freeze nested", |b| b.iter(|| black_box(freeze(nested.clone()))));
}

criterion_group!(benches, construct, hash, freezing);
criterion_main!(benches);
