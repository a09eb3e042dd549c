#![allow(missing_docs)]

use binform::{
    Attr, Bind, Binform, FieldType, MemberDesc, Prim, Record, Schema, TypeDesc, Value,
};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

// --- SETUP ---

fn telemetry_schema() -> Schema {
    let mut schema = Schema::new();
    schema.register(
        TypeDesc::new("Sample")
            .member(MemberDesc::new("Id", FieldType::Prim(Prim::U32)).order(1))
            .member(MemberDesc::new("Value", FieldType::Prim(Prim::F64)).order(2)),
    );
    schema.register(
        TypeDesc::new("Telemetry")
            .member(MemberDesc::new("Count", FieldType::Prim(Prim::U16)).order(1))
            .member(
                MemberDesc::new(
                    "Samples",
                    FieldType::List(Box::new(FieldType::Record("Sample".into()))),
                )
                .order(2)
                .attr(Attr::FieldCount(Bind::to("Count"))),
            ),
    );
    schema
}

fn telemetry_record(samples: usize) -> Record {
    let items = (0..samples)
        .map(|i| {
            Value::Record(
                Record::new("Sample")
                    .with("Id", Value::UInt(i as u64))
                    .with("Value", Value::Float(i as f64 * 0.5)),
            )
        })
        .collect();
    Record::new("Telemetry").with("Samples", Value::List(items))
}

// --- BENCHES ---

fn bench_serialize(c: &mut Criterion) {
    let engine = Binform::new(telemetry_schema());
    let record = telemetry_record(1_000);
    let size = engine.serialize(&record).expect("serialize").len() as u64;

    let mut group = c.benchmark_group("serialize");
    group.throughput(Throughput::Bytes(size));
    group.bench_function("telemetry_1k", |b| {
        b.iter(|| engine.serialize(black_box(&record)).expect("serialize"))
    });
    group.finish();
}

fn bench_deserialize(c: &mut Criterion) {
    let engine = Binform::new(telemetry_schema());
    let bytes = engine
        .serialize(&telemetry_record(1_000))
        .expect("serialize");

    let mut group = c.benchmark_group("deserialize");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("telemetry_1k", |b| {
        b.iter(|| {
            engine
                .deserialize("Telemetry", black_box(&bytes))
                .expect("deserialize")
        })
    });
    group.finish();
}

criterion_group!(benches, bench_serialize, bench_deserialize);
criterion_main!(benches);
