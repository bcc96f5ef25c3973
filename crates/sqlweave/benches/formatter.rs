use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use sqlweave::{Condition, Entity, Expr, Field, FieldType, Grouping, Record, SqlFormatter, query};
use std::sync::Arc;

fn wide_entity(n: usize) -> Arc<Entity> {
    let mut builder = Entity::builder("Wide")
        .table("wide")
        .field(Field::new("id", FieldType::Integer).primary());
    for i in 0..n {
        builder = builder.field(Field::new(format!("col{i}"), FieldType::Text));
    }
    builder.build().unwrap()
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatter/select");

    for n in [1, 5, 10, 50] {
        let entity = wide_entity(n);
        let mut q = query(&entity).limit(10).order_by("id");
        for i in 0..n {
            q = q.and_where(Condition::equal_to(format!("col{i}"), format!("v{i}")));
        }
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(q.to_statement().unwrap()));
        });
    }

    group.finish();
}

fn bench_nested_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatter/nested_where");
    let entity = wide_entity(4);

    for depth in [1, 4, 16] {
        let mut grouping = Grouping::and([Condition::equal_to("col0", "x")]);
        for i in 0..depth {
            grouping = Grouping::or([
                Expr::from(grouping),
                Expr::from(Condition::is_in("id", vec![i, i + 1, i + 2])),
            ]);
        }
        let q = query(&entity).and_where(grouping);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &q, |b, q| {
            b.iter(|| black_box(q.to_statement().unwrap()));
        });
    }

    group.finish();
}

fn bench_insert_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatter/insert_batches");
    let entity = wide_entity(4);

    for rows in [10, 100, 1000] {
        let records: Vec<Record> = (0..rows)
            .map(|i| {
                json!({"id": i, "col0": "a", "col1": "b", "col2": "c", "col3": "d"})
                    .as_object()
                    .unwrap()
                    .clone()
            })
            .collect();
        let q = query(&entity).batch_size(100);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &records, |b, records| {
            b.iter(|| {
                let formatter = SqlFormatter::new(&q).unwrap();
                black_box(formatter.format_inserts(records).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select, bench_nested_where, bench_insert_batches);
criterion_main!(benches);
