//! Benchmarks for paged message views
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use framelog::config::ViewConfig;
use framelog::store::{opcode, Criteria, Direction, MessageStore, NewMessage, SqliteStore};
use framelog::view::{Column, MessagesView};
use std::sync::Arc;
use tempfile::tempdir;

fn populate(store: &SqliteStore, count: u32) {
    for i in 0..count {
        let direction = if i % 2 == 0 {
            Direction::Outgoing
        } else {
            Direction::Incoming
        };
        let op = if i % 5 == 0 { opcode::PING } else { opcode::TEXT };
        store
            .append(NewMessage::text(i % 4 + 1, direction, "x".repeat(300)).opcode(op))
            .unwrap();
    }
}

fn bench_sequential_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_scan");
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    populate(&store, 5000);

    for page_size in [25usize, 50, 200] {
        group.throughput(Throughput::Elements(1000));
        group.bench_function(format!("page_{}", page_size), |b| {
            b.iter(|| {
                let config = ViewConfig {
                    page_size,
                    ..ViewConfig::default()
                };
                let view = MessagesView::new(store.clone(), Criteria::all(), config);
                for i in 0..1000 {
                    black_box(view.value_at(i, Column::Payload));
                }
            })
        });
    }

    group.finish();
}

fn bench_filtered_count(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("bench.db")).unwrap());
    populate(&store, 5000);

    c.bench_function("filtered_count", |b| {
        let view = MessagesView::new(
            store.clone(),
            Criteria::all().channel(2).opcode(opcode::TEXT),
            ViewConfig::default(),
        );
        b.iter(|| {
            view.clear_full_cache();
            view.set_scope(Some(2));
            black_box(view.row_count())
        })
    });
}

fn bench_arrivals(c: &mut Criterion) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    populate(&store, 1000);
    let view = MessagesView::new(store.clone(), Criteria::all(), ViewConfig::default());
    let message = NewMessage::text(1, Direction::Incoming, "tick").into_message(1);

    c.bench_function("message_arrived", |b| {
        b.iter(|| view.message_arrived(black_box(&message)))
    });
}

criterion_group!(benches, bench_sequential_scan, bench_filtered_count, bench_arrivals);
criterion_main!(benches);
