//! Throughput of the C3 fill path (§4.3.1): place → confirm → fill, the
//! hot loop every trade callback drives for a live book.

use arb_core::core::types::{HitType, OrderId, OrderType, Side};
use arb_core::prelude::{OrderPriceMap, OrderStats};
use arb_core::PerLegBook;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;

fn place_and_confirm(book: &mut PerLegBook, side: Side, price: rust_decimal::Decimal) -> OrderId {
    let id = OrderId::generate();
    let order = OrderStats::new(id, side, price, 10, OrderType::Limit, HitType::Standard);
    book.place_order(order).expect("fresh id/price never collide");
    book.confirm_new(id);
    id
}

fn bench_apply_fill(c: &mut Criterion) {
    c.bench_function("leg_book/apply_fill_full", |b| {
        b.iter_batched(
            || {
                let mut book = PerLegBook::new();
                let id = place_and_confirm(&mut book, Side::Buy, dec!(100.25));
                (book, id)
            },
            |(mut book, id)| {
                book.apply_fill(black_box(id), black_box(10), black_box(dec!(100.25)))
                    .expect("fresh order accepts a full fill");
                black_box(book)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_partial_fill_sequence(c: &mut Criterion) {
    c.bench_function("leg_book/apply_fill_partial_sequence", |b| {
        b.iter_batched(
            || {
                let mut book = PerLegBook::new();
                let id = OrderId::generate();
                let order =
                    OrderStats::new(id, Side::Buy, dec!(100.25), 100, OrderType::Limit, HitType::Standard);
                book.place_order(order).unwrap();
                book.confirm_new(id);
                (book, id)
            },
            |(mut book, id)| {
                for _ in 0..10 {
                    book.apply_fill(black_box(id), black_box(10), black_box(dec!(100.25)))
                        .expect("cumulative fills stay within order qty");
                }
                black_box(book)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_order_price_map_churn(c: &mut Criterion) {
    c.bench_function("order_book/add_remove_churn", |b| {
        b.iter_batched(
            OrderPriceMap::new,
            |mut map| {
                let id = OrderId::generate();
                let order =
                    OrderStats::new(id, Side::Sell, dec!(101.0), 5, OrderType::Limit, HitType::Standard);
                map.add(black_box(order)).unwrap();
                black_box(map.remove_by_id(black_box(id)))
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_apply_fill,
    bench_partial_fill_sequence,
    bench_order_price_map_churn
);
criterion_main!(benches);
