use std::sync::Arc;

use bookdb::filter::parse_filter;
use bookdb::{compile_query, standard_registry, HandlerRegistry, Session};
use bookdb_core::{Account, AccountType, Book, Entity, QueryExpression, Split, Transaction};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;
use time::{Date, Month};

const FILTER: &str = "amount > 100 AND memo = 'rent' AND post_date >= 2024-01-01 \
    OR NOT reconciled = true AND value <= 12.5 \
    OR description != 'transfer'";

fn registry() -> HandlerRegistry {
    standard_registry().unwrap()
}

fn seeded_book(transactions: usize) -> Book {
    let mut book = Book::new();
    let root = book.root_account().unwrap();
    let bank = book.insert(Entity::Account(Account::new("Bank", AccountType::Bank, Some(root))));
    let food = book.insert(Entity::Account(Account::new("Food", AccountType::Expense, Some(root))));
    let date = Date::from_calendar_date(2024, Month::January, 1).unwrap();
    for i in 0..transactions {
        let amount = dec!(10) + rust_decimal::Decimal::from(i as i64);
        book.insert(Entity::Transaction(Transaction::new(
            date,
            "groceries",
            vec![Split::new(food, amount), Split::new(bank, -amount)],
        )));
    }
    book
}

fn bench_parse_filter(c: &mut Criterion) {
    c.bench_function("parse_filter", |b| {
        b.iter(|| parse_filter(black_box(FILTER)).unwrap())
    });
}

fn bench_compile_generic(c: &mut Criterion) {
    let registry = registry();
    let expr = parse_filter(FILTER).unwrap();
    c.bench_function("compile_generic", |b| {
        b.iter(|| compile_query(&registry, black_box("Split"), black_box(&expr)))
    });
}

fn bench_compile_native(c: &mut Criterion) {
    let registry = registry();
    let expr = parse_filter("split.value >= 100.00n AND date >= 2024-01-01 OR num = '12'").unwrap();
    c.bench_function("compile_native", |b| {
        b.iter(|| compile_query(&registry, black_box("Trans"), black_box(&expr)))
    });
}

fn bench_sync_all(c: &mut Criterion) {
    let registry = Arc::new(registry());
    c.bench_function("sync_all_200_transactions", |b| {
        b.iter(|| {
            let mut session = Session::new(registry.clone());
            session.begin_in_memory().unwrap();
            session.attach(seeded_book(200)).unwrap();
            session.sync_all().unwrap()
        })
    });
}

fn bench_run_query(c: &mut Criterion) {
    let registry = Arc::new(registry());
    let mut session = Session::new(registry);
    session.begin_in_memory().unwrap();
    session.attach(seeded_book(200)).unwrap();
    session.sync_all().unwrap();
    let query = session.compile_query("Trans", &QueryExpression::match_all());

    c.bench_function("run_query_all_transactions", |b| {
        b.iter(|| session.run_query(black_box(&query)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parse_filter,
    bench_compile_generic,
    bench_compile_native,
    bench_sync_all,
    bench_run_query
);
criterion_main!(benches);
