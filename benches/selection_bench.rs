//! Selection and Transition Benchmarks — Hot-Path Performance
//!
//! Benchmarks the functions that run on every initiation request and
//! every status poll: bot selection over a realistic registry and the
//! transition table lookup.
//!
//! Run with: cargo bench --bench selection_bench

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pawmart_trade_orchestrator::domain::bot::{BotRegistry, TradeBot};
use pawmart_trade_orchestrator::domain::status::{FlowKind, RequestStatus};

fn fleet(size: usize) -> BotRegistry {
    BotRegistry::new(
        (0..size)
            .map(|i| {
                TradeBot::new(
                    format!("bot-{i}"),
                    format!("PawMartBot{i}"),
                    100 + i as u64,
                    "8737899170",
                    3,
                    true,
                )
            })
            .collect(),
    )
}

/// Benchmark selection over a 64-bot fleet (select + release pairs so
/// loads stay flat across iterations).
fn bench_select(c: &mut Criterion) {
    let registry = fleet(64);

    c.bench_function("registry_select_64_bots", |b| {
        b.iter(|| {
            let bot = registry.select(black_box("8737899170")).unwrap();
            registry.release(&bot.id);
        });
    });
}

/// Benchmark the transition legality check for both flows.
fn bench_transition_table(c: &mut Criterion) {
    c.bench_function("transition_legality_check", |b| {
        b.iter(|| {
            let _ = FlowKind::Trade.is_legal(
                black_box(RequestStatus::FriendRequestSent),
                black_box(RequestStatus::FriendAccepted),
            );
            let _ = FlowKind::Custody.is_legal(
                black_box(RequestStatus::FriendAccepted),
                black_box(RequestStatus::PetReceived),
            );
        });
    });
}

/// Benchmark the happy-path successor lookup used by the poller.
fn bench_successor(c: &mut Criterion) {
    c.bench_function("happy_path_successor", |b| {
        b.iter(|| {
            let _ = FlowKind::Trade.successor(black_box(RequestStatus::Trading));
        });
    });
}

criterion_group!(benches, bench_select, bench_transition_table, bench_successor);
criterion_main!(benches);
