//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that the state machine, the backoff
//! schedule and bot selection maintain their invariants across random
//! inputs.

use std::time::Duration;

use proptest::prelude::*;

use pawmart_trade_orchestrator::domain::backoff::{BackoffPolicy, BackoffSchedule};
use pawmart_trade_orchestrator::domain::bot::{BotRegistry, TradeBot};
use pawmart_trade_orchestrator::domain::status::{FlowKind, RequestStatus};

fn any_flow() -> impl Strategy<Value = FlowKind> {
    prop_oneof![Just(FlowKind::Trade), Just(FlowKind::Custody)]
}

fn any_status() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        Just(RequestStatus::Pending),
        Just(RequestStatus::FriendRequestSent),
        Just(RequestStatus::FriendAccepted),
        Just(RequestStatus::Trading),
        Just(RequestStatus::Completed),
        Just(RequestStatus::PetReceived),
        Just(RequestStatus::CustodyComplete),
        Just(RequestStatus::Failed),
    ]
}

// ── State Machine Properties ────────────────────────────────

proptest! {
    /// Every legal transition strictly increases status rank.
    #[test]
    fn legal_transitions_increase_rank(
        flow in any_flow(),
        from in any_status(),
        to in any_status(),
    ) {
        if flow.is_legal(from, to) {
            prop_assert!(
                to.rank() > from.rank(),
                "{flow}: {from} -> {to} legal but rank did not increase"
            );
        }
    }

    /// Terminal statuses accept no transitions at all.
    #[test]
    fn terminal_statuses_are_absorbing(
        flow in any_flow(),
        from in any_status(),
        to in any_status(),
    ) {
        if from.is_terminal() {
            prop_assert!(!flow.is_legal(from, to));
        }
    }

    /// `Failed` is reachable from every non-terminal status.
    #[test]
    fn failure_reachable_from_any_active_status(
        flow in any_flow(),
        from in any_status(),
    ) {
        if !from.is_terminal() {
            prop_assert!(flow.is_legal(from, RequestStatus::Failed));
        }
    }

    /// A status has at most one legal happy-path successor.
    #[test]
    fn at_most_one_happy_path_successor(
        flow in any_flow(),
        from in any_status(),
    ) {
        let successors = [
            RequestStatus::Pending,
            RequestStatus::FriendRequestSent,
            RequestStatus::FriendAccepted,
            RequestStatus::Trading,
            RequestStatus::Completed,
            RequestStatus::PetReceived,
            RequestStatus::CustodyComplete,
        ]
        .into_iter()
        .filter(|to| flow.is_legal(from, *to))
        .count();
        prop_assert!(successors <= 1);
    }
}

// ── Backoff Properties ──────────────────────────────────────

proptest! {
    /// Every delay respects the cap and stays above half its base.
    #[test]
    fn backoff_delays_bounded(
        initial_ms in 1u64..5_000,
        cap_ms in 5_000u64..120_000,
        attempts in 1usize..30,
    ) {
        let policy = BackoffPolicy {
            initial: Duration::from_millis(initial_ms),
            cap: Duration::from_millis(cap_ms),
            max_elapsed: Duration::from_secs(3600),
        };
        let mut schedule = BackoffSchedule::new(policy);
        for attempt in 0..attempts {
            let base = policy.base_delay(attempt as u32);
            let delay = schedule.next_delay().unwrap();
            prop_assert!(delay <= policy.cap);
            prop_assert!(delay <= base);
            prop_assert!(delay >= base / 2);
        }
    }

    /// The base sequence is non-decreasing up to the cap.
    #[test]
    fn backoff_base_sequence_monotone(
        initial_ms in 1u64..5_000,
        cap_ms in 5_000u64..120_000,
    ) {
        let policy = BackoffPolicy {
            initial: Duration::from_millis(initial_ms),
            cap: Duration::from_millis(cap_ms),
            max_elapsed: Duration::from_secs(3600),
        };
        let mut previous = Duration::ZERO;
        for attempt in 0..40u32 {
            let base = policy.base_delay(attempt);
            prop_assert!(base >= previous);
            previous = base;
        }
    }

    /// An exhausted budget never yields another delay.
    #[test]
    fn backoff_zero_budget_terminates(initial_ms in 1u64..5_000) {
        let policy = BackoffPolicy {
            initial: Duration::from_millis(initial_ms),
            cap: Duration::from_millis(initial_ms * 10),
            max_elapsed: Duration::ZERO,
        };
        let mut schedule = BackoffSchedule::new(policy);
        prop_assert!(schedule.next_delay().is_none());
    }
}

// ── Bot Selection Properties ────────────────────────────────

proptest! {
    /// Selection always takes an eligible bot with the minimum load,
    /// never exceeds capacity, and drains the pool completely.
    #[test]
    fn selection_picks_min_load_eligible(
        bot_count in 1usize..8,
        capacity in 1u32..5,
    ) {
        let bots: Vec<TradeBot> = (0..bot_count)
            .map(|i| {
                TradeBot::new(
                    format!("bot-{i}"),
                    format!("PawMartBot{i}"),
                    100 + i as u64,
                    "8737899170",
                    capacity,
                    true,
                )
            })
            .collect();
        let registry = BotRegistry::new(bots);

        let total_capacity = capacity * bot_count as u32;
        let mut selections = 0u32;
        loop {
            let min_eligible = registry
                .load_snapshot()
                .into_iter()
                .filter(|(_, load, cap)| load < cap)
                .map(|(_, load, _)| load)
                .min();
            match registry.select("8737899170") {
                Some(bot) => {
                    selections += 1;
                    prop_assert_eq!(Some(bot.load() - 1), min_eligible);
                    prop_assert!(bot.load() <= bot.capacity());
                }
                None => {
                    prop_assert!(min_eligible.is_none());
                    break;
                }
            }
            prop_assert!(selections <= total_capacity);
        }
        prop_assert_eq!(selections, total_capacity);
    }

    /// No bot is ever selected for a game it does not serve.
    #[test]
    fn selection_respects_game_id(game in "[0-9]{4,12}") {
        let registry = BotRegistry::new(vec![TradeBot::new(
            "bot-a",
            "PawMartBotA",
            101,
            "8737899170",
            3,
            true,
        )]);
        let selected = registry.select(&game);
        if game == "8737899170" {
            prop_assert!(selected.is_some());
        } else {
            prop_assert!(selected.is_none());
        }
    }
}
