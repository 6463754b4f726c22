//! Bot registry and least-loaded selection.
//!
//! The registry is built once from configuration and never changes shape
//! at runtime; only the per-bot load counters move. Loads are guarded by
//! compare-and-swap so a bot can never be driven past its capacity, and
//! release saturates at zero so a double release cannot underflow.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::domain::request::TradeRequest;

/// A bot account on the external platform, serving one game.
#[derive(Debug)]
pub struct TradeBot {
    /// Registry identifier, referenced by requests.
    pub id: String,
    /// Platform username the counterparty sees.
    pub username: String,
    /// Platform numeric user ID, used for friendship lookups.
    pub user_id: u64,
    /// Game (universe) this bot operates in.
    pub game_id: String,
    /// Offline bots are never selected.
    pub online: bool,
    /// Maximum concurrent requests this bot may hold.
    capacity: u32,
    /// Requests currently assigned.
    load: AtomicU32,
}

impl TradeBot {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        user_id: u64,
        game_id: impl Into<String>,
        capacity: u32,
        online: bool,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            user_id,
            game_id: game_id.into(),
            online,
            capacity,
            load: AtomicU32::new(0),
        }
    }

    /// Current number of assigned requests.
    pub fn load(&self) -> u32 {
        self.load.load(Ordering::Acquire)
    }

    /// Maximum concurrent requests.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take one slot. Fails when offline or at capacity.
    fn try_acquire(&self) -> bool {
        if !self.online {
            return false;
        }
        self.load
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |load| {
                (load < self.capacity).then_some(load + 1)
            })
            .is_ok()
    }

    /// Return one slot. Saturates at zero.
    fn release(&self) {
        let _ = self
            .load
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |load| {
                load.checked_sub(1)
            });
    }

    fn reset_load(&self) {
        self.load.store(0, Ordering::Release);
    }
}

/// Static list of bots per game, selected greedily by least load.
pub struct BotRegistry {
    bots: Vec<Arc<TradeBot>>,
}

impl BotRegistry {
    pub fn new(bots: Vec<TradeBot>) -> Self {
        Self {
            bots: bots.into_iter().map(Arc::new).collect(),
        }
    }

    /// Select and acquire the least-loaded eligible bot for a game.
    ///
    /// Eligible means online and under capacity. Ties break by registry
    /// order. Returns `None` when no bot qualifies; the caller maps this
    /// to an unavailability response and creates no request.
    pub fn select(&self, game_id: &str) -> Option<Arc<TradeBot>> {
        let mut candidates: Vec<&Arc<TradeBot>> = self
            .bots
            .iter()
            .filter(|b| b.game_id == game_id && b.online && b.load() < b.capacity)
            .collect();
        candidates.sort_by_key(|b| b.load());

        // The load may move between the snapshot and the acquire, so walk
        // the sorted list until a CAS lands.
        candidates
            .into_iter()
            .find(|bot| bot.try_acquire())
            .cloned()
    }

    /// Look up a bot by registry ID.
    pub fn get(&self, bot_id: &str) -> Option<Arc<TradeBot>> {
        self.bots.iter().find(|b| b.id == bot_id).cloned()
    }

    /// Return the slot held by a request's bot.
    pub fn release(&self, bot_id: &str) {
        if let Some(bot) = self.get(bot_id) {
            bot.release();
        }
    }

    /// Rebuild load counters from the set of active requests.
    ///
    /// Called after journal replay so a crash can never strand a counter:
    /// the requests are the source of truth, not the counters.
    pub fn reconcile(&self, active: &[TradeRequest]) {
        for bot in &self.bots {
            bot.reset_load();
        }
        for request in active {
            if let Some(bot) = self.get(&request.bot_id) {
                bot.load.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// (bot id, load, capacity) rows for metrics export.
    pub fn load_snapshot(&self) -> Vec<(String, u32, u32)> {
        self.bots
            .iter()
            .map(|b| (b.id.clone(), b.load(), b.capacity))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BotRegistry {
        BotRegistry::new(vec![
            TradeBot::new("bot-a", "PawMartBotA", 101, "8737899170", 2, true),
            TradeBot::new("bot-b", "PawMartBotB", 102, "8737899170", 2, true),
            TradeBot::new("bot-c", "PawMartBotC", 103, "920587237", 2, true),
        ])
    }

    #[test]
    fn test_select_prefers_registry_order_on_tie() {
        let reg = registry();
        let bot = reg.select("8737899170").unwrap();
        assert_eq!(bot.id, "bot-a");
    }

    #[test]
    fn test_select_prefers_least_loaded() {
        let reg = registry();
        let first = reg.select("8737899170").unwrap();
        assert_eq!(first.id, "bot-a");
        let second = reg.select("8737899170").unwrap();
        assert_eq!(second.id, "bot-b");
    }

    #[test]
    fn test_select_exhausts_capacity() {
        let reg = registry();
        for _ in 0..4 {
            assert!(reg.select("8737899170").is_some());
        }
        assert!(reg.select("8737899170").is_none());
    }

    #[test]
    fn test_select_unknown_game() {
        let reg = registry();
        assert!(reg.select("000000").is_none());
    }

    #[test]
    fn test_offline_bot_never_selected() {
        let reg = BotRegistry::new(vec![TradeBot::new(
            "bot-off",
            "PawMartBotOff",
            104,
            "8737899170",
            5,
            false,
        )]);
        assert!(reg.select("8737899170").is_none());
    }

    #[test]
    fn test_release_saturates_at_zero() {
        let reg = registry();
        reg.release("bot-a");
        let bot = reg.get("bot-a").unwrap();
        assert_eq!(bot.load(), 0);
    }

    #[test]
    fn test_reconcile_recomputes_loads() {
        let reg = registry();
        reg.select("8737899170").unwrap();
        reg.select("8737899170").unwrap();

        let mut req = TradeRequest::new_trade(
            "8737899170",
            "buyer1",
            "seller1",
            "lst_1",
            "bot-b",
            chrono::Duration::minutes(10),
        );
        reg.reconcile(std::slice::from_ref(&req));
        assert_eq!(reg.get("bot-a").unwrap().load(), 0);
        assert_eq!(reg.get("bot-b").unwrap().load(), 1);

        req.fail("test");
        reg.reconcile(&[]);
        assert_eq!(reg.get("bot-b").unwrap().load(), 0);
    }
}
