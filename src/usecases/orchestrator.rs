//! Trade/Custody Orchestrator - Request Lifecycle Ownership
//!
//! Owns every status transition of every request:
//! - Initiation: bot selection, journaling, watcher spawn
//! - Friendship confirmation: authoritative platform polls on a jittered
//!   backoff schedule, never simulated timers
//! - Explicit notifications: join-server, trade execution, pet receipt
//! - Deadline enforcement: watcher + sweeper, failing exactly once
//!
//! Transitions are serialized through a single lock so racing paths
//! (watcher vs. sweeper vs. API) observe consistent state.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::metrics::MetricsRegistry;
use crate::config::OrchestratorConfig;
use crate::domain::backoff::{BackoffPolicy, BackoffSchedule};
use crate::domain::bot::BotRegistry;
use crate::domain::request::{StatusView, TradeRequest, TransitionError};
use crate::domain::status::{FlowKind, RequestStatus};
use crate::ports::social::{FriendshipState, PlatformUser, SocialPlatform};
use crate::ports::store::RequestStore;

/// Failure modes surfaced to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// No online, under-capacity bot for the game. Maps to 503.
    #[error("no bot available for game {game_id}")]
    BotsUnavailable { game_id: String },

    /// Request ID unknown in this flow namespace. Maps to 404.
    #[error("unknown {flow} request {id}")]
    UnknownRequest { flow: FlowKind, id: Uuid },

    /// Transition table rejected the move. Maps to 409.
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    /// Friend request resend outside the sendable window. Maps to 409.
    #[error("friend request cannot be re-sent while the request is {0}")]
    ResendNotAllowed(RequestStatus),

    /// Platform call failed after retries. Maps to 502.
    #[error("platform call failed: {0}")]
    Social(#[source] anyhow::Error),

    /// Journal write or read failed. Maps to 500.
    #[error("storage failure: {0}")]
    Store(#[source] anyhow::Error),
}

/// Orchestrates trade and custody requests over the port traits.
pub struct Orchestrator<S: SocialPlatform, R: RequestStore> {
    /// External platform port.
    social: Arc<S>,
    /// Durable request store port.
    store: Arc<R>,
    /// Static bot registry.
    registry: Arc<BotRegistry>,
    /// Service metrics.
    metrics: Arc<MetricsRegistry>,
    /// Friendship confirmation budget.
    confirmation_ttl: chrono::Duration,
    /// Backoff parameters for friendship polls.
    poll_policy: BackoffPolicy,
    /// Expiry sweep cadence.
    sweep_interval: StdDuration,
    /// Serializes status transitions across watchers, sweeper and API.
    transition_lock: Mutex<()>,
    /// Watchers subscribe for graceful shutdown.
    shutdown_tx: broadcast::Sender<()>,
}

impl<S: SocialPlatform, R: RequestStore> Orchestrator<S, R> {
    pub fn new(
        social: Arc<S>,
        store: Arc<R>,
        registry: Arc<BotRegistry>,
        metrics: Arc<MetricsRegistry>,
        config: &OrchestratorConfig,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let confirmation = StdDuration::from_secs(config.confirmation_timeout_secs);
        Self {
            social,
            store,
            registry,
            metrics,
            confirmation_ttl: chrono::Duration::from_std(confirmation)
                .unwrap_or_else(|_| chrono::Duration::seconds(600)),
            poll_policy: BackoffPolicy {
                initial: StdDuration::from_millis(config.poll_initial_delay_ms),
                cap: StdDuration::from_secs(config.poll_max_delay_secs),
                max_elapsed: confirmation,
            },
            sweep_interval: StdDuration::from_secs(config.sweep_interval_secs),
            transition_lock: Mutex::new(()),
            shutdown_tx,
        }
    }

    // ── Initiation ──────────────────────────────────────────

    /// Initiate a buyer-purchase trade request.
    #[instrument(skip(self), fields(game_id, buyer, seller))]
    pub async fn initiate_trade(
        self: Arc<Self>,
        game_id: &str,
        buyer: &str,
        seller: &str,
        listing_id: &str,
    ) -> Result<TradeRequest, OrchestratorError> {
        let bot = self.acquire_bot(game_id)?;
        let request = TradeRequest::new_trade(
            game_id,
            buyer,
            seller,
            listing_id,
            bot.id.clone(),
            self.confirmation_ttl,
        );
        self.admit(request).await
    }

    /// Initiate a seller-deposit custody request.
    #[instrument(skip(self), fields(game_id, seller))]
    pub async fn initiate_custody(
        self: Arc<Self>,
        game_id: &str,
        seller: &str,
        listing_id: &str,
    ) -> Result<TradeRequest, OrchestratorError> {
        let bot = self.acquire_bot(game_id)?;
        let request = TradeRequest::new_custody(
            game_id,
            seller,
            listing_id,
            bot.id.clone(),
            self.confirmation_ttl,
        );
        self.admit(request).await
    }

    /// Registry access for response enrichment (bot usernames).
    pub fn registry(&self) -> &BotRegistry {
        &self.registry
    }

    fn acquire_bot(
        &self,
        game_id: &str,
    ) -> Result<Arc<crate::domain::bot::TradeBot>, OrchestratorError> {
        self.registry
            .select(game_id)
            .ok_or_else(|| OrchestratorError::BotsUnavailable {
                game_id: game_id.to_string(),
            })
    }

    /// Journal the new request and start its confirmation watcher.
    ///
    /// The bot slot was already acquired; a failed journal write returns
    /// it before surfacing the error, so no slot leaks.
    async fn admit(
        self: Arc<Self>,
        request: TradeRequest,
    ) -> Result<TradeRequest, OrchestratorError> {
        if let Err(e) = self.store.insert(&request).await {
            self.registry.release(&request.bot_id);
            return Err(OrchestratorError::Store(e));
        }

        let flow = request.flow.to_string();
        self.metrics
            .requests_initiated
            .with_label_values(&[&flow])
            .inc();

        info!(
            request_id = %request.id,
            flow = %request.flow,
            bot = %request.bot_id,
            counterparty = %request.counterparty(),
            "Request admitted"
        );

        Self::spawn_confirmation_watcher(Arc::clone(&self), &request);
        Ok(request)
    }

    // ── Status queries ──────────────────────────────────────

    /// Status view for polling clients. Flow mismatch reads as unknown
    /// so the two endpoint namespaces stay disjoint.
    pub async fn status(
        &self,
        flow: FlowKind,
        id: Uuid,
    ) -> Result<StatusView, OrchestratorError> {
        Ok(self.must_get(flow, id).await?.view())
    }

    // ── Explicit notifications ──────────────────────────────

    /// Re-dispatch the platform friend request for a trade.
    ///
    /// Legal only before acceptance. Advances `Pending` to
    /// `FriendRequestSent` when the first dispatch had not landed yet.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn resend_friend_request(
        &self,
        id: Uuid,
    ) -> Result<StatusView, OrchestratorError> {
        let request = self.must_get(FlowKind::Trade, id).await?;
        if request.status.rank() > RequestStatus::FriendRequestSent.rank() {
            return Err(OrchestratorError::ResendNotAllowed(request.status));
        }

        let bot = self
            .registry
            .get(&request.bot_id)
            .ok_or_else(|| OrchestratorError::UnknownRequest { flow: request.flow, id })?;
        let user = self
            .social
            .resolve_user(request.counterparty())
            .await
            .map_err(OrchestratorError::Social)?;
        self.social
            .send_friend_request(bot.user_id, user.user_id)
            .await
            .map_err(OrchestratorError::Social)?;

        info!(bot = %bot.username, target = %user.username, "Friend request re-sent");

        if request.status == RequestStatus::Pending {
            match self
                .apply_transition(FlowKind::Trade, id, RequestStatus::FriendRequestSent)
                .await
            {
                Ok(updated) => return Ok(updated.view()),
                // The confirmation watcher can win this race; the fresh
                // view below reflects whatever it applied.
                Err(OrchestratorError::IllegalTransition(_)) => {}
                Err(e) => return Err(e),
            }
            return Ok(self.must_get(FlowKind::Trade, id).await?.view());
        }
        Ok(request.view())
    }

    /// Join-server notification: both parties are in-game.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn notify_joined(&self, id: Uuid) -> Result<StatusView, OrchestratorError> {
        let updated = self
            .apply_transition(FlowKind::Trade, id, RequestStatus::Trading)
            .await?;
        Ok(updated.view())
    }

    /// Trade executed in-game; the request completes and the bot frees up.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn execute_trade(&self, id: Uuid) -> Result<StatusView, OrchestratorError> {
        let updated = self
            .apply_transition(FlowKind::Trade, id, RequestStatus::Completed)
            .await?;
        Ok(updated.view())
    }

    /// Pet receipt confirmation from the bot controller.
    ///
    /// Passes through `PetReceived` (journaled) and settles at
    /// `CustodyComplete`, releasing the bot.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn confirm_pet_received(
        &self,
        id: Uuid,
    ) -> Result<StatusView, OrchestratorError> {
        self.apply_transition(FlowKind::Custody, id, RequestStatus::PetReceived)
            .await?;
        let updated = self
            .apply_transition(FlowKind::Custody, id, RequestStatus::CustodyComplete)
            .await?;
        Ok(updated.view())
    }

    // ── Transition plumbing ─────────────────────────────────

    async fn must_get(
        &self,
        flow: FlowKind,
        id: Uuid,
    ) -> Result<TradeRequest, OrchestratorError> {
        self.store
            .get(id)
            .await
            .map_err(OrchestratorError::Store)?
            .filter(|r| r.flow == flow)
            .ok_or(OrchestratorError::UnknownRequest { flow, id })
    }

    /// Apply one happy-path transition under the transition lock.
    async fn apply_transition(
        &self,
        flow: FlowKind,
        id: Uuid,
        to: RequestStatus,
    ) -> Result<TradeRequest, OrchestratorError> {
        let _guard = self.transition_lock.lock().await;

        let mut request = self.must_get(flow, id).await?;
        request.advance(to)?;
        self.store
            .update(&request)
            .await
            .map_err(OrchestratorError::Store)?;

        self.metrics
            .transitions_total
            .with_label_values(&[&flow.to_string(), to.as_str()])
            .inc();
        if to.is_terminal() {
            self.registry.release(&request.bot_id);
        }

        debug!(request_id = %id, status = %to, "Transition applied");
        Ok(request)
    }

    /// Fail a request with a reason, exactly once.
    ///
    /// Returns `Ok(false)` when the request is unknown or already
    /// terminal, so the watcher and the sweeper can race safely.
    pub async fn fail_request(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<bool, OrchestratorError> {
        let _guard = self.transition_lock.lock().await;

        let Some(mut request) = self
            .store
            .get(id)
            .await
            .map_err(OrchestratorError::Store)?
        else {
            return Ok(false);
        };
        if !request.fail(reason) {
            return Ok(false);
        }
        self.store
            .update(&request)
            .await
            .map_err(OrchestratorError::Store)?;
        self.registry.release(&request.bot_id);

        let flow = request.flow.to_string();
        self.metrics
            .transitions_total
            .with_label_values(&[&flow, RequestStatus::Failed.as_str()])
            .inc();
        self.metrics
            .failures_total
            .with_label_values(&[&flow, reason])
            .inc();

        warn!(request_id = %id, reason, "Request failed");
        Ok(true)
    }

    // ── Confirmation watcher ────────────────────────────────

    /// Spawn the per-request friendship confirmation task.
    fn spawn_confirmation_watcher(orchestrator: Arc<Self>, request: &TradeRequest) {
        let id = request.id;
        let mut shutdown_rx = orchestrator.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(request_id = %id, "Watcher stopped by shutdown");
                }
                result = orchestrator.confirm_friendship(id) => {
                    if let Err(e) = result {
                        warn!(request_id = %id, error = %e, "Watcher ended with error");
                    }
                }
            }
        });
    }

    /// Drive a request from `Pending` to `FriendAccepted`.
    ///
    /// Each round: resolve the counterparty, dispatch the friend request
    /// if not yet sent, then poll the authoritative friendship endpoint.
    /// Transient platform errors are logged and retried on the schedule;
    /// only the deadline fails the request, exactly once.
    async fn confirm_friendship(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let Some(initial) = self
            .store
            .get(id)
            .await
            .map_err(OrchestratorError::Store)?
        else {
            return Ok(());
        };
        let Some(bot) = self.registry.get(&initial.bot_id) else {
            warn!(request_id = %id, bot = %initial.bot_id, "Assigned bot missing from registry");
            self.fail_request(id, "bot missing from registry").await?;
            return Ok(());
        };

        let mut schedule = BackoffSchedule::new(self.poll_policy);
        let mut counterparty: Option<PlatformUser> = None;

        loop {
            let Some(request) = self
                .store
                .get(id)
                .await
                .map_err(OrchestratorError::Store)?
            else {
                return Ok(());
            };
            if !request.is_active()
                || request.status.rank() >= RequestStatus::FriendAccepted.rank()
            {
                return Ok(());
            }
            if Utc::now() >= request.deadline {
                self.fail_request(id, "confirmation timeout").await?;
                return Ok(());
            }

            self.confirmation_round(&request, &bot, &mut counterparty)
                .await;

            match schedule.next_delay() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    self.fail_request(id, "confirmation timeout").await?;
                    return Ok(());
                }
            }
        }
    }

    /// One confirmation attempt. Errors are logged, never propagated:
    /// the schedule decides when to give up.
    async fn confirmation_round(
        &self,
        request: &TradeRequest,
        bot: &crate::domain::bot::TradeBot,
        counterparty: &mut Option<PlatformUser>,
    ) {
        if counterparty.is_none() {
            match self.social.resolve_user(request.counterparty()).await {
                Ok(user) => *counterparty = Some(user),
                Err(e) => {
                    warn!(
                        request_id = %request.id,
                        counterparty = %request.counterparty(),
                        error = %e,
                        "Username resolution failed, will retry"
                    );
                    return;
                }
            }
        }
        let Some(user) = counterparty.as_ref() else {
            return;
        };

        if request.status == RequestStatus::Pending {
            match self.social.send_friend_request(bot.user_id, user.user_id).await {
                Ok(()) => {
                    info!(
                        request_id = %request.id,
                        bot = %bot.username,
                        target = %user.username,
                        "Friend request dispatched"
                    );
                    if let Err(e) = self
                        .apply_transition(
                            request.flow,
                            request.id,
                            RequestStatus::FriendRequestSent,
                        )
                        .await
                    {
                        warn!(request_id = %request.id, error = %e, "Dispatch transition rejected");
                    }
                }
                Err(e) => {
                    warn!(request_id = %request.id, error = %e, "Friend request dispatch failed, will retry");
                }
            }
            return;
        }

        match self
            .social
            .friendship_state(bot.user_id, user.user_id)
            .await
        {
            Ok(FriendshipState::Friends) => {
                match self
                    .apply_transition(request.flow, request.id, RequestStatus::FriendAccepted)
                    .await
                {
                    Ok(accepted) => {
                        let waited = (accepted.updated_at - accepted.created_at)
                            .num_milliseconds()
                            .max(0) as f64
                            / 1000.0;
                        self.metrics
                            .confirmation_seconds
                            .with_label_values(&[&request.flow.to_string()])
                            .observe(waited);
                        info!(request_id = %request.id, "Friendship confirmed");
                    }
                    Err(e) => {
                        warn!(request_id = %request.id, error = %e, "Acceptance transition rejected");
                    }
                }
            }
            Ok(state) => {
                debug!(request_id = %request.id, state = ?state, "Friendship not yet accepted");
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Friendship poll failed, will retry");
            }
        }
    }

    // ── Recovery and expiry ─────────────────────────────────

    /// Respawn confirmation watchers for requests recovered from the
    /// journal that have not reached acceptance yet.
    pub async fn resume_watchers(self: Arc<Self>) -> Result<usize, OrchestratorError> {
        let active = self
            .store
            .list_active()
            .await
            .map_err(OrchestratorError::Store)?;
        let mut resumed = 0;
        for request in &active {
            if request.status.rank() < RequestStatus::FriendAccepted.rank() {
                Self::spawn_confirmation_watcher(Arc::clone(&self), request);
                resumed += 1;
            }
        }
        if resumed > 0 {
            info!(resumed, "Confirmation watchers resumed after replay");
        }
        Ok(resumed)
    }

    /// Periodic deadline enforcement and gauge refresh.
    ///
    /// Covers requests whose watcher was lost (crash before respawn) and
    /// keeps active/bot-load gauges honest.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "Expiry sweep failed");
                    }
                }
            }
        }
    }

    /// One sweep pass. Public for tests.
    pub async fn sweep_once(&self) -> Result<usize, OrchestratorError> {
        let active = self
            .store
            .list_active()
            .await
            .map_err(OrchestratorError::Store)?;
        let now = Utc::now();

        let mut failed = 0;
        for request in &active {
            if request.is_expired(now)
                && self.fail_request(request.id, "confirmation timeout").await?
            {
                failed += 1;
            }
        }

        let mut trade_active = 0i64;
        let mut custody_active = 0i64;
        for request in self
            .store
            .list_active()
            .await
            .map_err(OrchestratorError::Store)?
        {
            match request.flow {
                FlowKind::Trade => trade_active += 1,
                FlowKind::Custody => custody_active += 1,
            }
        }
        self.metrics
            .active_requests
            .with_label_values(&["trade"])
            .set(trade_active);
        self.metrics
            .active_requests
            .with_label_values(&["custody"])
            .set(custody_active);
        for (bot_id, load, _capacity) in self.registry.load_snapshot() {
            self.metrics
                .bot_load
                .with_label_values(&[&bot_id])
                .set(i64::from(load));
        }

        if failed > 0 {
            info!(failed, "Expired requests failed by sweeper");
        }
        Ok(failed)
    }
}
