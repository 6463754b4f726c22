//! Bot-trading HTTP API - axum Router and Error Mapping
//!
//! The unauthenticated JSON endpoints the storefront and the bot
//! controller call. Trade and custody keep separate namespaces; both
//! operate on the same orchestrator.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use super::types::{
    ErrorBody, InitiateCustodyBody, InitiateTradeBody, InitiatedBody, StatusBody,
};
use crate::domain::status::FlowKind;
use crate::ports::social::SocialPlatform;
use crate::ports::store::RequestStore;
use crate::usecases::orchestrator::{Orchestrator, OrchestratorError};

/// Orchestrator error wrapped for HTTP responses.
pub struct ApiError(OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::BotsUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::UnknownRequest { .. } => StatusCode::NOT_FOUND,
            OrchestratorError::IllegalTransition(_)
            | OrchestratorError::ResendNotAllowed(_) => StatusCode::CONFLICT,
            OrchestratorError::Social(_) => StatusCode::BAD_GATEWAY,
            OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the bot-trading router over a wired orchestrator.
pub fn router<S, R>(orchestrator: Arc<Orchestrator<S, R>>) -> Router
where
    S: SocialPlatform,
    R: RequestStore,
{
    Router::new()
        .route("/bot-trading/trades", post(initiate_trade))
        .route("/bot-trading/trades/:id", get(trade_status))
        .route(
            "/bot-trading/trades/:id/friend-request",
            post(resend_friend_request),
        )
        .route("/bot-trading/trades/:id/join", post(notify_joined))
        .route("/bot-trading/trades/:id/execute", post(execute_trade))
        .route("/bot-trading/custody", post(initiate_custody))
        .route("/bot-trading/custody/:id", get(custody_status))
        .route(
            "/bot-trading/custody/:id/pet-received",
            post(confirm_pet_received),
        )
        .with_state(orchestrator)
}

/// Serve the API with graceful shutdown.
pub async fn serve<S, R>(
    orchestrator: Arc<Orchestrator<S, R>>,
    bind_address: &str,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()>
where
    S: SocialPlatform,
    R: RequestStore,
{
    let app = router(orchestrator);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(address = %bind_address, "Bot-trading API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    Ok(())
}

async fn initiate_trade<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Json(body): Json<InitiateTradeBody>,
) -> Result<(StatusCode, Json<InitiatedBody>), ApiError> {
    let request = Arc::clone(&orchestrator)
        .initiate_trade(&body.game_id, &body.buyer, &body.seller, &body.listing_id)
        .await?;
    let username = bot_username(&orchestrator, &request.bot_id);
    Ok((
        StatusCode::CREATED,
        Json(InitiatedBody::from_request(&request, username)),
    ))
}

async fn initiate_custody<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Json(body): Json<InitiateCustodyBody>,
) -> Result<(StatusCode, Json<InitiatedBody>), ApiError> {
    let request = Arc::clone(&orchestrator)
        .initiate_custody(&body.game_id, &body.seller, &body.listing_id)
        .await?;
    let username = bot_username(&orchestrator, &request.bot_id);
    Ok((
        StatusCode::CREATED,
        Json(InitiatedBody::from_request(&request, username)),
    ))
}

async fn trade_status<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusBody>, ApiError> {
    let view = orchestrator.status(FlowKind::Trade, id).await?;
    Ok(Json(view.into()))
}

async fn custody_status<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusBody>, ApiError> {
    let view = orchestrator.status(FlowKind::Custody, id).await?;
    Ok(Json(view.into()))
}

async fn resend_friend_request<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusBody>, ApiError> {
    let view = orchestrator.resend_friend_request(id).await?;
    Ok(Json(view.into()))
}

async fn notify_joined<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusBody>, ApiError> {
    let view = orchestrator.notify_joined(id).await?;
    Ok(Json(view.into()))
}

async fn execute_trade<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusBody>, ApiError> {
    let view = orchestrator.execute_trade(id).await?;
    Ok(Json(view.into()))
}

async fn confirm_pet_received<S: SocialPlatform, R: RequestStore>(
    State(orchestrator): State<Arc<Orchestrator<S, R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusBody>, ApiError> {
    let view = orchestrator.confirm_pet_received(id).await?;
    Ok(Json(view.into()))
}

fn bot_username<S: SocialPlatform, R: RequestStore>(
    orchestrator: &Orchestrator<S, R>,
    bot_id: &str,
) -> String {
    orchestrator
        .registry()
        .get(bot_id)
        .map(|b| b.username.clone())
        .unwrap_or_default()
}
