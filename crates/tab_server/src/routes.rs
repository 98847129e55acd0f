//! JSON request/response surface.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tab_game::Selection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ServiceError;
use crate::ranking::RankingEntry;
use crate::service::{GameService, JoinTicket};
use crate::sse;

/// Shared handler state.
pub type AppState = Arc<GameService>;

/// Builds the full router: game actions, push endpoint and health check.
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/join", post(join))
        .route("/roll", post(roll))
        .route("/notify", post(notify))
        .route("/pass", post(pass))
        .route("/leave", post(leave))
        .route("/ranking", post(ranking))
        .route("/update", get(sse::update))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::Game(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::CredentialsMismatch => StatusCode::UNAUTHORIZED,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::validation(rejection.body_text()))
}

fn empty() -> Json<Value> {
    Json(json!({}))
}

/// `register` body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Player nickname.
    #[serde(default, alias = "nickname")]
    pub nick: String,
    /// Plain password.
    #[serde(default)]
    pub password: String,
}

/// `join` body.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// Player nickname.
    #[serde(default, alias = "nickname")]
    pub nick: String,
    /// Plain password.
    #[serde(default)]
    pub password: String,
    /// Matchmaking group.
    pub group: u32,
    /// Board columns.
    #[serde(alias = "columns")]
    pub size: usize,
}

/// Body of `roll`, `pass` and `leave`.
#[derive(Debug, Deserialize)]
pub struct GameRequest {
    /// Player nickname.
    #[serde(default, alias = "nickname")]
    pub nick: String,
    /// Plain password.
    #[serde(default)]
    pub password: String,
    /// Session id.
    #[serde(default, alias = "sessionId")]
    pub game: String,
}

/// `notify` body.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    /// Player nickname.
    #[serde(default, alias = "nickname")]
    pub nick: String,
    /// Plain password.
    #[serde(default)]
    pub password: String,
    /// Session id.
    #[serde(default, alias = "sessionId")]
    pub game: String,
    /// Picked cell.
    pub cell: usize,
}

/// `ranking` body.
#[derive(Debug, Deserialize)]
pub struct RankingRequest {
    /// Matchmaking group.
    pub group: u32,
    /// Board columns.
    #[serde(alias = "columns")]
    pub size: usize,
}

/// `roll` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResponse {
    /// Sticks score.
    pub dice_value: u8,
    /// The roll grants another throw.
    pub extra_turn: bool,
    /// No piece can move; the player must pass.
    pub must_pass: bool,
}

/// `ranking` response.
#[derive(Debug, Serialize)]
pub struct RankingResponse {
    /// Leaderboard rows, best first.
    pub ranking: Vec<RankingEntry>,
}

async fn register(
    State(service): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    service.register(&req.nick, &req.password).await?;
    Ok(empty())
}

async fn join(
    State(service): State<AppState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinTicket>, ServiceError> {
    let req = body(payload)?;
    let ticket = service
        .join(&req.nick, &req.password, req.group, req.size)
        .await?;
    Ok(Json(ticket))
}

async fn roll(
    State(service): State<AppState>,
    payload: Result<Json<GameRequest>, JsonRejection>,
) -> Result<Json<RollResponse>, ServiceError> {
    let req = body(payload)?;
    let outcome = service.roll(&req.nick, &req.password, &req.game).await?;
    Ok(Json(RollResponse {
        dice_value: outcome.dice.value(),
        extra_turn: outcome.dice.extra_turn(),
        must_pass: outcome.must_pass,
    }))
}

async fn notify(
    State(service): State<AppState>,
    payload: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    let selection = service
        .notify(&req.nick, &req.password, &req.game, req.cell)
        .await?;
    // Clients read the outcome from the pushed state; the reply only
    // echoes the selected destinations.
    let reply = match selection {
        Selection::OriginSelected { destinations, .. } => json!({ "selected": destinations }),
        Selection::Cancelled | Selection::Moved { .. } => json!({}),
    };
    Ok(Json(reply))
}

async fn pass(
    State(service): State<AppState>,
    payload: Result<Json<GameRequest>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    service.pass(&req.nick, &req.password, &req.game).await?;
    Ok(empty())
}

async fn leave(
    State(service): State<AppState>,
    payload: Result<Json<GameRequest>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let req = body(payload)?;
    service.leave(&req.nick, &req.password, &req.game).await?;
    Ok(empty())
}

async fn ranking(
    State(service): State<AppState>,
    payload: Result<Json<RankingRequest>, JsonRejection>,
) -> Result<Json<RankingResponse>, ServiceError> {
    let req = body(payload)?;
    let ranking = service.ranking(req.group, req.size).await?;
    Ok(Json(RankingResponse { ranking }))
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
