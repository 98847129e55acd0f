//! Server-Sent Events stream of session state.

use std::convert::Infallible;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use serde::Deserialize;
use tracing::{debug, info};

use crate::broadcast::Frame;
use crate::error::ServiceError;
use crate::routes::AppState;

/// `/update` query string.
#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    /// Session to follow.
    #[serde(default, alias = "sessionId")]
    pub game: String,
    /// Watching player, for logs only.
    #[serde(default, alias = "nickname")]
    pub nick: Option<String>,
}

fn to_event(frame: Frame) -> Event {
    match frame {
        Frame::State(json) => Event::default().data(&*json),
        Frame::KeepAlive => Event::default().comment("keep-alive"),
    }
}

/// SSE endpoint: the current state, then one frame per mutation plus
/// keep-alive comments. Ends when the client goes away.
pub async fn update(
    State(service): State<AppState>,
    query: Result<Query<UpdateQuery>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let Query(query) = query.map_err(|rejection| ServiceError::validation(rejection.body_text()))?;
    let mut subscription = service.subscribe(&query.game).await?;
    info!(session_id = %query.game, nick = ?query.nick, "Push connection opened");

    let stream = async_stream::stream! {
        while let Some(frame) = subscription.recv().await {
            yield Ok(to_event(frame));
        }
        debug!(session_id = %subscription.session_id(), "Push stream ended");
    };

    Ok(Sse::new(stream))
}
