use uuid::Uuid;
use warp::{Rejection, Reply};
use tracing::{info, warn};

use super::AppState;
use crate::error::ApiError;
use crate::models::SessionView;

pub async fn handle_create(state: AppState) -> Result<impl Reply, Rejection> {
    // Creation can evict the oldest session, so it has its own quota.
    if state.session_limiter.check().is_err() {
        warn!("Session creation rate limit hit");
        return Err(warp::reject::custom(ApiError::RateLimitExceeded));
    }

    let halted = state.engine.pipeline().is_none();
    let session_id = state.sessions.create(halted).await;
    let live = state.sessions.len().await;
    info!("Started session {} ({} live)", session_id, live);

    Ok(warp::reply::json(&serde_json::json!({ "session_id": session_id })))
}

pub async fn handle_get(session_id: Uuid, state: AppState) -> Result<impl Reply, Rejection> {
    let shell = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| warp::reject::custom(ApiError::SessionNotFound(session_id)))?;
    let (shell_state, turns) = shell.render().await;

    Ok(warp::reply::json(&SessionView {
        session_id,
        state: shell_state,
        turns,
    }))
}
