use uuid::Uuid;
use warp::{Rejection, Reply};
use tracing::{info, warn};

use super::{AppState, EngineStatus};
use crate::error::ApiError;
use crate::models::{QueryRequest, QueryResponse};

/// Checks run cheapest-first: blank question (400), unknown session (404),
/// halted engine (503), then the shared rate limit (429). Only a question
/// that will actually reach the pipeline spends a limiter token.
pub async fn handle_query(
    session_id: Uuid,
    request: QueryRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest(
            "Question must not be empty".to_string(),
        )));
    }

    let shell = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| warp::reject::custom(ApiError::SessionNotFound(session_id)))?;

    if let EngineStatus::Halted(err) = &state.engine {
        return Err(warp::reject::custom(ApiError::Halted(err.clone())));
    }

    if state.limiter.check().is_err() {
        warn!("Query rate limit hit for session {}", session_id);
        return Err(warp::reject::custom(ApiError::RateLimitExceeded));
    }

    info!("Processing query for session {}", session_id);

    match shell.submit(question, state.engine.pipeline()).await {
        Ok(rendered) => {
            state.metrics.record_answer(rendered.citations.len());
            Ok(warp::reply::json(&QueryResponse {
                session_id,
                answer: rendered.answer,
                citations: rendered.citations,
            }))
        }
        Err(err) => {
            state.metrics.record_failure(err.metric_label());
            Err(warp::reject::custom(ApiError::Turn(err)))
        }
    }
}
