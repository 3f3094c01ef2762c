use std::sync::Arc;

use governor::DefaultDirectRateLimiter;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

use crate::error::{handle_rejection, StartupError};
use crate::metrics::Metrics;
use crate::pipeline::RagPipeline;
use crate::shell::SessionStore;

mod page;
mod query;
mod sessions;
mod status;

/// Outcome of startup, shared read-only by every request.
#[derive(Clone)]
pub enum EngineStatus {
    Ready(Arc<RagPipeline>),
    Halted(StartupError),
}

impl EngineStatus {
    pub fn pipeline(&self) -> Option<&RagPipeline> {
        match self {
            EngineStatus::Ready(pipeline) => Some(pipeline.as_ref()),
            EngineStatus::Halted(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineStatus,
    pub sessions: Arc<SessionStore>,
    pub metrics: Metrics,
    pub limiter: Arc<DefaultDirectRateLimiter>,
    pub session_limiter: Arc<DefaultDirectRateLimiter>,
}

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = warp::path("api").and(warp::path("v1"));

    let page_route = warp::path::end()
        .and(warp::get())
        .map(page::handle_page);

    let status_route = api
        .and(warp::path("status"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(status::handle_status);

    let create_session_route = api
        .and(warp::path("sessions"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(sessions::handle_create);

    let get_session_route = api
        .and(warp::path("sessions"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(sessions::handle_get);

    let query_route = api
        .and(warp::path("sessions"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path("query"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(query::handle_query);

    page_route
        .or(status_route)
        .or(create_session_route)
        .or(get_session_route)
        .or(query_route)
        .recover(handle_rejection)
}

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}
