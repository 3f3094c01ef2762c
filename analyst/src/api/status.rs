use std::convert::Infallible;

use warp::Reply;

use super::{AppState, EngineStatus};
use crate::models::StatusResponse;

pub async fn handle_status(state: AppState) -> Result<impl Reply, Infallible> {
    let response = match &state.engine {
        EngineStatus::Ready(_) => StatusResponse {
            connected: true,
            message: "Connected to Azure AI Services".to_string(),
            details: None,
        },
        EngineStatus::Halted(err) => StatusResponse {
            connected: false,
            message: err.user_message().to_string(),
            details: Some(err.to_string()),
        },
    };
    Ok(warp::reply::json(&response))
}
