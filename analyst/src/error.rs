use thiserror::Error;
use warp::{reject::Reject, Reply, Rejection};

/// Whether an error ends the whole process/session or just the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fatal,
    PerTurn,
}

#[derive(Error, Debug, Clone)]
pub enum StartupError {
    #[error("Missing environment variables: {}", .missing.join(", "))]
    MissingConfiguration { missing: Vec<&'static str> },

    #[error("Invalid value {value:?} for {name}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("Client construction failed: {0}")]
    ClientConstruction(String),
}

impl StartupError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Fatal
    }

    /// Short, non-technical message for the status panel.
    pub fn user_message(&self) -> &'static str {
        match self {
            StartupError::MissingConfiguration { .. } => {
                "Missing environment variables. Please set them in a .env file."
            }
            StartupError::InvalidSetting { .. } => {
                "Invalid configuration value. Please check your .env file."
            }
            StartupError::ClientConstruction(_) => "Connection Failed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Answer composition failed: {0}")]
    Composition(String),

    #[error("RAG engine is not initialized.")]
    UninitializedPipeline,
}

impl TurnError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PerTurn
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            TurnError::Retrieval(_) => "retrieval_failure",
            TurnError::Composition(_) => "composition_failure",
            TurnError::UninitializedPipeline => "uninitialized",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Turn(#[from] TurnError),

    #[error("Service halted: {0}")]
    Halted(StartupError),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl Reject for ApiError {}

impl ApiError {
    fn status_and_message(&self) -> (u16, &'static str) {
        match self {
            ApiError::Turn(TurnError::UninitializedPipeline) => {
                (503, "RAG engine is not initialized.")
            }
            ApiError::Turn(TurnError::Retrieval(_)) => (502, "Could not search the financial documents"),
            ApiError::Turn(TurnError::Composition(_)) => (502, "Could not compose an answer"),
            ApiError::Halted(startup) => (503, startup.user_message()),
            ApiError::SessionNotFound(_) => (404, "Session not found"),
            ApiError::BadRequest(_) => (400, "Bad request"),
            ApiError::RateLimitExceeded => (429, "Rate limit exceeded"),
        }
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(api_err) = err.find::<ApiError>() {
        let (code, message) = api_err.status_and_message();

        let json = warp::reply::json(&serde_json::json!({
            "error": message,
            "details": api_err.to_string(),
        }));

        let status = warp::http::StatusCode::from_u16(code)
            .unwrap_or(warp::http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(warp::reply::with_status(json, status))
    } else {
        Err(err)
    }
}
