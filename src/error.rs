use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type GateResult<T> = Result<T, GateError>;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("{}", not_configured_message(.0))]
    NotConfigured(Vec<String>),

    #[error("Action '{attempted}' (mapped to '{mapped}') not found. Available: {available}")]
    ActionNotFound {
        attempted: String,
        mapped: String,
        available: String,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid Solana private key: {0}")]
    InvalidKey(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn not_configured_message(missing: &[String]) -> String {
    if missing.is_empty() {
        "Agent not configured".to_string()
    } else {
        format!("Agent not configured. Missing: {}", missing.join(", "))
    }
}

impl GateError {
    pub fn upstream<T: Into<String>>(msg: T) -> Self {
        GateError::Upstream(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        GateError::Validation(msg.into())
    }

    pub fn invalid_key<T: Into<String>>(msg: T) -> Self {
        GateError::InvalidKey(msg.into())
    }

    pub fn not_configured<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GateError::NotConfigured(missing.into_iter().map(Into::into).collect())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::ActionNotFound { .. } => StatusCode::NOT_FOUND,
            GateError::Validation(_) | GateError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            GateError::Upstream(_)
            | GateError::Network(_)
            | GateError::Json(_)
            | GateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Malformed or mistyped request bodies are bad input, reported in the same
/// JSON shape as every other error.
impl From<JsonRejection> for GateError {
    fn from(rejection: JsonRejection) -> Self {
        GateError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
