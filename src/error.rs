use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlucoseError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("missing caller identity")]
    Unauthorized,

    #[error("storage failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl GlucoseError {
    pub fn validation(message: impl Into<String>) -> Self {
        GlucoseError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GlucoseError::Validation(_) => StatusCode::BAD_REQUEST,
            GlucoseError::NotFound(_) => StatusCode::NOT_FOUND,
            GlucoseError::Unauthorized => StatusCode::UNAUTHORIZED,
            GlucoseError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GlucoseError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            GlucoseError::Store(err) => {
                error!("Request failed: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
