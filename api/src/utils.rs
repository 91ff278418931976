use axum::Json;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            url: None,
        }
    }

    pub fn with_url(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            url: Some(url.into()),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn client_error<T: std::fmt::Display>(error: T) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
}

pub fn internal_error<T: std::fmt::Display + std::fmt::Debug>(error: T) -> ApiError {
    error!("Internal error: {error:?}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
}
