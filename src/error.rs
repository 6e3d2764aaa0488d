use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("no available nodes")]
    NoAvailableNodes,

    #[error("no allowed upstreams")]
    NoAllowedUpstreams,

    #[error("all upstreams failed")]
    AllUpstreamsFailed,

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("upstream is not websocket")]
    NotWebsocket,

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NoAvailableNodes => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NoAllowedUpstreams => StatusCode::SERVICE_UNAVAILABLE,
            AppError::AllUpstreamsFailed => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidSignature => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotWebsocket => StatusCode::BAD_GATEWAY,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
