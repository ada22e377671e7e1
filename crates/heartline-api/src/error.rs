use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use heartline_db::StoreError;
use heartline_match::MatchError;
use heartline_types::api::ErrorBody;
use heartline_types::auth::AuthError;

/// Every failure an HTTP handler can return. Rendered as `{message, code}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Match(e) => match e {
                MatchError::NotFound => StatusCode::NOT_FOUND,
                MatchError::NotAuthorized => StatusCode::FORBIDDEN,
                MatchError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
                MatchError::Conflict => StatusCode::CONFLICT,
                MatchError::Store(_) | MatchError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::InvalidParticipants) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Match(e) => e.code(),
            Self::Auth(e) => e.code(),
            Self::Store(StoreError::NotFound(_)) => "not_found",
            Self::Store(StoreError::InvalidParticipants) => "invalid_participants",
            Self::Store(_) | Self::Join(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retryable = matches!(&self, Self::Match(e) if e.is_retryable());
        let message = if status.is_server_error() {
            error!("request failed: {}", self);
            "Internal error, please retry".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            message,
            code: self.code().to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
