use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use tracing::debug;

use heartline_types::auth::{AuthError, verify_token};

use crate::auth::{AppState, AuthUser};
use crate::error::ApiError;

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AuthError::Missing)?;

    let user_id = verify_token(&state.jwt_secret, bearer.token()).map_err(|e| {
        debug!("rejected bearer token: {}", e);
        e
    })?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
