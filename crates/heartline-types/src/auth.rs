use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT claims shared by the HTTP middleware and the WebSocket gateway.
/// `sub` is the verified user id every authorization check trusts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("access token required")]
    Missing,
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "token_required",
            Self::Expired => "token_expired",
            Self::Invalid => "token_invalid",
        }
    }
}

/// Resolve a bearer credential to the user id it was issued for.
pub fn verify_token(secret: &str, token: &str) -> Result<Uuid, AuthError> {
    if token.is_empty() {
        return Err(AuthError::Missing);
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims.sub)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Invalid,
    })
}

/// Sign a token for `user_id`. Login flows live outside this service; this
/// is used by development tooling and tests.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_verifies() {
        let user = Uuid::new_v4();
        let token = issue_token(SECRET, user, chrono::Duration::hours(1)).unwrap();
        assert_eq!(verify_token(SECRET, &token), Ok(user));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = issue_token(SECRET, Uuid::new_v4(), chrono::Duration::hours(1)).unwrap();
        assert_eq!(verify_token("other", &token), Err(AuthError::Invalid));
    }

    #[test]
    fn expired_token_is_reported() {
        // Default validation allows 60s of leeway.
        let token = issue_token(SECRET, Uuid::new_v4(), chrono::Duration::hours(-2)).unwrap();
        assert_eq!(verify_token(SECRET, &token), Err(AuthError::Expired));
    }

    #[test]
    fn empty_token_is_missing() {
        assert_eq!(verify_token(SECRET, ""), Err(AuthError::Missing));
    }
}
