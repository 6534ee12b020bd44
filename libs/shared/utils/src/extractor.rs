use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Validates the bearer token and stores the caller in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if request.headers().get(http::header::AUTHORIZATION).is_none() {
        return Err(AppError::Auth("Missing authorization header".to_string()));
    }

    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

fn digest(secret: &[u8]) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).ok()?;
    mac.update(b"shared-secret");
    Some(mac)
}

fn secrets_match(provided: &str, expected: &str) -> bool {
    match (digest(provided.as_bytes()), digest(expected.as_bytes())) {
        (Some(provided), Some(expected)) => {
            let tag = provided.finalize().into_bytes();
            expected.verify_slice(&tag).is_ok()
        }
        _ => false,
    }
}

/// Gate for machine callers such as the cron-triggered reminder sweep.
///
/// With no secret configured every caller passes. Otherwise the secret must be
/// presented either in `x-cron-secret` or as a bearer token.
pub fn verify_shared_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| bearer_token(headers));

    match provided {
        Some(value) if secrets_match(value, expected) => Ok(()),
        Some(_) => {
            warn!("Rejected shared-secret request with wrong secret");
            Err(AppError::Auth("Invalid shared secret".to_string()))
        }
        None => Err(AppError::Auth("Missing shared secret".to_string())),
    }
}
