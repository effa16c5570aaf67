use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::{accounts::Accounts, claims::TokenKind, jwt::JwtKeys};
use crate::error::AppError;

/// Authenticated caller, resolved from `Authorization: Bearer <access jwt>`.
/// The token's subject must still be an active account.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    Accounts: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthenticated)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_kind(token, TokenKind::Access).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            AppError::Unauthenticated
        })?;

        let Accounts(accounts) = Accounts::from_ref(state);
        if !accounts.is_active(claims.sub).await? {
            warn!(user_id = %claims.sub, "token for inactive or removed account");
            return Err(AppError::Unauthenticated);
        }

        Ok(AuthUser(claims.sub))
    }
}
