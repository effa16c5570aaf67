use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{PublicUser, RefreshRequest, RegisterRequest, TokenRequest, TokenResponse, UpdateMeRequest},
    extractors::AuthUser,
    jwt::{JwtKeys, TokenPair},
    repo_types::User,
    services,
};
use crate::{error::AppError, extract::Payload, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/token", post(token))
        .route("/users/token/refresh", post(refresh))
        .route("/users/me", get(get_me).patch(patch_me))
}

fn token_response(user: User, pair: TokenPair) -> TokenResponse {
    TokenResponse {
        access_token: pair.access,
        refresh_token: pair.refresh,
        user: user.into(),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = services::register(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn token(
    State(state): State<AppState>,
    Payload(payload): Payload<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let (user, pair) = services::issue_tokens(&state.db, &keys, payload).await?;
    Ok(Json(token_response(user, pair)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Payload(payload): Payload<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let (user, pair) = services::refresh_tokens(&state.db, &keys, &payload.refresh_token).await?;
    Ok(Json(token_response(user, pair)))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::active_user(&state.db, user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn patch_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(payload): Payload<UpdateMeRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::update_me(&state.db, user_id, payload).await?;
    Ok(Json(user.into()))
}
