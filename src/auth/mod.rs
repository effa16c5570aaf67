use crate::state::AppState;
use axum::Router;

pub mod accounts;
mod claims;
mod dto;
pub mod extractors;
mod handlers;
pub mod jwt;
mod password;
mod repo;
mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
