use crate::state::AppState;
use axum::Router;

pub mod dto;
mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod reconcile;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::recipe_routes()
}
