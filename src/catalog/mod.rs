//! Per-user tag and ingredient management. Both kinds share one implementation
//! parameterised by `CatalogKind`.

use crate::recipes::repo_types::CatalogKind;
use crate::state::AppState;
use axum::Router;

mod dto;
mod handlers;
pub mod services;

pub fn router() -> Router<AppState> {
    CatalogKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| {
            router.merge(handlers::catalog_routes(kind))
        })
}
