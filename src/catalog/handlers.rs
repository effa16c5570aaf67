use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CatalogListQuery, RenameRequest},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::Payload,
    recipes::{
        repo::PgStore,
        repo_types::{CatalogItem, CatalogKind},
    },
    state::AppState,
};

/// `/{kind}` and `/{kind}/:id` for one catalog kind.
pub fn catalog_routes(kind: CatalogKind) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/{}", kind.table()),
            get(
                move |state: State<AppState>, user: AuthUser, query: Query<CatalogListQuery>| {
                    list_items(kind, state, user, query)
                },
            ),
        )
        .route(
            &format!("/{}/:id", kind.table()),
            get(
                move |state: State<AppState>, user: AuthUser, id: Path<i64>| {
                    get_item(kind, state, user, id)
                },
            )
            .patch(
                move |state: State<AppState>,
                      user: AuthUser,
                      id: Path<i64>,
                      payload: Payload<RenameRequest>| {
                    rename_item(kind, state, user, id, payload)
                },
            )
            .delete(
                move |state: State<AppState>, user: AuthUser, id: Path<i64>| {
                    delete_item(kind, state, user, id)
                },
            ),
        )
}

#[instrument(skip(state))]
async fn list_items(
    kind: CatalogKind,
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<CatalogListQuery>,
) -> Result<Json<Vec<CatalogItem>>, AppError> {
    let assigned_only = query.assigned_only()?;
    let mut store = PgStore::begin(&state.db).await?;
    let items = services::list(&mut store, kind, user_id, assigned_only).await?;
    store.commit().await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
async fn get_item(
    kind: CatalogKind,
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<CatalogItem>, AppError> {
    let mut store = PgStore::begin(&state.db).await?;
    let item = services::get(&mut store, kind, user_id, id).await?;
    store.commit().await?;
    Ok(Json(item))
}

#[instrument(skip(state, payload))]
async fn rename_item(
    kind: CatalogKind,
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(payload): Payload<RenameRequest>,
) -> Result<Json<CatalogItem>, AppError> {
    let name = payload.validate()?;
    let mut store = PgStore::begin(&state.db).await?;
    let item = services::rename(&mut store, kind, user_id, id, &name).await?;
    store.commit().await?;
    Ok(Json(item))
}

#[instrument(skip(state))]
async fn delete_item(
    kind: CatalogKind,
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut store = PgStore::begin(&state.db).await?;
    services::delete(&mut store, kind, user_id, id).await?;
    store.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
