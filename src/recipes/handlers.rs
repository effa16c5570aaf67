use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::instrument;

use super::{
    dto::{RecipeAction, RecipeListQuery, RecipePayload, Shape},
    repo::PgStore,
    repo_types::RecipeAggregate,
    services,
};
use crate::{
    auth::extractors::AuthUser, error::AppError, extract::Payload, images::services as images,
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .patch(patch_recipe)
                .put(put_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

/// Renders `agg` the way `action` answers, resolving the image key to a URL when the shape carries it.
async fn respond(
    state: &AppState,
    action: RecipeAction,
    agg: RecipeAggregate,
) -> Result<Json<Value>, AppError> {
    let url = match action.shape() {
        Shape::Summary => None,
        Shape::Detail | Shape::Image => {
            images::image_url(
                state.storage.as_ref(),
                agg.recipe.image.as_deref(),
                state.config.storage.url_ttl_secs,
            )
            .await?
        }
    };
    Ok(Json(action.render(agg, url)))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<RecipeListQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = query.into_filter()?;
    let mut store = PgStore::begin(&state.db).await?;
    let recipes = services::list(&mut store, user_id, &filter).await?;
    store.commit().await?;

    let action = RecipeAction::List;
    Ok(Json(Value::Array(
        recipes
            .into_iter()
            .map(|agg| action.render(agg, None))
            .collect(),
    )))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let mut store = PgStore::begin(&state.db).await?;
    let agg = services::get(&mut store, user_id, id).await?;
    store.commit().await?;
    respond(&state, RecipeAction::Retrieve, agg).await
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(payload): Payload<RecipePayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut store = PgStore::begin(&state.db).await?;
    let agg = services::create(&mut store, user_id, payload).await?;
    store.commit().await?;
    Ok((
        StatusCode::CREATED,
        respond(&state, RecipeAction::Create, agg).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(payload): Payload<RecipePayload>,
) -> Result<Json<Value>, AppError> {
    let mut store = PgStore::begin(&state.db).await?;
    let agg = services::partial_update(&mut store, user_id, id, payload).await?;
    store.commit().await?;
    respond(&state, RecipeAction::PartialUpdate, agg).await
}

#[instrument(skip(state, payload))]
pub async fn put_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Payload(payload): Payload<RecipePayload>,
) -> Result<Json<Value>, AppError> {
    let mut store = PgStore::begin(&state.db).await?;
    let agg = services::full_update(&mut store, user_id, id, payload).await?;
    store.commit().await?;
    respond(&state, RecipeAction::Update, agg).await
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut store = PgStore::begin(&state.db).await?;
    let image = services::delete(&mut store, user_id, id).await?;
    store.commit().await?;
    if let Some(key) = image {
        images::discard(state.storage.as_ref(), &key).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Pulls the bytes of the `image` field out of a multipart body.
async fn image_field(mut multipart: Multipart) -> Result<Bytes, AppError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AppError::field("image", "No file was submitted.")),
            Err(e) => return Err(AppError::field("image", e.body_text())),
        };
        if field.name() != Some("image") {
            continue;
        }
        return field
            .bytes()
            .await
            .map_err(|e| AppError::field("image", e.body_text()));
    }
}

#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let body = image_field(multipart).await?;
    let storage = state.storage.as_ref();

    let mut store = PgStore::begin(&state.db).await?;
    let swap = services::upload_image(&mut store, storage, user_id, id, body).await?;
    if let Err(e) = store.commit().await {
        images::discard(storage, &swap.stored).await;
        return Err(e.into());
    }
    if let Some(old) = &swap.replaced {
        images::discard(storage, old).await;
    }
    respond(&state, RecipeAction::UploadImage, swap.aggregate).await
}
