//! Recipe aggregate operations. Every function works on one `RecipeStore`
//! unit of work; the caller decides when to commit it.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use super::{
    dto::{RecipePayload, WriteMode},
    reconcile::replace_links,
    repo::RecipeStore,
    repo_types::{CatalogItem, CatalogKind, Recipe, RecipeAggregate, RecipeFields, RecipeFilter},
};
use crate::{error::AppError, images::services as images, storage::ImageStorage};

/// Attaches tag and ingredient sets to already loaded recipes, keeping their order.
pub async fn hydrate<S: RecipeStore>(
    store: &mut S,
    recipes: Vec<Recipe>,
) -> Result<Vec<RecipeAggregate>, AppError> {
    let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
    let mut sets: HashMap<CatalogKind, HashMap<i64, Vec<CatalogItem>>> = HashMap::new();
    for kind in CatalogKind::ALL {
        let grouped = sets.entry(kind).or_default();
        if ids.is_empty() {
            continue;
        }
        for (recipe_id, item) in store.items_for_recipes(kind, &ids).await? {
            grouped.entry(recipe_id).or_default().push(item);
        }
    }
    let mut take = |kind: CatalogKind, id: i64| {
        sets.get_mut(&kind)
            .and_then(|m| m.remove(&id))
            .unwrap_or_default()
    };
    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeAggregate {
            tags: take(CatalogKind::Tag, recipe.id),
            ingredients: take(CatalogKind::Ingredient, recipe.id),
            recipe,
        })
        .collect())
}

async fn hydrate_one<S: RecipeStore>(
    store: &mut S,
    recipe: Recipe,
) -> Result<RecipeAggregate, AppError> {
    hydrate(store, vec![recipe])
        .await?
        .pop()
        .ok_or(AppError::NotFound)
}

async fn owned<S: RecipeStore>(store: &mut S, user_id: Uuid, id: i64) -> Result<Recipe, AppError> {
    store.get_recipe(user_id, id).await?.ok_or(AppError::NotFound)
}

pub async fn list<S: RecipeStore>(
    store: &mut S,
    user_id: Uuid,
    filter: &RecipeFilter,
) -> Result<Vec<RecipeAggregate>, AppError> {
    let recipes = store.list_recipes(user_id, filter).await?;
    hydrate(store, recipes).await
}

pub async fn get<S: RecipeStore>(
    store: &mut S,
    user_id: Uuid,
    id: i64,
) -> Result<RecipeAggregate, AppError> {
    let recipe = owned(store, user_id, id).await?;
    hydrate_one(store, recipe).await
}

pub async fn create<S: RecipeStore>(
    store: &mut S,
    user_id: Uuid,
    payload: RecipePayload,
) -> Result<RecipeAggregate, AppError> {
    let write = payload.validate(WriteMode::Create)?;
    let blank = RecipeFields {
        title: String::new(),
        description: String::new(),
        time_minutes: 0,
        price: Default::default(),
        link: String::new(),
    };
    let recipe = store
        .insert_recipe(user_id, &write.merged_onto(&blank))
        .await?;
    for kind in CatalogKind::ALL {
        if let Some(names) = write.names(kind) {
            replace_links(store, kind, user_id, recipe.id, names).await?;
        }
    }
    info!(recipe_id = recipe.id, %user_id, "recipe created");
    hydrate_one(store, recipe).await
}

/// PATCH: only the keys present in `payload` change. A present `tags` or
/// `ingredients` list replaces the whole set, an empty one clears it.
pub async fn partial_update<S: RecipeStore>(
    store: &mut S,
    user_id: Uuid,
    id: i64,
    payload: RecipePayload,
) -> Result<RecipeAggregate, AppError> {
    write(store, user_id, id, payload, WriteMode::Merge).await
}

/// PUT: required fields must be present, omitted ones fall back to their defaults.
pub async fn full_update<S: RecipeStore>(
    store: &mut S,
    user_id: Uuid,
    id: i64,
    payload: RecipePayload,
) -> Result<RecipeAggregate, AppError> {
    write(store, user_id, id, payload, WriteMode::Replace).await
}

async fn write<S: RecipeStore>(
    store: &mut S,
    user_id: Uuid,
    id: i64,
    payload: RecipePayload,
    mode: WriteMode,
) -> Result<RecipeAggregate, AppError> {
    let current = owned(store, user_id, id).await?;
    let write = payload.validate(mode)?;
    let fields = write.merged_onto(&RecipeFields::from(&current));
    let recipe = store
        .update_recipe(user_id, id, &fields)
        .await?
        .ok_or(AppError::NotFound)?;
    for kind in CatalogKind::ALL {
        if let Some(names) = write.names(kind) {
            replace_links(store, kind, user_id, id, names).await?;
        }
    }
    info!(recipe_id = id, %user_id, ?mode, "recipe updated");
    hydrate_one(store, recipe).await
}

/// Removes the recipe and its links. Returns the image key that is now unreferenced.
pub async fn delete<S: RecipeStore>(
    store: &mut S,
    user_id: Uuid,
    id: i64,
) -> Result<Option<String>, AppError> {
    let recipe = owned(store, user_id, id).await?;
    if !store.delete_recipe(user_id, id).await? {
        return Err(AppError::NotFound);
    }
    info!(recipe_id = id, %user_id, "recipe deleted");
    Ok(recipe.image)
}

/// Outcome of a successful upload, before the unit of work is committed.
#[derive(Debug)]
pub struct ImageSwap {
    pub aggregate: RecipeAggregate,
    /// Key of the object just written.
    pub stored: String,
    /// Key of the object it replaced, to be discarded once the new one is committed.
    pub replaced: Option<String>,
}

/// Validates `body` as an image, writes it to storage and points the recipe at it.
/// A rejected upload leaves both the recipe and the storage untouched.
pub async fn upload_image<S: RecipeStore>(
    store: &mut S,
    storage: &dyn ImageStorage,
    user_id: Uuid,
    id: i64,
    body: Bytes,
) -> Result<ImageSwap, AppError> {
    let current = owned(store, user_id, id).await?;
    let checked = images::check_image(body).await?;
    let key = images::image_key(user_id, id, &checked);
    images::store(storage, &key, &checked).await?;

    let updated = match store.set_recipe_image(user_id, id, Some(&key)).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            images::discard(storage, &key).await;
            return Err(AppError::NotFound);
        }
        Err(e) => {
            images::discard(storage, &key).await;
            return Err(e.into());
        }
    };
    info!(recipe_id = id, %user_id, key = %key, "recipe image replaced");
    Ok(ImageSwap {
        aggregate: hydrate_one(store, updated).await?,
        stored: key,
        replaced: current.image,
    })
}
