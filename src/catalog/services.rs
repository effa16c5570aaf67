use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::recipes::{
    repo::RecipeStore,
    repo_types::{CatalogItem, CatalogKind, Rename},
};

/// The user's items of `kind`, name descending. With `assigned_only`, only
/// items linked to at least one of the user's recipes, each once.
pub async fn list<S: RecipeStore>(
    store: &mut S,
    kind: CatalogKind,
    user_id: Uuid,
    assigned_only: bool,
) -> Result<Vec<CatalogItem>, AppError> {
    Ok(store.list_items(kind, user_id, assigned_only).await?)
}

pub async fn get<S: RecipeStore>(
    store: &mut S,
    kind: CatalogKind,
    user_id: Uuid,
    id: i64,
) -> Result<CatalogItem, AppError> {
    store
        .get_item(kind, user_id, id)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn rename<S: RecipeStore>(
    store: &mut S,
    kind: CatalogKind,
    user_id: Uuid,
    id: i64,
    name: &str,
) -> Result<CatalogItem, AppError> {
    match store.rename_item(kind, user_id, id, name).await? {
        Rename::Done(item) => {
            info!(kind = kind.table(), id, name, "catalog item renamed");
            Ok(item)
        }
        Rename::Missing => Err(AppError::NotFound),
        Rename::NameTaken => Err(AppError::field(
            "name",
            format!("You already have an item in {} with this name.", kind.table()),
        )),
    }
}

/// Deletes the item; its recipe links go with it, the recipes stay.
pub async fn delete<S: RecipeStore>(
    store: &mut S,
    kind: CatalogKind,
    user_id: Uuid,
    id: i64,
) -> Result<(), AppError> {
    if !store.delete_item(kind, user_id, id).await? {
        return Err(AppError::NotFound);
    }
    info!(kind = kind.table(), id, "catalog item deleted");
    Ok(())
}
