//! Get-or-create of tags and ingredients for a recipe write.
//!
//! Names resolve only inside the requesting user's catalog, so every item
//! attached to a recipe shares the recipe's owner.

use anyhow::anyhow;
use tracing::debug;
use uuid::Uuid;

use super::repo::RecipeStore;
use super::repo_types::{CatalogItem, CatalogKind};
use crate::error::AppError;

/// Resolves `names` to persisted items owned by `user_id`, creating the missing ones.
///
/// Input order is kept; repeated names collapse to a single item. An existing
/// item is reused untouched. When an insert loses a race on the
/// `(user_id, name)` constraint, the row that won is fetched instead.
pub async fn resolve_or_create<S: RecipeStore>(
    store: &mut S,
    kind: CatalogKind,
    user_id: Uuid,
    names: &[String],
) -> Result<Vec<CatalogItem>, AppError> {
    let mut resolved: Vec<CatalogItem> = Vec::with_capacity(names.len());
    for name in names {
        if resolved.iter().any(|item| &item.name == name) {
            continue;
        }
        let item = match store.find_item(kind, user_id, name).await? {
            Some(existing) => existing,
            None => match store.insert_item(kind, user_id, name).await? {
                Some(created) => {
                    debug!(kind = kind.table(), id = created.id, name = %created.name, "catalog item created");
                    created
                }
                None => store.find_item(kind, user_id, name).await?.ok_or_else(|| {
                    anyhow!("{} {:?} conflicted on insert but is not visible", kind.table(), name)
                })?,
            },
        };
        resolved.push(item);
    }
    Ok(resolved)
}

/// Replaces the recipe's whole `kind` set with `names`. An empty list clears it.
pub async fn replace_links<S: RecipeStore>(
    store: &mut S,
    kind: CatalogKind,
    user_id: Uuid,
    recipe_id: i64,
    names: &[String],
) -> Result<Vec<CatalogItem>, AppError> {
    store.clear_links(kind, recipe_id).await?;
    let items = resolve_or_create(store, kind, user_id, names).await?;
    for item in &items {
        store.link_item(kind, recipe_id, item.id).await?;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::memory::MemoryStore;
    use crate::recipes::repo_types::{Recipe, RecipeFields, RecipeFilter, Rename};
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    /// Reports a miss for the first `misses` name lookups, as when a concurrent
    /// request commits the row between our lookup and our insert.
    struct LateCommit {
        inner: MemoryStore,
        misses: usize,
    }

    #[async_trait]
    impl RecipeStore for LateCommit {
        async fn list_recipes(&mut self, user_id: Uuid, filter: &RecipeFilter) -> Result<Vec<Recipe>, sqlx::Error> {
            self.inner.list_recipes(user_id, filter).await
        }
        async fn get_recipe(&mut self, user_id: Uuid, id: i64) -> Result<Option<Recipe>, sqlx::Error> {
            self.inner.get_recipe(user_id, id).await
        }
        async fn insert_recipe(&mut self, user_id: Uuid, fields: &RecipeFields) -> Result<Recipe, sqlx::Error> {
            self.inner.insert_recipe(user_id, fields).await
        }
        async fn update_recipe(&mut self, user_id: Uuid, id: i64, fields: &RecipeFields) -> Result<Option<Recipe>, sqlx::Error> {
            self.inner.update_recipe(user_id, id, fields).await
        }
        async fn set_recipe_image(&mut self, user_id: Uuid, id: i64, image: Option<&str>) -> Result<Option<Recipe>, sqlx::Error> {
            self.inner.set_recipe_image(user_id, id, image).await
        }
        async fn delete_recipe(&mut self, user_id: Uuid, id: i64) -> Result<bool, sqlx::Error> {
            self.inner.delete_recipe(user_id, id).await
        }
        async fn find_item(&mut self, kind: CatalogKind, user_id: Uuid, name: &str) -> Result<Option<CatalogItem>, sqlx::Error> {
            if self.misses > 0 {
                self.misses -= 1;
                return Ok(None);
            }
            self.inner.find_item(kind, user_id, name).await
        }
        async fn insert_item(&mut self, kind: CatalogKind, user_id: Uuid, name: &str) -> Result<Option<CatalogItem>, sqlx::Error> {
            self.inner.insert_item(kind, user_id, name).await
        }
        async fn get_item(&mut self, kind: CatalogKind, user_id: Uuid, id: i64) -> Result<Option<CatalogItem>, sqlx::Error> {
            self.inner.get_item(kind, user_id, id).await
        }
        async fn list_items(&mut self, kind: CatalogKind, user_id: Uuid, assigned_only: bool) -> Result<Vec<CatalogItem>, sqlx::Error> {
            self.inner.list_items(kind, user_id, assigned_only).await
        }
        async fn rename_item(&mut self, kind: CatalogKind, user_id: Uuid, id: i64, name: &str) -> Result<Rename, sqlx::Error> {
            self.inner.rename_item(kind, user_id, id, name).await
        }
        async fn delete_item(&mut self, kind: CatalogKind, user_id: Uuid, id: i64) -> Result<bool, sqlx::Error> {
            self.inner.delete_item(kind, user_id, id).await
        }
        async fn items_for_recipes(&mut self, kind: CatalogKind, recipe_ids: &[i64]) -> Result<Vec<(i64, CatalogItem)>, sqlx::Error> {
            self.inner.items_for_recipes(kind, recipe_ids).await
        }
        async fn clear_links(&mut self, kind: CatalogKind, recipe_id: i64) -> Result<(), sqlx::Error> {
            self.inner.clear_links(kind, recipe_id).await
        }
        async fn link_item(&mut self, kind: CatalogKind, recipe_id: i64, item_id: i64) -> Result<(), sqlx::Error> {
            self.inner.link_item(kind, recipe_id, item_id).await
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fields() -> RecipeFields {
        RecipeFields {
            title: "Curry".into(),
            description: String::new(),
            time_minutes: 30,
            price: Decimal::new(550, 2),
            link: String::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_names_collapse_to_one_item() {
        let mut store = MemoryStore::new();
        let user = Uuid::new_v4();
        let items = resolve_or_create(&mut store, CatalogKind::Tag, user, &names(&["Thai", "Thai"]))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Thai");
        assert_eq!(items[0].user_id, user);
        assert_eq!(store.item_count(CatalogKind::Tag), 1);
    }

    #[tokio::test]
    async fn existing_item_is_reused_per_user() {
        let mut store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let first = resolve_or_create(&mut store, CatalogKind::Ingredient, alice, &names(&["Salt"]))
            .await
            .unwrap();
        let again = resolve_or_create(&mut store, CatalogKind::Ingredient, alice, &names(&["Salt"]))
            .await
            .unwrap();
        assert_eq!(first[0].id, again[0].id);

        let other = resolve_or_create(&mut store, CatalogKind::Ingredient, bob, &names(&["Salt"]))
            .await
            .unwrap();
        assert_ne!(other[0].id, first[0].id);
        assert_eq!(other[0].user_id, bob);
        assert_eq!(store.item_count(CatalogKind::Ingredient), 2);
    }

    #[tokio::test]
    async fn kinds_do_not_share_names() {
        let mut store = MemoryStore::new();
        let user = Uuid::new_v4();
        resolve_or_create(&mut store, CatalogKind::Tag, user, &names(&["Lemon"]))
            .await
            .unwrap();
        resolve_or_create(&mut store, CatalogKind::Ingredient, user, &names(&["Lemon"]))
            .await
            .unwrap();
        assert_eq!(store.item_count(CatalogKind::Tag), 1);
        assert_eq!(store.item_count(CatalogKind::Ingredient), 1);
    }

    #[tokio::test]
    async fn replace_links_swaps_the_whole_set() {
        let mut store = MemoryStore::new();
        let user = Uuid::new_v4();
        let recipe = store.insert_recipe(user, &fields()).await.unwrap();

        replace_links(&mut store, CatalogKind::Tag, user, recipe.id, &names(&["A", "B"]))
            .await
            .unwrap();
        assert_eq!(store.link_count(CatalogKind::Tag), 2);

        let now = replace_links(&mut store, CatalogKind::Tag, user, recipe.id, &names(&["B", "C"]))
            .await
            .unwrap();
        let linked: Vec<_> = now.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(linked, ["B", "C"]);
        assert_eq!(store.link_count(CatalogKind::Tag), 2);
        // "A" is unlinked, not deleted.
        assert_eq!(store.item_count(CatalogKind::Tag), 3);

        replace_links(&mut store, CatalogKind::Tag, user, recipe.id, &[])
            .await
            .unwrap();
        assert_eq!(store.link_count(CatalogKind::Tag), 0);
    }

    #[tokio::test]
    async fn insert_conflict_refetches_the_winning_row() {
        let user = Uuid::new_v4();
        let mut inner = MemoryStore::new();
        let winner = inner
            .insert_item(CatalogKind::Tag, user, "Thai")
            .await
            .unwrap()
            .unwrap();
        let mut store = LateCommit { inner, misses: 1 };

        let items = resolve_or_create(&mut store, CatalogKind::Tag, user, &names(&["Thai"]))
            .await
            .unwrap();
        assert_eq!(store.misses, 0, "first lookup was skipped");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, winner.id);
        assert_eq!(store.inner.item_count(CatalogKind::Tag), 1);
    }

    #[tokio::test]
    async fn conflict_without_visible_row_is_an_error() {
        let user = Uuid::new_v4();
        let mut inner = MemoryStore::new();
        inner
            .insert_item(CatalogKind::Ingredient, user, "Salt")
            .await
            .unwrap();
        let mut store = LateCommit { inner, misses: 2 };

        let err = resolve_or_create(&mut store, CatalogKind::Ingredient, user, &names(&["Salt"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.inner.item_count(CatalogKind::Ingredient), 1);
    }
}
