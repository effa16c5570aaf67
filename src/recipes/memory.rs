//! In-memory `RecipeStore` for unit tests. Mirrors the schema's constraints:
//! unique `(user_id, name)` per catalog, cascading link removal, owner scoping.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::RecipeStore;
use super::repo_types::{CatalogItem, CatalogKind, Recipe, RecipeFields, RecipeFilter, Rename};

#[derive(Default)]
struct Catalog {
    items: BTreeMap<i64, CatalogItem>,
    links: BTreeSet<(i64, i64)>, // (recipe_id, item_id)
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    recipes: BTreeMap<i64, Recipe>,
    next_recipe_id: i64,
    tags: Catalog,
    ingredients: Catalog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self, kind: CatalogKind) -> &Catalog {
        match kind {
            CatalogKind::Tag => &self.tags,
            CatalogKind::Ingredient => &self.ingredients,
        }
    }

    fn catalog_mut(&mut self, kind: CatalogKind) -> &mut Catalog {
        match kind {
            CatalogKind::Tag => &mut self.tags,
            CatalogKind::Ingredient => &mut self.ingredients,
        }
    }

    pub fn item_count(&self, kind: CatalogKind) -> usize {
        self.catalog(kind).items.len()
    }

    pub fn link_count(&self, kind: CatalogKind) -> usize {
        self.catalog(kind).links.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    fn linked_to_any(&self, kind: CatalogKind, recipe_id: i64, ids: &[i64]) -> bool {
        self.catalog(kind)
            .links
            .iter()
            .any(|(r, i)| *r == recipe_id && ids.contains(i))
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn list_recipes(
        &mut self,
        user_id: Uuid,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, sqlx::Error> {
        let mut out: Vec<Recipe> = self
            .recipes
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| match &filter.tag_ids {
                Some(ids) => self.linked_to_any(CatalogKind::Tag, r.id, ids),
                None => true,
            })
            .filter(|r| match &filter.ingredient_ids {
                Some(ids) => self.linked_to_any(CatalogKind::Ingredient, r.id, ids),
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(out)
    }

    async fn get_recipe(&mut self, user_id: Uuid, id: i64) -> Result<Option<Recipe>, sqlx::Error> {
        Ok(self
            .recipes
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn insert_recipe(
        &mut self,
        user_id: Uuid,
        fields: &RecipeFields,
    ) -> Result<Recipe, sqlx::Error> {
        self.next_recipe_id += 1;
        let recipe = Recipe {
            id: self.next_recipe_id,
            user_id,
            title: fields.title.clone(),
            description: fields.description.clone(),
            time_minutes: fields.time_minutes,
            price: fields.price,
            link: fields.link.clone(),
            image: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn update_recipe(
        &mut self,
        user_id: Uuid,
        id: i64,
        fields: &RecipeFields,
    ) -> Result<Option<Recipe>, sqlx::Error> {
        let Some(r) = self.recipes.get_mut(&id).filter(|r| r.user_id == user_id) else {
            return Ok(None);
        };
        r.title = fields.title.clone();
        r.description = fields.description.clone();
        r.time_minutes = fields.time_minutes;
        r.price = fields.price;
        r.link = fields.link.clone();
        Ok(Some(r.clone()))
    }

    async fn set_recipe_image(
        &mut self,
        user_id: Uuid,
        id: i64,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, sqlx::Error> {
        let Some(r) = self.recipes.get_mut(&id).filter(|r| r.user_id == user_id) else {
            return Ok(None);
        };
        r.image = image.map(str::to_string);
        Ok(Some(r.clone()))
    }

    async fn delete_recipe(&mut self, user_id: Uuid, id: i64) -> Result<bool, sqlx::Error> {
        if !self.recipes.get(&id).is_some_and(|r| r.user_id == user_id) {
            return Ok(false);
        }
        self.recipes.remove(&id);
        for kind in CatalogKind::ALL {
            self.catalog_mut(kind).links.retain(|(r, _)| *r != id);
        }
        Ok(true)
    }

    async fn find_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogItem>, sqlx::Error> {
        Ok(self
            .catalog(kind)
            .items
            .values()
            .find(|i| i.user_id == user_id && i.name == name)
            .cloned())
    }

    async fn insert_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogItem>, sqlx::Error> {
        let catalog = self.catalog_mut(kind);
        if catalog
            .items
            .values()
            .any(|i| i.user_id == user_id && i.name == name)
        {
            return Ok(None);
        }
        catalog.next_id += 1;
        let item = CatalogItem {
            id: catalog.next_id,
            user_id,
            name: name.to_string(),
        };
        catalog.items.insert(item.id, item.clone());
        Ok(Some(item))
    }

    async fn get_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
    ) -> Result<Option<CatalogItem>, sqlx::Error> {
        Ok(self
            .catalog(kind)
            .items
            .get(&id)
            .filter(|i| i.user_id == user_id)
            .cloned())
    }

    async fn list_items(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<CatalogItem>, sqlx::Error> {
        let catalog = self.catalog(kind);
        let mut out: Vec<CatalogItem> = catalog
            .items
            .values()
            .filter(|i| i.user_id == user_id)
            .filter(|i| {
                !assigned_only
                    || catalog.links.iter().any(|(r, item)| {
                        *item == i.id && self.recipes.get(r).is_some_and(|r| r.user_id == user_id)
                    })
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(out)
    }

    async fn rename_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Rename, sqlx::Error> {
        let catalog = self.catalog_mut(kind);
        if !catalog.items.get(&id).is_some_and(|i| i.user_id == user_id) {
            return Ok(Rename::Missing);
        }
        if catalog
            .items
            .values()
            .any(|i| i.user_id == user_id && i.name == name && i.id != id)
        {
            return Ok(Rename::NameTaken);
        }
        let Some(item) = catalog.items.get_mut(&id) else {
            return Ok(Rename::Missing);
        };
        item.name = name.to_string();
        Ok(Rename::Done(item.clone()))
    }

    async fn delete_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
    ) -> Result<bool, sqlx::Error> {
        let catalog = self.catalog_mut(kind);
        if !catalog.items.get(&id).is_some_and(|i| i.user_id == user_id) {
            return Ok(false);
        }
        catalog.items.remove(&id);
        catalog.links.retain(|(_, item)| *item != id);
        Ok(true)
    }

    async fn items_for_recipes(
        &mut self,
        kind: CatalogKind,
        recipe_ids: &[i64],
    ) -> Result<Vec<(i64, CatalogItem)>, sqlx::Error> {
        let catalog = self.catalog(kind);
        // BTreeSet order is (recipe_id, item_id), matching the SQL ordering.
        Ok(catalog
            .links
            .iter()
            .filter(|(r, _)| recipe_ids.contains(r))
            .filter_map(|(r, item)| catalog.items.get(item).map(|i| (*r, i.clone())))
            .collect())
    }

    async fn clear_links(&mut self, kind: CatalogKind, recipe_id: i64) -> Result<(), sqlx::Error> {
        self.catalog_mut(kind).links.retain(|(r, _)| *r != recipe_id);
        Ok(())
    }

    async fn link_item(
        &mut self,
        kind: CatalogKind,
        recipe_id: i64,
        item_id: i64,
    ) -> Result<(), sqlx::Error> {
        self.catalog_mut(kind).links.insert((recipe_id, item_id));
        Ok(())
    }
}
