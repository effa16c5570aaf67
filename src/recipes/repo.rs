use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{CatalogItem, CatalogKind, Recipe, RecipeFields, RecipeFilter, Rename};

/// Ownership-scoped data access for recipes and their catalogs.
///
/// Every lookup takes the requesting user; rows owned by someone else are
/// indistinguishable from missing rows. One value of an implementation is one
/// unit of work: the Postgres store wraps a transaction that the caller commits.
#[async_trait]
pub trait RecipeStore: Send {
    /// Newest id first, each recipe once.
    async fn list_recipes(
        &mut self,
        user_id: Uuid,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, sqlx::Error>;

    async fn get_recipe(&mut self, user_id: Uuid, id: i64) -> Result<Option<Recipe>, sqlx::Error>;

    async fn insert_recipe(
        &mut self,
        user_id: Uuid,
        fields: &RecipeFields,
    ) -> Result<Recipe, sqlx::Error>;

    async fn update_recipe(
        &mut self,
        user_id: Uuid,
        id: i64,
        fields: &RecipeFields,
    ) -> Result<Option<Recipe>, sqlx::Error>;

    async fn set_recipe_image(
        &mut self,
        user_id: Uuid,
        id: i64,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, sqlx::Error>;

    /// Removes the recipe and its link rows. Linked catalog rows stay.
    async fn delete_recipe(&mut self, user_id: Uuid, id: i64) -> Result<bool, sqlx::Error>;

    async fn find_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogItem>, sqlx::Error>;

    /// `None` when `(user_id, name)` already exists.
    async fn insert_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogItem>, sqlx::Error>;

    async fn get_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
    ) -> Result<Option<CatalogItem>, sqlx::Error>;

    /// Ordered by name descending. `assigned_only` keeps items linked to at
    /// least one of the user's recipes, each once.
    async fn list_items(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<CatalogItem>, sqlx::Error>;

    async fn rename_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Rename, sqlx::Error>;

    async fn delete_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
    ) -> Result<bool, sqlx::Error>;

    /// Items linked to each of `recipe_ids`, as `(recipe_id, item)` pairs ordered by item id.
    async fn items_for_recipes(
        &mut self,
        kind: CatalogKind,
        recipe_ids: &[i64],
    ) -> Result<Vec<(i64, CatalogItem)>, sqlx::Error>;

    async fn clear_links(&mut self, kind: CatalogKind, recipe_id: i64) -> Result<(), sqlx::Error>;

    async fn link_item(
        &mut self,
        kind: CatalogKind,
        recipe_id: i64,
        item_id: i64,
    ) -> Result<(), sqlx::Error>;
}

/// `RecipeStore` over one Postgres transaction.
pub struct PgStore {
    tx: Transaction<'static, Postgres>,
}

const RECIPE_COLUMNS: &str =
    "id, user_id, title, description, time_minutes, price, link, image, created_at";

impl PgStore {
    pub async fn begin(db: &PgPool) -> Result<Self, sqlx::Error> {
        Ok(Self { tx: db.begin().await? })
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn list_recipes(
        &mut self,
        user_id: Uuid,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, sqlx::Error> {
        // EXISTS keeps one row per recipe however many links match.
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
              FROM recipes r
             WHERE r.user_id = $1
               AND ($2::bigint[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_tags rt
                     WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
               AND ($3::bigint[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_ingredients ri
                     WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
             ORDER BY r.id DESC
            "#
        ))
        .bind(user_id)
        .bind(filter.tag_ids.as_deref())
        .bind(filter.ingredient_ids.as_deref())
        .fetch_all(&mut *self.tx)
        .await
    }

    async fn get_recipe(&mut self, user_id: Uuid, id: i64) -> Result<Option<Recipe>, sqlx::Error> {
        sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn insert_recipe(
        &mut self,
        user_id: Uuid,
        fields: &RecipeFields,
    ) -> Result<Recipe, sqlx::Error> {
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes (user_id, title, description, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.time_minutes)
        .bind(fields.price)
        .bind(&fields.link)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn update_recipe(
        &mut self,
        user_id: Uuid,
        id: i64,
        fields: &RecipeFields,
    ) -> Result<Option<Recipe>, sqlx::Error> {
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes
               SET title = $3, description = $4, time_minutes = $5, price = $6, link = $7
             WHERE id = $1 AND user_id = $2
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.time_minutes)
        .bind(fields.price)
        .bind(&fields.link)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn set_recipe_image(
        &mut self,
        user_id: Uuid,
        id: i64,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, sqlx::Error> {
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes SET image = $3
             WHERE id = $1 AND user_id = $2
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(image)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn delete_recipe(&mut self, user_id: Uuid, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogItem>, sqlx::Error> {
        sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 AND name = $2",
            kind.table()
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn insert_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogItem>, sqlx::Error> {
        sqlx::query_as::<_, CatalogItem>(&format!(
            r#"
            INSERT INTO {} (user_id, name) VALUES ($1, $2)
            ON CONFLICT (user_id, name) DO NOTHING
            RETURNING id, user_id, name
            "#,
            kind.table()
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn get_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
    ) -> Result<Option<CatalogItem>, sqlx::Error> {
        sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT id, user_id, name FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn list_items(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<CatalogItem>, sqlx::Error> {
        sqlx::query_as::<_, CatalogItem>(&format!(
            r#"
            SELECT c.id, c.user_id, c.name
              FROM {table} c
             WHERE c.user_id = $1
               AND (NOT $2 OR EXISTS (
                    SELECT 1 FROM {links} l
                      JOIN recipes r ON r.id = l.recipe_id
                     WHERE l.{col} = c.id AND r.user_id = $1))
             ORDER BY c.name DESC
            "#,
            table = kind.table(),
            links = kind.link_table(),
            col = kind.link_column(),
        ))
        .bind(user_id)
        .bind(assigned_only)
        .fetch_all(&mut *self.tx)
        .await
    }

    async fn rename_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Rename, sqlx::Error> {
        let res = sqlx::query_as::<_, CatalogItem>(&format!(
            r#"
            UPDATE {} SET name = $3
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name
            "#,
            kind.table()
        ))
        .bind(id)
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await;

        match res {
            Ok(Some(item)) => Ok(Rename::Done(item)),
            Ok(None) => Ok(Rename::Missing),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(Rename::NameTaken),
            Err(e) => Err(e),
        }
    }

    async fn delete_item(
        &mut self,
        kind: CatalogKind,
        user_id: Uuid,
        id: i64,
    ) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        ))
        .bind(id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn items_for_recipes(
        &mut self,
        kind: CatalogKind,
        recipe_ids: &[i64],
    ) -> Result<Vec<(i64, CatalogItem)>, sqlx::Error> {
        #[derive(sqlx::FromRow)]
        struct Row {
            recipe_id: i64,
            id: i64,
            user_id: Uuid,
            name: String,
        }

        let rows = sqlx::query_as::<_, Row>(&format!(
            r#"
            SELECT l.recipe_id, c.id, c.user_id, c.name
              FROM {links} l
              JOIN {table} c ON c.id = l.{col}
             WHERE l.recipe_id = ANY($1)
             ORDER BY l.recipe_id, c.id
            "#,
            links = kind.link_table(),
            table = kind.table(),
            col = kind.link_column(),
        ))
        .bind(recipe_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.recipe_id,
                    CatalogItem {
                        id: r.id,
                        user_id: r.user_id,
                        name: r.name,
                    },
                )
            })
            .collect())
    }

    async fn clear_links(&mut self, kind: CatalogKind, recipe_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE recipe_id = $1",
            kind.link_table()
        ))
        .bind(recipe_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn link_item(
        &mut self,
        kind: CatalogKind,
        recipe_id: i64,
        item_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "INSERT INTO {} (recipe_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        ))
        .bind(recipe_id)
        .bind(item_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}
