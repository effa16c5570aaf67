use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Recipe row, without its tag/ingredient sets.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>, // storage key
    pub created_at: OffsetDateTime,
}

/// Writable recipe columns. Owner and image are never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFields {
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

impl From<&Recipe> for RecipeFields {
    fn from(r: &Recipe) -> Self {
        Self {
            title: r.title.clone(),
            description: r.description.clone(),
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link.clone(),
        }
    }
}

/// The two per-user name catalogs a recipe links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Tag,
    Ingredient,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 2] = [CatalogKind::Tag, CatalogKind::Ingredient];

    pub fn table(self) -> &'static str {
        match self {
            CatalogKind::Tag => "tags",
            CatalogKind::Ingredient => "ingredients",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            CatalogKind::Tag => "recipe_tags",
            CatalogKind::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            CatalogKind::Tag => "tag_id",
            CatalogKind::Ingredient => "ingredient_id",
        }
    }

    /// Payload key the kind travels under.
    pub fn field(self) -> &'static str {
        self.table()
    }
}

/// A tag or an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CatalogItem {
    pub id: i64,
    #[serde(skip)]
    pub user_id: Uuid,
    pub name: String,
}

/// Result of renaming a catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rename {
    Done(CatalogItem),
    Missing,
    NameTaken,
}

/// Optional id filters for recipe listing; both present means both must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tag_ids: Option<Vec<i64>>,
    pub ingredient_ids: Option<Vec<i64>>,
}

/// A recipe with its hydrated tag and ingredient sets.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeAggregate {
    pub recipe: Recipe,
    pub tags: Vec<CatalogItem>,
    pub ingredients: Vec<CatalogItem>,
}
