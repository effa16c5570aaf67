use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::repo_types::{CatalogItem, CatalogKind, RecipeAggregate, RecipeFields, RecipeFilter};
use crate::error::{AppError, FieldErrors};

const MAX_TEXT_LEN: usize = 255;
const MAX_PRICE: i64 = 1000; // numeric(5, 2)
const REQUIRED: &str = "This field is required.";

#[derive(Debug, Clone, Deserialize)]
pub struct NameRef {
    pub name: String,
}

/// Body of POST, PUT and PATCH on recipes. Every key is optional at the JSON
/// level so absent and present-but-empty stay distinguishable; unknown keys
/// (`user`, `owner`, `image`, ...) are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i64>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<NameRef>>,
    pub ingredients: Option<Vec<NameRef>>,
}

/// How a payload is merged into the stored recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// New recipe: required fields present, the rest default.
    Create,
    /// PUT: required fields present, omitted fields reset to defaults.
    Replace,
    /// PATCH: only present fields change.
    Merge,
}

impl WriteMode {
    fn requires_all(self) -> bool {
        !matches!(self, WriteMode::Merge)
    }
}

/// A payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeWrite {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    /// `None` leaves the set alone; `Some(vec![])` clears it.
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipeWrite {
    pub fn names(&self, kind: CatalogKind) -> Option<&[String]> {
        match kind {
            CatalogKind::Tag => self.tags.as_deref(),
            CatalogKind::Ingredient => self.ingredients.as_deref(),
        }
    }

    /// Column values after applying this write on top of `base`.
    pub fn merged_onto(&self, base: &RecipeFields) -> RecipeFields {
        RecipeFields {
            title: self.title.clone().unwrap_or_else(|| base.title.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| base.description.clone()),
            time_minutes: self.time_minutes.unwrap_or(base.time_minutes),
            price: self.price.unwrap_or(base.price),
            link: self.link.clone().unwrap_or_else(|| base.link.clone()),
        }
    }
}

impl RecipePayload {
    /// Checks every present field and, outside of `Merge`, the required ones.
    /// Defaults are filled in for `Create` and `Replace`.
    pub fn validate(self, mode: WriteMode) -> Result<RecipeWrite, AppError> {
        let mut errors = FieldErrors::new();

        if mode.requires_all() {
            for (field, present) in [
                ("title", self.title.is_some()),
                ("time_minutes", self.time_minutes.is_some()),
                ("price", self.price.is_some()),
            ] {
                if !present {
                    errors.add(field, REQUIRED);
                }
            }
        }

        let title = self.title.map(|t| t.trim().to_string());
        if let Some(t) = &title {
            check_text("title", t, false, &mut errors);
        }
        let link = self.link.map(|l| l.trim().to_string());
        if let Some(l) = &link {
            check_text("link", l, true, &mut errors);
        }

        let time_minutes = match self.time_minutes {
            Some(m) if m < 0 => {
                errors.add("time_minutes", "Ensure this value is greater than or equal to 0.");
                None
            }
            Some(m) => match i32::try_from(m) {
                Ok(m) => Some(m),
                Err(_) => {
                    errors.add("time_minutes", "Ensure this value is less than or equal to 2147483647.");
                    None
                }
            },
            None => None,
        };

        let price = self.price.and_then(|p| check_price(p, &mut errors));

        let tags = self
            .tags
            .map(|list| check_names(CatalogKind::Tag, list, &mut errors));
        let ingredients = self
            .ingredients
            .map(|list| check_names(CatalogKind::Ingredient, list, &mut errors));

        errors.into_result()?;

        let mut write = RecipeWrite {
            title,
            description: self.description,
            time_minutes,
            price,
            link,
            tags,
            ingredients,
        };
        if mode.requires_all() {
            write.description.get_or_insert_with(String::new);
            write.link.get_or_insert_with(String::new);
            write.tags.get_or_insert_with(Vec::new);
            write.ingredients.get_or_insert_with(Vec::new);
        }
        Ok(write)
    }
}

fn check_text(field: &str, value: &str, blank_ok: bool, errors: &mut FieldErrors) {
    if !blank_ok && value.is_empty() {
        errors.add(field, "This field may not be blank.");
    }
    if value.chars().count() > MAX_TEXT_LEN {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_TEXT_LEN} characters."),
        );
    }
}

fn check_price(price: Decimal, errors: &mut FieldErrors) -> Option<Decimal> {
    let normalized = price.normalize();
    if normalized.is_sign_negative() && !normalized.is_zero() {
        errors.add("price", "Ensure this value is greater than or equal to 0.");
        return None;
    }
    if normalized.scale() > 2 {
        errors.add("price", "Ensure that there are no more than 2 decimal places.");
        return None;
    }
    if normalized >= Decimal::from(MAX_PRICE) {
        errors.add("price", "Ensure that there are no more than 5 digits in total.");
        return None;
    }
    let mut fixed = normalized;
    fixed.rescale(2);
    Some(fixed)
}

fn check_names(kind: CatalogKind, list: Vec<NameRef>, errors: &mut FieldErrors) -> Vec<String> {
    let mut names = Vec::with_capacity(list.len());
    for (i, item) in list.into_iter().enumerate() {
        let name = item.name.trim().to_string();
        if name.is_empty() {
            errors.add(kind.field(), format!("item {i}: name may not be blank."));
        } else if name.chars().count() > MAX_TEXT_LEN {
            errors.add(
                kind.field(),
                format!("item {i}: name has more than {MAX_TEXT_LEN} characters."),
            );
        } else {
            names.push(name);
        }
    }
    names
}

/// `?tags=1,2&ingredients=3`
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

impl RecipeListQuery {
    pub fn into_filter(self) -> Result<RecipeFilter, AppError> {
        let mut errors = FieldErrors::new();
        let tag_ids = parse_ids("tags", self.tags.as_deref(), &mut errors);
        let ingredient_ids = parse_ids("ingredients", self.ingredients.as_deref(), &mut errors);
        errors.into_result()?;
        Ok(RecipeFilter {
            tag_ids,
            ingredient_ids,
        })
    }
}

fn parse_ids(field: &str, raw: Option<&str>, errors: &mut FieldErrors) -> Option<Vec<i64>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let mut ids = Vec::new();
    for part in raw.split(',') {
        match part.trim().parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => {
                errors.add(field, format!("{part:?} is not a valid id."));
                return None;
            }
        }
    }
    Some(ids)
}

/// List representation.
#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<CatalogItem>,
    pub ingredients: Vec<CatalogItem>,
}

/// Single-recipe representation.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub description: String,
    pub image: Option<String>,
}

/// Upload-image response.
#[derive(Debug, Serialize)]
pub struct RecipeImage {
    pub id: i64,
    pub image: Option<String>,
}

/// The endpoints of the recipe resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeAction {
    List,
    Retrieve,
    Create,
    Update,
    PartialUpdate,
    UploadImage,
}

/// Response representation chosen for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Summary,
    Detail,
    Image,
}

impl RecipeAction {
    pub fn shape(self) -> Shape {
        match self {
            RecipeAction::List => Shape::Summary,
            RecipeAction::Retrieve
            | RecipeAction::Create
            | RecipeAction::Update
            | RecipeAction::PartialUpdate => Shape::Detail,
            RecipeAction::UploadImage => Shape::Image,
        }
    }

    /// Renders `agg` in this action's shape. `image_url` is the resolved URL of the stored image.
    pub fn render(self, agg: RecipeAggregate, image_url: Option<String>) -> Value {
        let id = agg.recipe.id;
        let value = match self.shape() {
            Shape::Summary => serde_json::to_value(summary(agg)),
            Shape::Detail => {
                let description = agg.recipe.description.clone();
                serde_json::to_value(RecipeDetail {
                    summary: summary(agg),
                    description,
                    image: image_url,
                })
            }
            Shape::Image => serde_json::to_value(RecipeImage {
                id,
                image: image_url,
            }),
        };
        value.unwrap_or(Value::Null)
    }
}

fn summary(agg: RecipeAggregate) -> RecipeSummary {
    RecipeSummary {
        id: agg.recipe.id,
        title: agg.recipe.title,
        time_minutes: agg.recipe.time_minutes,
        price: agg.recipe.price,
        link: agg.recipe.link,
        tags: agg.tags,
        ingredients: agg.ingredients,
    }
}
