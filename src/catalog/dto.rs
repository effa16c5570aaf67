use serde::Deserialize;

use crate::error::{AppError, FieldErrors};

const MAX_NAME_LEN: usize = 255;

/// `?assigned_only=1`
#[derive(Debug, Default, Deserialize)]
pub struct CatalogListQuery {
    pub assigned_only: Option<String>,
}

impl CatalogListQuery {
    pub fn assigned_only(&self) -> Result<bool, AppError> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => Ok(false),
            Some("1") | Some("true") => Ok(true),
            Some(other) => Err(AppError::field(
                "assigned_only",
                format!("{other:?} is not a valid boolean."),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RenameRequest {
    pub name: Option<String>,
}

impl RenameRequest {
    /// Trimmed new name, 1..=255 characters.
    pub fn validate(self) -> Result<String, AppError> {
        let mut errors = FieldErrors::new();
        let name = self.name.map(|n| n.trim().to_string());
        match &name {
            None => errors.add("name", "This field is required."),
            Some(n) if n.is_empty() => errors.add("name", "This field may not be blank."),
            Some(n) if n.chars().count() > MAX_NAME_LEN => errors.add(
                "name",
                format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
            ),
            Some(_) => {}
        }
        errors.into_result()?;
        Ok(name.unwrap_or_default())
    }
}
