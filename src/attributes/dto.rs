use serde::{Deserialize, Serialize};

use super::repo_types::AttrRecord;
use crate::error::{FieldErrors, NUL_NOT_ALLOWED};

pub(crate) const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttrResponse {
    pub id: i64,
    pub name: String,
}

impl From<AttrRecord> for AttrResponse {
    fn from(r: AttrRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
        }
    }
}

/// Body of create/update requests for a tag or ingredient.
#[derive(Debug, Default, Deserialize)]
pub struct AttrPayload {
    #[serde(default)]
    pub name: Option<String>,
}

/// `{ "name": ... }` element of a recipe's nested `tags`/`ingredients` list.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedItem {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttrListParams {
    #[serde(default)]
    pub assigned_only: Option<String>,
}

impl AttrListParams {
    /// `0`/absent lists everything, `1` lists only attributes used by a recipe.
    pub fn assigned_only(&self) -> Result<bool, FieldErrors> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") | Some("0") => Ok(false),
            Some("1") => Ok(true),
            Some(other) => Err(FieldErrors::single(
                "assigned_only",
                format!("Select a valid choice. {other} is not one of the available choices."),
            )),
        }
    }
}

/// Trimmed, non-blank name that fits the column.
pub(crate) fn clean_name(field: &str, raw: &str) -> Result<String, FieldErrors> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(FieldErrors::single(field, "This field may not be blank."));
    }
    if name.contains('\0') {
        return Err(FieldErrors::single(field, NUL_NOT_ALLOWED));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(FieldErrors::single(
            field,
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ));
    }
    Ok(name.to_string())
}
