use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::repo_types::{NewRecipe, RecipeChanges};
use crate::attributes::dto::{clean_name, AttrResponse, NamedItem, MAX_NAME_LEN};
use crate::error::FieldErrors;

const REQUIRED: &str = "This field is required.";
const MAX_PRICE_DECIMAL_PLACES: u32 = 2;
const MAX_PRICE_WHOLE_DIGITS: u32 = 3;

#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<AttrResponse>,
    pub ingredients: Vec<AttrResponse>,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    #[serde(flatten)]
    pub summary: RecipeListItem,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: i64,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeListParams {
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
}

/// Create/update body. Fields outside this set (`user`, `id`, ...) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_minutes: Option<i64>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<NamedItem>>,
    #[serde(default)]
    pub ingredients: Option<Vec<NamedItem>>,
}

/// Nested names requested for the recipe. `None` leaves links untouched,
/// an empty list clears them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AttrNames {
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

fn check_price(price: &Decimal) -> Vec<String> {
    let mut problems = Vec::new();
    if price.scale() > MAX_PRICE_DECIMAL_PLACES {
        problems.push(format!(
            "Ensure that there are no more than {MAX_PRICE_DECIMAL_PLACES} decimal places."
        ));
    }
    if price.abs().trunc() >= Decimal::from(10i64.pow(MAX_PRICE_WHOLE_DIGITS)) {
        problems.push(format!(
            "Ensure that there are no more than {MAX_PRICE_WHOLE_DIGITS} digits before the decimal point."
        ));
    }
    problems
}

fn clean_names(field: &str, items: Option<Vec<NamedItem>>, errors: &mut FieldErrors) -> Option<Vec<String>> {
    let items = items?;
    let mut names = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match clean_name(&format!("{field}[{i}].name"), &item.name) {
            Ok(name) => names.push(name),
            Err(e) => errors.merge(e),
        }
    }
    Some(names)
}

impl RecipePayload {
    fn clean(self, require_core: bool) -> Result<(RecipeChanges, AttrNames), FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = match self.title.as_deref() {
            Some(raw) => clean_name("title", raw).map_err(|e| errors.merge(e)).ok(),
            None => None,
        };

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

        if let Some(price) = self.price.as_ref() {
            for problem in check_price(price) {
                errors.add("price", problem);
            }
        }

        if let Some(description) = self.description.as_deref() {
            errors.forbid_nul("description", description);
        }

        if let Some(link) = self.link.as_deref() {
            errors.forbid_nul("link", link);
            if link.chars().count() > MAX_NAME_LEN {
                errors.add(
                    "link",
                    format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
                );
            }
        }

        if require_core {
            if self.title.is_none() {
                errors.add("title", REQUIRED);
            }
            if self.time_minutes.is_none() {
                errors.add("time_minutes", REQUIRED);
            }
            if self.price.is_none() {
                errors.add("price", REQUIRED);
            }
        }

        let names = AttrNames {
            tags: clean_names("tags", self.tags, &mut errors),
            ingredients: clean_names("ingredients", self.ingredients, &mut errors),
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let changes = RecipeChanges {
            title,
            description: self.description,
            time_minutes,
            price: self.price,
            link: self.link.map(|l| l.trim().to_string()),
        };
        Ok((changes, names))
    }

    /// POST: title, time_minutes and price are required.
    pub fn into_new(self) -> Result<(NewRecipe, AttrNames), FieldErrors> {
        let (changes, names) = self.clean(true)?;
        match (changes.title, changes.time_minutes, changes.price) {
            (Some(title), Some(time_minutes), Some(price)) => Ok((
                NewRecipe {
                    title,
                    description: changes.description.unwrap_or_default(),
                    time_minutes,
                    price,
                    link: changes.link.unwrap_or_default(),
                },
                names,
            )),
            _ => Err(FieldErrors::single("body", REQUIRED)),
        }
    }

    /// PUT requires the core fields, PATCH does not. Omitted fields stay as stored.
    pub fn into_changes(self, partial: bool) -> Result<(RecipeChanges, AttrNames), FieldErrors> {
        self.clean(!partial)
    }
}
