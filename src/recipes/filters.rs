use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::dto::RecipeListParams;
use crate::attributes::{AttrKind, Ingredient, Tag};
use crate::error::FieldErrors;

/// Narrowing applied to a recipe listing. Within one id set any match is
/// enough; both sets must match when both are given.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tag_ids: Option<Vec<i64>>,
    pub ingredient_ids: Option<Vec<i64>>,
}

/// Parses `"1,2,3"`. An absent or blank value means no filter.
pub(crate) fn parse_id_list(field: &str, raw: Option<&str>) -> Result<Option<Vec<i64>>, FieldErrors> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let mut ids = Vec::new();
    let mut errors = FieldErrors::new();
    for part in raw.split(',') {
        match part.trim().parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => errors.add(
                field,
                format!("{:?} is not a valid integer id.", part.trim()),
            ),
        }
    }

    if errors.is_empty() {
        ids.sort_unstable();
        ids.dedup();
        Ok(Some(ids))
    } else {
        Err(errors)
    }
}

impl RecipeFilter {
    pub fn from_params(params: &RecipeListParams) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let tag_ids = parse_id_list(Tag::FIELD, params.tags.as_deref())
            .map_err(|e| errors.merge(e))
            .ok()
            .flatten();
        let ingredient_ids = parse_id_list(Ingredient::FIELD, params.ingredients.as_deref())
            .map_err(|e| errors.merge(e))
            .ok()
            .flatten();

        if errors.is_empty() {
            Ok(Self {
                tag_ids,
                ingredient_ids,
            })
        } else {
            Err(errors)
        }
    }
}

fn push_link_filter<K: AttrKind>(qb: &mut QueryBuilder<'static, Postgres>, ids: &[i64]) {
    qb.push(format!(
        " AND EXISTS (SELECT 1 FROM {} l WHERE l.recipe_id = r.id AND l.{} = ANY(",
        K::LINK_TABLE,
        K::LINK_COLUMN
    ));
    qb.push_bind(ids.to_vec());
    qb.push("))");
}

/// Owner-scoped recipe listing, newest (highest id) first. Each recipe appears
/// once regardless of how many requested ids it matches.
pub(crate) fn list_query(user_id: Uuid, filter: &RecipeFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT r.id, r.user_id, r.title, r.description, r.time_minutes, r.price, r.link, r.image_key \
         FROM recipes r WHERE r.user_id = ",
    );
    qb.push_bind(user_id);
    if let Some(ids) = filter.tag_ids.as_deref() {
        push_link_filter::<Tag>(&mut qb, ids);
    }
    if let Some(ids) = filter.ingredient_ids.as_deref() {
        push_link_filter::<Ingredient>(&mut qb, ids);
    }
    qb.push(" ORDER BY r.id DESC");
    qb
}
