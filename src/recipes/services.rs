use std::collections::{HashMap, HashSet};

use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{AttrNames, RecipeDetails, RecipeListItem};
use super::filters::RecipeFilter;
use super::repo;
use super::repo_types::{NewRecipe, RecipeChanges, RecipeRecord};
use crate::attributes::dto::AttrResponse;
use crate::attributes::{self, AttrKind, Ingredient, Tag};
use crate::error::ApiError;
use crate::state::AppState;

/// First occurrence of each exact (case-sensitive) name, in request order.
pub(crate) fn unique_names(names: &[String]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .iter()
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect()
}

/// Resolves every name to one of the caller's records (creating missing ones)
/// and makes that set the recipe's complete link set.
async fn attach_names_tx<K: AttrKind>(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    recipe_id: i64,
    names: &[String],
) -> anyhow::Result<()> {
    let mut ids = Vec::with_capacity(names.len());
    for name in unique_names(names) {
        let (id, created) = attributes::repo::find_or_create_tx::<K>(tx, user_id, name).await?;
        if created {
            info!(%user_id, id, kind = K::LABEL, "created on demand");
        }
        ids.push(id);
    }
    attributes::repo::replace_links_tx::<K>(tx, recipe_id, &ids).await
}

async fn apply_names_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    recipe_id: i64,
    names: &AttrNames,
) -> anyhow::Result<()> {
    if let Some(tags) = names.tags.as_deref() {
        attach_names_tx::<Tag>(tx, user_id, recipe_id, tags).await?;
    }
    if let Some(ingredients) = names.ingredients.as_deref() {
        attach_names_tx::<Ingredient>(tx, user_id, recipe_id, ingredients).await?;
    }
    Ok(())
}

fn group_by_recipe(rows: Vec<attributes::repo_types::LinkedAttr>) -> HashMap<i64, Vec<AttrResponse>> {
    let mut grouped: HashMap<i64, Vec<AttrResponse>> = HashMap::new();
    for row in rows {
        grouped.entry(row.recipe_id).or_default().push(AttrResponse {
            id: row.id,
            name: row.name,
        });
    }
    grouped
}

/// Attaches tags and ingredients to each record, keeping the input order.
async fn summarize(db: &PgPool, records: Vec<RecipeRecord>) -> anyhow::Result<Vec<(RecipeListItem, RecipeRecord)>> {
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    let mut tags = group_by_recipe(attributes::repo::list_linked::<Tag>(db, &ids).await?);
    let mut ingredients =
        group_by_recipe(attributes::repo::list_linked::<Ingredient>(db, &ids).await?);

    Ok(records
        .into_iter()
        .map(|r| {
            let item = RecipeListItem {
                id: r.id,
                title: r.title.clone(),
                time_minutes: r.time_minutes,
                price: r.price,
                link: r.link.clone(),
                tags: tags.remove(&r.id).unwrap_or_default(),
                ingredients: ingredients.remove(&r.id).unwrap_or_default(),
            };
            (item, r)
        })
        .collect())
}

pub(crate) async fn image_url(st: &AppState, key: Option<&str>) -> anyhow::Result<Option<String>> {
    match key {
        Some(key) => st
            .storage
            .presign_get(key, st.config.uploads.url_ttl_secs)
            .await
            .with_context(|| format!("presign url for {}", key))
            .map(Some),
        None => Ok(None),
    }
}

async fn details(st: &AppState, record: RecipeRecord) -> anyhow::Result<RecipeDetails> {
    let mut summaries = summarize(&st.db, vec![record]).await?;
    let (summary, record) = summaries
        .pop()
        .context("summary for a single recipe")?;
    let image = image_url(st, record.image_key.as_deref()).await?;
    Ok(RecipeDetails {
        summary,
        description: record.description,
        image,
    })
}

pub async fn list_recipes(
    st: &AppState,
    user_id: Uuid,
    filter: &RecipeFilter,
) -> Result<Vec<RecipeListItem>, ApiError> {
    let records = repo::list(&st.db, user_id, filter).await?;
    let items = summarize(&st.db, records)
        .await?
        .into_iter()
        .map(|(item, _)| item)
        .collect();
    Ok(items)
}

pub async fn get_recipe(st: &AppState, user_id: Uuid, id: i64) -> Result<RecipeDetails, ApiError> {
    let record = repo::find(&st.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("recipe"))?;
    Ok(details(st, record).await?)
}

/// Inserts the recipe and its nested tags/ingredients in one transaction.
pub async fn create_recipe(
    st: &AppState,
    user_id: Uuid,
    recipe: NewRecipe,
    names: AttrNames,
) -> Result<RecipeDetails, ApiError> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    let record = repo::insert_tx(&mut tx, user_id, &recipe).await?;
    apply_names_tx(&mut tx, user_id, record.id, &names).await?;
    tx.commit().await.context("commit tx")?;

    info!(%user_id, recipe_id = record.id, "recipe created");
    Ok(details(st, record).await?)
}

/// Updates fields and replaces any nested lists that were sent, atomically.
pub async fn update_recipe(
    st: &AppState,
    user_id: Uuid,
    id: i64,
    changes: RecipeChanges,
    names: AttrNames,
) -> Result<RecipeDetails, ApiError> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    let Some(record) = repo::update_tx(&mut tx, user_id, id, &changes).await? else {
        return Err(ApiError::NotFound("recipe"));
    };
    apply_names_tx(&mut tx, user_id, record.id, &names).await?;
    tx.commit().await.context("commit tx")?;

    info!(%user_id, recipe_id = record.id, "recipe updated");
    Ok(details(st, record).await?)
}

pub async fn delete_recipe(st: &AppState, user_id: Uuid, id: i64) -> Result<(), ApiError> {
    let record = repo::delete(&st.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("recipe"))?;

    if let Some(key) = record.image_key.as_deref() {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, key, recipe_id = id, "failed to delete image of removed recipe");
        }
    }
    info!(%user_id, recipe_id = id, "recipe deleted");
    Ok(())
}
