use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::filters::{list_query, RecipeFilter};
use super::repo_types::{NewRecipe, RecipeChanges, RecipeRecord};

const RECIPE_COLUMNS: &str =
    "id, user_id, title, description, time_minutes, price, link, image_key";

pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    filter: &RecipeFilter,
) -> anyhow::Result<Vec<RecipeRecord>> {
    let rows = list_query(user_id, filter)
        .build_query_as::<RecipeRecord>()
        .fetch_all(db)
        .await
        .context("list recipes")?;
    Ok(rows)
}

pub async fn find(db: &PgPool, user_id: Uuid, id: i64) -> anyhow::Result<Option<RecipeRecord>> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("find recipe")?;
    Ok(row)
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    recipe: &NewRecipe,
) -> anyhow::Result<RecipeRecord> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        r#"
        INSERT INTO recipes (user_id, title, description, time_minutes, price, link)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {RECIPE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&recipe.title)
    .bind(&recipe.description)
    .bind(recipe.time_minutes)
    .bind(recipe.price)
    .bind(&recipe.link)
    .fetch_one(&mut **tx)
    .await
    .context("insert recipe")?;
    Ok(row)
}

/// Applies the present fields; `None` when the recipe is not the caller's.
pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    id: i64,
    changes: &RecipeChanges,
) -> anyhow::Result<Option<RecipeRecord>> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        r#"
        UPDATE recipes
           SET title        = COALESCE($3, title),
               description  = COALESCE($4, description),
               time_minutes = COALESCE($5, time_minutes),
               price        = COALESCE($6, price),
               link         = COALESCE($7, link)
         WHERE id = $1 AND user_id = $2
        RETURNING {RECIPE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(user_id)
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(changes.link.as_deref())
    .fetch_optional(&mut **tx)
    .await
    .context("update recipe")?;
    Ok(row)
}

/// Deletes and returns the row, or `None` when the recipe is not the caller's.
pub async fn delete(db: &PgPool, user_id: Uuid, id: i64) -> anyhow::Result<Option<RecipeRecord>> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        "DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("delete recipe")?;
    Ok(row)
}

/// Locks the caller's recipe row and returns its current image key.
pub async fn lock_image_key_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    id: i64,
) -> anyhow::Result<Option<Option<String>>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT image_key FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock recipe image")?;
    Ok(row.map(|(key,)| key))
}

pub async fn set_image_key_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    image_key: &str,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE recipes SET image_key = $2 WHERE id = $1")
        .bind(id)
        .bind(image_key)
        .execute(&mut **tx)
        .await
        .context("set recipe image")?;
    Ok(())
}
