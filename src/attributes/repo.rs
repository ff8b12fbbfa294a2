use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::repo_types::{AttrKind, AttrRecord, LinkedAttr};

/// Owner-scoped listing, newest name first. `assigned_only` keeps rows with at
/// least one recipe link; EXISTS keeps each row once however many recipes use it.
pub(crate) fn list_query<K: AttrKind>(
    user_id: Uuid,
    assigned_only: bool,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT a.id, a.user_id, a.name FROM {} a WHERE a.user_id = ",
        K::TABLE
    ));
    qb.push_bind(user_id);
    if assigned_only {
        qb.push(format!(
            " AND EXISTS (SELECT 1 FROM {} l WHERE l.{} = a.id)",
            K::LINK_TABLE,
            K::LINK_COLUMN
        ));
    }
    qb.push(" ORDER BY a.name DESC, a.id DESC");
    qb
}

pub async fn list<K: AttrKind>(
    db: &PgPool,
    user_id: Uuid,
    assigned_only: bool,
) -> anyhow::Result<Vec<AttrRecord>> {
    let rows = list_query::<K>(user_id, assigned_only)
        .build_query_as::<AttrRecord>()
        .fetch_all(db)
        .await
        .with_context(|| format!("list {}", K::TABLE))?;
    Ok(rows)
}

pub async fn find<K: AttrKind>(
    db: &PgPool,
    user_id: Uuid,
    id: i64,
) -> anyhow::Result<Option<AttrRecord>> {
    let row = sqlx::query_as::<_, AttrRecord>(&format!(
        "SELECT id, user_id, name FROM {} WHERE id = $1 AND user_id = $2",
        K::TABLE
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .with_context(|| format!("find {}", K::LABEL))?;
    Ok(row)
}

pub async fn create<K: AttrKind>(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
) -> anyhow::Result<AttrRecord> {
    let row = sqlx::query_as::<_, AttrRecord>(&format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
        K::TABLE
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(db)
    .await
    .with_context(|| format!("insert {}", K::LABEL))?;
    Ok(row)
}

pub async fn rename<K: AttrKind>(
    db: &PgPool,
    user_id: Uuid,
    id: i64,
    name: &str,
) -> anyhow::Result<Option<AttrRecord>> {
    let row = sqlx::query_as::<_, AttrRecord>(&format!(
        "UPDATE {} SET name = $3 WHERE id = $1 AND user_id = $2 RETURNING id, user_id, name",
        K::TABLE
    ))
    .bind(id)
    .bind(user_id)
    .bind(name)
    .fetch_optional(db)
    .await
    .with_context(|| format!("rename {}", K::LABEL))?;
    Ok(row)
}

/// Returns false when nothing owned by `user_id` had that id.
pub async fn delete<K: AttrKind>(db: &PgPool, user_id: Uuid, id: i64) -> anyhow::Result<bool> {
    let res = sqlx::query(&format!(
        "DELETE FROM {} WHERE id = $1 AND user_id = $2",
        K::TABLE
    ))
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await
    .with_context(|| format!("delete {}", K::LABEL))?;
    Ok(res.rows_affected() > 0)
}

/// Id of the owner's record with exactly this name, inserting one if absent.
/// Lowest id wins when duplicates already exist.
pub async fn find_or_create_tx<K: AttrKind>(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    name: &str,
) -> anyhow::Result<(i64, bool)> {
    let existing: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT id FROM {} WHERE user_id = $1 AND name = $2 ORDER BY id LIMIT 1",
        K::TABLE
    ))
    .bind(user_id)
    .bind(name)
    .fetch_optional(&mut **tx)
    .await
    .with_context(|| format!("lookup {} by name", K::LABEL))?;

    if let Some(id) = existing {
        return Ok((id, false));
    }

    let id: i64 = sqlx::query_scalar(&format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id",
        K::TABLE
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("insert {}", K::LABEL))?;
    Ok((id, true))
}

/// Makes `attr_ids` the complete set of links for the recipe.
pub async fn replace_links_tx<K: AttrKind>(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    attr_ids: &[i64],
) -> anyhow::Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE recipe_id = $1", K::LINK_TABLE))
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("clear {}", K::LINK_TABLE))?;

    if attr_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(&format!(
        "INSERT INTO {} (recipe_id, {}) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
        K::LINK_TABLE,
        K::LINK_COLUMN
    ))
    .bind(recipe_id)
    .bind(attr_ids)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("link {}", K::LINK_TABLE))?;
    Ok(())
}

/// Attributes linked to any of `recipe_ids`, ordered by attribute id.
pub async fn list_linked<K: AttrKind>(
    db: &PgPool,
    recipe_ids: &[i64],
) -> anyhow::Result<Vec<LinkedAttr>> {
    if recipe_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, LinkedAttr>(&format!(
        r#"
        SELECT l.recipe_id, a.id, a.name
          FROM {link} l
          JOIN {table} a ON a.id = l.{col}
         WHERE l.recipe_id = ANY($1)
         ORDER BY a.id ASC
        "#,
        link = K::LINK_TABLE,
        table = K::TABLE,
        col = K::LINK_COLUMN
    ))
    .bind(recipe_ids)
    .fetch_all(db)
    .await
    .with_context(|| format!("list linked {}", K::TABLE))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::repo_types::{Ingredient, Tag};

    #[test]
    fn list_query_is_owner_scoped_and_ordered_by_name() {
        let qb = list_query::<Tag>(Uuid::new_v4(), false);
        let sql = qb.sql();
        assert!(sql.contains("FROM tags a WHERE a.user_id = $1"));
        assert!(!sql.contains("EXISTS"));
        assert!(sql.ends_with("ORDER BY a.name DESC, a.id DESC"));
    }

    #[test]
    fn assigned_only_filters_through_link_table() {
        let qb = list_query::<Ingredient>(Uuid::new_v4(), true);
        let sql = qb.sql();
        assert!(sql.contains(
            "EXISTS (SELECT 1 FROM recipe_ingredients l WHERE l.ingredient_id = a.id)"
        ));
        assert!(!sql.contains("DISTINCT"));
    }
}
