use sqlx::FromRow;
use uuid::Uuid;

/// Table layout shared by the per-user recipe attributes (tags, ingredients).
pub trait AttrKind: Send + Sync + 'static {
    /// Entity table, e.g. `tags`.
    const TABLE: &'static str;
    /// Join table pairing recipes with this entity.
    const LINK_TABLE: &'static str;
    /// Column of `LINK_TABLE` referencing `TABLE`.
    const LINK_COLUMN: &'static str;
    /// Singular name used in messages.
    const LABEL: &'static str;
    /// Recipe payload field and list query parameter.
    const FIELD: &'static str;
}

pub struct Tag;

impl AttrKind for Tag {
    const TABLE: &'static str = "tags";
    const LINK_TABLE: &'static str = "recipe_tags";
    const LINK_COLUMN: &'static str = "tag_id";
    const LABEL: &'static str = "tag";
    const FIELD: &'static str = "tags";
}

pub struct Ingredient;

impl AttrKind for Ingredient {
    const TABLE: &'static str = "ingredients";
    const LINK_TABLE: &'static str = "recipe_ingredients";
    const LINK_COLUMN: &'static str = "ingredient_id";
    const LABEL: &'static str = "ingredient";
    const FIELD: &'static str = "ingredients";
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AttrRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub name: String,
}

/// An attribute as attached to one recipe.
#[derive(Debug, Clone, FromRow)]
pub struct LinkedAttr {
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
}
