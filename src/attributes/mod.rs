//! Tags and ingredients: per-user names attached to recipes.

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub use repo_types::{AttrKind, Ingredient, Tag};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::routes::<Tag>())
        .merge(handlers::routes::<Ingredient>())
}
