use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{RecipeDetails, RecipeListItem, RecipeListParams, RecipePayload};
use super::filters::RecipeFilter;
use super::services;
use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::{AppJson, AppQuery},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .put(replace_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
}

/// GET /recipes?tags=1,2&ingredients=3
#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(params): AppQuery<RecipeListParams>,
) -> Result<Json<Vec<RecipeListItem>>, ApiError> {
    let filter = RecipeFilter::from_params(&params).map_err(|e| {
        warn!(%user_id, "malformed recipe filter");
        ApiError::Validation(e)
    })?;
    let items = services::list_recipes(&state, user_id, &filter).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetails>, ApiError> {
    Ok(Json(services::get_recipe(&state, user_id, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<RecipePayload>,
) -> Result<(StatusCode, HeaderMap, Json<RecipeDetails>), ApiError> {
    let (recipe, names) = payload.into_new().map_err(ApiError::Validation)?;
    let details = services::create_recipe(&state, user_id, recipe, names).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/recipes/{}", details.summary.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(details)))
}

/// PUT: title, time_minutes and price must be present.
#[instrument(skip(state, payload))]
pub async fn replace_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<RecipePayload>,
) -> Result<Json<RecipeDetails>, ApiError> {
    let (changes, names) = payload.into_changes(false).map_err(ApiError::Validation)?;
    Ok(Json(
        services::update_recipe(&state, user_id, id, changes, names).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<RecipePayload>,
) -> Result<Json<RecipeDetails>, ApiError> {
    let (changes, names) = payload.into_changes(true).map_err(ApiError::Validation)?;
    Ok(Json(
        services::update_recipe(&state, user_id, id, changes, names).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services::delete_recipe(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
