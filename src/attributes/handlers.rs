use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{clean_name, AttrListParams, AttrPayload, AttrResponse},
    repo,
    repo_types::AttrKind,
};
use crate::{
    auth::AuthUser,
    error::{ApiError, FieldErrors},
    extract::{AppJson, AppQuery},
    state::AppState,
};

/// `/<field>` and `/<field>/:id` for one attribute kind.
pub fn routes<K: AttrKind>() -> Router<AppState> {
    let collection = format!("/{}", K::FIELD);
    let item = format!("/{}/:id", K::FIELD);
    Router::new()
        .route(&collection, get(list::<K>).post(create::<K>))
        .route(
            &item,
            get(retrieve::<K>)
                .put(update::<K>)
                .patch(partial_update::<K>)
                .delete(remove::<K>),
        )
}

fn required_name(payload: &AttrPayload) -> Result<String, ApiError> {
    match payload.name.as_deref() {
        Some(raw) => clean_name("name", raw).map_err(ApiError::Validation),
        None => Err(ApiError::Validation(FieldErrors::single(
            "name",
            "This field is required.",
        ))),
    }
}

#[instrument(skip(state), fields(kind = K::TABLE))]
pub async fn list<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(params): AppQuery<AttrListParams>,
) -> Result<Json<Vec<AttrResponse>>, ApiError> {
    let assigned_only = params.assigned_only().map_err(ApiError::Validation)?;
    let rows = repo::list::<K>(&state.db, user_id, assigned_only).await?;
    Ok(Json(rows.into_iter().map(AttrResponse::from).collect()))
}

#[instrument(skip(state, payload), fields(kind = K::TABLE))]
pub async fn create<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<AttrPayload>,
) -> Result<(StatusCode, Json<AttrResponse>), ApiError> {
    let name = required_name(&payload)?;
    let row = repo::create::<K>(&state.db, user_id, &name).await?;
    info!(%user_id, id = row.id, kind = K::LABEL, "attribute created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state), fields(kind = K::TABLE))]
pub async fn retrieve<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<AttrResponse>, ApiError> {
    repo::find::<K>(&state.db, user_id, id)
        .await?
        .map(|row| Json(row.into()))
        .ok_or(ApiError::NotFound(K::LABEL))
}

#[instrument(skip(state, payload), fields(kind = K::TABLE))]
pub async fn update<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<AttrPayload>,
) -> Result<Json<AttrResponse>, ApiError> {
    let name = required_name(&payload)?;
    repo::rename::<K>(&state.db, user_id, id, &name)
        .await?
        .map(|row| Json(row.into()))
        .ok_or(ApiError::NotFound(K::LABEL))
}

#[instrument(skip(state, payload), fields(kind = K::TABLE))]
pub async fn partial_update<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<AttrPayload>,
) -> Result<Json<AttrResponse>, ApiError> {
    let row = match payload.name.as_deref() {
        Some(raw) => {
            let name = clean_name("name", raw).map_err(ApiError::Validation)?;
            repo::rename::<K>(&state.db, user_id, id, &name).await?
        }
        None => repo::find::<K>(&state.db, user_id, id).await?,
    };
    row.map(|row| Json(row.into()))
        .ok_or(ApiError::NotFound(K::LABEL))
}

#[instrument(skip(state), fields(kind = K::TABLE))]
pub async fn remove<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !repo::delete::<K>(&state.db, user_id, id).await? {
        return Err(ApiError::NotFound(K::LABEL));
    }
    info!(%user_id, id, kind = K::LABEL, "attribute deleted");
    Ok(StatusCode::NO_CONTENT)
}
