use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;

use bizchat_core::{EmbedCode, ProfileInput, PublicProfile};
use bizchat_db::BusinessProfile;

use super::{owner_from_headers, ApiError, AppState};

pub async fn create_business(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BusinessProfile>), ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    let Json(input) = payload?;
    let profile = state.service.create_profile(&owner, input)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn list_businesses(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BusinessProfile>>, ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    Ok(Json(state.service.list_profiles(&owner)?))
}

pub async fn get_business(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BusinessProfile>, ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    Ok(Json(state.service.get_profile(&owner, &id)?))
}

pub async fn update_business(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<Json<BusinessProfile>, ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    let Json(input) = payload?;
    Ok(Json(state.service.update_profile(&owner, &id, input)?))
}

pub async fn delete_business(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    state.service.delete_profile(&owner, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_public_business(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    Ok(Json(state.service.public_profile(&id)?))
}

pub async fn get_embed_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmbedCode>, ApiError> {
    Ok(Json(state.service.embed_code(&id, &state.public_base_url)?))
}
