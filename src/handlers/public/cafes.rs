// handlers/public/cafes.rs - Read-only café listings

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::database::models::{Cafe, CafeFilter};
use crate::error::ApiError;
use crate::handlers::extract::parse_id;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::CafeError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub city: Option<String>,
}

/// GET /api/cafes - all cafés, optionally narrowed with `?city=`
pub async fn cafes_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Cafe>> {
    let filter = CafeFilter {
        city: query.city.filter(|c| !c.trim().is_empty()),
        ..Default::default()
    };
    let cafes = state.store.find_cafes(&filter).await.map_err(CafeError::from)?;
    tracing::debug!("Listed {} cafes", cafes.len());
    Ok(ApiResponse::success(cafes))
}

/// GET /api/cafes/:id
pub async fn cafe_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Cafe> {
    let id = parse_id(&id, "cafe")?;

    match state.store.find_cafe(id).await.map_err(CafeError::from)? {
        Some(cafe) => Ok(ApiResponse::success(cafe)),
        None => Err(ApiError::not_found(format!("Could not find cafe for id {}", id))),
    }
}

/// GET /api/cafes/city/:name - cafés in one city, empty list when none
pub async fn cafes_by_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> ApiResult<Vec<Cafe>> {
    let cafes = state
        .store
        .find_cafes(&CafeFilter::city(city))
        .await
        .map_err(CafeError::from)?;
    Ok(ApiResponse::success(cafes))
}

/// GET /api/cafes/user/:uid - cafés in the user's owned set
pub async fn cafes_by_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<Vec<Cafe>> {
    let uid = parse_id(&uid, "user")?;

    match state.store.find_cafes_by_owner(uid).await.map_err(CafeError::from)? {
        Some(cafes) if !cafes.is_empty() => Ok(ApiResponse::success(cafes)),
        Some(_) => Err(ApiError::not_found(format!("User {} has not added any cafes", uid))),
        None => Err(ApiError::not_found(format!("Could not find user for id {}", uid))),
    }
}
