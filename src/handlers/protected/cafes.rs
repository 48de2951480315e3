// handlers/protected/cafes.rs - Café writes on behalf of the authenticated user
//
// Every mutation is delegated to the ownership manager; handlers only parse
// input and pick the caller's id out of the verified token.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{Cafe, CafeUpdate, NewCafe};
use crate::handlers::extract::{parse_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{validate_listing, CafeError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCafeRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub num_of_seats: i32,
    pub coffee_rating: String,
    pub socket_availability: String,
    pub wifi_strength: String,
    #[serde(default)]
    pub overall_rating: Vec<f64>,
}

impl CreateCafeRequest {
    fn validate(&self) -> Result<(), CafeError> {
        validate_listing(
            &[
                ("name", &self.name),
                ("address", &self.address),
                ("city", &self.city),
                ("coffeeRating", &self.coffee_rating),
                ("socketAvailability", &self.socket_availability),
                ("wifiStrength", &self.wifi_strength),
            ],
            self.num_of_seats,
            &self.overall_rating,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub overall_rating: f64,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

/// POST /api/cafes - create a café owned by the caller
///
/// Fields are validated first, then the address is geocoded before anything
/// is written. A lookup failure aborts the request with no store changes.
pub async fn cafe_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Cafe> {
    let request: CreateCafeRequest = parse_body(
        body,
        &[
            "name",
            "address",
            "city",
            "numOfSeats",
            "coffeeRating",
            "socketAvailability",
            "wifiStrength",
        ],
    )?;
    request.validate()?;
    tracing::debug!("User {} ({}) creating cafe '{}'", user.user_id, user.email, request.name);

    let query = format!("{} {}", request.address.trim(), request.city.trim());
    let location = state.geocoder.resolve(&query).await.map_err(CafeError::from)?;

    let fields = NewCafe {
        name: request.name,
        address: request.address,
        city: request.city,
        location,
        num_of_seats: request.num_of_seats,
        coffee_rating: request.coffee_rating,
        socket_availability: request.socket_availability,
        wifi_strength: request.wifi_strength,
        overall_rating: request.overall_rating,
    };

    let cafe = state.manager.create(user.user_id, fields).await?;
    Ok(ApiResponse::created(cafe))
}

/// PATCH /api/cafes/:id - owner-only amenity update
pub async fn cafe_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Cafe> {
    let id = parse_id(&id, "cafe")?;
    let update: CafeUpdate = parse_body(
        body,
        &["numOfSeats", "coffeeRating", "socketAvailability", "wifiStrength"],
    )?;

    let cafe = state.manager.update_attributes(id, user.user_id, update).await?;
    Ok(ApiResponse::success(cafe))
}

/// POST /api/cafes/rating/:id - append one rating sample
pub async fn cafe_rate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Cafe> {
    let id = parse_id(&id, "cafe")?;
    let request: RatingRequest = parse_body(body, &["overallRating"])?;

    tracing::debug!("User {} rating cafe {}", user.user_id, id);
    let cafe = state.manager.append_rating(id, request.overall_rating).await?;
    Ok(ApiResponse::created(cafe))
}

/// DELETE /api/cafes/:id - owner-only removal
pub async fn cafe_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    let id = parse_id(&id, "cafe")?;
    state.manager.delete(id, user.user_id).await?;
    Ok(ApiResponse::success(Deleted { id, deleted: true }))
}
