// handlers/extract.rs - Request parsing shared by public and protected handlers
//
// Path ids and JSON bodies are parsed here rather than through axum's typed
// extractors so that malformed input still gets the standard error envelope.

use axum::{extract::rejection::JsonRejection, Json};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;

/// Parse a path segment as a UUID, 400 on failure
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::bad_request(format!("Invalid {} id '{}'", what, raw)))
}

/// Unwrap a JSON body, check that `required` fields are present and non-null,
/// then deserialize it into `T`.
pub fn parse_body<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
    required: &[&str],
) -> Result<T, ApiError> {
    let Json(value) = body.map_err(|rejection| ApiError::invalid_json(rejection.body_text()))?;

    let object = value
        .as_object()
        .ok_or_else(|| ApiError::invalid_json("Request body must be a JSON object"))?;

    let field_errors: HashMap<String, String> = required
        .iter()
        .filter(|field| object.get(**field).map_or(true, Value::is_null))
        .map(|field| (field.to_string(), "This field is required".to_string()))
        .collect();

    if !field_errors.is_empty() {
        return Err(ApiError::unprocessable_entity("Missing required fields", field_errors));
    }

    serde_json::from_value(value)
        .map_err(|e| ApiError::unprocessable_entity(e.to_string(), HashMap::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Seats {
        num_of_seats: i32,
    }

    #[test]
    fn invalid_uuid_is_bad_request() {
        let err = parse_id("not-a-uuid", "cafe").unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[test]
    fn missing_fields_are_listed() {
        let body = Ok(Json(json!({ "numOfSeats": null })));
        let err = parse_body::<Seats>(body, &["numOfSeats"]).unwrap_err();

        match err {
            ApiError::UnprocessableEntity { field_errors, .. } => {
                assert!(field_errors.contains_key("numOfSeats"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wrong_types_are_unprocessable() {
        let body = Ok(Json(json!({ "numOfSeats": "many" })));
        let err = parse_body::<Seats>(body, &["numOfSeats"]).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 422);

        let body = Ok(Json(json!({ "numOfSeats": 4 })));
        let seats: Seats = parse_body(body, &["numOfSeats"]).unwrap();
        assert_eq!(seats.num_of_seats, 4);
    }

    #[test]
    fn non_object_body_is_invalid_json() {
        let err = parse_body::<Seats>(Ok(Json(json!([1, 2]))), &[]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson(_)));
    }
}
