use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Geographic coordinates resolved from a café's address
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// A café as persisted and as returned to clients.
///
/// `creator` is fixed at creation; the owning user lists this café's id in its
/// `cafes` set for as long as the row exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cafe {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    #[sqlx(flatten)]
    pub location: Location,
    pub num_of_seats: i32,
    pub coffee_rating: String,
    pub socket_availability: String,
    pub wifi_strength: String,
    pub overall_rating: Vec<f64>,
    pub creator: Uuid,
}

/// Fields required to create a café; coordinates are resolved before this is built
#[derive(Debug, Clone, PartialEq)]
pub struct NewCafe {
    pub name: String,
    pub address: String,
    pub city: String,
    pub location: Location,
    pub num_of_seats: i32,
    pub coffee_rating: String,
    pub socket_availability: String,
    pub wifi_strength: String,
    pub overall_rating: Vec<f64>,
}

impl NewCafe {
    pub fn into_cafe(self, id: Uuid, creator: Uuid) -> Cafe {
        Cafe {
            id,
            name: self.name,
            address: self.address,
            city: self.city,
            location: self.location,
            num_of_seats: self.num_of_seats,
            coffee_rating: self.coffee_rating,
            socket_availability: self.socket_availability,
            wifi_strength: self.wifi_strength,
            overall_rating: self.overall_rating,
            creator,
        }
    }
}

/// Owner-editable attributes
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CafeUpdate {
    pub num_of_seats: i32,
    pub coffee_rating: String,
    pub socket_availability: String,
    pub wifi_strength: String,
}

impl CafeUpdate {
    pub fn apply_to(&self, cafe: &mut Cafe) {
        cafe.num_of_seats = self.num_of_seats;
        cafe.coffee_rating = self.coffee_rating.clone();
        cafe.socket_availability = self.socket_availability.clone();
        cafe.wifi_strength = self.wifi_strength.clone();
    }
}

/// Read-side filter for café listings. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CafeFilter {
    pub city: Option<String>,
    pub creator: Option<Uuid>,
}

impl CafeFilter {
    pub fn city(name: impl Into<String>) -> Self {
        Self {
            city: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, cafe: &Cafe) -> bool {
        self.city.as_deref().map_or(true, |city| cafe.city == city)
            && self.creator.map_or(true, |creator| cafe.creator == creator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(city: &str, creator: Uuid) -> Cafe {
        NewCafe {
            name: "Bean There".to_string(),
            address: "1 Main St".to_string(),
            city: city.to_string(),
            location: Location { lat: 52.52, lng: 13.40 },
            num_of_seats: 12,
            coffee_rating: "high".to_string(),
            socket_availability: "some".to_string(),
            wifi_strength: "strong".to_string(),
            overall_rating: vec![4.0],
        }
        .into_cafe(Uuid::new_v4(), creator)
    }

    #[test]
    fn serializes_record_shape() {
        let creator = Uuid::new_v4();
        let cafe = sample("Berlin", creator);
        let value = serde_json::to_value(&cafe).unwrap();

        assert_eq!(value["location"], json!({ "lat": 52.52, "lng": 13.40 }));
        assert_eq!(value["numOfSeats"], json!(12));
        assert_eq!(value["overallRating"], json!([4.0]));
        assert_eq!(value["creator"], json!(creator));
    }

    #[test]
    fn filter_matches_city_and_creator() {
        let owner = Uuid::new_v4();
        let cafe = sample("Berlin", owner);

        assert!(CafeFilter::default().matches(&cafe));
        assert!(CafeFilter::city("Berlin").matches(&cafe));
        assert!(!CafeFilter::city("Paris").matches(&cafe));
        assert!(!CafeFilter { city: None, creator: Some(Uuid::new_v4()) }.matches(&cafe));
        assert!(CafeFilter { city: Some("Berlin".into()), creator: Some(owner) }.matches(&cafe));
    }

    #[test]
    fn update_leaves_identity_and_ratings_alone() {
        let mut cafe = sample("Berlin", Uuid::new_v4());
        let before = cafe.clone();

        CafeUpdate {
            num_of_seats: 40,
            coffee_rating: "low".to_string(),
            socket_availability: "none".to_string(),
            wifi_strength: "weak".to_string(),
        }
        .apply_to(&mut cafe);

        assert_eq!(cafe.num_of_seats, 40);
        assert_eq!(cafe.wifi_strength, "weak");
        assert_eq!(cafe.id, before.id);
        assert_eq!(cafe.creator, before.creator);
        assert_eq!(cafe.overall_rating, before.overall_rating);
    }
}
