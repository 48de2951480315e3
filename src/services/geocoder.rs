use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::GeocoderConfig;
use crate::database::models::Location;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Could not find location for address '{0}'")]
    NoMatch(String),

    #[error("Geocoding provider error: {0}")]
    Upstream(String),
}

/// Turns a free-text address into coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError>;
}

/// LocationIQ search API client
pub struct LocationIqGeocoder {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

impl LocationIqGeocoder {
    pub fn new(config: &GeocoderConfig, api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GeocodeError::Upstream(format!("invalid geocoder url: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeocodeError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn search_url(&self, address: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", address)
            .append_pair("format", "json");
        url
    }

    fn parse_hits(address: &str, hits: Vec<SearchHit>) -> Result<Location, GeocodeError> {
        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch(address.to_string()))?;

        let lat = hit.lat.parse::<f64>();
        let lng = hit.lon.parse::<f64>();
        match (lat, lng) {
            (Ok(lat), Ok(lng)) if lat.is_finite() && lng.is_finite() => Ok(Location { lat, lng }),
            _ => Err(GeocodeError::Upstream(format!(
                "unparseable coordinates '{}', '{}'",
                hit.lat, hit.lon
            ))),
        }
    }
}

#[async_trait]
impl Geocoder for LocationIqGeocoder {
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError> {
        let response = self
            .client
            .get(self.search_url(address))
            .send()
            .await
            .map_err(|e| GeocodeError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(GeocodeError::NoMatch(address.to_string())),
            status if !status.is_success() => {
                return Err(GeocodeError::Upstream(format!("provider returned {}", status)))
            }
            _ => {}
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Upstream(e.to_string()))?;

        let location = Self::parse_hits(address, hits)?;
        tracing::debug!("Geocoded '{}' to ({}, {})", address, location.lat, location.lng);
        Ok(location)
    }
}

/// Geocoder backed by a fixed table, used when no provider key is configured
/// and in tests. Unknown addresses resolve to `fallback` if one is set.
///
/// Clones share one lookup counter.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    known: HashMap<String, Location>,
    fallback: Option<Location>,
    lookups: Arc<AtomicUsize>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: Location) -> Self {
        Self {
            fallback: Some(fallback),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>, location: Location) -> Self {
        self.known.insert(normalize(&address.into()), location);
        self
    }

    /// Number of `resolve` calls made so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

fn normalize(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.known
            .get(&normalize(address))
            .copied()
            .or(self.fallback)
            .ok_or_else(|| GeocodeError::NoMatch(address.to_string()))
    }
}
