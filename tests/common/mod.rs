#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use cafe_directory::config::AppConfig;
use cafe_directory::database::models::Location;
use cafe_directory::database::MemoryStore;
use cafe_directory::services::StaticGeocoder;
use cafe_directory::{app, AppState};

/// Address the test geocoder knows; anything else fails to resolve
pub const KNOWN_ADDRESS: &str = "10 Rue de Rivoli";
pub const KNOWN_CITY: &str = "Paris";
pub const KNOWN_LOCATION: Location = Location { lat: 48.8556, lng: 2.3598 };

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: MemoryStore,
    pub geocoder: StaticGeocoder,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Start the real router in-process on a free port, backed by a fresh MemoryStore
    pub async fn start() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = port;
        config.transactions.initial_backoff_ms = 1;
        config.transactions.max_backoff_ms = 5;

        let store = MemoryStore::new();
        let geocoder = StaticGeocoder::new()
            .with_address(format!("{} {}", KNOWN_ADDRESS, KNOWN_CITY), KNOWN_LOCATION);
        let state = AppState::new(Arc::new(store.clone()), Arc::new(geocoder.clone()), config);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        let server = Self {
            port,
            base_url,
            store,
            geocoder,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a user and return `(user_id, token)`
    pub async fn signup(&self, email: &str) -> Result<(String, String)> {
        let res = self
            .client
            .post(self.url("/api/users/signup"))
            .json(&json!({ "username": "tester", "email": email, "password": "secret123" }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "signup returned {}", res.status());

        let body: Value = res.json().await?;
        let user_id = body["data"]["userId"].as_str().context("missing userId")?.to_string();
        let token = body["data"]["token"].as_str().context("missing token")?.to_string();
        Ok((user_id, token))
    }

    /// Create a café at the known address and return its JSON record
    pub async fn create_cafe(&self, token: &str, name: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.url("/api/cafes"))
            .bearer_auth(token)
            .json(&cafe_body(name))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "create returned {}", res.status());

        let body: Value = res.json().await?;
        Ok(body["data"].clone())
    }

    /// Ids in the user's owned set as listed by GET /api/users
    pub async fn owned_cafes(&self, user_id: &str) -> Result<Vec<String>> {
        let body: Value = self.client.get(self.url("/api/users")).send().await?.json().await?;
        let users = body["data"].as_array().context("users is not a list")?;
        let user = users
            .iter()
            .find(|u| u["id"] == json!(user_id))
            .context("user not listed")?;

        Ok(user["cafes"]
            .as_array()
            .context("cafes is not a list")?
            .iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect())
    }
}

pub fn cafe_body(name: &str) -> Value {
    json!({
        "name": name,
        "address": KNOWN_ADDRESS,
        "city": KNOWN_CITY,
        "numOfSeats": 24,
        "coffeeRating": "excellent",
        "socketAvailability": "plenty",
        "wifiStrength": "strong"
    })
}
