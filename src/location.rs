//! Points on the map and travel time between them

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::RoutingConfig;

/// Initial delay between attempts, doubled on every retry
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Upper bound for attempts per lookup, whatever is configured
const MAX_ATTEMPTS: u32 = 8;

/// How long a computed travel time stays valid
const CACHE_TTL: Duration = Duration::from_secs(60);

/// A latitude/longitude pair
///
/// Kept as text, so coordinates are passed on exactly as they were reported
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub latitude: String,
    pub longitude: String,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
        }
    }
}

/// Error parsing a `lat,lon` pair
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid coordinates `{0}`, expected `latitude,longitude`")]
pub struct InvalidPoint(String);

impl FromStr for Point {
    type Err = InvalidPoint;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let stripped: String = value.chars().filter(|c| !c.is_whitespace()).collect();

        let Some((latitude, longitude)) = stripped.split_once(',') else {
            return Err(InvalidPoint(value.to_string()));
        };

        let valid = |part: &str, limit: f64| {
            part.parse::<f64>()
                .is_ok_and(|number| number.is_finite() && number.abs() <= limit)
        };

        if !valid(latitude, 90.0) || !valid(longitude, 180.0) {
            return Err(InvalidPoint(value.to_string()));
        }

        Ok(Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
        })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Routing failures
#[derive(Debug, Error)]
pub enum RouteError {
    /// Could not reach the provider, or it failed on its side
    #[error("Routing provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered, but without a usable route
    #[error("No route found: {0}")]
    NoRoute(String),
}

/// Estimates how long it takes to travel between two points
#[async_trait]
pub trait TravelTime: Send + Sync {
    /// Travel time in seconds
    async fn duration(&self, from: &Point, to: &Point) -> Result<i64, RouteError>;
}

/// Distance Matrix style JSON API
pub struct DistanceMatrix {
    client: Client,
    base_url: Url,
    api_key: String,
    max_attempts: u32,
    cache: Arc<Cache<(Point, Point), i64>>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(default)]
    status: String,
    duration: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Value {
    value: i64,
}

impl DistanceMatrix {
    /// Create the client from configuration
    ///
    /// # Errors
    ///
    /// Will return `Err` when the HTTP client can not be built
    pub fn new(config: &RoutingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            max_attempts: config.max_attempts.clamp(1, MAX_ATTEMPTS),
            cache: Arc::new(cache),
        })
    }

    fn url(&self, from: &Point, to: &Point) -> Url {
        let mut url = self.base_url.clone();

        url.query_pairs_mut()
            .append_pair("origins", &from.to_string())
            .append_pair("destinations", &to.to_string())
            .append_pair("key", &self.api_key);

        url
    }

    /// A single request, `Ok(None)` means worth another attempt
    async fn attempt(&self, url: &Url) -> Result<Option<i64>, RouteError> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("Routing request failed: {err}");
                return Ok(None);
            }
        };

        let status = response.status();

        if status.is_server_error() {
            tracing::warn!("Routing provider responded with {status}");
            return Ok(None);
        }

        if !status.is_success() {
            return Err(RouteError::Unavailable(format!(
                "Provider responded with {status}"
            )));
        }

        let body = response
            .json::<DistanceMatrixResponse>()
            .await
            .map_err(|err| RouteError::Unavailable(format!("Unreadable response: {err}")))?;

        duration_from_response(&body).map(Some)
    }
}

fn duration_from_response(body: &DistanceMatrixResponse) -> Result<i64, RouteError> {
    if !body.status.is_empty() && body.status != "OK" {
        return Err(RouteError::NoRoute(body.status.clone()));
    }

    let element = body
        .rows
        .first()
        .and_then(|row| row.elements.first())
        .ok_or_else(|| RouteError::NoRoute(String::from("no rows returned")))?;

    if !element.status.is_empty() && element.status != "OK" {
        return Err(RouteError::NoRoute(element.status.clone()));
    }

    element
        .duration
        .as_ref()
        .map(|duration| duration.value)
        .ok_or_else(|| RouteError::NoRoute(String::from("no duration returned")))
}

#[async_trait]
impl TravelTime for DistanceMatrix {
    async fn duration(&self, from: &Point, to: &Point) -> Result<i64, RouteError> {
        let key = (from.clone(), to.clone());

        if let Some(seconds) = self.cache.get(&key).await {
            tracing::debug!("Cache hit for route {from} -> {to}");
            return Ok(seconds);
        }

        let url = self.url(from, to);

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            if let Some(seconds) = self.attempt(&url).await? {
                tracing::debug!("Route {from} -> {to} takes {seconds} seconds");
                self.cache.insert(key, seconds).await;
                return Ok(seconds);
            }
        }

        Err(RouteError::Unavailable(format!(
            "Gave up after {} attempts",
            self.max_attempts
        )))
    }
}
