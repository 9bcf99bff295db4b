//! Reverse geocoding collaborators.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Turns signed decimal coordinates into a human-readable place name.
pub trait ReverseGeocoder: Send + Sync {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<String>;
}

impl<F> ReverseGeocoder for F
where
    F: Fn(f64, f64) -> Result<String> + Send + Sync,
{
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<String> {
        self(latitude, longitude)
    }
}

/// Geocoder used when no provider is configured. Every lookup fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledGeocoder;

impl ReverseGeocoder for DisabledGeocoder {
    fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<String> {
        Err(anyhow!("reverse geocoding is not configured"))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    formatted_address: Option<String>,
}

/// Google Maps Geocoding API client.
///
/// One blocking request per lookup, bounded by the agent timeout. No retries.
pub struct GoogleGeocoder {
    agent: ureq::Agent,
    endpoint: Url,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: &str, endpoint: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("geocoder api key must not be empty"));
        }
        let endpoint = Url::parse(endpoint).context("parse geocoder endpoint")?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            agent,
            endpoint,
            api_key: api_key.trim().to_string(),
        })
    }

    fn request_url(&self, latitude: f64, longitude: f64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("latlng", &format!("{},{}", latitude, longitude))
            .append_pair("key", &self.api_key);
        url
    }
}

impl ReverseGeocoder for GoogleGeocoder {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<String> {
        let url = self.request_url(latitude, longitude);
        let response = self
            .agent
            .get(url.as_str())
            .call()
            .context("geocode request failed")?;
        let body: GeocodeResponse = response.into_json().context("decode geocode response")?;
        first_address(body)
    }
}

fn first_address(body: GeocodeResponse) -> Result<String> {
    if let Some(status) = body.status.as_deref() {
        if status != "OK" {
            return Err(anyhow!("geocoder returned status {}", status));
        }
    }
    body.results
        .into_iter()
        .next()
        .and_then(|result| result.formatted_address)
        .filter(|address| !address.trim().is_empty())
        .ok_or_else(|| anyhow!("geocoder returned no results"))
}
