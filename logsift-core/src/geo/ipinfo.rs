use super::{GeoError, GeoLocation, GeoProvider};
use crate::error::{Result, SiftError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    loc: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

/// Looks addresses up against an ipinfo-compatible `GET {endpoint}/{ip}/json`.
pub struct IpInfoProvider {
    client: Client,
    endpoint: String,
}

impl IpInfoProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SiftError::Geo(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

fn parse_response(body: IpInfoResponse) -> std::result::Result<GeoLocation, GeoError> {
    let loc = body
        .loc
        .ok_or_else(|| GeoError::InvalidResponse("missing loc".to_string()))?;
    let (lat, lon) = loc
        .split_once(',')
        .ok_or_else(|| GeoError::InvalidResponse(format!("malformed loc '{}'", loc)))?;
    let parse = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| GeoError::InvalidResponse(format!("malformed loc '{}'", loc)))
    };

    Ok(GeoLocation {
        latitude: Some(parse(lat)?),
        longitude: Some(parse(lon)?),
        city: body.city,
        country: body.country,
    })
}

#[async_trait::async_trait]
impl GeoProvider for IpInfoProvider {
    async fn lookup(&self, ip: &str) -> std::result::Result<GeoLocation, GeoError> {
        let url = format!("{}/{}/json", self.endpoint, ip);
        debug!("Geolocation request: {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: IpInfoResponse = response.json().await?;
        parse_response(body)
    }

    fn get_provider_name(&self) -> &str {
        "ipinfo"
    }
}
