use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use shared::Coordinate;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.opencagedata.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no coordinates found for address '{0}'")]
    NotFound(String),
    #[error("geocoding service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("unexpected geocoding payload: {0}")]
    Malformed(String),
}

/// Seam for the address-resolution collaborator.
///
/// The pipeline only consumes a [`Coordinate`] or a failure signal; the
/// HTTP client below is the production implementation, tests plug in
/// stubs.
pub trait Geocoder: Send + Sync {
    fn resolve(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Coordinate, GeocodeError>> + Send;
}

/// OpenCage forward-geocoding client. The first candidate wins.
#[derive(Debug, Clone)]
pub struct OpenCageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeocodeCandidate {
    geometry: CandidateGeometry,
}

#[derive(Debug, Deserialize)]
struct CandidateGeometry {
    lat: f64,
    lng: f64,
}

impl OpenCageClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

impl Geocoder for OpenCageClient {
    fn resolve(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Coordinate, GeocodeError>> + Send {
        async move {
            let url = format!("{}/geocode/v1/json", self.base_url);
            let response = self
                .client
                .get(&url)
                .query(&[("q", address), ("key", self.api_key.as_str())])
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|err| GeocodeError::ServiceUnavailable(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(GeocodeError::ServiceUnavailable(format!("HTTP {status}")));
            }

            let payload: GeocodeResponse = response
                .json()
                .await
                .map_err(|err| GeocodeError::Malformed(err.to_string()))?;

            first_candidate(&payload).ok_or_else(|| GeocodeError::NotFound(address.to_string()))
        }
    }
}

fn first_candidate(payload: &GeocodeResponse) -> Option<Coordinate> {
    payload.results.first().map(|candidate| Coordinate {
        lat: candidate.geometry.lat,
        lon: candidate.geometry.lng,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_candidate() {
        let payload: GeocodeResponse = serde_json::from_str(
            r#"{
                "results": [
                    {"geometry": {"lat": 52.52, "lng": 13.405}},
                    {"geometry": {"lat": 48.85, "lng": 2.35}}
                ]
            }"#,
        )
        .unwrap();

        let coord = first_candidate(&payload).unwrap();
        assert_eq!(coord.lat, 52.52);
        assert_eq!(coord.lon, 13.405);
    }

    #[test]
    fn empty_result_set_means_not_found() {
        let payload: GeocodeResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(first_candidate(&payload).is_none());
    }

    #[test]
    fn missing_results_field_parses_as_empty() {
        let payload: GeocodeResponse = serde_json::from_str(r#"{"status": {"code": 200}}"#).unwrap();
        assert!(first_candidate(&payload).is_none());
    }

    #[test]
    fn candidate_without_geometry_is_malformed() {
        let parsed = serde_json::from_str::<GeocodeResponse>(r#"{"results": [{"confidence": 9}]}"#);
        assert!(parsed.is_err());
    }
}
