use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use shared::Coordinate;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.bbbike.org/api/0.2/bbbike/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Error)]
pub enum RouteFetchError {
    #[error("start or end coordinate is outside the valid WGS84 range")]
    InvalidCoordinates,
    #[error("routing service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("unexpected routing payload: {0}")]
    Malformed(String),
    #[error("routing response is missing the 'LongLatPath' field")]
    MissingPath,
    #[error("routing response contains a malformed coordinate '{0}'")]
    MalformedCoordinate(String),
    #[error("routing service returned a path with fewer than two points")]
    EmptyPath,
}

/// An ordered start-to-end path as returned by the routing service.
/// Always holds at least two points.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<Coordinate>,
}

impl Route {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, RouteFetchError> {
        if points.len() < 2 {
            return Err(RouteFetchError::EmptyPath);
        }
        Ok(Self { points })
    }

    /// Parse the `LongLatPath` entries of a routing response, each a
    /// `"lon,lat"` string.
    pub fn from_long_lat_path(entries: &[String]) -> Result<Self, RouteFetchError> {
        let mut points = Vec::with_capacity(entries.len());
        for entry in entries {
            points.push(parse_long_lat(entry)?);
        }
        Self::new(points)
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn distance_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum()
    }
}

fn parse_long_lat(entry: &str) -> Result<Coordinate, RouteFetchError> {
    let malformed = || RouteFetchError::MalformedCoordinate(entry.to_string());

    let mut parts = entry.split(',');
    let (lon, lat) = match (parts.next(), parts.next(), parts.next()) {
        (Some(lon), Some(lat), None) => (lon, lat),
        _ => return Err(malformed()),
    };
    let coord = Coordinate {
        lat: lat.trim().parse().map_err(|_| malformed())?,
        lon: lon.trim().parse().map_err(|_| malformed())?,
    };
    if !coord.is_valid() {
        return Err(malformed());
    }
    Ok(coord)
}

/// Seam for the route-fetching collaborator.
pub trait RouteService: Send + Sync {
    fn fetch(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> impl Future<Output = Result<Route, RouteFetchError>> + Send;
}

/// BBBike cycling-route client, biased towards side streets
/// (`pref_cat=N1`) like the dashboards it serves.
#[derive(Debug, Clone)]
pub struct BbbikeClient {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
}

#[derive(Debug, Deserialize)]
struct BbbikeResponse {
    #[serde(rename = "LongLatPath")]
    long_lat_path: Option<Vec<String>>,
}

impl BbbikeClient {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, app_id)
    }

    pub fn with_base_url(base_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            app_id: app_id.into(),
        }
    }
}

impl RouteService for BbbikeClient {
    fn fetch(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> impl Future<Output = Result<Route, RouteFetchError>> + Send {
        async move {
            if !start.is_valid() || !end.is_valid() {
                return Err(RouteFetchError::InvalidCoordinates);
            }

            let start_param = format!("{},{}", start.lon, start.lat);
            let end_param = format!("{},{}", end.lon, end.lat);
            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("appid", self.app_id.as_str()),
                    ("startc_wgs84", start_param.as_str()),
                    ("zielc_wgs84", end_param.as_str()),
                    ("pref_seen", "1"),
                    ("pref_cat", "N1"),
                    ("output_as", "json"),
                ])
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|err| RouteFetchError::ServiceUnavailable(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(RouteFetchError::ServiceUnavailable(format!("HTTP {status}")));
            }

            let payload: BbbikeResponse = response
                .json()
                .await
                .map_err(|err| RouteFetchError::Malformed(err.to_string()))?;

            let entries = payload.long_lat_path.ok_or(RouteFetchError::MissingPath)?;
            Route::from_long_lat_path(&entries)
        }
    }
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
