use serde::{Deserialize, Serialize};

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Street-network filter tuple. An empty filter selects the whole
/// cycling network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxspeed: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub street_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surfaces: Vec<String>,
}

impl NetworkFilter {
    pub fn is_empty(&self) -> bool {
        self.maxspeed.is_none() && self.street_types.is_empty() && self.surfaces.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAttributesRequest {
    pub start_address: String,
    pub end_address: String,
    /// Tag dimension to summarize along the route.
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Categories below this share of matched segments collapse into the
    /// rare bucket.
    #[serde(default = "default_rarity_threshold")]
    pub rarity_threshold_pct: f64,
    #[serde(default)]
    pub filter: NetworkFilter,
}

/// One category of the attribute distribution, before rare collapsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeShare {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub percent: f64,
}

/// A matched street segment with its post-collapse canonical tag value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedSegment {
    pub geometry: Vec<Coordinate>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAttributesResponse {
    pub path: Vec<Coordinate>,
    pub distance_km: f64,
    pub distribution: Vec<AttributeShare>,
    pub rare_values: Vec<String>,
    pub matched_segment_count: usize,
    pub unmatched_point_count: usize,
    pub segments: Vec<MatchedSegment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilteredStreetsRequest {
    #[serde(default)]
    pub filter: NetworkFilter,
}

/// Street feature with the tags the map tooltip shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetFeature {
    pub geometry: Vec<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxspeed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredStreetsResponse {
    pub total_count: usize,
    pub matching_count: usize,
    pub segments: Vec<StreetFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub color: String,
    pub weight: u32,
    pub fill: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DangerFeature {
    pub location: Coordinate,
    pub incidents: u32,
    pub rides: u32,
    pub score: f64,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DangerPointsResponse {
    pub points: Vec<DangerFeature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_tag() -> String {
    "highway".to_string()
}

pub fn default_rarity_threshold() -> f64 {
    1.0
}
