pub mod danger;
pub mod error;
pub mod geocode;
pub mod matcher;
pub mod network;
pub mod pipeline;
pub mod presentation;
pub mod routing;
pub mod summary;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

use shared::{
    ApiError, AttributeShare, DangerFeature, DangerPointsResponse, FilteredStreetsRequest,
    FilteredStreetsResponse, MatchedSegment, NetworkFilter, RouteAttributesRequest,
    RouteAttributesResponse, StreetFeature,
};

use crate::danger::AccidentPoint;
use crate::error::PipelineError;
use crate::geocode::{GeocodeError, OpenCageClient};
use crate::network::{NetworkStore, StreetSegment};
use crate::pipeline::SessionContext;
use crate::routing::{BbbikeClient, RouteFetchError};

#[derive(Clone)]
pub struct AppState {
    pub geocoder: OpenCageClient,
    pub routes: BbbikeClient,
    pub network: Arc<NetworkStore>,
    pub danger_points: Arc<Vec<AccidentPoint>>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/route", post(route_handler))
        .route("/api/streets", post(streets_handler))
        .route("/api/danger-points", get(danger_handler))
        .layer(cors)
        .with_state(state)
}

async fn route_handler(
    State(state): State<AppState>,
    Json(req): Json<RouteAttributesRequest>,
) -> Result<Json<RouteAttributesResponse>, (StatusCode, Json<ApiError>)> {
    let ctx = SessionContext {
        filter: req.filter.clone(),
        tag: req.tag.clone(),
        rarity_threshold_pct: req.rarity_threshold_pct,
        ..SessionContext::default()
    };

    let annotated = pipeline::annotate_route(
        &state.geocoder,
        &state.routes,
        &state.network,
        &ctx,
        &req.start_address,
        &req.end_address,
    )
    .await
    .map_err(error_response)?;

    let distribution = annotated
        .summary
        .distribution
        .iter()
        .map(|(value, percent)| AttributeShare {
            value: value.clone(),
            label: presentation::attribute_label(&req.tag, value).map(str::to_string),
            percent: *percent,
        })
        .collect();

    let segments = annotated
        .matches
        .matched_segments
        .iter()
        .zip(&annotated.summary.canonical)
        .filter_map(|(&idx, canonical)| {
            let value = canonical.clone()?;
            let label = presentation::attribute_label(&req.tag, &value).map(str::to_string);
            Some(MatchedSegment {
                geometry: annotated.network.segments()[idx].geometry.clone(),
                value,
                label,
            })
        })
        .collect();

    Ok(Json(RouteAttributesResponse {
        path: annotated.route.points().to_vec(),
        distance_km: annotated.route.distance_km(),
        distribution,
        rare_values: annotated.summary.rare_values.clone(),
        matched_segment_count: annotated.matches.matched_segments.len(),
        unmatched_point_count: annotated.matches.unmatched_points.len(),
        segments,
    }))
}

async fn streets_handler(
    State(state): State<AppState>,
    Json(req): Json<FilteredStreetsRequest>,
) -> Result<Json<FilteredStreetsResponse>, (StatusCode, Json<ApiError>)> {
    let base = state
        .network
        .load(&NetworkFilter::default())
        .map_err(|err| error_response(err.into()))?;
    let filtered = state
        .network
        .load(&req.filter)
        .map_err(|err| error_response(err.into()))?;

    Ok(Json(FilteredStreetsResponse {
        total_count: base.len(),
        matching_count: filtered.len(),
        segments: filtered.segments().iter().map(street_feature).collect(),
    }))
}

async fn danger_handler(State(state): State<AppState>) -> Json<DangerPointsResponse> {
    let points = state
        .danger_points
        .iter()
        .map(|point| DangerFeature {
            location: point.location,
            incidents: point.incidents,
            rides: point.rides,
            score: point.score,
            style: presentation::danger_style(point),
        })
        .collect();
    Json(DangerPointsResponse { points })
}

fn street_feature(segment: &StreetSegment) -> StreetFeature {
    StreetFeature {
        geometry: segment.geometry.clone(),
        name: segment.tag("name").map(str::to_string),
        maxspeed: segment.tag("maxspeed").map(str::to_string),
        highway: segment.tag("highway").map(str::to_string),
        surface: segment.tag("surface").map(str::to_string),
    }
}

/// Map pipeline failures to distinct HTTP responses; the message always
/// names the failing stage and reason.
fn error_response(err: PipelineError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        PipelineError::Geocode(GeocodeError::NotFound(_)) => StatusCode::NOT_FOUND,
        PipelineError::Geocode(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Route(RouteFetchError::InvalidCoordinates) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::Route(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
