use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    extract::Query,
    http::Request,
    routing::get,
    Json, Router,
};
use backend::{
    create_router, danger,
    geocode::OpenCageClient,
    network::{NetworkSource, NetworkStore, StreetNetwork, StreetSegment},
    routing::BbbikeClient,
    AppState,
};
use hyper::StatusCode;
use serde_json::{json, Value};
use shared::{
    ApiError, Coordinate, DangerPointsResponse, FilteredStreetsResponse, RouteAttributesResponse,
};
use tower::ServiceExt;

const SAMPLE_DANGER: &str = include_str!("../data/sample_danger.geojson");

/// Stub upstream serving canned OpenCage and BBBike payloads.
async fn spawn_upstream() -> SocketAddr {
    async fn geocode(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let q = params.get("q").cloned().unwrap_or_default();
        if q.starts_with("asdkfjasdf") {
            return Json(json!({ "results": [] }));
        }
        let (lat, lng) = if q.starts_with("Wildenbruch") {
            (52.5200, 13.4000)
        } else {
            (52.5200, 13.4040)
        };
        Json(json!({ "results": [{ "geometry": { "lat": lat, "lng": lng } }] }))
    }

    async fn route(Query(_params): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!({
            "LongLatPath": ["13.4000,52.5200", "13.4020,52.5200", "13.4040,52.5200"]
        }))
    }

    let app = Router::new()
        .route("/geocode/v1/json", get(geocode))
        .route("/api/0.2/bbbike/", get(route));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn sample_network() -> Arc<StreetNetwork> {
    let on_route = StreetSegment {
        geometry: vec![
            Coordinate { lat: 52.5200, lon: 13.4000 },
            Coordinate { lat: 52.5200, lon: 13.4040 },
        ],
        tags: HashMap::from([
            ("highway".to_string(), "primary".to_string()),
            ("name".to_string(), "Hauptstraße".to_string()),
        ]),
    };
    let elsewhere = StreetSegment {
        geometry: vec![
            Coordinate { lat: 52.5300, lon: 13.4000 },
            Coordinate { lat: 52.5300, lon: 13.4040 },
        ],
        tags: HashMap::from([("highway".to_string(), "track".to_string())]),
    };
    Arc::new(StreetNetwork::from_segments(vec![on_route, elsewhere]))
}

async fn test_app() -> Router {
    let upstream = spawn_upstream().await;
    let state = AppState {
        geocoder: OpenCageClient::with_base_url(format!("http://{upstream}"), "test-key"),
        routes: BbbikeClient::with_base_url(format!("http://{upstream}/api/0.2/bbbike/"), "test"),
        network: Arc::new(NetworkStore::new(NetworkSource::Memory(sample_network()))),
        danger_points: Arc::new(danger::parse_danger_points(SAMPLE_DANGER).unwrap()),
    };
    create_router(state)
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn route_endpoint_annotates_the_route() {
    let app = test_app().await;
    let payload = json!({
        "start_address": "Wildenbruchstraße 33, Berlin",
        "end_address": "Rubensstr. 6, Berlin"
    });

    let response = app.oneshot(post_json("/api/route", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: RouteAttributesResponse = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body.path.len(), 3);
    assert!(body.distance_km > 0.1);
    assert_eq!(body.distribution.len(), 1);
    assert_eq!(body.distribution[0].value, "primary");
    assert_eq!(
        body.distribution[0].label.as_deref(),
        Some("Hauptverkehrsstraße")
    );
    assert!((body.distribution[0].percent - 100.0).abs() < 1e-9);
    assert_eq!(body.matched_segment_count, 1);
    assert_eq!(body.unmatched_point_count, 0);
    assert!(body.rare_values.is_empty());
    assert_eq!(body.segments.len(), 1);
    assert_eq!(body.segments[0].value, "primary");
}

#[tokio::test]
async fn unknown_address_is_reported_as_not_found() {
    let app = test_app().await;
    let payload = json!({
        "start_address": "asdkfjasdf, Berlin",
        "end_address": "Rubensstr. 6, Berlin"
    });

    let response = app.oneshot(post_json("/api/route", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: ApiError = serde_json::from_slice(&bytes).unwrap();
    assert!(body.message.contains("asdkfjasdf"));
}

#[tokio::test]
async fn streets_endpoint_reports_filter_counts() {
    let app = test_app().await;
    let payload = json!({ "filter": { "street_types": ["primary"] } });

    let response = app
        .oneshot(post_json("/api/streets", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: FilteredStreetsResponse = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body.total_count, 2);
    assert_eq!(body.matching_count, 1);
    assert_eq!(body.segments.len(), 1);
    assert_eq!(body.segments[0].name.as_deref(), Some("Hauptstraße"));
}

#[tokio::test]
async fn danger_endpoint_styles_hotspots() {
    let app = test_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/danger-points")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: DangerPointsResponse = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body.points.len(), 2);
    let hotspot = &body.points[0];
    assert_eq!(hotspot.style.color, "red");
    assert!(hotspot.style.fill);
    let minor = &body.points[1];
    assert_eq!(minor.style.color, "brown");
}
