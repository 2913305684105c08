use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use backend::{
    create_router, danger,
    geocode::OpenCageClient,
    network::{NetworkSource, NetworkStore},
    routing::BbbikeClient,
    AppState,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(author, version, about = "SafeCycling route-annotation backend")]
struct Args {
    /// Street network extract: a .osm.pbf regional extract, a
    /// pre-processed .geojson file, or a directory of per-tag extracts
    #[arg(long)]
    network: PathBuf,

    /// GeoJSON danger-point dataset
    #[arg(long)]
    danger_points: Option<PathBuf>,

    /// Address to serve on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// OpenCage geocoder API key
    #[arg(long, env = "OPENCAGE_API_KEY")]
    geocoder_key: String,

    /// BBBike application id
    #[arg(long, env = "BBBIKE_APP_ID", default_value = "safecycling")]
    routing_app_id: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backend=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let source = NetworkSource::from_path(&args.network).expect("usable network extract");
    let network = Arc::new(NetworkStore::new(source));
    tracing::info!("serving street network from {:?}", args.network);

    let danger_points = match &args.danger_points {
        Some(path) => danger::load_danger_points(path).expect("load danger-point dataset"),
        None => Vec::new(),
    };
    tracing::info!("loaded {} danger points", danger_points.len());

    let state = AppState {
        geocoder: OpenCageClient::new(args.geocoder_key),
        routes: BbbikeClient::new(args.routing_app_id),
        network,
        danger_points: Arc::new(danger_points),
    };
    let app = create_router(state);

    tracing::info!("starting backend on http://{}", args.listen);
    axum::serve(
        tokio::net::TcpListener::bind(args.listen).await.unwrap(),
        app,
    )
    .await
    .unwrap();
}
