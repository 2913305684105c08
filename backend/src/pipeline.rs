use std::sync::Arc;

use shared::NetworkFilter;

use crate::error::PipelineError;
use crate::geocode::Geocoder;
use crate::matcher::{self, MatchOutcome, DEFAULT_TOLERANCE_DEG};
use crate::network::{NetworkStore, StreetNetwork, StreetSegment};
use crate::routing::{Route, RouteService};
use crate::summary::{self, AttributeSummary};

/// Per-session pipeline parameters. Every request carries its own
/// context; nothing is shared across sessions.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub filter: NetworkFilter,
    pub tag: String,
    pub rarity_threshold_pct: f64,
    pub tolerance_deg: f64,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            filter: NetworkFilter::default(),
            tag: shared::default_tag(),
            rarity_threshold_pct: shared::default_rarity_threshold(),
            tolerance_deg: DEFAULT_TOLERANCE_DEG,
        }
    }
}

/// Everything one pipeline run produces.
pub struct AnnotatedRoute {
    pub route: Route,
    pub network: Arc<StreetNetwork>,
    pub matches: MatchOutcome,
    pub summary: AttributeSummary,
}

/// Run the full pipeline: geocode both addresses, fetch the route, match
/// it against the (cached) filtered network and summarize the requested
/// tag dimension.
///
/// Failures of the geocoder or the routing service abort the run before
/// the next stage; unmatched route points and an all-untagged segment
/// set degrade to empty results instead.
pub async fn annotate_route<G, R>(
    geocoder: &G,
    routes: &R,
    store: &NetworkStore,
    ctx: &SessionContext,
    start_address: &str,
    end_address: &str,
) -> Result<AnnotatedRoute, PipelineError>
where
    G: Geocoder,
    R: RouteService,
{
    let start = geocoder.resolve(start_address).await?;
    let end = geocoder.resolve(end_address).await?;
    tracing::debug!(
        "resolved '{start_address}' to ({}, {}) and '{end_address}' to ({}, {})",
        start.lat,
        start.lon,
        end.lat,
        end.lon
    );

    let route = routes.fetch(start, end).await?;
    tracing::info!(
        "fetched route with {} points ({:.2} km)",
        route.points().len(),
        route.distance_km()
    );

    let network = store.load(&ctx.filter)?;
    let matches = matcher::match_route(route.points(), &network, ctx.tolerance_deg);
    if !matches.unmatched_points.is_empty() {
        tracing::warn!(
            "{} of {} route points matched no street segment",
            matches.unmatched_points.len(),
            matches.point_matches.len()
        );
    }

    let segments: Vec<&StreetSegment> = matches
        .matched_segments
        .iter()
        .map(|&idx| &network.segments()[idx])
        .collect();
    let summary = summary::summarize_attribute(&segments, &ctx.tag, ctx.rarity_threshold_pct);

    Ok(AnnotatedRoute {
        route,
        network,
        matches,
        summary,
    })
}
