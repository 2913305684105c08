use std::collections::HashSet;

use shared::Coordinate;

use crate::network::StreetNetwork;

/// Planar buffer radius (degrees) around a route point. Route and network
/// coordinates rarely align bit-for-bit, so a point counts as "on" a
/// segment when it lies within this distance of the segment polyline.
pub const DEFAULT_TOLERANCE_DEG: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct PointMatch {
    pub point: Coordinate,
    /// Indices into the network's segment slice. A point may intersect
    /// zero, one, or many segments (e.g. at intersections).
    pub segments: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub point_matches: Vec<PointMatch>,
    /// Matched segment indices, de-duplicated, in first-match order.
    pub matched_segments: Vec<usize>,
    pub unmatched_points: Vec<Coordinate>,
}

/// Match every unique route point against the street network.
///
/// ## Matching policy
///
/// Buffer intersection: a point matches a segment when the minimum planar
/// distance from the point to the segment polyline is at most
/// `tolerance_deg`. Points are de-duplicated bit-exactly before matching,
/// since adjacent route points frequently coincide with shared segment
/// vertices.
///
/// A point without any match is recorded and logged as a warning, never
/// an error; sparse networks and coordinate rounding make this a normal
/// outcome. The whole query is pure: same inputs, same outcome.
pub fn match_route(
    points: &[Coordinate],
    network: &StreetNetwork,
    tolerance_deg: f64,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    let mut seen_segments = HashSet::new();

    for point in dedup_points(points) {
        let segments: Vec<usize> = network
            .candidate_segments(point, tolerance_deg)
            .into_iter()
            .filter(|&idx| {
                within_tolerance(point, &network.segments()[idx].geometry, tolerance_deg)
            })
            .collect();

        if segments.is_empty() {
            tracing::warn!(
                "no street segment within tolerance of point ({}, {})",
                point.lat,
                point.lon
            );
            outcome.unmatched_points.push(point);
        } else {
            for &idx in &segments {
                if seen_segments.insert(idx) {
                    outcome.matched_segments.push(idx);
                }
            }
        }
        outcome.point_matches.push(PointMatch { point, segments });
    }

    outcome
}

/// Bit-exact de-duplication, first occurrence wins.
fn dedup_points(points: &[Coordinate]) -> Vec<Coordinate> {
    let mut seen = HashSet::new();
    points
        .iter()
        .copied()
        .filter(|point| seen.insert((point.lat.to_bits(), point.lon.to_bits())))
        .collect()
}

fn within_tolerance(point: Coordinate, geometry: &[Coordinate], tolerance_deg: f64) -> bool {
    point_to_polyline_sq(point, geometry) <= tolerance_deg * tolerance_deg
}

/// Squared planar distance from a point to a polyline, in degrees².
fn point_to_polyline_sq(point: Coordinate, geometry: &[Coordinate]) -> f64 {
    match geometry {
        [] => f64::INFINITY,
        [only] => point_to_edge_sq(point, *only, *only),
        _ => geometry
            .windows(2)
            .map(|pair| point_to_edge_sq(point, pair[0], pair[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn point_to_edge_sq(point: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    let dlon = b.lon - a.lon;
    let dlat = b.lat - a.lat;
    let len_sq = dlon * dlon + dlat * dlat;

    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((point.lon - a.lon) * dlon + (point.lat - a.lat) * dlat) / len_sq).clamp(0.0, 1.0)
    };

    let elon = point.lon - (a.lon + t * dlon);
    let elat = point.lat - (a.lat + t * dlat);
    elon * elon + elat * elat
}
