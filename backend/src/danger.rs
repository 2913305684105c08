use std::{fs, io, path::Path};

use geo_types::Point;
use geojson::{FeatureCollection, GeoJson};
use shared::Coordinate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DangerError {
    #[error("failed to read danger-point dataset: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse danger-point dataset: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// A location flagged by crowd-sourced ride data as carrying elevated
/// near-accident risk.
#[derive(Debug, Clone, PartialEq)]
pub struct AccidentPoint {
    pub location: Coordinate,
    pub incidents: u32,
    pub rides: u32,
    pub score: f64,
}

/// Load the dataset, keeping only points with recorded incidents.
pub fn load_danger_points(path: impl AsRef<Path>) -> Result<Vec<AccidentPoint>, DangerError> {
    parse_danger_points(&fs::read_to_string(path)?)
}

pub fn parse_danger_points(raw: &str) -> Result<Vec<AccidentPoint>, DangerError> {
    let geojson: GeoJson = raw.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for feature in &collection.features {
        match accident_point(feature) {
            Some(point) if point.incidents > 0 => points.push(point),
            // Zero-incident points carry no risk signal.
            Some(_) => {}
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!("skipped {skipped} malformed danger-point features");
    }
    Ok(points)
}

fn accident_point(feature: &geojson::Feature) -> Option<AccidentPoint> {
    let geometry = feature.geometry.as_ref()?;
    let point = Point::<f64>::try_from(geometry.value.clone()).ok()?;
    let properties = feature.properties.as_ref()?;

    Some(AccidentPoint {
        location: Coordinate {
            lat: point.y(),
            lon: point.x(),
        },
        incidents: u32::try_from(properties.get("incidents")?.as_u64()?).ok()?,
        rides: u32::try_from(properties.get("rides")?.as_u64()?).ok()?,
        score: properties.get("score")?.as_f64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../data/sample_danger.geojson");

    #[test]
    fn keeps_only_points_with_incidents() {
        let points = parse_danger_points(SAMPLE).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|point| point.incidents > 0));
    }

    #[test]
    fn reads_properties_and_location() {
        let points = parse_danger_points(SAMPLE).unwrap();
        let hotspot = &points[0];
        assert_eq!(hotspot.incidents, 3);
        assert_eq!(hotspot.rides, 120);
        assert!((hotspot.score - 0.25).abs() < 1e-9);
        assert!((hotspot.location.lat - 52.5205).abs() < 1e-9);
        assert!((hotspot.location.lon - 13.4010).abs() < 1e-9);
    }

    #[test]
    fn malformed_features_are_skipped() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [13.4, 52.5]},
                    "properties": {"incidents": 2, "rides": 10}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [13.4, 52.5]},
                    "properties": {"incidents": 2, "rides": 10, "score": 0.3}
                }
            ]
        }"#;
        let points = parse_danger_points(raw).unwrap();
        assert_eq!(points.len(), 1);
    }
}
