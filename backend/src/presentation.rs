use shared::MarkerStyle;

use crate::danger::AccidentPoint;
use crate::network::StreetSegment;

/// Score above which a danger point counts as a hotspot.
const DANGER_SCORE_HOTSPOT: f64 = 0.1;

/// German display label for a road class, including the rare bucket.
pub fn street_type_label(value: &str) -> Option<&'static str> {
    let label = match value {
        "primary" => "Hauptverkehrsstraße",
        "secondary" => "Nebenstraße",
        "tertiary" => "Verbindungsstraße",
        "residential" => "Wohngebietsstraße",
        "living_street" => "verkehrsberuhigter Bereich",
        "footway" => "Gehweg",
        "cycleway" => "Radweg",
        "track" => "Feld-/Waldweg",
        "path" => "schmaler Weg",
        "service" => "Erschließungsweg (Toreinfahrt)",
        "highway_rare" => "sonstige Straßen",
        _ => return None,
    };
    Some(label)
}

pub fn surface_label(value: &str) -> Option<&'static str> {
    let label = match value {
        "asphalt" => "Asphalt",
        "concrete" => "Beton",
        "paving_stone" => "gepflastert",
        "sett" => "grob gepflastert",
        "unpaved" => "kein Straßenbelag",
        _ => return None,
    };
    Some(label)
}

/// Label for a canonical tag value. Unknown tags and values stay
/// untranslated; the wire carries the canonical value either way.
pub fn attribute_label(tag: &str, value: &str) -> Option<&'static str> {
    match tag {
        "highway" => street_type_label(value),
        "surface" => surface_label(value),
        _ => None,
    }
}

/// Display order for street-type labels in selection widgets.
pub const STREET_LABEL_ORDER: [&str; 11] = [
    "Hauptverkehrsstraße",
    "Nebenstraße",
    "Verbindungsstraße",
    "Wohngebietsstraße",
    "verkehrsberuhigter Bereich",
    "Gehweg",
    "Radweg",
    "Feld-/Waldweg",
    "schmaler Weg",
    "Erschließungsweg (Toreinfahrt)",
    "sonstige Straßen",
];

pub const SURFACE_LABEL_ORDER: [&str; 5] = [
    "Asphalt",
    "Beton",
    "gepflastert",
    "grob gepflastert",
    "kein Straßenbelag",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: &'static str,
    pub weight: u32,
    pub opacity: f64,
}

/// Filter dimension drawn as its own map overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDimension {
    MaxSpeed,
    StreetType,
    Surface,
}

pub fn route_style() -> LineStyle {
    LineStyle {
        color: "green",
        weight: 8,
        opacity: 0.6,
    }
}

pub fn dimension_style(dimension: FilterDimension) -> LineStyle {
    match dimension {
        FilterDimension::MaxSpeed => LineStyle {
            color: "blue",
            weight: 5,
            opacity: 0.4,
        },
        FilterDimension::StreetType => LineStyle {
            color: "yellow",
            weight: 3,
            opacity: 0.6,
        },
        FilterDimension::Surface => LineStyle {
            color: "black",
            weight: 1,
            opacity: 1.0,
        },
    }
}

pub fn danger_style(point: &AccidentPoint) -> MarkerStyle {
    if point.score > DANGER_SCORE_HOTSPOT {
        MarkerStyle {
            color: "red".to_string(),
            weight: 4,
            fill: true,
        }
    } else {
        MarkerStyle {
            color: "brown".to_string(),
            weight: 1,
            fill: false,
        }
    }
}

pub fn danger_tooltip(point: &AccidentPoint) -> Vec<(&'static str, String)> {
    vec![
        ("incidents", point.incidents.to_string()),
        ("rides", point.rides.to_string()),
        ("score", point.score.to_string()),
    ]
}

/// Tooltip fields for a street segment; absent tags are omitted rather
/// than rendered empty.
pub fn street_tooltip(segment: &StreetSegment) -> Vec<(&'static str, String)> {
    ["name", "maxspeed", "highway", "surface"]
        .into_iter()
        .filter_map(|key| segment.tag(key).map(|value| (key, value.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use shared::Coordinate;

    use super::*;

    fn accident(score: f64) -> AccidentPoint {
        AccidentPoint {
            location: Coordinate { lat: 52.52, lon: 13.40 },
            incidents: 2,
            rides: 40,
            score,
        }
    }

    #[test]
    fn rare_bucket_has_its_own_label() {
        assert_eq!(street_type_label("highway_rare"), Some("sonstige Straßen"));
        assert_eq!(street_type_label("motorway"), None);
    }

    #[test]
    fn labels_cover_both_translated_tags() {
        assert_eq!(attribute_label("highway", "cycleway"), Some("Radweg"));
        assert_eq!(attribute_label("surface", "sett"), Some("grob gepflastert"));
        assert_eq!(attribute_label("maxspeed", "30"), None);
    }

    #[test]
    fn hotspot_markers_are_red_above_the_score_cutoff() {
        assert_eq!(danger_style(&accident(0.25)).color, "red");
        assert!(danger_style(&accident(0.25)).fill);
        // exactly at the cutoff is not a hotspot
        assert_eq!(danger_style(&accident(0.1)).color, "brown");
        assert_eq!(danger_style(&accident(0.05)).weight, 1);
    }

    #[test]
    fn street_tooltip_omits_missing_tags() {
        let segment = StreetSegment {
            geometry: vec![
                Coordinate { lat: 52.52, lon: 13.40 },
                Coordinate { lat: 52.52, lon: 13.41 },
            ],
            tags: HashMap::from([
                ("highway".to_string(), "primary".to_string()),
                ("name".to_string(), "Hauptstraße".to_string()),
            ]),
        };
        let fields = street_tooltip(&segment);
        assert_eq!(
            fields,
            vec![
                ("name", "Hauptstraße".to_string()),
                ("highway", "primary".to_string()),
            ]
        );
    }
}
