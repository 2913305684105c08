use std::{
    collections::{HashMap, HashSet},
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use geo_types::LineString;
use geojson::{FeatureCollection, GeoJson};
use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use lru::LruCache;
use osmpbf::{Element, ElementReader};
use shared::{Coordinate, NetworkFilter};
use thiserror::Error;

/// Road classes considered cycling-suitable; raw regional extracts are
/// filtered to this set at load time.
pub const CYCLING_HIGHWAYS: [&str; 11] = [
    "primary",
    "secondary",
    "tertiary",
    "residential",
    "living_street",
    "cycleway",
    "footway",
    "track",
    "path",
    "service",
    "unclassified",
];

/// Tag keys kept per segment; everything else in the extract is dropped.
const KEPT_TAGS: [&str; 4] = ["highway", "surface", "maxspeed", "name"];

/// Spacing of the interpolated vertices fed to the spatial index. Keeps
/// long straight segments discoverable by a radius query around any of
/// their interior points.
const INDEX_SAMPLE_SPACING_DEG: f64 = 1e-3;

/// Max memoized networks (base + filtered variants).
const CACHE_CAPACITY: usize = 20;

const BASE_KEY: &str = "unfiltered";

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to read network extract: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse OSM extract: {0}")]
    Pbf(#[from] osmpbf::Error),
    #[error("failed to parse GeoJSON extract: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("unsupported network extract format '{0}'")]
    UnsupportedFormat(String),
    #[error("network extract contains no usable street segments")]
    EmptyNetwork,
}

/// One tagged line geometry of the street network. A missing tag key is
/// not the same thing as an empty value.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetSegment {
    pub geometry: Vec<Coordinate>,
    pub tags: HashMap<String, String>,
}

impl StreetSegment {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Immutable street network with a KD-tree over densified segment
/// vertices for candidate lookup.
pub struct StreetNetwork {
    segments: Vec<StreetSegment>,
    index: KdTree<f64, usize, [f64; 2]>,
}

impl StreetNetwork {
    pub fn from_segments(segments: Vec<StreetSegment>) -> Self {
        let mut index = KdTree::new(2);
        for (idx, segment) in segments.iter().enumerate() {
            for sample in densify(&segment.geometry) {
                // Stored as [lon, lat] for geographic coordinates
                let _ = index.add([sample.lon, sample.lat], idx);
            }
        }
        Self { segments, index }
    }

    pub fn segments(&self) -> &[StreetSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Indices of segments with an indexed vertex within `radius_deg` of
    /// the point, padded by the sample spacing. Candidates only; callers
    /// still need an exact geometry test.
    pub fn candidate_segments(&self, point: Coordinate, radius_deg: f64) -> Vec<usize> {
        let padded = radius_deg + INDEX_SAMPLE_SPACING_DEG / 2.0;
        let hits = self
            .index
            .within(&[point.lon, point.lat], padded * padded, &squared_euclidean)
            .unwrap_or_default();

        let mut indices: Vec<usize> = hits.into_iter().map(|(_, &idx)| idx).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

fn densify(geometry: &[Coordinate]) -> Vec<Coordinate> {
    let mut samples = Vec::with_capacity(geometry.len() * 2);
    for pair in geometry.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        samples.push(a);
        let dlon = b.lon - a.lon;
        let dlat = b.lat - a.lat;
        let length = (dlon * dlon + dlat * dlat).sqrt();
        let steps = (length / INDEX_SAMPLE_SPACING_DEG).floor() as usize;
        for i in 1..=steps {
            let t = i as f64 / (steps + 1) as f64;
            samples.push(Coordinate {
                lat: a.lat + dlat * t,
                lon: a.lon + dlon * t,
            });
        }
    }
    if let Some(&last) = geometry.last() {
        samples.push(last);
    }
    samples
}

/// Where the street network comes from. A directory holds pre-processed
/// extracts, one GeoJSON file per tag dimension, merged on geometry at
/// load time. `Memory` backs tests and benches with a pre-built network.
pub enum NetworkSource {
    Pbf(PathBuf),
    GeoJson(PathBuf),
    GeoJsonDir(PathBuf),
    Memory(Arc<StreetNetwork>),
}

impl NetworkSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(Self::GeoJsonDir(path.to_path_buf()));
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pbf") => Ok(Self::Pbf(path.to_path_buf())),
            Some("geojson") | Some("json") => Ok(Self::GeoJson(path.to_path_buf())),
            other => Err(NetworkError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    fn load_base(&self) -> Result<Arc<StreetNetwork>, NetworkError> {
        let segments = match self {
            NetworkSource::Pbf(path) => segments_from_pbf(path)?,
            NetworkSource::GeoJson(path) => segments_from_geojson_str(&fs::read_to_string(path)?)?,
            NetworkSource::GeoJsonDir(dir) => segments_from_geojson_dir(dir)?,
            NetworkSource::Memory(network) => return Ok(Arc::clone(network)),
        };
        if segments.is_empty() {
            return Err(NetworkError::EmptyNetwork);
        }
        Ok(Arc::new(StreetNetwork::from_segments(segments)))
    }
}

/// Merge per-dimension extracts on identical geometry; the first file to
/// mention a tag key wins.
fn segments_from_geojson_dir(dir: &Path) -> Result<Vec<StreetSegment>, NetworkError> {
    use std::collections::hash_map::Entry;

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("geojson") | Some("json")
            )
        })
        .collect();
    paths.sort();

    let mut merged: Vec<StreetSegment> = Vec::new();
    let mut by_geometry: HashMap<Vec<(u64, u64)>, usize> = HashMap::new();
    for path in paths {
        for segment in segments_from_geojson_str(&fs::read_to_string(&path)?)? {
            let key: Vec<(u64, u64)> = segment
                .geometry
                .iter()
                .map(|coord| (coord.lat.to_bits(), coord.lon.to_bits()))
                .collect();
            match by_geometry.entry(key) {
                Entry::Occupied(slot) => {
                    let existing = &mut merged[*slot.get()];
                    for (tag, value) in segment.tags {
                        existing.tags.entry(tag).or_insert(value);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(merged.len());
                    merged.push(segment);
                }
            }
        }
    }
    Ok(merged)
}

fn segments_from_pbf(path: &Path) -> Result<Vec<StreetSegment>, NetworkError> {
    struct PendingWay {
        node_ids: Vec<i64>,
        tags: HashMap<String, String>,
    }

    let mut ways: Vec<PendingWay> = Vec::new();
    let mut wanted_nodes: HashSet<i64> = HashSet::new();

    // First pass: cycling-suitable ways and the node ids they reference.
    let reader = ElementReader::from_path(path)?;
    reader.for_each(|element| {
        if let Element::Way(way) = element {
            let mut tags = HashMap::new();
            for (key, value) in way.tags() {
                if KEPT_TAGS.contains(&key) {
                    tags.insert(key.to_string(), value.to_string());
                }
            }
            let Some(highway) = tags.get("highway") else {
                return;
            };
            if !CYCLING_HIGHWAYS.contains(&highway.as_str()) {
                return;
            }
            let node_ids: Vec<i64> = way.refs().collect();
            if node_ids.len() < 2 {
                return;
            }
            wanted_nodes.extend(node_ids.iter().copied());
            ways.push(PendingWay { node_ids, tags });
        }
    })?;

    // Second pass: coordinates of the referenced nodes.
    let mut coords: HashMap<i64, Coordinate> = HashMap::with_capacity(wanted_nodes.len());
    let reader = ElementReader::from_path(path)?;
    reader.for_each(|element| match element {
        Element::Node(node) => {
            if wanted_nodes.contains(&node.id()) {
                coords.insert(
                    node.id(),
                    Coordinate {
                        lat: node.lat(),
                        lon: node.lon(),
                    },
                );
            }
        }
        Element::DenseNode(node) => {
            if wanted_nodes.contains(&node.id()) {
                coords.insert(
                    node.id(),
                    Coordinate {
                        lat: node.lat(),
                        lon: node.lon(),
                    },
                );
            }
        }
        _ => {}
    })?;

    let mut segments = Vec::with_capacity(ways.len());
    let mut skipped = 0usize;
    for way in ways {
        let geometry: Option<Vec<Coordinate>> = way
            .node_ids
            .iter()
            .map(|id| coords.get(id).copied())
            .collect();
        match geometry {
            Some(geometry) => segments.push(StreetSegment {
                geometry,
                tags: way.tags,
            }),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!("skipped {skipped} ways referencing nodes missing from the extract");
    }
    Ok(segments)
}

pub fn segments_from_geojson_str(raw: &str) -> Result<Vec<StreetSegment>, NetworkError> {
    let geojson: GeoJson = raw.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut segments = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(geometry) = feature.geometry.as_ref() else {
            continue;
        };
        let Ok(line) = LineString::<f64>::try_from(geometry.value.clone()) else {
            tracing::warn!("skipping non-LineString feature in network extract");
            continue;
        };
        let geometry: Vec<Coordinate> = line
            .0
            .iter()
            .map(|coord| Coordinate {
                lat: coord.y,
                lon: coord.x,
            })
            .collect();
        if geometry.len() < 2 {
            continue;
        }

        let mut tags = HashMap::new();
        if let Some(properties) = feature.properties {
            for (key, value) in properties {
                if let Some(value) = property_value(&value) {
                    tags.insert(normalize_tag_key(&key).to_string(), value);
                }
            }
        }
        segments.push(StreetSegment { geometry, tags });
    }
    Ok(segments)
}

/// Pre-processed extracts name their tag columns `*_category`; fold those
/// back onto the raw OSM keys so both extract generations filter
/// identically.
fn normalize_tag_key(key: &str) -> &str {
    match key {
        "maxspeed_category" => "maxspeed",
        "surface_category" => "surface",
        other => other,
    }
}

fn property_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) if !text.is_empty() => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub fn matches_filter(segment: &StreetSegment, filter: &NetworkFilter) -> bool {
    if let Some(maxspeed) = &filter.maxspeed {
        if segment.tag("maxspeed") != Some(maxspeed.as_str()) {
            return false;
        }
    }
    if !filter.street_types.is_empty() {
        match segment.tag("highway") {
            Some(value) if filter.street_types.iter().any(|wanted| wanted == value) => {}
            _ => return false,
        }
    }
    if !filter.surfaces.is_empty() {
        match segment.tag("surface") {
            Some(value) if filter.surfaces.iter().any(|wanted| wanted == value) => {}
            _ => return false,
        }
    }
    true
}

fn apply_filter(network: &StreetNetwork, filter: &NetworkFilter) -> Vec<StreetSegment> {
    network
        .segments()
        .iter()
        .filter(|segment| matches_filter(segment, filter))
        .cloned()
        .collect()
}

/// Canonical cache key for a filter tuple. Multi-value dimensions are
/// sorted so equivalent selections hash identically.
pub fn filter_cache_key(filter: &NetworkFilter) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut street_types = filter.street_types.clone();
    street_types.sort();
    let mut surfaces = filter.surfaces.clone();
    surfaces.sort();

    let mut hasher = DefaultHasher::new();
    filter.maxspeed.hash(&mut hasher);
    street_types.hash(&mut hasher);
    surfaces.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Memoizes loaded networks per filter tuple. Entries live for the
/// process lifetime until explicitly invalidated or evicted by capacity.
pub struct NetworkStore {
    source: NetworkSource,
    cache: Mutex<LruCache<String, Arc<StreetNetwork>>>,
}

impl NetworkStore {
    pub fn new(source: NetworkSource) -> Self {
        Self {
            source,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    pub fn load(&self, filter: &NetworkFilter) -> Result<Arc<StreetNetwork>, NetworkError> {
        if filter.is_empty() {
            return self.base();
        }

        let key = filter_cache_key(filter);
        if let Some(network) = self.guard().get(&key) {
            return Ok(Arc::clone(network));
        }

        let base = self.base()?;
        let network = Arc::new(StreetNetwork::from_segments(apply_filter(&base, filter)));
        tracing::debug!(
            "filtered network: {} of {} segments match {:?}",
            network.len(),
            base.len(),
            filter
        );
        self.guard().push(key, Arc::clone(&network));
        Ok(network)
    }

    /// Drop the memoized entry for one filter tuple.
    pub fn invalidate(&self, filter: &NetworkFilter) {
        let key = if filter.is_empty() {
            BASE_KEY.to_string()
        } else {
            filter_cache_key(filter)
        };
        self.guard().pop(&key);
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    fn base(&self) -> Result<Arc<StreetNetwork>, NetworkError> {
        if let Some(network) = self.guard().get(BASE_KEY) {
            return Ok(Arc::clone(network));
        }
        let network = self.source.load_base()?;
        tracing::info!("loaded street network with {} segments", network.len());
        self.guard().push(BASE_KEY.to_string(), Arc::clone(&network));
        Ok(network)
    }

    fn guard(&self) -> MutexGuard<'_, LruCache<String, Arc<StreetNetwork>>> {
        self.cache.lock().expect("network cache lock poisoned")
    }
}
