use crate::core::geo::LngLat;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// GeoJSON geometry, coordinates in `[lng, lat]` order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    MultiPoint { coordinates: Vec<[f64; 2]> },
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
}

impl Geometry {
    pub fn point(position: LngLat) -> Self {
        Geometry::Point {
            coordinates: [position.lng, position.lat],
        }
    }

    /// A polygon from one exterior ring; the ring is closed if it is not already
    pub fn polygon(mut ring: Vec<LngLat>) -> Self {
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        Geometry::Polygon {
            coordinates: vec![ring.iter().map(|p| [p.lng, p.lat]).collect()],
        }
    }

    /// Every vertex, exterior rings only for polygons
    pub fn positions(&self) -> Vec<LngLat> {
        let to_lnglat = |c: &[f64; 2]| LngLat::new(c[0], c[1]);
        match self {
            Geometry::Point { coordinates } => vec![to_lnglat(coordinates)],
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().map(to_lnglat).collect()
            }
            Geometry::Polygon { coordinates } => coordinates
                .first()
                .map(|ring| ring.iter().map(to_lnglat).collect())
                .unwrap_or_default(),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .filter_map(|polygon| polygon.first())
                .flat_map(|ring| ring.iter().map(to_lnglat))
                .collect(),
        }
    }

    /// Whether `point` lies inside a polygon (or on a point geometry)
    pub fn contains(&self, point: &LngLat) -> bool {
        match self {
            Geometry::Point { coordinates } => {
                (coordinates[0] - point.lng).abs() < 1e-10
                    && (coordinates[1] - point.lat).abs() < 1e-10
            }
            Geometry::Polygon { coordinates } => coordinates
                .first()
                .map_or(false, |ring| point_in_ring(point, ring)),
            Geometry::MultiPolygon { coordinates } => coordinates.iter().any(|polygon| {
                polygon
                    .first()
                    .map_or(false, |ring| point_in_ring(point, ring))
            }),
            Geometry::MultiPoint { .. } | Geometry::LineString { .. } => false,
        }
    }
}

fn point_in_ring(point: &LngLat, ring: &[[f64; 2]]) -> bool {
    if ring.is_empty() {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);
        if ((yi > point.lat) != (yj > point.lat))
            && (point.lng < (xj - xi) * (point.lat - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            properties: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Features whose `key` property equals `value`
    pub fn filter_by_property<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features
            .iter()
            .filter(move |feature| feature.property_str(key) == Some(value))
    }
}
