use crate::data::geojson::FeatureCollection;
use crate::render::expression::Expression;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Circle,
    Symbol,
    Fill,
    Line,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerKind::Circle => write!(f, "circle"),
            LayerKind::Symbol => write!(f, "symbol"),
            LayerKind::Fill => write!(f, "fill"),
            LayerKind::Line => write!(f, "line"),
        }
    }
}

/// Clustering options attached to a GeoJSON source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterOptions {
    #[serde(rename = "clusterRadius")]
    pub radius: f64,
    #[serde(rename = "clusterMaxZoom")]
    pub max_zoom: u8,
    #[serde(rename = "clusterMinPoints")]
    pub min_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SourceSpec {
    #[serde(rename = "geojson")]
    GeoJson {
        data: FeatureCollection,
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster: Option<ClusterOptions>,
    },
}

impl SourceSpec {
    pub fn geojson(data: FeatureCollection) -> Self {
        SourceSpec::GeoJson {
            data,
            cluster: None,
        }
    }

    pub fn clustered(data: FeatureCollection, options: ClusterOptions) -> Self {
        SourceSpec::GeoJson {
            data,
            cluster: Some(options),
        }
    }

    pub fn data(&self) -> &FeatureCollection {
        match self {
            SourceSpec::GeoJson { data, .. } => data,
        }
    }

    pub fn set_data(&mut self, new_data: FeatureCollection) {
        match self {
            SourceSpec::GeoJson { data, .. } => *data = new_data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expression>,
    pub paint: BTreeMap<String, Expression>,
    pub layout: BTreeMap<String, Expression>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, kind: LayerKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            filter: None,
            paint: BTreeMap::new(),
            layout: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_paint(mut self, property: impl Into<String>, value: Expression) -> Self {
        self.paint.insert(property.into(), value);
        self
    }

    pub fn with_layout(mut self, property: impl Into<String>, value: Expression) -> Self {
        self.layout.insert(property.into(), value);
        self
    }
}

/// A single paint-level write
#[derive(Debug, Clone, PartialEq)]
pub enum StyleWrite {
    Filter {
        layer: String,
        filter: Option<Expression>,
    },
    Paint {
        layer: String,
        property: String,
        value: Expression,
    },
}

impl StyleWrite {
    pub fn layer(&self) -> &str {
        match self {
            StyleWrite::Filter { layer, .. } | StyleWrite::Paint { layer, .. } => layer,
        }
    }
}

/// Paint and filter writes that must land together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleBatch {
    writes: Vec<StyleWrite>,
}

impl StyleBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, layer: &str, filter: Option<Expression>) -> Self {
        self.writes.push(StyleWrite::Filter {
            layer: layer.to_string(),
            filter,
        });
        self
    }

    pub fn paint(mut self, layer: &str, property: &str, value: Expression) -> Self {
        self.writes.push(StyleWrite::Paint {
            layer: layer.to_string(),
            property: property.to_string(),
            value,
        });
        self
    }

    /// Distinct layers touched by the batch, in first-write order
    pub fn layers(&self) -> Vec<&str> {
        let mut layers: Vec<&str> = Vec::new();
        for write in &self.writes {
            if !layers.contains(&write.layer()) {
                layers.push(write.layer());
            }
        }
        layers
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn into_writes(self) -> Vec<StyleWrite> {
        self.writes
    }
}
