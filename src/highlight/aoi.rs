use crate::core::{config::HighlightConfig, constants, geo::LngLat};
use crate::data::geojson::{Feature, FeatureCollection, Geometry};
use crate::render::{
    expression::Expression,
    style::{LayerKind, LayerSpec},
};
use serde::{Deserialize, Serialize};

const CIRCLE_SEGMENTS: usize = 64;

/// A circular overlay drawn around a tour checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOfInterest {
    pub id: String,
    pub center: LngLat,
    pub radius_km: f64,
}

impl AreaOfInterest {
    pub fn new(id: impl Into<String>, center: LngLat, radius_km: f64) -> Self {
        Self {
            id: id.into(),
            center,
            radius_km,
        }
    }

    /// Geodesic circle as a closed polygon ring
    pub fn to_polygon(&self) -> Geometry {
        let radius_m = self.radius_km.max(0.0) * 1000.0;
        let ring = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let bearing = 360.0 * i as f64 / CIRCLE_SEGMENTS as f64;
                self.center.destination(bearing, radius_m)
            })
            .collect();
        Geometry::polygon(ring)
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection::new(vec![Feature::new(self.to_polygon())
            .with_id(self.id.clone())
            .with_property("id", self.id.clone())])
    }
}

pub(crate) fn layers(config: &HighlightConfig) -> [LayerSpec; 2] {
    [
        LayerSpec::new(constants::AOI_FILL_LAYER, LayerKind::Fill, constants::AOI_SOURCE)
            .with_paint("fill-color", Expression::literal(config.aoi_fill_color.clone()))
            .with_paint("fill-opacity", Expression::literal(config.aoi_fill_opacity)),
        LayerSpec::new(constants::AOI_OUTLINE_LAYER, LayerKind::Line, constants::AOI_SOURCE)
            .with_paint("line-color", Expression::literal(config.aoi_fill_color.clone()))
            .with_paint("line-width", Expression::literal(2.0)),
    ]
}
