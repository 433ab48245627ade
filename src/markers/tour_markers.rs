use crate::core::{constants, geo::LngLat, session::MapSession};
use crate::data::{
    geojson::{Feature, FeatureCollection, Geometry},
    location::{MemoryCategory, MemoryLocation},
};
use crate::render::{
    expression::Expression,
    style::{LayerKind, LayerSpec, SourceSpec},
};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// A temporary marker a tour reveals for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourMarker {
    pub code: String,
    pub position: LngLat,
    pub title: String,
    #[serde(default)]
    pub category: Option<MemoryCategory>,
}

impl TourMarker {
    pub fn new(code: impl Into<String>, position: LngLat, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            position,
            title: title.into(),
            category: None,
        }
    }

    /// Marker for a location; uses the location code when present, the id otherwise
    pub fn from_location(location: &MemoryLocation) -> Result<Self> {
        Ok(Self {
            code: location.code.clone().unwrap_or_else(|| location.id.clone()),
            position: location.position()?,
            title: location.title.clone(),
            category: Some(location.category),
        })
    }

    pub fn to_feature(&self) -> Feature {
        let feature = Feature::new(Geometry::point(self.position))
            .with_id(self.code.clone())
            .with_property("code", self.code.clone())
            .with_property("title", self.title.clone());
        match self.category {
            Some(category) => feature.with_property("category", category.key()),
            None => feature,
        }
    }
}

/// The tour's own marker overlay, kept apart from the clustered memories
#[derive(Debug, Clone, Default)]
pub struct TourMarkers {
    shown: Arc<Mutex<Vec<TourMarker>>>,
}

impl TourMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TourMarker>> {
        self.shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn layers() -> [LayerSpec; 2] {
        [
            LayerSpec::new(
                constants::TOUR_MARKER_LAYER,
                LayerKind::Circle,
                constants::TOUR_MARKER_SOURCE,
            )
            .with_paint("circle-color", Expression::literal("#e67e22"))
            .with_paint("circle-radius", Expression::literal(10.0))
            .with_paint("circle-stroke-width", Expression::literal(2.0))
            .with_paint("circle-stroke-color", Expression::literal("#ffffff")),
            LayerSpec::new(
                constants::TOUR_MARKER_LABEL_LAYER,
                LayerKind::Symbol,
                constants::TOUR_MARKER_SOURCE,
            )
            .with_layout("text-field", Expression::get("title"))
            .with_layout("text-offset", Expression::literal(serde_json::json!([0.0, 1.4]))),
        ]
    }

    /// Replaces the shown set. The source is created on first use.
    pub fn show(&self, session: &MapSession, markers: &[TourMarker]) -> Result<()> {
        let data = FeatureCollection::new(markers.iter().map(TourMarker::to_feature).collect());
        let exists = session.with_renderer(|r| r.has_source(constants::TOUR_MARKER_SOURCE))?;
        if exists {
            session.with_renderer(|r| r.set_source_data(constants::TOUR_MARKER_SOURCE, data))??;
        } else {
            let _guard = session.begin_structural_mutation()?;
            session.with_renderer(|r| -> Result<()> {
                r.add_source(constants::TOUR_MARKER_SOURCE, SourceSpec::geojson(data))?;
                for layer in Self::layers() {
                    r.add_layer(layer)?;
                }
                Ok(())
            })??;
        }
        *self.lock() = markers.to_vec();
        Ok(())
    }

    /// Removes every tour marker from the map. Falls back to emptying the source when
    /// another structural mutation holds the lock.
    pub fn clear(&self, session: &MapSession) -> Result<()> {
        self.clear_local();
        if !session.with_renderer(|r| r.has_source(constants::TOUR_MARKER_SOURCE))? {
            return Ok(());
        }
        match session.begin_structural_mutation() {
            Ok(_guard) => session.with_renderer(|r| -> Result<()> {
                for layer in [
                    constants::TOUR_MARKER_LABEL_LAYER,
                    constants::TOUR_MARKER_LAYER,
                ] {
                    match r.remove_layer(layer) {
                        Ok(()) | Err(MapError::LayerNotFound(_)) => {}
                        Err(err) => return Err(err),
                    }
                }
                r.remove_source(constants::TOUR_MARKER_SOURCE)
            })?,
            Err(MapError::StructuralMutationInFlight) => {
                log::debug!("structural lock busy, emptying tour markers in place");
                session.with_renderer(|r| {
                    r.set_source_data(constants::TOUR_MARKER_SOURCE, FeatureCollection::default())
                })?
            }
            Err(err) => Err(err),
        }
    }

    /// Forgets the shown set without touching the renderer
    pub fn clear_local(&self) {
        self.lock().clear();
    }

    pub fn shown_codes(&self) -> Vec<String> {
        self.lock().iter().map(|m| m.code.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessRenderer;

    fn markers() -> Vec<TourMarker> {
        vec![
            TourMarker::new("BOJ", LngLat::new(-76.89, 6.56), "Bojayá"),
            TourMarker::new("CTG", LngLat::new(-75.51, 10.39), "Cartagena"),
        ]
    }

    #[test]
    fn test_show_then_update() {
        let renderer = HeadlessRenderer::new();
        let session = MapSession::new(renderer.clone());
        let overlay = TourMarkers::new();

        overlay.show(&session, &markers()[..1]).unwrap();
        assert_eq!(renderer.source_data(constants::TOUR_MARKER_SOURCE).unwrap().len(), 1);
        overlay.show(&session, &markers()).unwrap();
        assert_eq!(renderer.source_data(constants::TOUR_MARKER_SOURCE).unwrap().len(), 2);
        assert_eq!(overlay.shown_codes(), vec!["BOJ", "CTG"]);
    }

    #[test]
    fn test_clear_removes_layers() {
        let renderer = HeadlessRenderer::new();
        let session = MapSession::new(renderer.clone());
        let overlay = TourMarkers::new();
        overlay.show(&session, &markers()).unwrap();
        overlay.clear(&session).unwrap();

        assert!(overlay.is_empty());
        assert!(renderer.layer(constants::TOUR_MARKER_LAYER).is_none());
        assert!(renderer.source_data(constants::TOUR_MARKER_SOURCE).is_none());
        // clearing twice is fine
        overlay.clear(&session).unwrap();
    }

    #[test]
    fn test_clear_while_locked_empties_source() {
        let renderer = HeadlessRenderer::new();
        let session = MapSession::new(renderer.clone());
        let overlay = TourMarkers::new();
        overlay.show(&session, &markers()).unwrap();

        let _guard = session.begin_structural_mutation().unwrap();
        overlay.clear(&session).unwrap();
        assert!(renderer.source_data(constants::TOUR_MARKER_SOURCE).unwrap().is_empty());
    }

    #[test]
    fn test_marker_from_location() {
        let location = MemoryLocation::new(
            "m-7",
            "Salón del Nunca Más",
            LngLat::new(-75.28, 6.15),
            MemoryCategory::Museum,
            crate::data::location::MacroRegion::Andina,
        );
        assert_eq!(TourMarker::from_location(&location).unwrap().code, "m-7");
        assert_eq!(
            TourMarker::from_location(&location.with_code("GRA")).unwrap().code,
            "GRA"
        );
    }
}
