use crate::core::geo::LngLat;
use crate::render::CameraState;
use serde::{Deserialize, Serialize};

/// Identifies one camera transition so its completion can be matched to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub u64);

/// Event kinds a session listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Zoom,
    Click,
    StyleLoaded,
    MoveEnd,
    TornDown,
}

/// A feature the renderer reports under the pointer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedFeature {
    pub layer: String,
    pub position: LngLat,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl RenderedFeature {
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

/// Events forwarded from the renderer into a [`MapSession`](crate::MapSession)
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Camera zoom changed
    Zoom { zoom: f64 },
    /// Pointer click, with the rendered features under it (topmost first)
    Click {
        position: LngLat,
        features: Vec<RenderedFeature>,
    },
    /// A style finished loading; sources and layers may be added
    StyleLoaded { style: String },
    /// Camera stopped moving. `transition` is set when the motion was issued through
    /// [`MapRenderer::move_camera`](crate::MapRenderer::move_camera).
    MoveEnd {
        transition: Option<TransitionId>,
        camera: CameraState,
    },
    /// The map was destroyed
    TornDown,
}

impl MapEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MapEvent::Zoom { .. } => EventKind::Zoom,
            MapEvent::Click { .. } => EventKind::Click,
            MapEvent::StyleLoaded { .. } => EventKind::StyleLoaded,
            MapEvent::MoveEnd { .. } => EventKind::MoveEnd,
            MapEvent::TornDown => EventKind::TornDown,
        }
    }
}
