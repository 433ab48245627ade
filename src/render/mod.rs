//! Renderer capability interface
//!
//! The map renderer is owned by the host. This crate drives it via [`MapRenderer`]:
//! camera transitions, source and layer management, and paint/filter writes. Renderer
//! events travel the other way, forwarded by the host adapter into
//! [`MapSession::dispatch`](crate::MapSession::dispatch).

pub mod events;
pub mod expression;
pub mod headless;
pub mod style;

use crate::camera::pose::CameraPose;
use crate::core::{constants, geo::LngLat};
use crate::data::geojson::FeatureCollection;
use crate::{MapError, Result};
use events::TransitionId;
use expression::Expression;
use serde::{Deserialize, Serialize};
use style::{LayerSpec, SourceSpec, StyleBatch, StyleWrite};

/// Where the camera currently is
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            center: LngLat::default(),
            zoom: 1.0,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

pub trait MapRenderer: Send {
    /// The renderer has loaded its style and accepts sources and layers
    fn is_ready(&self) -> bool;

    fn is_torn_down(&self) -> bool;

    fn camera(&self) -> CameraState;

    fn zoom_range(&self) -> (f64, f64) {
        (constants::MIN_ZOOM, constants::MAX_ZOOM)
    }

    /// Starts an animated transition. The renderer reports completion with a
    /// [`MapEvent::MoveEnd`](events::MapEvent::MoveEnd) carrying `transition`. Starting a
    /// new transition interrupts the previous one.
    fn move_camera(&mut self, pose: &CameraPose, transition: TransitionId);

    /// Moves the camera without animation
    fn jump_camera(&mut self, pose: &CameraPose);

    fn stop_camera(&mut self);

    /// Swaps the base style. Sources and layers are dropped; readiness returns with a
    /// [`MapEvent::StyleLoaded`](events::MapEvent::StyleLoaded).
    fn set_style(&mut self, style: &str);

    fn has_source(&self, id: &str) -> bool;

    fn has_layer(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<()>;

    fn remove_source(&mut self, id: &str) -> Result<()>;

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<()>;

    fn add_layer(&mut self, layer: LayerSpec) -> Result<()>;

    fn remove_layer(&mut self, id: &str) -> Result<()>;

    fn set_paint_property(&mut self, layer: &str, property: &str, value: Expression)
        -> Result<()>;

    fn set_filter(&mut self, layer: &str, filter: Option<Expression>) -> Result<()>;

    /// Applies every write or none. The default checks all target layers first, then writes
    /// in order; a renderer with native batching should override it.
    fn apply_batch(&mut self, batch: StyleBatch) -> Result<()> {
        if let Some(missing) = batch.layers().into_iter().find(|layer| !self.has_layer(layer)) {
            return Err(MapError::LayerNotFound(missing.to_string()));
        }
        for write in batch.into_writes() {
            match write {
                StyleWrite::Filter { layer, filter } => self.set_filter(&layer, filter)?,
                StyleWrite::Paint {
                    layer,
                    property,
                    value,
                } => self.set_paint_property(&layer, &property, value)?,
            }
        }
        Ok(())
    }

    /// Releases renderer resources when the session is torn down
    fn destroy(&mut self) {}
}
