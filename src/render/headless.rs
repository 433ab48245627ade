//! In-memory renderer
//!
//! [`HeadlessRenderer`] keeps sources, layers, paint properties and the camera in memory
//! and queues the events a real renderer would emit. It is a cheap clonable handle: give
//! one clone to the [`MapSession`] and keep another to drive time and inspect what would
//! be drawn.

use crate::camera::pose::CameraPose;
use crate::core::{constants, session::MapSession};
use crate::data::geojson::{Feature, FeatureCollection};
use crate::render::{
    events::{MapEvent, TransitionId},
    expression::{EvalContext, Expression},
    style::{LayerSpec, SourceSpec, StyleBatch, StyleWrite},
    CameraState, MapRenderer,
};
use crate::{MapError, Result};
use fxhash::FxHashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct ActiveTransition {
    id: TransitionId,
    from: CameraState,
    pose: CameraPose,
    elapsed: Duration,
}

#[derive(Debug)]
struct HeadlessState {
    ready: bool,
    torn_down: bool,
    auto_settle: bool,
    style: String,
    camera: CameraState,
    zoom_range: (f64, f64),
    sources: FxHashMap<String, SourceSpec>,
    layers: Vec<LayerSpec>,
    active: Option<ActiveTransition>,
    interrupted: Vec<TransitionId>,
    events: VecDeque<MapEvent>,
    batches: usize,
}

impl HeadlessState {
    fn layer_mut(&mut self, id: &str) -> Result<&mut LayerSpec> {
        self.layers
            .iter_mut()
            .find(|layer| layer.id == id)
            .ok_or_else(|| MapError::LayerNotFound(id.to_string()))
    }

    fn apply_write(&mut self, write: StyleWrite) -> Result<()> {
        match write {
            StyleWrite::Filter { layer, filter } => {
                self.layer_mut(&layer)?.filter = filter;
            }
            StyleWrite::Paint {
                layer,
                property,
                value,
            } => {
                self.layer_mut(&layer)?.paint.insert(property, value);
            }
        }
        Ok(())
    }

    fn finish_transition(&mut self) {
        if let Some(active) = self.active.take() {
            self.camera = active.pose.target_state();
            self.events.push_back(MapEvent::Zoom {
                zoom: self.camera.zoom,
            });
            self.events.push_back(MapEvent::MoveEnd {
                transition: Some(active.id),
                camera: self.camera,
            });
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessRenderer {
    /// A renderer whose style is loaded and whose transitions settle at once
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState {
                ready: true,
                torn_down: false,
                auto_settle: true,
                style: "default".to_string(),
                camera: CameraState::default(),
                zoom_range: (constants::MIN_ZOOM, constants::MAX_ZOOM),
                sources: FxHashMap::default(),
                layers: Vec::new(),
                active: None,
                interrupted: Vec::new(),
                events: VecDeque::new(),
                batches: 0,
            })),
        }
    }

    /// A renderer still loading its style; call [`HeadlessRenderer::finish_loading`]
    pub fn loading() -> Self {
        let renderer = Self::new();
        {
            let mut state = renderer.lock();
            state.ready = false;
            state.auto_settle = false;
        }
        renderer
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// When set, transitions and style loads complete as soon as they are issued
    pub fn set_auto_settle(&self, auto_settle: bool) {
        self.lock().auto_settle = auto_settle;
    }

    pub fn set_zoom_range(&self, min: f64, max: f64) {
        self.lock().zoom_range = (min, max);
    }

    pub fn finish_loading(&self) {
        let mut state = self.lock();
        state.ready = true;
        let style = state.style.clone();
        state.events.push_back(MapEvent::StyleLoaded { style });
    }

    /// Steps the active transition forward by `dt`
    pub fn advance(&self, dt: Duration) {
        let mut state = self.lock();
        let Some(active) = state.active.as_mut() else {
            return;
        };
        active.elapsed += dt;
        let t = if active.pose.duration.is_zero() {
            1.0
        } else {
            active.elapsed.as_secs_f64() / active.pose.duration.as_secs_f64()
        };
        let camera = active.pose.state_at(&active.from, t);
        state.camera = camera;
        if t >= 1.0 {
            state.finish_transition();
        } else {
            state.events.push_back(MapEvent::Zoom { zoom: camera.zoom });
        }
    }

    /// Completes the active transition immediately
    pub fn settle(&self) {
        self.lock().finish_transition();
    }

    pub fn queue_event(&self, event: MapEvent) {
        self.lock().events.push_back(event);
    }

    pub fn take_events(&self) -> Vec<MapEvent> {
        self.lock().events.drain(..).collect()
    }

    /// Forwards queued events into `session`, returning how many were delivered
    pub fn pump(&self, session: &MapSession) -> usize {
        let events = self.take_events();
        let count = events.len();
        for event in events {
            session.dispatch(event);
        }
        count
    }

    /// Keeps forwarding events into `session` from a background task until the session
    /// is torn down or dropped
    pub fn spawn_pump(&self, session: &MapSession) -> tokio::task::JoinHandle<()> {
        let renderer = self.clone();
        let session = session.downgrade();
        tokio::spawn(async move {
            while let Some(session) = session.upgrade() {
                renderer.pump(&session);
                if session.is_torn_down() {
                    break;
                }
                drop(session);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    }

    pub fn camera_state(&self) -> CameraState {
        self.lock().camera
    }

    pub fn active_transition(&self) -> Option<TransitionId> {
        self.lock().active.as_ref().map(|active| active.id)
    }

    pub fn interrupted_transitions(&self) -> Vec<TransitionId> {
        self.lock().interrupted.clone()
    }

    pub fn style_name(&self) -> String {
        self.lock().style.clone()
    }

    pub fn source_data(&self, id: &str) -> Option<FeatureCollection> {
        self.lock().sources.get(id).map(|source| source.data().clone())
    }

    pub fn source_spec(&self, id: &str) -> Option<SourceSpec> {
        self.lock().sources.get(id).cloned()
    }

    pub fn layer(&self, id: &str) -> Option<LayerSpec> {
        self.lock().layers.iter().find(|layer| layer.id == id).cloned()
    }

    pub fn layer_ids(&self) -> Vec<String> {
        self.lock().layers.iter().map(|layer| layer.id.clone()).collect()
    }

    pub fn layer_filter(&self, id: &str) -> Option<Expression> {
        self.layer(id).and_then(|layer| layer.filter)
    }

    pub fn paint_value(&self, layer: &str, property: &str) -> Option<Expression> {
        self.layer(layer)
            .and_then(|layer| layer.paint.get(property).cloned())
    }

    /// Number of batches committed through [`MapRenderer::apply_batch`]
    pub fn batch_count(&self) -> usize {
        self.lock().batches
    }

    /// Features of a layer's source that pass the layer filter at `zoom`
    pub fn rendered_features(&self, layer_id: &str, zoom: f64) -> Vec<Feature> {
        let state = self.lock();
        let Some(layer) = state.layers.iter().find(|layer| layer.id == layer_id) else {
            return Vec::new();
        };
        let Some(source) = state.sources.get(&layer.source) else {
            return Vec::new();
        };
        source
            .data()
            .features
            .iter()
            .filter(|feature| {
                layer.filter.as_ref().map_or(true, |filter| {
                    filter.matches(&EvalContext::at_zoom(zoom).with_properties(&feature.properties))
                })
            })
            .cloned()
            .collect()
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MapRenderer for HeadlessRenderer {
    fn is_ready(&self) -> bool {
        let state = self.lock();
        state.ready && !state.torn_down
    }

    fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }

    fn camera(&self) -> CameraState {
        self.lock().camera
    }

    fn zoom_range(&self) -> (f64, f64) {
        self.lock().zoom_range
    }

    fn move_camera(&mut self, pose: &CameraPose, transition: TransitionId) {
        let mut state = self.lock();
        if let Some(previous) = state.active.take() {
            state.interrupted.push(previous.id);
        }
        let from = state.camera;
        state.active = Some(ActiveTransition {
            id: transition,
            from,
            pose: pose.clone(),
            elapsed: Duration::ZERO,
        });
        if state.auto_settle {
            state.finish_transition();
        }
    }

    fn jump_camera(&mut self, pose: &CameraPose) {
        let mut state = self.lock();
        if let Some(previous) = state.active.take() {
            state.interrupted.push(previous.id);
        }
        state.camera = pose.target_state();
        let camera = state.camera;
        state.events.push_back(MapEvent::Zoom { zoom: camera.zoom });
        state.events.push_back(MapEvent::MoveEnd {
            transition: None,
            camera,
        });
    }

    fn stop_camera(&mut self) {
        let mut state = self.lock();
        if let Some(previous) = state.active.take() {
            state.interrupted.push(previous.id);
            let camera = state.camera;
            state.events.push_back(MapEvent::MoveEnd {
                transition: None,
                camera,
            });
        }
    }

    fn set_style(&mut self, style: &str) {
        let mut state = self.lock();
        state.style = style.to_string();
        state.sources.clear();
        state.layers.clear();
        state.active = None;
        state.ready = state.auto_settle;
        if state.auto_settle {
            state.events.push_back(MapEvent::StyleLoaded {
                style: style.to_string(),
            });
        }
    }

    fn has_source(&self, id: &str) -> bool {
        self.lock().sources.contains_key(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.lock().layers.iter().any(|layer| layer.id == id)
    }

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<()> {
        let mut state = self.lock();
        if state.sources.contains_key(id) {
            return Err(MapError::Renderer(format!("source {id} already exists")));
        }
        state.sources.insert(id.to_string(), source);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.layers.iter().any(|layer| layer.source == id) {
            return Err(MapError::Renderer(format!(
                "source {id} is still used by a layer"
            )));
        }
        state
            .sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MapError::SourceNotFound(id.to_string()))
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<()> {
        let mut state = self.lock();
        let source = state
            .sources
            .get_mut(id)
            .ok_or_else(|| MapError::SourceNotFound(id.to_string()))?;
        source.set_data(data);
        Ok(())
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<()> {
        let mut state = self.lock();
        if !state.sources.contains_key(&layer.source) {
            return Err(MapError::SourceNotFound(layer.source.clone()));
        }
        if state.layers.iter().any(|existing| existing.id == layer.id) {
            return Err(MapError::Renderer(format!(
                "layer {} already exists",
                layer.id
            )));
        }
        state.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let before = state.layers.len();
        state.layers.retain(|layer| layer.id != id);
        if state.layers.len() == before {
            return Err(MapError::LayerNotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        property: &str,
        value: Expression,
    ) -> Result<()> {
        self.lock().apply_write(StyleWrite::Paint {
            layer: layer.to_string(),
            property: property.to_string(),
            value,
        })
    }

    fn set_filter(&mut self, layer: &str, filter: Option<Expression>) -> Result<()> {
        self.lock().apply_write(StyleWrite::Filter {
            layer: layer.to_string(),
            filter,
        })
    }

    fn apply_batch(&mut self, batch: StyleBatch) -> Result<()> {
        let mut state = self.lock();
        if let Some(missing) = batch
            .layers()
            .into_iter()
            .find(|layer| !state.layers.iter().any(|existing| existing.id == *layer))
        {
            return Err(MapError::LayerNotFound(missing.to_string()));
        }
        for write in batch.into_writes() {
            state.apply_write(write)?;
        }
        state.batches += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        let mut state = self.lock();
        state.torn_down = true;
        state.ready = false;
        state.active = None;
    }
}
