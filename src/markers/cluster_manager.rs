//! Clustered memory markers
//!
//! The manager owns the `memories` source. Every refresh or filter change projects the
//! raw locations into point features again from scratch, sorted by id, and rebuilds the
//! crate-side [`ClusterIndex`] from the same list, so the renderer source and the index
//! never disagree about what is shown.

use crate::camera::{motion::CameraMotionController, pose::CameraPose};
use crate::core::{
    config::{CameraConfig, ClusterConfig},
    constants,
    geo::LngLat,
    session::{ListenerControl, ListenerId, MapSession},
};
use crate::data::{geojson::FeatureCollection, location::MemoryLocation};
use crate::data::location::MemoryCategory;
use crate::markers::filter::FilterCriteria;
use crate::render::{
    events::{EventKind, MapEvent, RenderedFeature},
    expression::Expression,
    style::{ClusterOptions, LayerKind, LayerSpec, SourceSpec},
};
use crate::runtime;
use crate::spatial::clustering::{ClusterEntry, ClusterIndex};
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard};

/// Host callback for a click on a single memory marker
pub type LocationSelected = Arc<dyn Fn(&MemoryLocation) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterBand {
    Small,
    Medium,
    Large,
}

impl ClusterBand {
    pub fn for_count(count: u64, config: &ClusterConfig) -> Self {
        if count >= config.large_threshold {
            ClusterBand::Large
        } else if count >= config.medium_threshold {
            ClusterBand::Medium
        } else {
            ClusterBand::Small
        }
    }

    fn slot(self) -> usize {
        match self {
            ClusterBand::Small => 0,
            ClusterBand::Medium => 1,
            ClusterBand::Large => 2,
        }
    }

    pub fn color<'a>(&self, config: &'a ClusterConfig) -> &'a str {
        &config.band_colors[self.slot()]
    }

    pub fn radius(&self, config: &ClusterConfig) -> f64 {
        config.band_radii[self.slot()]
    }
}

struct ClusterState {
    raw: Vec<MemoryLocation>,
    filter: FilterCriteria,
    visible: Vec<MemoryLocation>,
    data: FeatureCollection,
    index: ClusterIndex,
    on_select: Option<LocationSelected>,
    click_listener: Option<(u64, ListenerId)>,
}

#[derive(Clone)]
pub struct MarkerClusterManager {
    config: ClusterConfig,
    camera: CameraConfig,
    motion: CameraMotionController,
    state: Arc<Mutex<ClusterState>>,
}

impl MarkerClusterManager {
    /// Fails with [`crate::MapError::InvalidConfig`] when `config` cannot back a cluster index
    pub fn new(config: ClusterConfig, camera: CameraConfig) -> Result<Self> {
        let index = ClusterIndex::new(&config)?;
        Ok(Self {
            motion: CameraMotionController::new(camera.clone()),
            camera,
            state: Arc::new(Mutex::new(ClusterState {
                raw: Vec::new(),
                filter: FilterCriteria::default(),
                visible: Vec::new(),
                data: FeatureCollection::default(),
                index,
                on_select: None,
                click_listener: None,
            })),
            config,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates the clustered source, its layers and click handling. Calling it again once
    /// the source exists only refreshes the data.
    pub fn initialize<F>(
        &self,
        session: &MapSession,
        locations: Vec<MemoryLocation>,
        on_select: F,
    ) -> Result<()>
    where
        F: Fn(&MemoryLocation) + Send + Sync + 'static,
    {
        self.lock().on_select = Some(Arc::new(on_select));
        self.ensure_click_listener(session);

        if session.with_renderer(|r| r.has_source(constants::MEMORY_SOURCE))? {
            log::debug!("memory source already present, refreshing instead");
            self.refresh(session, locations);
            return Ok(());
        }

        let _guard = session.begin_structural_mutation()?;
        let data = {
            let mut state = self.lock();
            state.raw = locations;
            self.rebuild(&mut state);
            state.data.clone()
        };
        let options = ClusterOptions {
            radius: self.config.radius_px,
            max_zoom: self.config.max_zoom,
            min_points: self.config.min_points,
        };
        let layers = self.layers();
        session.with_renderer(|r| -> Result<()> {
            r.add_source(constants::MEMORY_SOURCE, SourceSpec::clustered(data, options))?;
            for layer in layers {
                if !r.has_layer(&layer.id) {
                    r.add_layer(layer)?;
                }
            }
            Ok(())
        })??;
        log::info!("memory clusters initialized with {} markers", self.len());
        Ok(())
    }

    /// Replaces the raw location list. The current filter still applies.
    pub fn refresh(&self, session: &MapSession, locations: Vec<MemoryLocation>) -> bool {
        let data = {
            let mut state = self.lock();
            state.raw = locations;
            self.rebuild(&mut state);
            state.data.clone()
        };
        self.push(session, data)
    }

    /// Changes which locations are shown; survives later refreshes
    pub fn apply_filter(&self, session: &MapSession, criteria: FilterCriteria) -> bool {
        let data = {
            let mut state = self.lock();
            log::debug!("marker filter {:?} -> {:?}", state.filter, criteria);
            state.filter = criteria;
            self.rebuild(&mut state);
            state.data.clone()
        };
        self.push(session, data)
    }

    fn rebuild(&self, state: &mut ClusterState) {
        let mut candidates: Vec<&MemoryLocation> = state
            .raw
            .iter()
            .filter(|location| state.filter.matches(location))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let mut visible = Vec::with_capacity(candidates.len());
        let mut features = Vec::with_capacity(candidates.len());
        let mut positions = Vec::with_capacity(candidates.len());
        for location in candidates {
            match location.position().and_then(|p| Ok((p, location.to_feature()?))) {
                Ok((position, feature)) => {
                    positions.push(position);
                    features.push(feature);
                    visible.push(location.clone());
                }
                Err(err) => log::warn!("excluding location from clusters: {}", err),
            }
        }

        state.index.load(&positions);
        state.data = FeatureCollection::new(features);
        state.visible = visible;
    }

    fn push(&self, session: &MapSession, data: FeatureCollection) -> bool {
        let pushed = session.with_renderer(|r| {
            if !r.has_source(constants::MEMORY_SOURCE) {
                return Ok(false);
            }
            r.set_source_data(constants::MEMORY_SOURCE, data).map(|_| true)
        });
        match pushed {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                log::debug!("memory source not created yet; keeping data for later");
                false
            }
            Ok(Err(err)) => {
                log::warn!("could not update memory source: {}", err);
                false
            }
            Err(err) => {
                log::debug!("memory source update skipped: {}", err);
                false
            }
        }
    }

    fn layers(&self) -> Vec<LayerSpec> {
        let config = &self.config;
        let band_step = |values: [Expression; 3]| {
            let [small, medium, large] = values;
            Expression::step(
                Expression::get("point_count"),
                small,
                vec![
                    (config.medium_threshold as f64, medium),
                    (config.large_threshold as f64, large),
                ],
            )
        };
        let colors = config.band_colors.clone().map(Expression::literal);
        let radii = config.band_radii.map(Expression::literal);

        let category_colors = MemoryCategory::ALL
            .iter()
            .map(|category| (category.key().into(), Expression::literal(category.color())))
            .collect();

        vec![
            LayerSpec::new(constants::CLUSTER_LAYER, LayerKind::Circle, constants::MEMORY_SOURCE)
                .with_filter(Expression::has("point_count"))
                .with_paint("circle-color", band_step(colors))
                .with_paint("circle-radius", band_step(radii)),
            LayerSpec::new(
                constants::CLUSTER_COUNT_LAYER,
                LayerKind::Symbol,
                constants::MEMORY_SOURCE,
            )
            .with_filter(Expression::has("point_count"))
            .with_layout("text-field", Expression::get("point_count_abbreviated"))
            .with_layout("text-size", Expression::literal(12.0)),
            LayerSpec::new(constants::POINT_LAYER, LayerKind::Circle, constants::MEMORY_SOURCE)
                .with_filter(Expression::not(Expression::has("point_count")))
                .with_paint(
                    "circle-color",
                    Expression::match_on(
                        Expression::get("category"),
                        category_colors,
                        Expression::literal(MemoryCategory::Other.color()),
                    ),
                )
                .with_paint("circle-radius", Expression::literal(7.0))
                .with_paint("circle-stroke-width", Expression::literal(1.5))
                .with_paint("circle-stroke-color", Expression::literal("#ffffff")),
        ]
    }

    fn ensure_click_listener(&self, session: &MapSession) {
        let mut state = self.lock();
        if matches!(state.click_listener, Some((id, _)) if id == session.id()) {
            return;
        }
        let manager = self.clone();
        let weak = session.downgrade();
        let listener = session.on(&[EventKind::Click], move |event| {
            let Some(session) = weak.upgrade() else {
                return ListenerControl::Remove;
            };
            if let MapEvent::Click { position, features } = event {
                manager.handle_click(&session, *position, features);
            }
            ListenerControl::Keep
        });
        state.click_listener = Some((session.id(), listener));
    }

    /// Reacts to a click: zooms into a cluster, or reports a selected point
    pub fn handle_click(
        &self,
        session: &MapSession,
        position: LngLat,
        features: &[RenderedFeature],
    ) {
        if let Some(cluster) = features
            .iter()
            .find(|f| f.layer == constants::CLUSTER_LAYER)
        {
            let current = session.camera().map_or(0.0, |camera| camera.zoom);
            let target = self.expansion_target(cluster.position, current);
            let pose = CameraPose::new(cluster.position, target)
                .with_duration(std::time::Duration::from_millis(
                    self.camera.cluster_click_duration_ms,
                ))
                .with_easing(self.camera.default_easing);
            log::debug!("cluster click at z{:.2}, expanding to z{:.2}", current, target);
            let (motion, session) = (self.motion.clone(), session.clone());
            runtime::spawn(async move {
                motion.move_to(&session, pose).await;
            });
            return;
        }

        let Some(id) = features
            .iter()
            .find(|f| f.layer == constants::POINT_LAYER)
            .and_then(|f| f.property("id"))
            .and_then(|id| id.as_str())
        else {
            log::debug!("click at ({:.4}, {:.4}) hit no marker", position.lng, position.lat);
            return;
        };

        let (location, on_select) = {
            let state = self.lock();
            (
                state.visible.iter().find(|l| l.id == id).cloned(),
                state.on_select.clone(),
            )
        };
        match (location, on_select) {
            (Some(location), Some(on_select)) => on_select(&location),
            (None, _) => log::warn!("clicked marker {} is not among visible locations", id),
            (Some(_), None) => {}
        }
    }

    /// Zoom to move to after clicking the cluster drawn at `position`: where it splits,
    /// but never more than the configured increment past `current`
    pub fn expansion_target(&self, position: LngLat, current: f64) -> f64 {
        let cap = current + self.config.max_zoom_increment;
        let split = {
            let state = self.lock();
            state
                .index
                .entry_at(position, current, self.config.band_radii[2])
                .and_then(|entry| match entry {
                    ClusterEntry::Cluster { id, .. } => state.index.expansion_zoom(id),
                    ClusterEntry::Point { .. } => None,
                })
        };
        match split {
            Some(zoom) => (zoom as f64).min(cap),
            None => cap,
        }
        .min(self.camera.max_zoom)
    }

    pub fn visible_locations(&self) -> Vec<MemoryLocation> {
        self.lock().visible.clone()
    }

    pub fn filter(&self) -> FilterCriteria {
        self.lock().filter.clone()
    }

    /// The feature collection most recently projected for the source
    pub fn source_data(&self) -> FeatureCollection {
        self.lock().data.clone()
    }

    pub fn clusters_at(&self, zoom: f64) -> Vec<ClusterEntry> {
        self.lock().index.clusters_at(zoom)
    }

    pub fn location(&self, id: &str) -> Option<MemoryLocation> {
        self.lock().raw.iter().find(|l| l.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
