#![allow(dead_code)]

use maptour::prelude::*;
use maptour::{constants, render::headless::HeadlessRenderer};
use std::sync::atomic::{AtomicU64, Ordering};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small national sample with codes matching the embedded default tour
pub fn sample_locations() -> Vec<MemoryLocation> {
    vec![
        MemoryLocation::new(
            "loc-001",
            "Centro de Memoria, Paz y Reconciliación",
            LngLat::new(-74.0776, 4.6245),
            MemoryCategory::Memorial,
            MacroRegion::Andina,
        )
        .with_department("Bogotá D.C.")
        .with_code("CMPR"),
        MemoryLocation::new(
            "loc-002",
            "Museo Casa de la Memoria",
            LngLat::new(-75.5582, 6.2447),
            MemoryCategory::Museum,
            MacroRegion::Andina,
        )
        .with_department("Antioquia")
        .with_code("MCM"),
        MemoryLocation::new(
            "loc-003",
            "Salón del Nunca Más",
            LngLat::new(-75.1845, 6.1446),
            MemoryCategory::Archive,
            MacroRegion::Andina,
        )
        .with_department("Antioquia")
        .with_code("SNM"),
        MemoryLocation::new(
            "loc-004",
            "Bellavista, Bojayá",
            LngLat::new(-76.8867, 6.5592),
            MemoryCategory::Sanctuary,
            MacroRegion::Pacifica,
        )
        .with_department("Chocó")
        .with_code("BOJ"),
        MemoryLocation::new(
            "loc-005",
            "Montes de María",
            LngLat::new(-75.3553, 9.7167),
            MemoryCategory::CommunityInitiative,
            MacroRegion::Caribe,
        )
        .with_department("Sucre")
        .with_code("MMA"),
        MemoryLocation::new(
            "loc-006",
            "Cartagena",
            LngLat::new(-75.5144, 10.3910),
            MemoryCategory::Mural,
            MacroRegion::Caribe,
        )
        .with_department("Bolívar")
        .with_code("CTG"),
        MemoryLocation::new(
            "loc-007",
            "Mitú",
            LngLat::new(-70.2339, 1.1983),
            MemoryCategory::Monument,
            MacroRegion::Amazonia,
        )
        .with_department("Vaupés"),
        MemoryLocation::new(
            "loc-008",
            "Medellín, Comuna 13",
            LngLat::new(-75.6120, 6.2570),
            MemoryCategory::Mural,
            MacroRegion::Andina,
        )
        .with_department("Antioquia"),
    ]
}

/// Coarse boxes standing in for the macro-region polygons
pub fn region_polygons() -> FeatureCollection {
    let boxes = [
        (MacroRegion::Caribe, (-76.5, 8.0), (-71.0, 12.5)),
        (MacroRegion::Andina, (-77.0, 1.0), (-72.0, 8.0)),
        (MacroRegion::Pacifica, (-79.0, 1.0), (-77.0, 8.0)),
        (MacroRegion::Orinoquia, (-72.0, 2.0), (-67.0, 7.0)),
        (MacroRegion::Amazonia, (-75.0, -4.5), (-67.0, 2.0)),
    ];
    FeatureCollection::new(
        boxes
            .iter()
            .map(|(region, (w, s), (e, n))| {
                Feature::new(Geometry::polygon(vec![
                    LngLat::new(*w, *s),
                    LngLat::new(*e, *s),
                    LngLat::new(*e, *n),
                    LngLat::new(*w, *n),
                ]))
                .with_property(constants::REGION_ID_PROPERTY, region.key())
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShownStep {
    pub position: StepPosition,
    pub title: String,
    pub is_last_step: bool,
    /// Tour marker codes on the map when the step was shown
    pub markers: Vec<String>,
}

/// Records every overlay and optionally answers each one with `next`
#[derive(Clone, Default)]
pub struct ScriptedPresenter {
    pub shown: Arc<Mutex<Vec<ShownStep>>>,
    pub dismissed: Arc<Mutex<Vec<PresentationHandle>>>,
    handle: Arc<Mutex<Option<TourHandle>>>,
    renderer: Option<HeadlessRenderer>,
    next_handle: Arc<AtomicU64>,
}

impl ScriptedPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the tour markers drawn by `renderer` at each step
    pub fn observing(renderer: &HeadlessRenderer) -> Self {
        Self {
            renderer: Some(renderer.clone()),
            ..Self::default()
        }
    }

    /// Sends `next` through `handle` as soon as each step is shown
    pub fn advance_with(&self, handle: TourHandle) {
        *self.handle.lock().unwrap() = Some(handle);
    }

    pub fn shown(&self) -> Vec<ShownStep> {
        self.shown.lock().unwrap().clone()
    }

    pub fn dismissed_count(&self) -> usize {
        self.dismissed.lock().unwrap().len()
    }
}

impl Presenter for ScriptedPresenter {
    fn show(&self, step: &TourStep, position: StepPosition) -> PresentationHandle {
        let markers = self
            .renderer
            .as_ref()
            .and_then(|r| r.source_data(constants::TOUR_MARKER_SOURCE))
            .map(|data| {
                data.features
                    .iter()
                    .filter_map(|f| f.property_str("code").map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        self.shown.lock().unwrap().push(ShownStep {
            position,
            title: step.title.clone(),
            is_last_step: step.is_last_step,
            markers,
        });
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.next();
        }
        PresentationHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn dismiss(&self, handle: PresentationHandle) {
        self.dismissed.lock().unwrap().push(handle);
    }
}

/// Polls `condition` every millisecond, failing after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
