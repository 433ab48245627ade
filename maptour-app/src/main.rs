use anyhow::Context;
use maptour::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prints each step to the terminal
#[derive(Default)]
struct ConsolePresenter {
    next_handle: AtomicU64,
}

impl Presenter for ConsolePresenter {
    fn show(&self, step: &TourStep, position: StepPosition) -> PresentationHandle {
        println!(
            "\n[{}/{}] {}{}",
            position.number(),
            position.total,
            step.title,
            if step.is_last_step { " (last)" } else { "" }
        );
        if !step.message.is_empty() {
            println!("    {}", step.message);
        }
        PresentationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn dismiss(&self, _handle: PresentationHandle) {}
}

fn sample_locations() -> Vec<MemoryLocation> {
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
            "Tumaco",
            LngLat::new(-78.8156, 1.7986),
            MemoryCategory::Mural,
            MacroRegion::Pacifica,
        )
        .with_department("Nariño"),
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
            "San Andrés",
            LngLat::new(-81.7006, 12.5847),
            MemoryCategory::Other,
            MacroRegion::Insular,
        )
        .with_department("San Andrés"),
    ]
}

fn region_polygons() -> FeatureCollection {
    let boxes = [
        (MacroRegion::Caribe, [-76.5, 8.0, -71.0, 12.5]),
        (MacroRegion::Andina, [-77.0, 1.0, -72.0, 8.0]),
        (MacroRegion::Pacifica, [-79.0, 1.0, -77.0, 8.0]),
        (MacroRegion::Orinoquia, [-72.0, 2.0, -67.0, 7.0]),
        (MacroRegion::Amazonia, [-75.0, -4.5, -67.0, 2.0]),
        (MacroRegion::Insular, [-82.0, 12.0, -81.0, 13.5]),
    ];
    FeatureCollection::new(
        boxes
            .iter()
            .map(|(region, [w, s, e, n])| {
                Feature::new(Geometry::polygon(vec![
                    LngLat::new(*w, *s),
                    LngLat::new(*e, *s),
                    LngLat::new(*e, *n),
                    LngLat::new(*w, *n),
                ]))
                .with_property(maptour::constants::REGION_ID_PROPERTY, region.key())
            })
            .collect(),
    )
}

/// `maptour-app [locations.json] [config.json]`
fn load_inputs() -> anyhow::Result<(Vec<MemoryLocation>, EngineConfig)> {
    let mut args = std::env::args().skip(1);
    let locations = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading locations from {}", path))?;
            MemoryLocation::list_from_json(&json).with_context(|| format!("parsing {}", path))?
        }
        None => sample_locations(),
    };
    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config from {}", path))?;
            EngineConfig::from_json_str(&json).with_context(|| format!("parsing {}", path))?
        }
        None => {
            let mut config = EngineProfile::Kiosk.resolve();
            config.tour.default_auto_advance_ms = Some(1_500);
            config.tour.themed_auto_advance_ms = Some(1_000);
            config
        }
    };
    Ok((locations, config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let (locations, config) = load_inputs()?;

    let renderer = HeadlessRenderer::new();
    let session = MapSession::new(renderer.clone());
    let pump = renderer.spawn_pump(&session);

    let highlight = RegionHighlightController::new(config.highlight.clone())?;
    highlight.install(&session, region_polygons())?;

    let clusters = MarkerClusterManager::new(config.cluster.clone(), config.camera.clone())?;
    clusters.initialize(&session, locations.clone(), |location| {
        println!("selected: {} ({})", location.title, location.region);
    })?;
    println!(
        "{} of {} locations clustered; {} entries drawn at z5",
        clusters.len(),
        locations.len(),
        clusters.clusters_at(5.0).len()
    );

    let sequencer = TourSequencer::new(&config, ConsolePresenter::default())?;
    let handle = sequencer.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, skipping tour");
            handle.skip();
        }
    });

    let hooks = TourHooks::new()
        .on_completed(|| println!("\ntour completed"))
        .on_skipped(|| println!("\ntour skipped"));

    let tour = default_tour(&locations)?;
    let outcome = sequencer.start(&session, tour, hooks.clone()).await;
    log::info!("default tour: {:?}", outcome);

    let theme = ThemedTour {
        name: "pacifico".to_string(),
        title: "Voices of the Pacific".to_string(),
        intro: "Three places where memory travels by river and sea.".to_string(),
        outro: "The Pacific keeps its own memory.".to_string(),
        locations: vec!["loc-004".into(), "loc-006".into(), "loc-001".into()],
    };
    let plan = themed_tour(&theme, &locations, &config.tour);
    let outcome = sequencer.start(&session, plan, hooks).await;
    log::info!("themed tour: {:?}", outcome);

    let camera = renderer.camera_state();
    println!(
        "camera at ({:.3}, {:.3}) z{:.1}",
        camera.center.lng, camera.center.lat, camera.zoom
    );

    session.tear_down();
    pump.await.context("event pump task")?;
    Ok(())
}
