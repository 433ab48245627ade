mod common;

use common::*;
use futures::poll;
use maptour::constants;
use maptour::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::Poll;

struct Fixture {
    renderer: HeadlessRenderer,
    session: MapSession,
    presenter: ScriptedPresenter,
    sequencer: TourSequencer,
}

fn fixture(auto_settle: bool) -> Fixture {
    init_logging();
    let renderer = HeadlessRenderer::new();
    renderer.set_auto_settle(auto_settle);
    let session = MapSession::new(renderer.clone());
    let config = EngineConfig::default();
    RegionHighlightController::new(config.highlight.clone())
        .unwrap()
        .install(&session, region_polygons())
        .unwrap();
    let presenter = ScriptedPresenter::observing(&renderer);
    let sequencer = TourSequencer::new(&config, presenter.clone()).unwrap();
    Fixture {
        renderer,
        session,
        presenter,
        sequencer,
    }
}

fn assert_clean(fixture: &Fixture) {
    let residual = fixture
        .renderer
        .source_data(constants::TOUR_MARKER_SOURCE)
        .map_or(0, |data| data.len());
    assert_eq!(residual, 0, "tour markers left on the map");
    assert!(fixture.sequencer.markers().is_empty());
    assert!(fixture.renderer.source_data(constants::AOI_SOURCE).is_none());
    assert!(fixture.renderer.layer(constants::AOI_FILL_LAYER).is_none());
    assert!(fixture.session.highlight_state().is_default());
    assert!(fixture.renderer.layer_filter(constants::REGION_FILL_LAYER).is_none());
    let default_opacity = HighlightConfig::default()
        .default_opacity_ramp()
        .unwrap()
        .to_expression();
    assert_eq!(
        fixture
            .renderer
            .paint_value(constants::REGION_FILL_LAYER, "fill-opacity"),
        Some(default_opacity)
    );
}

/// Drives a manual-settle tour until it reaches `(target, phase)`, then skips
async fn skip_at(target: usize, phase: StepPhase) -> (Fixture, TourOutcome) {
    let fixture = fixture(false);
    let plan = default_tour(&sample_locations()).unwrap();
    let skipped = Arc::new(AtomicUsize::new(0));
    let hooks = {
        let skipped = skipped.clone();
        TourHooks::new()
            .on_skipped(move || {
                skipped.fetch_add(1, Ordering::SeqCst);
            })
            .on_completed(|| panic!("skipped tour must not complete"))
    };
    let handle = fixture.sequencer.handle();
    let tour = {
        let (sequencer, session) = (fixture.sequencer.clone(), fixture.session.clone());
        tokio::spawn(async move { sequencer.start(&session, plan, hooks).await })
    };

    let state = fixture.sequencer.subscribe();
    let mut advanced_through = None;
    loop {
        let current = state.borrow().clone();
        match current {
            TourState::Running { step, phase: current_phase, .. }
                if step == target && current_phase == phase =>
            {
                let ready = match phase {
                    StepPhase::Moving => fixture.renderer.active_transition().is_some(),
                    StepPhase::Presenting => true,
                };
                if ready {
                    handle.skip();
                    break;
                }
            }
            TourState::Running { phase: StepPhase::Moving, .. } => {
                fixture.renderer.settle();
                fixture.renderer.pump(&fixture.session);
            }
            TourState::Running { step, phase: StepPhase::Presenting, .. } => {
                if advanced_through != Some(step) {
                    advanced_through = Some(step);
                    handle.next();
                }
            }
            other => panic!("tour ended early: {:?}", other),
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let outcome = tokio::time::timeout(Duration::from_secs(2), tour)
        .await
        .expect("tour did not stop after skip")
        .unwrap();
    assert_eq!(skipped.load(Ordering::SeqCst), 1);
    (fixture, outcome)
}

#[tokio::test]
async fn test_skip_is_safe_from_every_step_and_phase() {
    println!("🧪 [TEST] Skip from every (step, phase)");
    let steps = default_tour(&sample_locations()).unwrap().len();
    for step in 0..steps {
        for phase in [StepPhase::Moving, StepPhase::Presenting] {
            let (fixture, outcome) = skip_at(step, phase).await;
            assert_eq!(outcome, TourOutcome::Cancelled(CancelReason::Skipped));
            assert_eq!(
                fixture.sequencer.state(),
                TourState::Cancelled(CancelReason::Skipped)
            );
            assert_clean(&fixture);
            assert_eq!(
                fixture.presenter.shown().len(),
                fixture.presenter.dismissed_count(),
                "overlay left open at step {} {:?}",
                step,
                phase
            );
        }
    }
    println!("✅ [TEST] Skip safety test passed");
}

#[tokio::test]
async fn test_default_tour_reveals_monotonically() {
    println!("🧪 [TEST] Default tour reveal is monotonic");
    let fixture = fixture(true);
    let pump = fixture.renderer.spawn_pump(&fixture.session);
    fixture.presenter.advance_with(fixture.sequencer.handle());

    let plan = default_tour(&sample_locations()).unwrap();
    let total = plan.len();
    let outcome = fixture
        .sequencer
        .start(&fixture.session, plan, TourHooks::new())
        .await;
    assert_eq!(outcome, TourOutcome::Completed);

    let shown = fixture.presenter.shown();
    assert_eq!(shown.len(), total);
    for pair in shown.windows(2) {
        let (before, now) = (&pair[0].markers, &pair[1].markers);
        assert!(
            before.iter().all(|code| now.contains(code)),
            "step {} dropped markers: {:?} -> {:?}",
            pair[1].position.number(),
            before,
            now
        );
    }
    assert!(shown.last().unwrap().markers.len() >= 5);
    assert_clean(&fixture);

    fixture.session.tear_down();
    let _ = pump.await;
    println!("✅ [TEST] Monotonic reveal test passed");
}

#[tokio::test]
async fn test_teardown_aborts_pending_move_within_one_poll() {
    println!("🧪 [TEST] Teardown resolves a pending move at once");
    init_logging();
    let renderer = HeadlessRenderer::new();
    renderer.set_auto_settle(false);
    let session = MapSession::new(renderer.clone());
    let controller = CameraMotionController::new(CameraConfig::default());

    let motion = controller.move_to(&session, CameraPose::new(LngLat::new(-74.0, 4.6), 8.0));
    tokio::pin!(motion);
    assert!(poll!(&mut motion).is_pending());
    assert!(renderer.active_transition().is_some());

    session.tear_down();
    assert_eq!(
        poll!(&mut motion),
        Poll::Ready(MotionOutcome::Aborted(AbortReason::SessionTornDown))
    );
    println!("✅ [TEST] Abort propagation test passed");
}

#[tokio::test]
async fn test_teardown_mid_tour_cancels() {
    println!("🧪 [TEST] Teardown while a tour is moving");
    let fixture = fixture(false);
    let plan = default_tour(&sample_locations()).unwrap();
    let tour = {
        let (sequencer, session) = (fixture.sequencer.clone(), fixture.session.clone());
        tokio::spawn(async move { sequencer.start(&session, plan, TourHooks::new()).await })
    };
    wait_until(|| fixture.renderer.active_transition().is_some()).await;

    fixture.session.tear_down();
    let outcome = tokio::time::timeout(Duration::from_millis(200), tour)
        .await
        .expect("tour hung after teardown")
        .unwrap();
    assert_eq!(outcome, TourOutcome::Cancelled(CancelReason::SessionTornDown));
    assert!(fixture.sequencer.markers().is_empty());
    println!("✅ [TEST] Teardown cancel test passed");
}

#[tokio::test]
async fn test_themed_tour_of_three_locations() {
    println!("🧪 [TEST] Themed tour with three locations");
    let fixture = fixture(true);
    let pump = fixture.renderer.spawn_pump(&fixture.session);
    fixture.presenter.advance_with(fixture.sequencer.handle());

    let theme = ThemedTour::new(
        "caribe-y-pacifico",
        vec!["loc-004".into(), "loc-005".into(), "loc-006".into()],
    );
    let plan = themed_tour(&theme, &sample_locations(), &TourConfig::default());
    assert_eq!(plan.len(), 5);

    let completed = Arc::new(AtomicUsize::new(0));
    let hooks = {
        let completed = completed.clone();
        TourHooks::new().on_completed(move || {
            completed.fetch_add(1, Ordering::SeqCst);
        })
    };
    let outcome = fixture.sequencer.start(&fixture.session, plan, hooks).await;
    assert_eq!(outcome, TourOutcome::Completed);
    assert_eq!(completed.load(Ordering::SeqCst), 1);

    let shown = fixture.presenter.shown();
    assert_eq!(shown.len(), 5);
    let last_flags: Vec<bool> = shown.iter().map(|s| s.is_last_step).collect();
    assert_eq!(last_flags, vec![false, false, false, false, true]);
    let marker_counts: Vec<usize> = shown.iter().map(|s| s.markers.len()).collect();
    assert_eq!(marker_counts, vec![0, 1, 2, 3, 3]);

    // a finished sequencer is inert until started again
    assert_eq!(fixture.sequencer.state(), TourState::Completed);
    assert_clean(&fixture);
    fixture.session.tear_down();
    let _ = pump.await;
    println!("✅ [TEST] Themed tour test passed");
}

#[tokio::test]
async fn test_pause_holds_auto_advance() {
    println!("🧪 [TEST] Pause and resume");
    let fixture = fixture(true);
    let pump = fixture.renderer.spawn_pump(&fixture.session);

    let mut config = TourConfig::default();
    config.themed_auto_advance_ms = Some(30);
    config.themed_step_duration_ms = 0;
    let theme = ThemedTour::new("short", vec!["loc-001".into()]);
    let plan = themed_tour(&theme, &sample_locations(), &config);

    let handle = fixture.sequencer.handle();
    let tour = {
        let (sequencer, session) = (fixture.sequencer.clone(), fixture.session.clone());
        tokio::spawn(async move { sequencer.start(&session, plan, TourHooks::new()).await })
    };
    wait_until(|| {
        matches!(
            fixture.sequencer.state(),
            TourState::Running { phase: StepPhase::Presenting, .. }
        )
    })
    .await;
    handle.pause();
    wait_until(|| {
        matches!(
            fixture.sequencer.state(),
            TourState::Running { paused: true, .. }
        )
    })
    .await;
    let paused_at = fixture.presenter.shown().len();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(fixture.presenter.shown().len(), paused_at, "advanced while paused");

    handle.resume();
    let outcome = tokio::time::timeout(Duration::from_secs(2), tour)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, TourOutcome::Completed);
    assert_eq!(fixture.presenter.shown().len(), 3);
    fixture.session.tear_down();
    let _ = pump.await;
    println!("✅ [TEST] Pause test passed");
}

#[tokio::test]
async fn test_second_start_is_refused_while_running() {
    println!("🧪 [TEST] Only one tour at a time");
    let fixture = fixture(false);
    let tour = {
        let (sequencer, session) = (fixture.sequencer.clone(), fixture.session.clone());
        let plan = default_tour(&sample_locations()).unwrap();
        tokio::spawn(async move { sequencer.start(&session, plan, TourHooks::new()).await })
    };
    wait_until(|| fixture.sequencer.is_running()).await;

    let second = fixture
        .sequencer
        .start(
            &fixture.session,
            default_tour(&sample_locations()).unwrap(),
            TourHooks::new(),
        )
        .await;
    assert_eq!(second, TourOutcome::NotStarted);

    fixture.sequencer.handle().cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(2), tour)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, TourOutcome::Cancelled(CancelReason::Cancelled));
    assert_clean(&fixture);
    println!("✅ [TEST] Single tour test passed");
}

#[tokio::test]
async fn test_cluster_click_while_moving_interrupts_tour() {
    println!("🧪 [TEST] Cluster click during a tour camera move");
    let fixture = fixture(false);
    let config = EngineConfig::default();
    let clusters = MarkerClusterManager::new(config.cluster, config.camera).unwrap();
    clusters
        .initialize(&fixture.session, sample_locations(), |_| {})
        .unwrap();

    let plan = default_tour(&sample_locations()).unwrap();
    let tour = {
        let (sequencer, session) = (fixture.sequencer.clone(), fixture.session.clone());
        tokio::spawn(async move { sequencer.start(&session, plan, TourHooks::new()).await })
    };
    wait_until(|| {
        matches!(
            fixture.sequencer.state(),
            TourState::Running { phase: StepPhase::Moving, .. }
        ) && fixture.renderer.active_transition().is_some()
    })
    .await;
    let tour_transition = fixture.renderer.active_transition();

    let target = LngLat::new(-75.4, 6.2);
    let properties = serde_json::json!({ "cluster": true, "point_count": 3 })
        .as_object()
        .unwrap()
        .clone();
    fixture.session.dispatch(MapEvent::Click {
        position: target,
        features: vec![RenderedFeature {
            layer: constants::CLUSTER_LAYER.to_string(),
            position: target,
            properties,
        }],
    });
    wait_until(|| fixture.renderer.active_transition() != tour_transition).await;

    let outcome = tokio::time::timeout(Duration::from_secs(2), tour)
        .await
        .expect("tour hung after its camera move was taken over")
        .unwrap();
    assert_eq!(
        outcome,
        TourOutcome::Cancelled(CancelReason::CameraInterrupted)
    );
    assert_clean(&fixture);

    // the click's move is the one that settles
    fixture.renderer.settle();
    fixture.renderer.pump(&fixture.session);
    let camera = fixture.renderer.camera_state();
    assert!((camera.center.lng - target.lng).abs() < 1e-6);
    assert!((camera.center.lat - target.lat).abs() < 1e-6);
    assert_eq!(fixture.session.pending_transition(), None);
    println!("✅ [TEST] Cluster click interruption test passed");
}
