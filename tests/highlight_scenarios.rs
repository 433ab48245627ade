mod common;

use common::*;
use maptour::constants;
use maptour::prelude::*;

fn setup() -> (HeadlessRenderer, MapSession, RegionHighlightController) {
    init_logging();
    let renderer = HeadlessRenderer::new();
    let session = MapSession::new(renderer.clone());
    let controller = RegionHighlightController::new(HighlightConfig::default()).unwrap();
    controller.install(&session, region_polygons()).unwrap();
    (renderer, session, controller)
}

fn sampled_opacity(renderer: &HeadlessRenderer) -> Vec<f64> {
    let expression = renderer
        .paint_value(constants::REGION_FILL_LAYER, "fill-opacity")
        .unwrap();
    (6..=10)
        .map(|zoom| expression.evaluate_f64(&EvalContext::at_zoom(zoom as f64)).unwrap())
        .collect()
}

#[tokio::test]
async fn test_installed_opacity_is_continuous() {
    println!("🧪 [TEST] Opacity sampled at zoom 6..=10");
    let (renderer, session, controller) = setup();
    let limit = HighlightConfig::default().max_opacity_slope;

    for region in [Some("pacifica"), None] {
        assert!(controller.focus(&session, region));
        let samples = sampled_opacity(&renderer);
        for pair in samples.windows(2) {
            assert!(pair[1] <= pair[0], "increasing: {:?}", samples);
            assert!(pair[0] - pair[1] <= limit + 1e-9, "jump: {:?}", samples);
        }
    }
    println!("✅ [TEST] Opacity continuity test passed");
}

#[tokio::test]
async fn test_focus_restricts_and_restore_releases() {
    println!("🧪 [TEST] Focus then restore");
    let (renderer, session, controller) = setup();
    let batches = renderer.batch_count();

    controller.focus(&session, Some("caribe"));
    assert_eq!(renderer.batch_count(), batches + 1);
    let visible = renderer.rendered_features(constants::REGION_FILL_LAYER, 6.0);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].property_str(constants::REGION_ID_PROPERTY), Some("caribe"));
    let focused = sampled_opacity(&renderer);

    assert!(controller.restore_default(&session));
    assert!(session.highlight_state().is_default());
    assert!(renderer.layer_filter(constants::REGION_FILL_LAYER).is_none());
    assert!(renderer.layer_filter(constants::REGION_OUTLINE_LAYER).is_none());
    assert_eq!(
        renderer.rendered_features(constants::REGION_FILL_LAYER, 6.0).len(),
        region_polygons().len()
    );
    let default = sampled_opacity(&renderer);
    assert!(default[0] < focused[0]);
    println!("✅ [TEST] Focus/restore test passed");
}

#[tokio::test]
async fn test_focus_before_install_is_applied_later() {
    println!("🧪 [TEST] Focus before the region layers exist");
    init_logging();
    let renderer = HeadlessRenderer::new();
    let session = MapSession::new(renderer.clone());
    let controller = RegionHighlightController::new(HighlightConfig::default()).unwrap();

    assert!(!controller.focus(&session, Some("andina")));
    assert_eq!(
        session.highlight_state().active_region.as_deref(),
        Some("andina")
    );

    controller.install(&session, region_polygons()).unwrap();
    let visible = renderer.rendered_features(constants::REGION_FILL_LAYER, 6.0);
    assert_eq!(visible.len(), 1);
    println!("✅ [TEST] Deferred focus test passed");
}

#[tokio::test]
async fn test_focus_when_ready_waits_for_layers() {
    println!("🧪 [TEST] Bounded retry while layers are set up");
    init_logging();
    let renderer = HeadlessRenderer::new();
    let session = MapSession::new(renderer.clone());
    let controller = RegionHighlightController::new(HighlightConfig::default()).unwrap();

    let installer = {
        let (session, controller) = (session.clone(), controller.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.install(&session, region_polygons()).unwrap();
        })
    };
    let policy = RetryPolicy::new(10, Duration::from_millis(10));
    assert!(controller.focus_when_ready(&session, Some("amazonia"), policy).await);
    installer.await.unwrap();

    let gave_up = RegionHighlightController::new(HighlightConfig::default())
        .unwrap()
        .focus_when_ready(
            &MapSession::new(HeadlessRenderer::new()),
            None,
            RetryPolicy::new(2, Duration::from_millis(1)),
        )
        .await;
    assert!(!gave_up);
    println!("✅ [TEST] Retry test passed");
}

#[tokio::test]
async fn test_area_of_interest_overlay() {
    println!("🧪 [TEST] Area of interest show and clear");
    let (renderer, session, controller) = setup();
    let area = AreaOfInterest::new("bojaya", LngLat::new(-76.8867, 6.5592), 25.0);

    controller.show_area_of_interest(&session, &area).unwrap();
    assert!(controller.has_area_of_interest(&session));
    assert!(renderer.layer(constants::AOI_FILL_LAYER).is_some());

    controller.clear_area_of_interest(&session).unwrap();
    assert!(!controller.has_area_of_interest(&session));
    assert!(renderer.layer(constants::AOI_OUTLINE_LAYER).is_none());
    controller.clear_area_of_interest(&session).unwrap();
    println!("✅ [TEST] Area of interest test passed");
}
