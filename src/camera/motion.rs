//! Awaitable camera transitions
//!
//! [`CameraMotionController::move_to`] issues a renderer transition and resolves once the
//! renderer reports that exactly that transition settled. Each call gets a fresh waiter.
//! A newer call on the same session (from any controller), an explicit cancel or session
//! teardown resolves the older waiter with [`MotionOutcome::Aborted`].

use crate::camera::pose::CameraPose;
use crate::core::{
    config::CameraConfig,
    session::{CameraWaiter, ListenerControl, ListenerId, MapSession},
};
use crate::render::events::{EventKind, MapEvent, TransitionId};
use futures::channel::oneshot;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    SessionTornDown,
    /// A newer `move_to` took over the camera
    Superseded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    Settled,
    Aborted(AbortReason),
}

impl MotionOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, MotionOutcome::Settled)
    }
}

static NEXT_CONTROLLER: AtomicU64 = AtomicU64::new(1);

/// Awaitable camera moves against a [`MapSession`].
///
/// The pending waiter and transition ids live on the session, so a move from any
/// controller supersedes whatever move is pending on that session. Clones share one
/// identity; `cancel_pending` only ever cancels a move this controller issued.
#[derive(Clone)]
pub struct CameraMotionController {
    config: CameraConfig,
    id: u64,
}

impl CameraMotionController {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            id: NEXT_CONTROLLER.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Whether the transition pending on `session` was issued through this controller
    pub fn is_moving(&self, session: &MapSession) -> bool {
        session.pending_transition_owner() == Some(self.id)
    }

    /// Moves the camera to `pose` and resolves once the renderer has settled there.
    pub async fn move_to(&self, session: &MapSession, pose: CameraPose) -> MotionOutcome {
        if session.is_torn_down() {
            return MotionOutcome::Aborted(AbortReason::SessionTornDown);
        }

        let mut pose = pose;
        let (renderer_min, renderer_max) = session
            .with_renderer(|r| r.zoom_range())
            .unwrap_or((self.config.min_zoom, self.config.max_zoom));
        let (min, max) = (
            renderer_min.max(self.config.min_zoom),
            renderer_max.min(self.config.max_zoom),
        );
        let requested = pose.zoom;
        if pose.clamp_zoom(min, max) {
            log::warn!(
                "camera zoom {} outside [{}, {}], clamped to {}",
                requested,
                min,
                max,
                pose.zoom
            );
        }

        if let Some(previous) = session.take_camera_waiter(|_| true) {
            resolve(session, previous, MotionOutcome::Aborted(AbortReason::Superseded));
        }

        if pose.is_jump() {
            return match session.with_renderer(|r| r.jump_camera(&pose)) {
                Ok(()) => MotionOutcome::Settled,
                Err(_) => MotionOutcome::Aborted(AbortReason::SessionTornDown),
            };
        }

        let transition = session.allocate_transition();
        let (sender, receiver) = oneshot::channel();
        let listener = settle_listener(session, transition);
        let displaced = session.replace_camera_waiter(CameraWaiter {
            transition,
            owner: self.id,
            listener,
            sender,
        });
        // another move may have raced in between
        if let Some(previous) = displaced {
            resolve(session, previous, MotionOutcome::Aborted(AbortReason::Superseded));
        }
        log::debug!(
            "camera transition {:?} to ({:.4}, {:.4}) z{:.2} over {:?}",
            transition,
            pose.center.lng,
            pose.center.lat,
            pose.zoom,
            pose.duration
        );

        if session
            .with_renderer(|r| r.move_camera(&pose, transition))
            .is_err()
        {
            if let Some(waiter) = session.take_camera_waiter(|w| w.transition == transition) {
                resolve(session, waiter, MotionOutcome::Aborted(AbortReason::SessionTornDown));
            }
        }

        receiver
            .await
            .unwrap_or(MotionOutcome::Aborted(AbortReason::SessionTornDown))
    }

    /// Resolves this controller's in-flight waiter with `Cancelled` and stops the camera
    pub fn cancel_pending(&self, session: &MapSession) {
        if let Some(waiter) = session.take_camera_waiter(|waiter| waiter.owner == self.id) {
            resolve(session, waiter, MotionOutcome::Aborted(AbortReason::Cancelled));
            let _ = session.with_renderer(|r| r.stop_camera());
        }
    }
}

fn resolve(session: &MapSession, waiter: CameraWaiter, outcome: MotionOutcome) {
    log::debug!("camera transition {:?} {:?}", waiter.transition, outcome);
    session.off(waiter.listener);
    let _ = waiter.sender.send(outcome);
}

fn settle_listener(session: &MapSession, transition: TransitionId) -> ListenerId {
    let weak = session.downgrade();
    session.on(&[EventKind::MoveEnd, EventKind::TornDown], move |event| {
        let outcome = match event {
            MapEvent::MoveEnd {
                transition: Some(id),
                ..
            } if *id == transition => MotionOutcome::Settled,
            MapEvent::TornDown => MotionOutcome::Aborted(AbortReason::SessionTornDown),
            _ => return ListenerControl::Keep,
        };
        let waiter = weak
            .upgrade()
            .and_then(|session| session.take_camera_waiter(|w| w.transition == transition));
        if let Some(waiter) = waiter {
            let _ = waiter.sender.send(outcome);
        }
        ListenerControl::Remove
    })
}

impl Default for CameraMotionController {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LngLat;
    use crate::render::headless::HeadlessRenderer;
    use std::time::Duration;

    fn pose(zoom: f64) -> CameraPose {
        CameraPose::new(LngLat::new(-74.07, 4.71), zoom).with_duration(Duration::from_millis(800))
    }

    fn manual_session() -> (HeadlessRenderer, MapSession) {
        let renderer = HeadlessRenderer::new();
        renderer.set_auto_settle(false);
        let session = MapSession::new(renderer.clone());
        (renderer, session)
    }

    #[tokio::test]
    async fn test_settles_on_matching_move_end() {
        let (renderer, session) = manual_session();
        let controller = CameraMotionController::default();

        let motion = {
            let (controller, session) = (controller.clone(), session.clone());
            tokio::spawn(async move { controller.move_to(&session, pose(8.0)).await })
        };
        tokio::task::yield_now().await;
        assert!(controller.is_moving(&session));

        // unrelated move end is ignored
        session.dispatch(MapEvent::MoveEnd {
            transition: None,
            camera: renderer.camera_state(),
        });
        assert!(controller.is_moving(&session));

        renderer.settle();
        renderer.pump(&session);
        assert_eq!(motion.await.unwrap(), MotionOutcome::Settled);
        assert_eq!(renderer.camera_state().zoom, 8.0);
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_jump_settles_without_event() {
        let (renderer, session) = manual_session();
        let controller = CameraMotionController::default();
        let outcome = controller
            .move_to(&session, pose(6.0).with_duration(Duration::ZERO))
            .await;
        assert_eq!(outcome, MotionOutcome::Settled);
        assert_eq!(renderer.camera_state().zoom, 6.0);
    }

    #[tokio::test]
    async fn test_zoom_is_clamped() {
        let (renderer, session) = manual_session();
        renderer.set_zoom_range(0.0, 18.0);
        let controller = CameraMotionController::default();

        let motion = {
            let (controller, session) = (controller.clone(), session.clone());
            tokio::spawn(async move { controller.move_to(&session, pose(25.0)).await })
        };
        tokio::task::yield_now().await;
        renderer.settle();
        renderer.pump(&session);
        assert_eq!(motion.await.unwrap(), MotionOutcome::Settled);
        assert_eq!(renderer.camera_state().zoom, 18.0);
    }

    #[tokio::test]
    async fn test_new_move_supersedes_pending() {
        let (renderer, session) = manual_session();
        let controller = CameraMotionController::default();

        let first = {
            let (controller, session) = (controller.clone(), session.clone());
            tokio::spawn(async move { controller.move_to(&session, pose(7.0)).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let (controller, session) = (controller.clone(), session.clone());
            tokio::spawn(async move { controller.move_to(&session, pose(9.0)).await })
        };

        assert_eq!(
            first.await.unwrap(),
            MotionOutcome::Aborted(AbortReason::Superseded)
        );
        tokio::task::yield_now().await;
        renderer.settle();
        renderer.pump(&session);
        assert_eq!(second.await.unwrap(), MotionOutcome::Settled);
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_move_from_another_controller_supersedes() {
        let (renderer, session) = manual_session();
        let tour = CameraMotionController::default();
        let clicks = CameraMotionController::default();

        let first = {
            let (tour, session) = (tour.clone(), session.clone());
            tokio::spawn(async move { tour.move_to(&session, pose(8.0)).await })
        };
        tokio::task::yield_now().await;
        let first_transition = renderer.active_transition().unwrap();
        assert!(tour.is_moving(&session));

        let second = {
            let (clicks, session) = (clicks.clone(), session.clone());
            tokio::spawn(async move { clicks.move_to(&session, pose(3.0)).await })
        };
        assert_eq!(
            first.await.unwrap(),
            MotionOutcome::Aborted(AbortReason::Superseded)
        );
        tokio::task::yield_now().await;
        let second_transition = renderer.active_transition().unwrap();
        assert_ne!(first_transition, second_transition);
        assert!(clicks.is_moving(&session));
        assert!(!tour.is_moving(&session));

        // cancelling from the superseded controller leaves the newer move alone
        tour.cancel_pending(&session);
        assert_eq!(renderer.active_transition(), Some(second_transition));

        renderer.settle();
        renderer.pump(&session);
        assert_eq!(second.await.unwrap(), MotionOutcome::Settled);
        assert_eq!(renderer.camera_state().zoom, 3.0);
        assert_eq!(session.pending_transition(), None);
        assert_eq!(session.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_aborts_pending_move() {
        let (_renderer, session) = manual_session();
        let controller = CameraMotionController::default();

        let motion = {
            let (controller, session) = (controller.clone(), session.clone());
            tokio::spawn(async move { controller.move_to(&session, pose(8.0)).await })
        };
        tokio::task::yield_now().await;
        session.tear_down();

        let outcome = tokio::time::timeout(Duration::from_millis(50), motion)
            .await
            .expect("waiter must not hang")
            .unwrap();
        assert_eq!(outcome, MotionOutcome::Aborted(AbortReason::SessionTornDown));
    }

    #[tokio::test]
    async fn test_move_on_torn_down_session_aborts() {
        let session = MapSession::new(HeadlessRenderer::new());
        session.tear_down();
        let outcome = CameraMotionController::default()
            .move_to(&session, pose(8.0))
            .await;
        assert_eq!(outcome, MotionOutcome::Aborted(AbortReason::SessionTornDown));
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let (renderer, session) = manual_session();
        let controller = CameraMotionController::default();
        let motion = {
            let (controller, session) = (controller.clone(), session.clone());
            tokio::spawn(async move { controller.move_to(&session, pose(8.0)).await })
        };
        tokio::task::yield_now().await;
        controller.cancel_pending(&session);
        assert_eq!(
            motion.await.unwrap(),
            MotionOutcome::Aborted(AbortReason::Cancelled)
        );
        assert_eq!(renderer.active_transition(), None);
    }
}
