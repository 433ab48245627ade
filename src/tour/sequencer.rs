//! Tour state machine
//!
//! `Idle -> Running { step, phase } -> Completed | Cancelled(reason)`. Each step first
//! moves the camera (`Moving`), then shows its narrative (`Presenting`) until the visitor
//! advances, the step times out, or the tour is skipped or cancelled. Whatever ends the
//! tour, the same cleanup runs: area of interest removed, tour markers removed, default
//! region highlight restored.

use crate::camera::motion::{AbortReason, CameraMotionController, MotionOutcome};
use crate::core::{config::EngineConfig, session::MapSession};
use crate::highlight::controller::RegionHighlightController;
use crate::markers::tour_markers::TourMarkers;
use crate::runtime::{self, RetryPolicy};
use crate::tour::presenter::{Presenter, StepPosition};
use crate::tour::step::{SideEffect, TourPlan, TourStep};
use crate::{MapError, Result};
use instant::Instant;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The visitor skipped the tour
    Skipped,
    /// The host cancelled through [`TourHandle::cancel`]
    Cancelled,
    SessionTornDown,
    /// Something else took over the camera
    CameraInterrupted,
}

impl From<AbortReason> for CancelReason {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::SessionTornDown => CancelReason::SessionTornDown,
            AbortReason::Superseded => CancelReason::CameraInterrupted,
            AbortReason::Cancelled => CancelReason::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Moving,
    Presenting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourCommand {
    Next,
    Skip,
    Cancel,
    Pause,
    Resume,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TourState {
    Idle,
    Running {
        step: usize,
        phase: StepPhase,
        paused: bool,
    },
    Completed,
    Cancelled(CancelReason),
}

impl TourState {
    pub fn is_running(&self) -> bool {
        matches!(self, TourState::Running { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourOutcome {
    Completed,
    Cancelled(CancelReason),
    /// The tour was refused before its first step
    NotStarted,
}

/// Sends control commands to a running (or about to run) tour
#[derive(Debug, Clone)]
pub struct TourHandle {
    sender: mpsc::UnboundedSender<TourCommand>,
}

impl TourHandle {
    pub fn send(&self, command: TourCommand) -> bool {
        self.sender.send(command).is_ok()
    }

    pub fn next(&self) -> bool {
        self.send(TourCommand::Next)
    }

    pub fn skip(&self) -> bool {
        self.send(TourCommand::Skip)
    }

    pub fn cancel(&self) -> bool {
        self.send(TourCommand::Cancel)
    }

    pub fn pause(&self) -> bool {
        self.send(TourCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(TourCommand::Resume)
    }
}

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Host callbacks invoked when a tour hands control back
#[derive(Clone, Default)]
pub struct TourHooks {
    on_tour_completed: Option<Hook>,
    on_tour_skipped: Option<Hook>,
}

impl TourHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_completed<F: Fn() + Send + Sync + 'static>(mut self, hook: F) -> Self {
        self.on_tour_completed = Some(Arc::new(hook));
        self
    }

    pub fn on_skipped<F: Fn() + Send + Sync + 'static>(mut self, hook: F) -> Self {
        self.on_tour_skipped = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for TourHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourHooks")
            .field("on_tour_completed", &self.on_tour_completed.is_some())
            .field("on_tour_skipped", &self.on_tour_skipped.is_some())
            .finish()
    }
}

type CommandSlot = Arc<Mutex<Option<mpsc::UnboundedReceiver<TourCommand>>>>;

/// Puts the command receiver back when a run ends, even if its future is dropped
struct RunGuard {
    slot: CommandSlot,
    receiver: Option<mpsc::UnboundedReceiver<TourCommand>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            if let Ok(mut slot) = self.slot.lock() {
                *slot = Some(receiver);
            }
        }
    }
}

enum StepEnd {
    Advance,
    Stop(CancelReason),
}

#[derive(Clone)]
pub struct TourSequencer {
    motion: CameraMotionController,
    highlight: RegionHighlightController,
    markers: TourMarkers,
    presenter: Arc<dyn Presenter>,
    sender: mpsc::UnboundedSender<TourCommand>,
    commands: CommandSlot,
    state: Arc<watch::Sender<TourState>>,
    cleanup_retry: RetryPolicy,
    /// Used by steps that set no auto-advance of their own
    fallback_auto_advance: Option<Duration>,
}

impl TourSequencer {
    pub fn new(config: &EngineConfig, presenter: impl Presenter + 'static) -> Result<Self> {
        let highlight = RegionHighlightController::new(config.highlight.clone())?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(TourState::Idle);
        Ok(Self {
            motion: CameraMotionController::new(config.camera.clone()),
            cleanup_retry: highlight.retry_policy(),
            fallback_auto_advance: config.tour.default_auto_advance(),
            highlight,
            markers: TourMarkers::new(),
            presenter: Arc::new(presenter),
            sender,
            commands: Arc::new(Mutex::new(Some(receiver))),
            state: Arc::new(state),
        })
    }

    pub fn handle(&self) -> TourHandle {
        TourHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TourState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TourState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Tour-owned markers currently on the map
    pub fn markers(&self) -> &TourMarkers {
        &self.markers
    }

    pub fn highlight(&self) -> &RegionHighlightController {
        &self.highlight
    }

    fn set_state(&self, state: TourState) {
        self.state.send_replace(state);
    }

    /// Runs `plan` to the end. Never fails: refusals return [`TourOutcome::NotStarted`],
    /// every interruption ends as [`TourOutcome::Cancelled`].
    pub async fn start(
        &self,
        session: &MapSession,
        plan: TourPlan,
        hooks: TourHooks,
    ) -> TourOutcome {
        if !session.is_ready() {
            log::warn!("tour {} refused: {}", plan.name, MapError::SessionNotReady);
            return TourOutcome::NotStarted;
        }
        if plan.is_empty() {
            log::warn!("tour {} refused: no steps", plan.name);
            return TourOutcome::NotStarted;
        }
        let receiver = self.commands.lock().ok().and_then(|mut slot| slot.take());
        let Some(mut receiver) = receiver else {
            log::warn!("tour {} refused: another tour is running", plan.name);
            return TourOutcome::NotStarted;
        };
        let mut stale = 0;
        while receiver.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            log::debug!("dropped {} stale tour commands", stale);
        }
        let mut guard = RunGuard {
            slot: self.commands.clone(),
            receiver: Some(receiver),
        };

        let started = Instant::now();
        log::info!("tour {} started ({} steps)", plan.name, plan.len());
        let Some(commands) = guard.receiver.as_mut() else {
            return TourOutcome::NotStarted;
        };
        let (outcome, last_index) = self.run(session, &plan, commands).await;

        self.finish(session, &plan, last_index, outcome, &hooks).await;
        drop(guard);
        log::info!(
            "tour {} ended {:?} after {:?}",
            plan.name,
            outcome,
            started.elapsed()
        );
        outcome
    }

    async fn run(
        &self,
        session: &MapSession,
        plan: &TourPlan,
        commands: &mut mpsc::UnboundedReceiver<TourCommand>,
    ) -> (TourOutcome, usize) {
        let total = plan.len();
        let mut paused = false;

        for (index, step) in plan.steps().iter().enumerate() {
            let step_started = Instant::now();
            if let StepEnd::Stop(reason) =
                self.move_phase(session, index, step, commands, &mut paused).await
            {
                return (TourOutcome::Cancelled(reason), index);
            }

            for effect in &step.on_reach {
                self.apply_effect(session, effect);
            }
            if let Err(err) = self.markers.show(session, &plan.markers_at(index)) {
                log::warn!("tour markers for step {}: {}", index, err);
            }

            let position = StepPosition::new(index, total);
            if let StepEnd::Stop(reason) =
                self.present_phase(session, position, step, commands, &mut paused).await
            {
                return (TourOutcome::Cancelled(reason), index);
            }
            log::debug!("step {} done in {:?}", position.number(), step_started.elapsed());
        }
        (TourOutcome::Completed, total.saturating_sub(1))
    }

    async fn move_phase(
        &self,
        session: &MapSession,
        index: usize,
        step: &TourStep,
        commands: &mut mpsc::UnboundedReceiver<TourCommand>,
        paused: &mut bool,
    ) -> StepEnd {
        self.set_state(TourState::Running {
            step: index,
            phase: StepPhase::Moving,
            paused: *paused,
        });
        let motion = self.motion.move_to(session, step.motion_pose());
        tokio::pin!(motion);

        loop {
            tokio::select! {
                outcome = &mut motion => {
                    return match outcome {
                        MotionOutcome::Settled => StepEnd::Advance,
                        MotionOutcome::Aborted(reason) => {
                            log::info!("step {} camera move aborted: {:?}", index, reason);
                            StepEnd::Stop(reason.into())
                        }
                    };
                }
                command = commands.recv() => match command {
                    Some(TourCommand::Skip) => {
                        self.motion.cancel_pending(session);
                        return StepEnd::Stop(CancelReason::Skipped);
                    }
                    Some(TourCommand::Cancel) | None => {
                        self.motion.cancel_pending(session);
                        return StepEnd::Stop(CancelReason::Cancelled);
                    }
                    Some(TourCommand::Pause) => {
                        self.set_paused(index, StepPhase::Moving, paused, true)
                    }
                    Some(TourCommand::Resume) => {
                        self.set_paused(index, StepPhase::Moving, paused, false)
                    }
                    Some(TourCommand::Next) => log::debug!("next ignored while the camera moves"),
                },
            }
        }
    }

    async fn present_phase(
        &self,
        session: &MapSession,
        position: StepPosition,
        step: &TourStep,
        commands: &mut mpsc::UnboundedReceiver<TourCommand>,
        paused: &mut bool,
    ) -> StepEnd {
        let index = position.index;
        self.set_state(TourState::Running {
            step: index,
            phase: StepPhase::Presenting,
            paused: *paused,
        });
        let handle = self.presenter.show(step, position);
        let advance_after = step.auto_advance.or(self.fallback_auto_advance);

        let end = loop {
            // pause or resume restarts the step timer
            let timer = auto_advance(if *paused { None } else { advance_after });
            tokio::select! {
                _ = timer => {
                    log::debug!("step {} auto-advanced", position.number());
                    break StepEnd::Advance;
                }
                _ = session.torn_down() => break StepEnd::Stop(CancelReason::SessionTornDown),
                command = commands.recv() => match command {
                    Some(TourCommand::Next) => break StepEnd::Advance,
                    Some(TourCommand::Skip) => break StepEnd::Stop(CancelReason::Skipped),
                    Some(TourCommand::Cancel) | None => {
                        break StepEnd::Stop(CancelReason::Cancelled)
                    }
                    Some(TourCommand::Pause) => {
                        self.set_paused(index, StepPhase::Presenting, paused, true)
                    }
                    Some(TourCommand::Resume) => {
                        self.set_paused(index, StepPhase::Presenting, paused, false)
                    }
                },
            }
        };

        self.presenter.dismiss(handle);
        end
    }

    fn set_paused(&self, step: usize, phase: StepPhase, paused: &mut bool, value: bool) {
        *paused = value;
        self.set_state(TourState::Running {
            step,
            phase,
            paused: value,
        });
    }

    fn apply_effect(&self, session: &MapSession, effect: &SideEffect) {
        match effect {
            // picked up by the reveal policy
            SideEffect::RevealLocation(_) => {}
            SideEffect::ShowAreaOfInterest(area) => {
                if let Err(err) = self.highlight.show_area_of_interest(session, area) {
                    log::warn!("area of interest {}: {}", area.id, err);
                }
            }
            SideEffect::ClearAreaOfInterest => {
                if let Err(err) = self.highlight.clear_area_of_interest(session) {
                    log::warn!("clearing area of interest: {}", err);
                }
            }
            SideEffect::FocusRegion(region) => {
                self.highlight.focus(session, region.as_deref());
            }
            SideEffect::Custom(effect) => effect(session),
        }
    }

    async fn finish(
        &self,
        session: &MapSession,
        plan: &TourPlan,
        index: usize,
        outcome: TourOutcome,
        hooks: &TourHooks,
    ) {
        if session.is_torn_down() {
            self.markers.clear_local();
        } else {
            if outcome == TourOutcome::Cancelled(CancelReason::Skipped) {
                if let Some(step) = plan.step(index) {
                    for effect in &step.skip {
                        self.apply_effect(session, effect);
                    }
                }
            }
            self.clean_map(session).await;
        }

        self.set_state(match outcome {
            TourOutcome::Completed => TourState::Completed,
            TourOutcome::Cancelled(reason) => TourState::Cancelled(reason),
            TourOutcome::NotStarted => TourState::Idle,
        });

        let hook = match outcome {
            TourOutcome::Completed => hooks.on_tour_completed.as_ref(),
            TourOutcome::Cancelled(CancelReason::Skipped) => hooks.on_tour_skipped.as_ref(),
            _ => None,
        };
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Removes everything a tour may have put on the map. Structural removals retry while
    /// another structural mutation holds the lock.
    async fn clean_map(&self, session: &MapSession) {
        let area = runtime::retry_fixed(self.cleanup_retry, |_| {
            match self.highlight.clear_area_of_interest(session) {
                Err(MapError::StructuralMutationInFlight) => None,
                other => Some(other),
            }
        })
        .await;
        match area {
            Some(Ok(())) => {}
            Some(Err(err)) => log::warn!("tour cleanup: area of interest: {}", err),
            None => log::warn!("tour cleanup: area of interest still shown, map busy"),
        }

        if let Err(err) = self.markers.clear(session) {
            log::warn!("tour cleanup: markers: {}", err);
        }
        self.highlight.restore_default(session);
    }
}

async fn auto_advance(after: Option<Duration>) {
    match after {
        Some(delay) => runtime::async_delay(delay).await,
        None => std::future::pending::<()>().await,
    }
}
