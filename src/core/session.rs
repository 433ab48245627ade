//! The shared map session
//!
//! A [`MapSession`] owns the single renderer handle for one map instance together with its
//! lifecycle flags: readiness, teardown, and the structural-mutation lock that keeps style
//! swaps and source/layer additions from interleaving. It is also the event hub renderer
//! events are dispatched through.

use crate::camera::motion::{AbortReason, MotionOutcome};
use crate::highlight::controller::RegionHighlightState;
use crate::render::{
    events::{EventKind, MapEvent, TransitionId},
    CameraState, MapRenderer,
};
use crate::{MapError, Result};
use futures::channel::oneshot;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// What a listener wants after handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    Keep,
    Remove,
}

type Handler = Arc<dyn Fn(&MapEvent) -> ListenerControl + Send + Sync>;

struct Listener {
    id: ListenerId,
    kinds: Vec<EventKind>,
    handler: Handler,
}

/// The waiter of the one camera transition a session can have in flight
pub(crate) struct CameraWaiter {
    pub transition: TransitionId,
    /// Controller that issued the transition
    pub owner: u64,
    pub listener: ListenerId,
    pub sender: oneshot::Sender<MotionOutcome>,
}

struct SessionInner {
    id: u64,
    renderer: Mutex<Box<dyn MapRenderer>>,
    ready: AtomicBool,
    torn_down: AtomicBool,
    structural_mutation_in_flight: AtomicBool,
    current_style: Mutex<Option<String>>,
    listeners: Mutex<Vec<Listener>>,
    next_listener: AtomicU64,
    highlight: Mutex<RegionHighlightState>,
    camera_waiter: Mutex<Option<CameraWaiter>>,
    next_transition: AtomicU64,
    teardown: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct MapSession {
    inner: Arc<SessionInner>,
}

/// Non-owning session handle for long-lived event handlers
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

impl WeakSession {
    pub fn upgrade(&self) -> Option<MapSession> {
        self.inner.upgrade().map(|inner| MapSession { inner })
    }
}

/// Held while a structural mutation is in flight; releases the lock on drop
pub struct StructuralGuard {
    session: MapSession,
}

impl Drop for StructuralGuard {
    fn drop(&mut self) {
        self.session
            .inner
            .structural_mutation_in_flight
            .store(false, Ordering::SeqCst);
    }
}

impl MapSession {
    pub fn new(renderer: impl MapRenderer + 'static) -> Self {
        let ready = renderer.is_ready();
        let (teardown, _) = watch::channel(false);
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        log::info!("map session {} created (ready: {})", id, ready);
        Self {
            inner: Arc::new(SessionInner {
                id,
                renderer: Mutex::new(Box::new(renderer)),
                ready: AtomicBool::new(ready),
                torn_down: AtomicBool::new(false),
                structural_mutation_in_flight: AtomicBool::new(false),
                current_style: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                highlight: Mutex::new(RegionHighlightState::default()),
                camera_waiter: Mutex::new(None),
                next_transition: AtomicU64::new(1),
                teardown,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
            && !self.is_torn_down()
            && self.with_renderer(|r| r.is_ready()).unwrap_or(false)
    }

    pub fn mark_ready(&self) {
        self.inner.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// Runs `f` against the renderer. Fails once the session is torn down.
    pub fn with_renderer<R>(&self, f: impl FnOnce(&mut dyn MapRenderer) -> R) -> Result<R> {
        if self.is_torn_down() {
            return Err(MapError::SessionTornDown);
        }
        let mut renderer = self
            .inner
            .renderer
            .lock()
            .map_err(|_| MapError::Renderer("renderer lock poisoned".to_string()))?;
        if renderer.is_torn_down() {
            return Err(MapError::SessionTornDown);
        }
        Ok(f(renderer.as_mut()))
    }

    pub fn camera(&self) -> Option<CameraState> {
        self.with_renderer(|r| r.camera()).ok()
    }

    /// Subscribes `handler` to the given event kinds
    pub fn on<F>(&self, kinds: &[EventKind], handler: F) -> ListenerId
    where
        F: Fn(&MapEvent) -> ListenerControl + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push(Listener {
                id,
                kinds: kinds.to_vec(),
                handler: Arc::new(handler),
            });
        }
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        match self.inner.listeners.lock() {
            Ok(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|listener| listener.id != id);
                listeners.len() != before
            }
            Err(_) => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Delivers a renderer event to every subscribed listener
    pub fn dispatch(&self, event: MapEvent) {
        if self.is_torn_down() && event.kind() != EventKind::TornDown {
            log::debug!("session {}: dropping {:?} after teardown", self.id(), event.kind());
            return;
        }
        if let MapEvent::StyleLoaded { style } = &event {
            self.inner.ready.store(true, Ordering::SeqCst);
            if let Ok(mut current) = self.inner.current_style.lock() {
                *current = Some(style.clone());
            }
        }

        let kind = event.kind();
        let handlers: Vec<(ListenerId, Handler)> = match self.inner.listeners.lock() {
            Ok(listeners) => listeners
                .iter()
                .filter(|listener| listener.kinds.contains(&kind))
                .map(|listener| (listener.id, listener.handler.clone()))
                .collect(),
            Err(_) => return,
        };

        let finished: Vec<ListenerId> = handlers
            .into_iter()
            .filter_map(|(id, handler)| match handler(&event) {
                ListenerControl::Remove => Some(id),
                ListenerControl::Keep => None,
            })
            .collect();

        if !finished.is_empty() {
            if let Ok(mut listeners) = self.inner.listeners.lock() {
                listeners.retain(|listener| !finished.contains(&listener.id));
            }
        }
    }

    /// Destroys the session. Every listener sees [`MapEvent::TornDown`] once, then all
    /// listeners are dropped.
    pub fn tear_down(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("map session {} torn down", self.id());
        self.inner.ready.store(false, Ordering::SeqCst);
        if let Ok(mut renderer) = self.inner.renderer.lock() {
            renderer.destroy();
        }
        self.dispatch(MapEvent::TornDown);
        if let Some(waiter) = self.take_camera_waiter(|_| true) {
            let _ = waiter
                .sender
                .send(MotionOutcome::Aborted(AbortReason::SessionTornDown));
        }
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.clear();
        }
        self.inner.teardown.send_replace(true);
    }

    /// Resolves once the session has been torn down
    pub async fn torn_down(&self) {
        let mut receiver = self.inner.teardown.subscribe();
        let _ = receiver.wait_for(|torn_down| *torn_down).await;
    }

    /// Takes the structural-mutation lock, rejecting if a mutation is already in flight
    pub fn begin_structural_mutation(&self) -> Result<StructuralGuard> {
        if self.is_torn_down() {
            return Err(MapError::SessionTornDown);
        }
        self.inner
            .structural_mutation_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| MapError::StructuralMutationInFlight)?;
        Ok(StructuralGuard {
            session: self.clone(),
        })
    }

    pub fn is_structural_mutation_in_flight(&self) -> bool {
        self.inner
            .structural_mutation_in_flight
            .load(Ordering::SeqCst)
    }

    pub fn current_style(&self) -> Option<String> {
        self.inner.current_style.lock().ok().and_then(|s| s.clone())
    }

    /// Swaps the base style, holding the structural lock until the new style has loaded.
    ///
    /// Sources and layers do not survive a swap; components re-run their setup afterwards.
    pub async fn change_style(&self, style: &str) -> Result<()> {
        let _guard = self.begin_structural_mutation()?;
        let (sender, receiver) = oneshot::channel::<Result<String>>();
        let sender = Mutex::new(Some(sender));
        let listener = self.on(&[EventKind::StyleLoaded, EventKind::TornDown], move |event| {
            let outcome = match event {
                MapEvent::StyleLoaded { style } => Ok(style.clone()),
                MapEvent::TornDown => Err(MapError::SessionTornDown),
                _ => return ListenerControl::Keep,
            };
            if let Some(sender) = sender.lock().ok().and_then(|mut s| s.take()) {
                let _ = sender.send(outcome);
            }
            ListenerControl::Remove
        });

        log::info!("session {}: switching style to {}", self.id(), style);
        self.inner.ready.store(false, Ordering::SeqCst);
        if let Err(err) = self.with_renderer(|r| r.set_style(style)) {
            self.off(listener);
            return Err(err);
        }

        let loaded = receiver.await.unwrap_or(Err(MapError::SessionTornDown))?;
        log::debug!("session {}: style {} loaded", self.id(), loaded);
        Ok(())
    }

    /// Transition whose waiter is still pending, whichever controller issued it
    pub fn pending_transition(&self) -> Option<TransitionId> {
        self.inner
            .camera_waiter
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|waiter| waiter.transition))
    }

    pub(crate) fn pending_transition_owner(&self) -> Option<u64> {
        self.inner
            .camera_waiter
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|waiter| waiter.owner))
    }

    pub(crate) fn allocate_transition(&self) -> TransitionId {
        TransitionId(self.inner.next_transition.fetch_add(1, Ordering::Relaxed))
    }

    /// Installs `waiter` as the session's camera waiter, returning the one it displaced
    pub(crate) fn replace_camera_waiter(&self, waiter: CameraWaiter) -> Option<CameraWaiter> {
        match self.inner.camera_waiter.lock() {
            Ok(mut slot) => slot.replace(waiter),
            Err(_) => None,
        }
    }

    /// Removes the pending waiter when `matches` accepts it
    pub(crate) fn take_camera_waiter(
        &self,
        matches: impl FnOnce(&CameraWaiter) -> bool,
    ) -> Option<CameraWaiter> {
        let mut slot = self.inner.camera_waiter.lock().ok()?;
        if slot.as_ref().map_or(false, matches) {
            slot.take()
        } else {
            None
        }
    }

    pub fn highlight_state(&self) -> RegionHighlightState {
        self.inner
            .highlight
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    pub(crate) fn update_highlight_state(&self, f: impl FnOnce(&mut RegionHighlightState)) {
        if let Ok(mut state) = self.inner.highlight.lock() {
            f(&mut state);
        }
    }
}

impl std::fmt::Debug for MapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSession")
            .field("id", &self.inner.id)
            .field("ready", &self.inner.ready.load(Ordering::SeqCst))
            .field("torn_down", &self.is_torn_down())
            .field(
                "structural_mutation_in_flight",
                &self.is_structural_mutation_in_flight(),
            )
            .finish()
    }
}
