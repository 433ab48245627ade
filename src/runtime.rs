//! Runtime abstraction layer for async operations
//!
//! Event handlers run synchronously inside [`MapSession::dispatch`](crate::MapSession::dispatch);
//! any async follow-up work they start goes through [`spawn`]. Also home to the bounded,
//! fixed-delay retry used while layers are still being set up.

use crate::prelude::{Future, Pin};
use once_cell::sync::OnceCell;
use std::time::Duration;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Spawns `future` on the configured runtime
pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    runtime().spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    use super::*;
    use ::tokio::task::JoinHandle;

    /// Spawns onto the ambient tokio runtime
    pub struct TokioSpawner;

    impl AsyncSpawner for TokioSpawner {
        fn spawn_boxed(
            &self,
            future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
        ) -> Box<dyn AsyncHandle> {
            match ::tokio::runtime::Handle::try_current() {
                Ok(handle) => Box::new(TokioHandle(Some(handle.spawn(future)))),
                Err(_) => {
                    log::warn!("no tokio runtime running; dropping spawned task");
                    Box::new(TokioHandle(None))
                }
            }
        }
    }

    struct TokioHandle(Option<JoinHandle<()>>);

    impl AsyncHandle for TokioHandle {
        fn is_finished(&self) -> bool {
            self.0.as_ref().map_or(true, JoinHandle::is_finished)
        }

        fn cancel(&self) {
            if let Some(handle) = &self.0 {
                handle.abort();
            }
        }
    }
}

/// Global runtime instance
static RUNTIME: OnceCell<Box<dyn AsyncSpawner>> = OnceCell::new();

/// Initialize the runtime with a specific spawner. Only the first call has an effect.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) {
    if RUNTIME.set(spawner).is_err() {
        log::debug!("runtime spawner already initialized");
    }
}

/// Get the global runtime spawner
pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME
        .get_or_init(|| Box::new(spawners::TokioSpawner))
        .as_ref()
}

pub async fn async_delay(duration: Duration) {
    ::tokio::time::sleep(duration).await;
}

/// Bounded retries with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(200))
    }
}

/// Runs `attempt` until it returns `Some`, at most `policy.attempts` times, sleeping
/// `policy.delay` in between.
pub async fn retry_fixed<T>(
    policy: RetryPolicy,
    mut attempt: impl FnMut(u32) -> Option<T>,
) -> Option<T> {
    let attempts = policy.attempts.max(1);
    for n in 1..=attempts {
        if let Some(value) = attempt(n) {
            return Some(value);
        }
        if n < attempts {
            log::debug!(
                "attempt {}/{} not ready, retrying in {:?}",
                n,
                attempts,
                policy.delay
            );
            async_delay(policy.delay).await;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[::tokio::test]
    async fn test_spawn_runs_on_tokio() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });
        for _ in 0..10 {
            if handle.is_finished() {
                break;
            }
            ::tokio::task::yield_now().await;
        }
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_spawn_without_runtime_is_dropped() {
        let handle = spawn(async {});
        assert!(handle.is_finished());
    }

    #[::tokio::test]
    async fn test_retry_fixed_stops_on_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let mut calls = 0;
        let result = retry_fixed(policy, |n| {
            calls += 1;
            (n == 3).then_some(n)
        })
        .await;
        assert_eq!(result, Some(3));
        assert_eq!(calls, 3);
    }

    #[::tokio::test]
    async fn test_retry_fixed_is_bounded() {
        let policy = RetryPolicy::new(4, Duration::from_millis(1));
        let mut calls = 0;
        let result: Option<()> = retry_fixed(policy, |_| {
            calls += 1;
            None
        })
        .await;
        assert_eq!(result, None);
        assert_eq!(calls, 4);
    }
}
