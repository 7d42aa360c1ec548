//! One-shot deferred tasks that can be revoked.

use std::{
    collections::HashMap,
    future::Future,
    sync::Mutex,
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a task armed with [`defer`].
#[derive(Debug)]
pub struct TimerHandle {
    label: &'static str,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Revoke the timer. A no-op once it has fired.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the task has fired and completed, or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the timer to fire (or be cancelled).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(timer = self.label, error = %e, "timer task failed");
        }
    }
}

/// Run `work` after `delay` unless cancelled first.
pub fn defer<F>(label: &'static str, delay: Duration, work: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let child = token.clone();

    let task = tokio::spawn(async move {
        tokio::select! {
            () = child.cancelled() => {
                tracing::debug!(timer = label, "timer cancelled");
            }
            () = tokio::time::sleep(delay) => {
                tracing::debug!(timer = label, "timer fired");
                work.await;
            }
        }
    });

    TimerHandle { label, token, task }
}

/// Armed timers owned by one scheduler.
#[derive(Debug, Default)]
pub struct Timers {
    inner: Mutex<TimersInner>,
}

#[derive(Debug, Default)]
struct TimersInner {
    pending: Vec<TimerHandle>,
    keyed: HashMap<&'static str, TimerHandle>,
}

impl TimersInner {
    fn prune(&mut self) {
        self.pending.retain(|t| !t.is_finished());
        self.keyed.retain(|_, t| !t.is_finished());
    }
}

impl Timers {
    fn lock(&self) -> std::sync::MutexGuard<'_, TimersInner> {
        // A poisoned registry only ever holds handles; keep using it.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Keep `handle` alongside any other pending timers.
    pub fn arm(&self, handle: TimerHandle) {
        let mut inner = self.lock();
        inner.prune();
        inner.pending.push(handle);
    }

    /// Keep `handle` as the only timer under `key`, cancelling the previous one.
    pub fn arm_exclusive(&self, key: &'static str, handle: TimerHandle) {
        let mut inner = self.lock();
        inner.prune();
        if let Some(previous) = inner.keyed.insert(key, handle) {
            tracing::info!(timer = key, "replacing pending timer");
            previous.cancel();
        }
    }

    /// Timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        let mut inner = self.lock();
        inner.prune();
        inner.pending.iter().chain(inner.keyed.values()).filter(|t| !t.is_cancelled()).count()
    }

    /// Cancel everything; used on shutdown.
    pub fn cancel_all(&self) {
        let mut inner = self.lock();
        let count = inner.pending.len() + inner.keyed.len();
        for t in inner.pending.drain(..) {
            t.cancel();
        }
        for (_, t) in inner.keyed.drain() {
            t.cancel();
        }
        if count > 0 {
            tracing::info!(count, "cancelled pending timers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>)
    {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let make = move || {
            let h = Arc::clone(&h);
            Box::pin(async move {
                h.fetch_add(1, Ordering::SeqCst);
            }) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
        };
        (hits, make)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (hits, make) = counter();
        let handle = defer("test", Duration::from_secs(3 * 3600), make());

        tokio::time::sleep(Duration::from_secs(3 * 3600 - 1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        handle.join().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (hits, make) = counter();
        let handle = defer("test", Duration::from_secs(60), make());
        handle.cancel();
        assert!(handle.is_cancelled());

        handle.join().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exclusive_slot_replaces_previous() {
        let (hits, make) = counter();
        let timers = Timers::default();

        timers.arm_exclusive("follow-up", defer("a", Duration::from_secs(60), make()));
        timers.arm_exclusive("follow-up", defer("b", Duration::from_secs(60), make()));
        assert_eq!(timers.pending(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stacked_timers_all_fire() {
        let (hits, make) = counter();
        let timers = Timers::default();

        timers.arm(defer("a", Duration::from_secs(60), make()));
        timers.arm(defer("b", Duration::from_secs(90), make()));
        assert_eq!(timers.pending(), 2);

        tokio::time::sleep(Duration::from_secs(91)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_revokes_everything() {
        let (hits, make) = counter();
        let timers = Timers::default();

        timers.arm(defer("a", Duration::from_secs(60), make()));
        timers.arm_exclusive("k", defer("b", Duration::from_secs(60), make()));
        timers.cancel_all();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(timers.pending(), 0);
    }
}
