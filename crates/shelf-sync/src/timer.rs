//! Debounce timer

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A restartable one-shot timer
///
/// `reschedule` replaces any timer that has not fired yet. Once the delay
/// elapses the action is spawned on its own task, so cancelling or
/// rescheduling never interrupts an action that already started.
#[derive(Default)]
pub struct DebounceTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay`, superseding a pending timer.
    /// Returns true if a pending timer was superseded.
    pub fn reschedule<F>(&self, delay: Duration, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action);
        });

        let previous = self.pending.lock().replace(handle);
        match previous {
            Some(prev) if !prev.is_finished() => {
                prev.abort();
                true
            }
            _ => false,
        }
    }

    /// Drop the pending timer. Returns true if one was pending.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether a timer is armed and has not fired yet
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counter_action(counter: &Arc<AtomicU32>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_fires() {
        let timer = DebounceTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        assert!(!timer.reschedule(Duration::from_millis(600), counter_action(&fired)));
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(timer.reschedule(Duration::from_millis(600), counter_action(&fired)));
        }
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(599)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let timer = DebounceTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        timer.reschedule(Duration::from_millis(600), counter_action(&fired));
        assert!(timer.cancel());
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_action_is_not_interrupted() {
        let timer = Arc::new(DebounceTimer::new());
        let done = Arc::new(AtomicU32::new(0));

        let done_in_action = done.clone();
        timer.reschedule(Duration::from_millis(100), async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            done_in_action.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Fired already; nothing left to cancel
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
