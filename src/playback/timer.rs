//! Cancellable delayed-callback timers
//!
//! Every suspension in the engine (highlight activation/deactivation, the
//! inter-segment silence gap, clip-completion watching) is a [`TimerHandle`]:
//! a spawned task that can be cancelled up to the moment it fires. Dropping
//! a handle cancels it, so a set of pending timers is torn down by clearing
//! the collection that owns it.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// A cancellable scheduled callback
///
/// Cancellation is idempotent; cancelling an already-fired or
/// already-cancelled timer is a no-op.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Run `future` after `delay`
    pub fn after<F>(delay: Duration, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                future.await;
            }),
        }
    }

    /// Run `future` immediately as a cancellable task
    ///
    /// Used for open-ended waits such as watching a clip's completion
    /// signal.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    /// Cancel the timer if it has not fired yet
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let _timer = TimerHandle::after(Duration::from_millis(100), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let timer = TimerHandle::after(Duration::from_millis(100), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        timer.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Cancelling again is a no-op
        timer.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let timer = TimerHandle::after(Duration::from_millis(10), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        timer.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        {
            let _timer = TimerHandle::after(Duration::from_millis(100), async move {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
