//! Watches a predicate over transaction state and force-closes registered
//! resources the moment it goes false.
//!
//! Pairs naturally with [`buyer_transport::ScopedTransport`]: register the
//! scope's closer with the watchdog, hand the watchdog a `watch` channel
//! fed by the transaction poller, and every in-flight socket is guaranteed
//! to die no later than the phase window it was opened for.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Something a watchdog can force-close.
pub trait Closeable: Send + Sync {
    /// Force-close this resource. Must be safe to call more than once.
    fn close(&self);
}

impl<F: Fn() + Send + Sync> Closeable for F {
    fn close(&self) {
        self()
    }
}

struct State {
    closed: bool,
    resources: Vec<Box<dyn Closeable>>,
}

/// A handle to a running watchdog. Cheap to clone.
#[derive(Clone)]
pub struct WatchdogHandle {
    state: Arc<Mutex<State>>,
}

impl WatchdogHandle {
    /// Register a resource to be force-closed when the watchdog's
    /// predicate goes false. If the predicate has already failed, `close`
    /// is invoked immediately instead.
    pub fn register(&self, resource: Box<dyn Closeable>) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            resource.close();
        } else {
            state.resources.push(resource);
        }
    }

    /// Whether the watchdog has already fired.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Spawn a watchdog task driven by `predicate` (an externally-updated
/// "still allowed to run" flag) and `exit`. The task runs until either the
/// predicate reports `false` (closing every registered resource) or `exit`
/// is cancelled (a clean shutdown with no forced close).
pub fn spawn(predicate: watch::Receiver<bool>, exit: CancellationToken) -> WatchdogHandle {
    let state = Arc::new(Mutex::new(State {
        closed: false,
        resources: Vec::new(),
    }));
    let handle = WatchdogHandle {
        state: state.clone(),
    };

    tokio::spawn(async move {
        let mut predicate = predicate;
        loop {
            if !*predicate.borrow() {
                break;
            }
            tokio::select! {
                biased;
                () = exit.cancelled() => {
                    tracing::trace!("watchdog exiting cleanly");
                    return;
                }
                changed = predicate.changed() => {
                    if changed.is_err() {
                        // Predicate sender dropped: treat as a failure, same
                        // as an explicit `false`.
                        break;
                    }
                }
            }
        }
        tracing::debug!("watchdog predicate failed, closing registered resources");
        let mut guard = state.lock();
        guard.closed = true;
        for resource in guard.resources.drain(..) {
            resource.close();
        }
    });

    handle
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn closes_registered_resources_when_predicate_goes_false() {
        let (tx, rx) = watch::channel(true);
        let exit = CancellationToken::new();
        let handle = spawn(rx, exit);

        let closed = Arc::new(AtomicBool::new(false));
        let closed_clone = closed.clone();
        handle.register(Box::new(move || {
            closed_clone.store(true, Ordering::SeqCst);
        }));

        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(closed.load(Ordering::SeqCst));
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn late_registration_after_failure_closes_immediately() {
        let (tx, rx) = watch::channel(true);
        let exit = CancellationToken::new();
        let handle = spawn(rx, exit);

        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let closed = Arc::new(AtomicBool::new(false));
        let closed_clone = closed.clone();
        handle.register(Box::new(move || {
            closed_clone.store(true, Ordering::SeqCst);
        }));

        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn clean_exit_does_not_close_resources() {
        let (_tx, rx) = watch::channel(true);
        let exit = CancellationToken::new();
        let handle = spawn(rx, exit.clone());

        let closed = Arc::new(AtomicBool::new(false));
        let closed_clone = closed.clone();
        handle.register(Box::new(move || {
            closed_clone.store(true, Ordering::SeqCst);
        }));

        exit.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!closed.load(Ordering::SeqCst));
        assert!(!handle.is_closed());
    }
}
