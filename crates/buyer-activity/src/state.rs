//! The single serializing critical section every `BuyActivityState`
//! mutation crosses (`execSync`), per §5 of the spec: every read or write of
//! the activity record crosses this one lock, and it is never sharded.
//!
//! The real suspension points in `activity.rs` (`wait_for_phase_interruptible`,
//! `wait_for_decryption_key`) wait on the transaction client's broadcast
//! channel of `Tx` snapshots, not on `BuyActivityState` itself, so this
//! module only needs the lock-and-mutate half of the primitive, not a
//! predicate-wait built on top of it.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use buyer_primitives::BuyActivityState;

/// The shared, lock-guarded activity record.
pub(crate) struct Shared {
    inner: Mutex<BuyActivityState>,
}

impl Shared {
    pub(crate) fn new(state: BuyActivityState) -> Arc<Self> {
        Arc::new(Self { inner: Mutex::new(state) })
    }

    /// Run `f` under the single serializing lock.
    pub(crate) fn exec_sync<R>(&self, f: impl FnOnce(&mut BuyActivityState) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Read-only peek under the lock.
    pub(crate) fn peek<R>(&self, f: impl FnOnce(&BuyActivityState) -> R) -> R {
        let guard = self.inner.lock();
        f(&guard)
    }
}

/// Race an arbitrary future against `interrupt`, per the concurrency
/// model's single interrupt channel threaded through every blocking call.
pub(crate) async fn interruptible<T>(
    interrupt: &CancellationToken,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, buyer_primitives::BuyError> {
    tokio::select! {
        biased;
        () = interrupt.cancelled() => Err(buyer_primitives::BuyError::Interrupted),
        value = fut => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use buyer_primitives::{BuyError, Fingerprint};

    use super::*;
    use crate::test_stub::fake_work_file;

    fn fresh_state() -> BuyActivityState {
        BuyActivityState::new(fake_work_file(b"work"), Fingerprint::random(&mut rand::thread_rng()))
    }

    #[tokio::test]
    async fn exec_sync_mutates_under_the_lock() {
        let shared = Shared::new(fresh_state());
        shared.exec_sync(|s| s.last_error = Some("done".into()));
        assert_eq!(shared.peek(|s| s.last_error.clone()), Some("done".to_string()));
    }

    #[tokio::test]
    async fn interruptible_helper_prefers_cancellation() {
        let interrupt = CancellationToken::new();
        interrupt.cancel();
        let result = interruptible(&interrupt, async {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            42
        })
        .await;
        assert!(matches!(result, Err(BuyError::Interrupted)));
    }
}
