use buyer_primitives::Phase;

/// Failures talking to the coordinator or waiting on a transaction phase.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TxClientError {
    /// The poll loop has stopped (the client was dropped or told to exit).
    #[error("transaction client stopped")]
    Stopped,
    /// A network or auth failure talking to the coordinator.
    #[error("coordinator error: {0}")]
    CoordinatorError(String),
    /// An observed phase fell outside the allowed set for a phase wait.
    #[error("phase violation: observed {observed}, allowed {allowed:?}")]
    PhaseViolation {
        /// The phase that was actually observed.
        observed: Phase,
        /// The target plus transient phases that would have been fine.
        allowed: Vec<Phase>,
    },
    /// The transaction's state became `Retired` before the awaited phase
    /// was reached.
    #[error("transaction retired before reaching the awaited phase")]
    Retired,
}
