use crate::FailureKind;

/// Lifecycle of one target inside the coordinator.
///
/// `P` is the fetched page. It travels with the state from a successful fetch
/// into extraction, so an extracting target always has its page in hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState<P = ()> {
    Pending,
    Fetching { retries: u32 },
    Retry { retries: u32 },
    Extracting { retries: u32, page: P },
    /// Extraction finished; `found` is false for a NOT_FOUND outcome.
    Done { found: bool },
    Failed(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent<P = ()> {
    SlotAcquired,
    FetchSucceeded(P),
    FetchFailed(FailureKind),
    BackoffElapsed,
    Extracted { found: bool },
    ExtractionFailed(FailureKind),
    Cancelled,
}

impl<P> TargetState<P> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TargetState::Done { .. } | TargetState::Failed(_))
    }

    /// Retries consumed so far, for non-terminal states.
    pub fn retries(&self) -> Option<u32> {
        match self {
            TargetState::Pending => Some(0),
            TargetState::Fetching { retries }
            | TargetState::Retry { retries }
            | TargetState::Extracting { retries, .. } => Some(*retries),
            TargetState::Done { .. } | TargetState::Failed(_) => None,
        }
    }
}

/// Pure transition function. Events that do not apply to the current state
/// leave it unchanged; terminal states never change.
pub fn advance<P>(state: TargetState<P>, event: TargetEvent<P>, max_retries: u32) -> TargetState<P> {
    if state.is_terminal() {
        return state;
    }

    match (state, event) {
        (_, TargetEvent::Cancelled) => TargetState::Failed(FailureKind::Cancelled),
        (TargetState::Pending, TargetEvent::SlotAcquired) => TargetState::Fetching { retries: 0 },
        (TargetState::Fetching { retries }, TargetEvent::FetchSucceeded(page)) => {
            TargetState::Extracting { retries, page }
        }
        (TargetState::Fetching { retries }, TargetEvent::FetchFailed(kind)) => {
            if kind.is_retryable() && retries < max_retries {
                TargetState::Retry {
                    retries: retries + 1,
                }
            } else {
                TargetState::Failed(kind)
            }
        }
        (TargetState::Retry { retries }, TargetEvent::BackoffElapsed) => {
            TargetState::Fetching { retries }
        }
        (TargetState::Extracting { .. }, TargetEvent::Extracted { found }) => {
            TargetState::Done { found }
        }
        (TargetState::Extracting { .. }, TargetEvent::ExtractionFailed(kind)) => {
            TargetState::Failed(kind)
        }
        (state, _) => state,
    }
}
