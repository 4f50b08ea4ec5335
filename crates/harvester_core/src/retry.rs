use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TargetKind;

/// Settle time slow-rendering sites needed in practice; reused as the default
/// pause before retrying a contact-site fetch.
pub const SLOW_RENDER_DELAY_MS: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    /// `base_ms * 2^(retry - 1)`, capped at `max_ms`.
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Backoff {
    /// Delay before the `retry`-th retry (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { base_ms, max_ms } => {
                let exponent = retry.saturating_sub(1).min(32);
                let factor = 1u64 << exponent;
                Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed { delay_ms: 0 },
        }
    }

    /// A listing query is expected to succeed on its single navigation; a
    /// contact site may time out once.
    pub fn default_for(kind: TargetKind) -> Self {
        match kind {
            TargetKind::ListingQuery => Self::none(),
            TargetKind::SiteContact => Self {
                max_retries: 1,
                backoff: Backoff::Fixed {
                    delay_ms: SLOW_RENDER_DELAY_MS,
                },
            },
        }
    }
}
