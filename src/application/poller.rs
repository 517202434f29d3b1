use super::cancel::CancelToken;
use std::time::Duration;
use tokio::time::sleep;

/// Attempt budget of one confirmation run. A tunable, not a hidden constant:
/// slow gateways get a bigger budget per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub limit: u32,
    pub interval: Duration,
}

impl PollSettings {
    /// Default budget for payment and installment-retry confirmation.
    pub const PAYMENT: Self = Self {
        limit: 10,
        interval: Duration::from_secs(1),
    };

    /// Signature vendors settle slower than payment gateways.
    pub const SIGNATURE: Self = Self {
        limit: 20,
        interval: Duration::from_secs(2),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Confirmed { attempts: u32 },
    TimedOut,
    /// The owning flow was torn down mid-poll. Callers have already abandoned
    /// the outcome; nothing may act on it.
    Cancelled,
}

/// Asks `check` whether the awaited terminal state has been reached, with a
/// bounded retry budget.
///
/// The first check runs immediately, even with a zero `limit` (the budget is
/// clamped to one attempt). Every failed check consumes one round and is
/// followed by one `interval` sleep, so an exhausted budget takes at least
/// `limit * interval`. `check` must be idempotent and side-effect free; a
/// transient transport error counts as "not yet confirmed" and simply consumes
/// a round, which trades an occasional false timeout for never hanging on
/// flaky connectivity.
pub async fn confirm<F, Fut>(mut check: F, settings: PollSettings, cancel: &CancelToken) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for round in 0..settings.limit.max(1) {
        if check().await {
            return PollOutcome::Confirmed { attempts: round + 1 };
        }
        tracing::debug!(round = round + 1, limit = settings.limit, "not yet confirmed");
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = sleep(settings.interval) => {}
        }
    }
    tracing::warn!(limit = settings.limit, "confirmation budget exhausted");
    PollOutcome::TimedOut
}
