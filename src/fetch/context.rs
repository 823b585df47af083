//! Per-call cancellation and deadline.
//!
//! A [`FetchContext`] travels with one logical [`fetch`](super::FetchCache::fetch)
//! call. Every suspension point in the fetch path (follower wait, permit
//! wait, result wait) races the awaited future against [`FetchContext::done`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CancelReason;

/// Cancellation signal plus optional deadline for one fetch.
///
/// ```rust
/// # use icalfilter::FetchContext;
/// # use std::time::Duration;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = FetchContext::new().timeout(Duration::from_secs(5));
/// assert!(ctx.deadline().is_some());
/// assert!(ctx.err().is_none());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl FetchContext {
    /// A context that never ends unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that ends when `token` (or any of its parents) is cancelled.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set the deadline to `now + timeout`, keeping an earlier deadline.
    ///
    /// Requires a tokio runtime context for the clock.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline_at(Instant::now() + timeout)
    }

    /// Set an absolute deadline, keeping an earlier one if already set.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The token backing this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel this context (and every clone of it).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Why the context has ended, or `None` while it is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context ends.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Drive `fut` until it completes or the context ends, whichever first.
    ///
    /// An already-ended context returns immediately without polling `fut`.
    /// Dropping `fut` on cancellation is the only side effect.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, CancelReason> {
        if let Some(reason) = self.err() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            out = fut => Ok(out),
            reason = self.done() => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_ends_context() {
        let ctx = FetchContext::new().timeout(Duration::from_millis(10));
        assert!(ctx.err().is_none());
        assert_eq!(ctx.done().await, CancelReason::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancel_reaches_clones() {
        let ctx = FetchContext::new();
        let clone = ctx.clone();
        ctx.cancel();
        assert_eq!(clone.err(), Some(CancelReason::Cancelled));
        assert_eq!(clone.done().await, CancelReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_wins() {
        let ctx = FetchContext::new()
            .timeout(Duration::from_millis(10))
            .timeout(Duration::from_secs(60));
        let expected = Instant::now() + Duration::from_millis(10);
        assert_eq!(ctx.deadline(), Some(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_output_before_deadline() {
        let ctx = FetchContext::new().timeout(Duration::from_millis(50));
        let out = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                7
            })
            .await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_at_deadline() {
        let ctx = FetchContext::new().timeout(Duration::from_millis(10));
        let out = ctx.run(tokio::time::sleep(Duration::from_secs(1))).await;
        assert_eq!(out, Err(CancelReason::DeadlineExceeded));
    }

    #[tokio::test]
    async fn run_returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = FetchContext::with_token(token);
        let out = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(CancelReason::Cancelled));
    }
}
