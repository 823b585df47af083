//! Deduplicating, rate-bounded fetch cache.
//!
//! [`FetchCache`] fetches a URL on behalf of many concurrent callers. It
//! composes three primitives, each in its own module:
//!
//! - [`cache::TtlCache`]: successful responses, fresh for a fixed TTL.
//! - [`gate::KeyGate`]: at most one refresh per key; later callers follow.
//! - [`admission::Admission`]: at most N upstream calls in flight overall.
//!
//! # Call flow
//!
//! 1. A fresh cache entry is returned immediately. No gate, no permit.
//! 2. On a miss the caller claims the key. A follower waits for the running
//!    refresh and re-reads the cache. If the refresh left nothing fresh (it
//!    failed, or its leader gave up before fetching), the follower claims
//!    again: it leads if the key is free, else queues behind the new leader.
//!    Each caller leads at most once, so N callers cause at most N upstream
//!    calls.
//! 3. A leader waits for an admission permit while still holding the key,
//!    so same-key callers queue as followers instead of racing it.
//! 4. The upstream call runs in a spawned task that owns both the key guard
//!    and the permit. A successful result is stored before the guard drops.
//!    If the leader's own context ends first, the task keeps going and still
//!    populates the cache for the followers.
//!
//! Failures are never cached and never retried here. Every wait races the
//! caller's [`FetchContext`]; giving up is reported as
//! [`FetchError::Cancelled`], distinct from [`FetchError::Upstream`].

pub mod admission;
pub mod cache;
pub mod context;
pub mod gate;
pub mod transport;

pub use admission::{Admission, Permit};
pub use cache::{CacheEntry, TtlCache};
pub use context::FetchContext;
pub use gate::{GateGuard, GateWaiter, KeyGate, Role};
pub use transport::{HttpTransport, Payload, Transport};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{CancelReason, FetchError, UpstreamError};
use crate::{IcalFilterError, Result, telemetry};

/// Configuration for a [`FetchCache`].
///
/// ```rust
/// # use icalfilter::FetchConfig;
/// # use std::time::Duration;
/// let config = FetchConfig::new()
///     .ttl(Duration::from_secs(60))
///     .max_concurrent(4);
/// assert_eq!(config.max_concurrent, 4);
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// How long a successful response stays fresh. Default: 5 minutes.
    pub ttl: Duration,
    /// Maximum upstream calls in flight across all keys. Default: 10.
    pub max_concurrent: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_concurrent: 10,
        }
    }
}

impl FetchConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cached responses.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the global upstream concurrency limit.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }
}

/// Fetch cache over a [`Transport`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FetchCache {
    cache: TtlCache,
    gate: KeyGate,
    admission: Admission,
    transport: Arc<dyn Transport>,
    ttl: Duration,
}

impl FetchCache {
    /// Create a fetch cache over `transport`.
    ///
    /// Fails if `config.max_concurrent` is zero.
    pub fn new(config: &FetchConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        if config.max_concurrent == 0 {
            return Err(IcalFilterError::Configuration(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            cache: TtlCache::new(),
            gate: KeyGate::new(),
            admission: Admission::new(config.max_concurrent),
            transport,
            ttl: config.ttl,
        })
    }

    /// Create a fetch cache over a fresh [`HttpTransport`].
    pub fn http(config: &FetchConfig) -> Result<Self> {
        Self::new(config, Arc::new(HttpTransport::new()?))
    }

    /// Fetch `key`, from cache when fresh, else from upstream.
    ///
    /// See the module docs for the full call flow.
    pub async fn fetch(
        &self,
        ctx: &FetchContext,
        key: &str,
    ) -> std::result::Result<Payload, FetchError> {
        if let Some(payload) = self.lookup(key) {
            return Ok(payload);
        }

        loop {
            match self.gate.acquire_or_wait(key) {
                Role::Leader(guard) => return self.lead(ctx, guard).await,
                Role::Follower(waiter) => {
                    self.follow(ctx, key, waiter).await?;
                    if let Some(payload) = self.recheck(key) {
                        return Ok(payload);
                    }
                }
            }
        }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// The underlying key gate.
    pub fn gate(&self) -> &KeyGate {
        &self.gate
    }

    /// The underlying admission pool.
    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    fn lookup(&self, key: &str) -> Option<Payload> {
        match self.cache.lookup(key) {
            Some(entry) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(url = %key, "cache hit");
                Some(entry.payload().clone())
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Cache read after a wait or a claim. Not counted as a lookup: the
    /// caller's miss was already recorded.
    fn recheck(&self, key: &str) -> Option<Payload> {
        self.cache.lookup(key).map(|entry| entry.payload().clone())
    }

    async fn follow(
        &self,
        ctx: &FetchContext,
        key: &str,
        waiter: GateWaiter,
    ) -> std::result::Result<(), FetchError> {
        metrics::counter!(telemetry::FOLLOWER_WAITS_TOTAL).increment(1);
        debug!(url = %key, "refresh in progress, following");
        ctx.run(waiter.wait())
            .await
            .map_err(|reason| cancelled(key, "follower", reason))
    }

    async fn lead(
        &self,
        ctx: &FetchContext,
        guard: GateGuard,
    ) -> std::result::Result<Payload, FetchError> {
        // A previous leader may have stored a fresh entry between our miss
        // and our claim.
        if let Some(payload) = self.recheck(guard.key()) {
            return Ok(payload);
        }

        let permit = self
            .admission
            .acquire(ctx)
            .await
            .map_err(|reason| cancelled(guard.key(), "permit", reason))?;

        let url = guard.key().to_owned();
        let cache = self.cache.clone();
        let transport = Arc::clone(&self.transport);
        let ttl = self.ttl;
        let handle = tokio::spawn(async move {
            // Locals drop in reverse order: the guard releases followers
            // only after the store below, then the permit returns.
            let _permit = permit;
            let guard = guard;

            let started = Instant::now();
            let result = transport.get(guard.key()).await;
            let elapsed = started.elapsed();
            metrics::histogram!(telemetry::UPSTREAM_DURATION_SECONDS)
                .record(elapsed.as_secs_f64());

            match &result {
                Ok(payload) => {
                    metrics::counter!(telemetry::UPSTREAM_REQUESTS_TOTAL, "status" => "ok")
                        .increment(1);
                    info!(
                        url = %guard.key(),
                        status = payload.status,
                        bytes = payload.body.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "fetched upstream"
                    );
                    cache.store(guard.key(), payload.clone(), ttl);
                }
                Err(e) => {
                    metrics::counter!(telemetry::UPSTREAM_REQUESTS_TOTAL, "status" => "error")
                        .increment(1);
                    warn!(
                        url = %guard.key(),
                        status = e.status(),
                        error = %e,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "upstream fetch failed"
                    );
                }
            }
            result
        });

        match ctx.run(handle).await {
            Ok(Ok(result)) => result.map_err(FetchError::from),
            Ok(Err(join_err)) if join_err.is_panic() => {
                metrics::counter!(telemetry::UPSTREAM_REQUESTS_TOTAL, "status" => "error")
                    .increment(1);
                warn!(url = %url, "upstream call panicked");
                Err(UpstreamError::Panicked.into())
            }
            // Only happens when the runtime shuts down under us.
            Ok(Err(_)) => Err(FetchError::Cancelled(CancelReason::Cancelled)),
            // The detached task keeps running and still fills the cache.
            Err(reason) => Err(cancelled(&url, "result", reason)),
        }
    }
}

fn cancelled(key: &str, stage: &'static str, reason: CancelReason) -> FetchError {
    metrics::counter!(telemetry::CANCELLATIONS_TOTAL, "stage" => stage).increment(1);
    debug!(url = %key, stage, %reason, "caller stopped waiting");
    FetchError::Cancelled(reason)
}
