//! Token bucket rate limiter for product sources.
//!
//! Implements per-source rate limiting using the token bucket algorithm.
//! Each source gets its own bucket and its own concurrency gate, both sized
//! from the source's declared [`RateLimit`]. Waiting for tokens goes through
//! the injected [`Clock`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::clock::{elapsed_between, Clock};
use crate::provider::RateLimit;

/// Token bucket for a single source.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: DateTime<Utc>,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    fn new(limit: &RateLimit, now: DateTime<Utc>) -> Self {
        let capacity = f64::from(limit.burst_capacity.max(1));
        Self {
            tokens: capacity,
            last_update: now,
            rate: f64::from(limit.requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed = elapsed_between(self.last_update, now).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    /// Take a token if one is available.
    fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until a token becomes available.
    fn time_until_available(&mut self, now: DateTime<Utc>) -> Duration {
        self.refill(now);

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Duration::from_secs_f64(tokens_needed / self.rate)
        }
    }
}

/// Window used for [`RateLimiterStats::requests_last_minute`].
const REQUEST_WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter activity, reported in service stats.
///
/// Serializes as `{"trackedSources", "activeRequests", "requestsLastMinute"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
    /// Sources with an active token bucket.
    pub tracked_sources: usize,
    /// Source calls currently holding a permit.
    pub active_requests: usize,
    /// Tokens handed out during the last minute, across sources.
    pub requests_last_minute: usize,
}

/// Held for the duration of one source call.
///
/// Dropping it frees the source's concurrency slot.
#[derive(Debug)]
pub struct SourcePermit {
    _slot: Option<OwnedSemaphorePermit>,
    active: Arc<AtomicUsize>,
}

impl Drop for SourcePermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Thread-safe rate limiter keeping one token bucket and one concurrency
/// gate per source.
///
/// Buckets and gates are created on first use from the configured limit for
/// the source, or from [`RateLimit::default`] when none was configured.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    limits: Mutex<HashMap<String, RateLimit>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    /// When each recent token was handed out, oldest first.
    recent: Mutex<VecDeque<DateTime<Utc>>>,
    active: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limits: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            recent: Mutex::new(VecDeque::new()),
            active: Arc::new(AtomicUsize::new(0)),
            clock,
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    ///
    /// For rate limiting, it's safe to recover from a poisoned mutex since
    /// the worst case is slightly incorrect rate limiting, which is better
    /// than panicking.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_limits(&self) -> MutexGuard<'_, HashMap<String, RateLimit>> {
        self.limits.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter limits mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_gates(&self) -> MutexGuard<'_, HashMap<String, Arc<Semaphore>>> {
        self.gates.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter gates mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_recent(&self) -> MutexGuard<'_, VecDeque<DateTime<Utc>>> {
        self.recent.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter request window mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure the limit for a source, replacing its current bucket and
    /// concurrency gate.
    pub fn configure(&self, source: &str, limit: RateLimit) {
        let gate = Arc::new(Semaphore::new(limit.max_concurrency.max(1)));
        self.lock_limits().insert(source.to_string(), limit);
        // Release limits lock before acquiring the others
        self.lock_buckets().remove(source);
        self.lock_gates().insert(source.to_string(), gate);
    }

    /// Wait for a free concurrency slot and a token for `source`.
    ///
    /// The returned permit must be held while the source is being called.
    pub async fn acquire(&self, source: &str) -> SourcePermit {
        let gate = self.gate_for(source);
        // The gate is never closed, so acquisition only fails if that changes
        let slot = gate.acquire_owned().await.ok();

        self.take_token(source).await;

        self.active.fetch_add(1, Ordering::SeqCst);
        SourcePermit {
            _slot: slot,
            active: Arc::clone(&self.active),
        }
    }

    async fn take_token(&self, source: &str) {
        loop {
            let wait_time = {
                let now = self.clock.now();
                let limit = self.limit_for(source);
                let mut buckets = self.lock_buckets();

                let bucket = buckets
                    .entry(source.to_string())
                    .or_insert_with(|| TokenBucket::new(&limit, now));

                if bucket.try_acquire(now) {
                    drop(buckets);
                    self.note_request(now);
                    debug!("Rate limiter: acquired token for '{}'", source);
                    return;
                }

                bucket.time_until_available(now)
            };

            debug!("Rate limiter: waiting {:?} for '{}'", wait_time, source);
            self.clock.sleep(wait_time).await;
        }
    }

    /// Take a token without waiting. Returns false when rate limited.
    pub fn try_acquire(&self, source: &str) -> bool {
        let now = self.clock.now();
        let limit = self.limit_for(source);
        let acquired = self
            .lock_buckets()
            .entry(source.to_string())
            .or_insert_with(|| TokenBucket::new(&limit, now))
            .try_acquire(now);

        if acquired {
            self.note_request(now);
        }
        acquired
    }

    /// Number of sources with an active bucket.
    pub fn tracked_sources(&self) -> usize {
        self.lock_buckets().len()
    }

    pub fn stats(&self) -> RateLimiterStats {
        let now = self.clock.now();
        let requests_last_minute = {
            let mut recent = self.lock_recent();
            prune(&mut recent, now);
            recent.len()
        };

        RateLimiterStats {
            tracked_sources: self.tracked_sources(),
            active_requests: self.active.load(Ordering::SeqCst),
            requests_last_minute,
        }
    }

    /// Refill every bucket to capacity and forget recent requests.
    ///
    /// Calls in progress keep their concurrency slots.
    pub fn reset(&self) {
        self.lock_buckets().clear();
        self.lock_recent().clear();
        debug!("Rate limiter: all buckets reset");
    }

    fn limit_for(&self, source: &str) -> RateLimit {
        self.lock_limits().get(source).cloned().unwrap_or_default()
    }

    fn gate_for(&self, source: &str) -> Arc<Semaphore> {
        let limit = self.limit_for(source);
        let mut gates = self.lock_gates();
        Arc::clone(
            gates
                .entry(source.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(limit.max_concurrency.max(1)))),
        )
    }

    fn note_request(&self, now: DateTime<Utc>) {
        let mut recent = self.lock_recent();
        recent.push_back(now);
        prune(&mut recent, now);
    }
}

/// Drop timestamps that fell out of the request window.
fn prune(recent: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    while let Some(oldest) = recent.front() {
        if elapsed_between(*oldest, now) < REQUEST_WINDOW {
            break;
        }
        recent.pop_front();
    }
}
