//! Framework guards that run on every request, before autoloaded ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;

use crate::config::schema::{EngineConfig, RateLimitConfig};
use crate::dispatch::context::RequestContext;
use crate::middleware::guard::{Guard, GuardRegistry};

pub const REQUEST_LOG_GUARD: &str = "RequestLogGuard";
pub const RATE_LIMIT_GUARD: &str = "RateLimitGuard";
pub const INPUT_GUARD: &str = "InputGuard";

/// Logs every request. Never rejects.
#[derive(Debug, Default)]
pub struct RequestLogGuard;

impl Guard for RequestLogGuard {
    fn evaluate(&self, ctx: &RequestContext) -> bool {
        tracing::info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            client = %ctx.client_key(),
            "Request received"
        );
        true
    }
}

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Whether the bucket would be full by now. A full bucket behaves like
    /// a fresh one, so it can be dropped.
    fn is_idle(&self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Evaluations between sweeps of idle buckets.
const PRUNE_INTERVAL: u64 = 1024;

/// Token bucket per client address.
///
/// Buckets that have refilled completely are swept every
/// `PRUNE_INTERVAL` evaluations, so the map only holds clients seen within
/// roughly `burst / rps` seconds.
pub struct RateLimitGuard {
    enabled: bool,
    rps: f64,
    burst: f64,
    buckets: DashMap<String, TokenBucket>,
    evaluations: AtomicU64,
}

impl RateLimitGuard {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            rps: f64::from(config.requests_per_second),
            burst: f64::from(config.burst_size.max(1)),
            buckets: DashMap::new(),
            evaluations: AtomicU64::new(0),
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that have refilled to capacity. Returns how many were
    /// removed.
    pub fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_idle(now, self.burst, self.rps));
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.buckets.len(), "Idle rate limit buckets pruned");
        }
        removed
    }
}

impl Guard for RateLimitGuard {
    fn evaluate(&self, ctx: &RequestContext) -> bool {
        if !self.enabled {
            return true;
        }
        let key = ctx.client_key();
        let allowed = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| TokenBucket::new(self.burst))
            .try_acquire(self.burst, self.rps);

        // the entry guard is released above; retain needs every shard
        let seen = self.evaluations.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % PRUNE_INTERVAL == 0 {
            self.prune_idle();
        }

        if !allowed {
            tracing::warn!(client = %key, "Rate limit exceeded");
        }
        allowed
    }
}

/// Rejects paths carrying control characters or markup.
#[derive(Debug)]
pub struct InputGuard {
    strict: bool,
}

impl InputGuard {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }
}

impl Guard for InputGuard {
    fn evaluate(&self, ctx: &RequestContext) -> bool {
        if !self.strict {
            return true;
        }
        !ctx
            .path
            .chars()
            .any(|c| c.is_control() || c == '<' || c == '>')
    }
}

/// Register the framework guards in the order they run.
pub fn install_framework_guards(registry: &mut GuardRegistry, config: &EngineConfig) {
    registry
        .register_framework(REQUEST_LOG_GUARD, RequestLogGuard)
        .register_framework(RATE_LIMIT_GUARD, RateLimitGuard::new(&config.rate_limit))
        .register_framework(INPUT_GUARD, InputGuard::new(config.security.strict_input));
}
