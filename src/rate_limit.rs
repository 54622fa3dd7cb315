use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Millisecond clock, injectable so tests can advance time by hand.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Test clock driven manually.
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn advance_ms(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_ms(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Operation classes subject to quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    ShipSubmit,
    Register,
    Ack,
}

impl OpClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShipSubmit => "ship",
            Self::Register => "register",
            Self::Ack => "ack",
        }
    }
}

/// Per-class quotas: (max count, window in milliseconds).
#[derive(Debug, Clone)]
pub struct Quotas {
    pub ships_per_window: u32,
    pub ship_window_ms: u64,
    pub registrations_per_window: u32,
    pub registration_window_ms: u64,
    pub acks_per_window: u32,
    pub ack_window_ms: u64,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            ships_per_window: 10,
            ship_window_ms: 60_000,
            registrations_per_window: 5,
            registration_window_ms: 3_600_000,
            acks_per_window: 30,
            ack_window_ms: 60_000,
        }
    }
}

impl Quotas {
    fn limits(&self, class: OpClass) -> (u32, u64) {
        match class {
            OpClass::ShipSubmit => (self.ships_per_window, self.ship_window_ms),
            OpClass::Register => (self.registrations_per_window, self.registration_window_ms),
            OpClass::Ack => (self.acks_per_window, self.ack_window_ms),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub count: u32,
    pub reset_at_ms: u64,
}

/// The only shared mutable state in the pipeline. Single-process deployments
/// use [`InMemoryCounter`]; a multi-instance deployment swaps in a shared
/// external counter without touching callers.
pub trait Counter: Send + Sync {
    fn increment(&self, key: &str, window_ms: u64) -> Hit;
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_start_ms: u64,
}

pub struct InMemoryCounter<C: Clock> {
    clock: C,
    inner: Mutex<HashMap<String, Bucket>>,
}

impl<C: Clock> InMemoryCounter<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<C: Clock> Counter for InMemoryCounter<C> {
    fn increment(&self, key: &str, window_ms: u64) -> Hit {
        let now = self.clock.now_ms();
        let mut map = self.inner.lock().unwrap();
        let bucket = map.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            window_start_ms: now,
        });

        // Fixed window: reset strictly at the boundary.
        if now >= bucket.window_start_ms + window_ms {
            bucket.count = 0;
            bucket.window_start_ms = now;
        }

        bucket.count += 1;
        Hit {
            count: bucket.count,
            reset_at_ms: bucket.window_start_ms + window_ms,
        }
    }
}

/// Quota enforcement over a [`Counter`], keyed by (operation class, principal).
pub struct RateLimiter {
    counter: Box<dyn Counter>,
    quotas: Quotas,
}

#[derive(Debug)]
pub struct RateExceeded {
    pub retry_after_secs: u64,
}

impl RateLimiter {
    pub fn new(counter: Box<dyn Counter>, quotas: Quotas) -> Self {
        Self { counter, quotas }
    }

    /// Increment and enforce. Returns the retry-after hint on rejection,
    /// derived from the time remaining in the current window.
    pub fn check(&self, class: OpClass, principal: &str, now_ms: u64) -> Result<(), RateExceeded> {
        let (quota, window_ms) = self.quotas.limits(class);
        let key = format!("{}:{}", class.as_str(), principal);
        let hit = self.counter.increment(&key, window_ms);
        if hit.count > quota {
            let remaining_ms = hit.reset_at_ms.saturating_sub(now_ms);
            return Err(RateExceeded {
                // Round up so retry_after is never 0 mid-window.
                retry_after_secs: remaining_ms.div_ceil(1000).max(1),
            });
        }
        Ok(())
    }
}
