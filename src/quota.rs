//! Upstream rate-limit state (spec.md §3 `RateState`, §5).
//!
//! A single scalar timestamp, not the teacher's per-client token-bucket
//! rate limiter in `rate_limit.rs` — this tracks only the shared upstream
//! quota window advertised by the geo-IP service's `X-Rl`/`X-Ttl` headers.
//! Last-writer-wins under concurrent updates is acceptable per spec.md §5.

use std::sync::atomic::{AtomicI64, Ordering};

/// `reset_at`: the epoch second at or after which upstream calls are
/// permitted again. `0` means never rate-limited.
pub struct RateState {
    reset_at: AtomicI64,
}

impl RateState {
    pub fn new() -> Self {
        Self {
            reset_at: AtomicI64::new(0),
        }
    }

    /// `true` when `now` is still within an active rate-limit window.
    pub fn is_limited(&self, now: i64) -> bool {
        now < self.reset_at.load(Ordering::Relaxed)
    }

    pub fn reset_at(&self) -> i64 {
        self.reset_at.load(Ordering::Relaxed)
    }

    pub fn set_reset_at(&self, reset_at: i64) {
        self.reset_at.store(reset_at, Ordering::Relaxed);
    }
}

impl Default for RateState {
    fn default() -> Self {
        Self::new()
    }
}
