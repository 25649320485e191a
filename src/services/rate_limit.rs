use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// In-process sliding-window counter, keyed by caller identifier (client IP
/// for the contact endpoint). State lives for the process lifetime only;
/// expiry is checked at read time, so stale entries self-correct even if
/// `sweep_expired` never runs.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    entries: HashMap<String, WindowEntry>,
}

struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: HashMap::new(),
        }
    }

    pub fn check(&mut self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        match self.entries.get_mut(key) {
            Some(entry) if now <= entry.reset_at => {
                if entry.count >= self.max_requests {
                    return RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: entry.reset_at,
                    };
                }
                entry.count += 1;
                RateLimitDecision {
                    allowed: true,
                    remaining: self.max_requests - entry.count,
                    reset_at: entry.reset_at,
                }
            }
            _ => {
                let reset_at = now + self.window;
                self.entries
                    .insert(key.to_string(), WindowEntry { count: 1, reset_at });
                RateLimitDecision {
                    allowed: true,
                    remaining: self.max_requests - 1,
                    reset_at,
                }
            }
        }
    }

    /// Drops expired windows to bound memory growth.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| now <= entry.reset_at);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        "2025-06-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn allows_up_to_max_then_denies() {
        let mut limiter = RateLimiter::new(3, Duration::minutes(15));
        let now = t0();

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("1.2.3.4", now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let denied = limiter.check("1.2.3.4", now + Duration::minutes(1));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, t0() + Duration::minutes(15));
    }

    #[test]
    fn window_resets_after_expiry() {
        let mut limiter = RateLimiter::new(3, Duration::minutes(15));
        let now = t0();

        for _ in 0..3 {
            limiter.check("1.2.3.4", now);
        }
        assert!(!limiter.check("1.2.3.4", now).allowed);

        let later = now + Duration::minutes(16);
        let decision = limiter.check("1.2.3.4", later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_at, later + Duration::minutes(15));
    }

    #[test]
    fn keys_are_independent() {
        let mut limiter = RateLimiter::new(1, Duration::minutes(15));
        let now = t0();

        assert!(limiter.check("a", now).allowed);
        assert!(!limiter.check("a", now).allowed);
        assert!(limiter.check("b", now).allowed);
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let mut limiter = RateLimiter::new(3, Duration::minutes(15));
        let now = t0();

        limiter.check("old", now);
        limiter.check("fresh", now + Duration::minutes(10));
        limiter.sweep_expired(now + Duration::minutes(16));

        assert_eq!(limiter.len(), 1);
        // The fresh window is still counting.
        let decision = limiter.check("fresh", now + Duration::minutes(17));
        assert_eq!(decision.remaining, 1);
    }
}
