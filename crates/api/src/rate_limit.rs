use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Key count above which idle clients are swept out on the next call.
const SWEEP_AT_KEYS: usize = 10_000;

/// Sliding-window request counter keyed by client address.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    buckets: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests,
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        if buckets.len() > SWEEP_AT_KEYS {
            let window = self.window;
            buckets.retain(|_, hits| {
                hits.back()
                    .is_some_and(|last| now.saturating_duration_since(*last) <= window)
            });
        }

        let hits = buckets.entry(key.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) > self.window)
        {
            hits.pop_front();
        }
        if hits.len() >= self.max_requests {
            return false;
        }
        hits.push_back(now);
        true
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_and_recovers_after_window() {
        let limiter = IpRateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", start));
        assert!(limiter.allow_at("10.0.0.1", start));
        assert!(!limiter.allow_at("10.0.0.1", start));
        assert!(limiter.allow_at("10.0.0.2", start));
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(61)));
    }

    #[test]
    fn idle_clients_are_swept_once_the_map_grows() {
        let limiter = IpRateLimiter::new(Duration::from_secs(60), 5);
        let start = Instant::now();
        for n in 0..=SWEEP_AT_KEYS {
            limiter.allow_at(&format!("client-{n}"), start);
        }
        assert_eq!(limiter.tracked_keys(), SWEEP_AT_KEYS + 1);

        assert!(limiter.allow_at("late", start + Duration::from_secs(120)));
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
