//! Per-email cooldown for magic-link issuance.
//!
//! A soft in-process throttle: state lives in memory and is lost on restart.
//! The per-client rate limiter in `auth::rate_limit` is the harder backstop.

use dashmap::DashMap;
use std::time::{Duration, Instant};

const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Tracks the last accepted issuance time per normalized email.
pub struct Cooldowns {
    last_seen: DashMap<String, Instant>,
    window: Duration,
    max_entries: usize,
}

impl Cooldowns {
    pub fn new(window: Duration) -> Self {
        Self {
            last_seen: DashMap::new(),
            window,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    #[cfg(test)]
    pub fn with_max_entries(window: Duration, max_entries: usize) -> Self {
        Self {
            last_seen: DashMap::new(),
            window,
            max_entries,
        }
    }

    /// Record an issuance attempt for `email`.
    ///
    /// Returns `Err(retry_after)` when the email was accepted within the
    /// window. Rejected attempts do not extend the window, so a client
    /// retrying early never locks itself out past the original deadline.
    pub fn check_and_update(&self, email: &str) -> Result<(), Duration> {
        let now = Instant::now();

        if let Some(last) = self.last_seen.get(email) {
            let elapsed = now.duration_since(*last);
            if elapsed < self.window {
                return Err(self.window - elapsed);
            }
        }

        if self.last_seen.len() >= self.max_entries {
            self.purge_expired(now);
        }

        self.last_seen.insert(email.to_string(), now);
        Ok(())
    }

    /// Drop entries whose window has already elapsed
    fn purge_expired(&self, now: Instant) {
        self.last_seen.retain(|_, last| now.duration_since(*last) < self.window);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_attempt_within_window_rejected() {
        let cooldowns = Cooldowns::new(Duration::from_secs(30));

        assert!(cooldowns.check_and_update("a@example.com").is_ok());
        let retry_after = cooldowns.check_and_update("a@example.com").unwrap_err();
        assert!(retry_after <= Duration::from_secs(30));

        // Other emails are unaffected
        assert!(cooldowns.check_and_update("b@example.com").is_ok());
    }

    #[test]
    fn test_window_elapses() {
        let cooldowns = Cooldowns::new(Duration::ZERO);

        assert!(cooldowns.check_and_update("a@example.com").is_ok());
        assert!(cooldowns.check_and_update("a@example.com").is_ok());
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let cooldowns = Cooldowns::new(Duration::from_millis(50));

        assert!(cooldowns.check_and_update("a@example.com").is_ok());
        assert!(cooldowns.check_and_update("a@example.com").is_err());

        std::thread::sleep(Duration::from_millis(60));
        // The rejected attempt above must not have reset the timer
        assert!(cooldowns.check_and_update("a@example.com").is_ok());
    }

    #[test]
    fn test_capacity_purges_expired_entries() {
        let cooldowns = Cooldowns::with_max_entries(Duration::from_millis(10), 3);

        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            assert!(cooldowns.check_and_update(email).is_ok());
        }
        std::thread::sleep(Duration::from_millis(20));

        // At capacity with every entry stale, the next insert purges them
        assert!(cooldowns.check_and_update("d@x.com").is_ok());
        assert_eq!(cooldowns.len(), 1);
    }
}
