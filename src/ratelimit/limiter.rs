//! Core rate limiter implementation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::config::LimiterConfig;
use crate::error::Result;

use super::entry::TrackingEntry;
use super::registry::EvictionRegistry;

/// Outcome of an admission check.
///
/// Overflow is a normal outcome, not a fault: `Reject` is returned as data
/// and carries the message configured for the limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request is within quota and may proceed.
    Admit,
    /// The request exceeded quota.
    Reject {
        /// Message to relay to the rejected caller
        message: String,
    },
}

impl Decision {
    /// Returns `true` if the request was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit)
    }

    /// Get the rejection message, if the request was rejected.
    pub fn message(&self) -> Option<&str> {
        match self {
            Decision::Admit => None,
            Decision::Reject { message } => Some(message),
        }
    }
}

/// A named rate limiter enforcing a fixed quota per key per window.
///
/// This struct is thread-safe and can be shared across multiple tasks. Each
/// instance owns its key-to-entry map outright, so traffic against one
/// limiter can never interfere with the counters of another.
pub struct RateLimiter {
    shared: Arc<LimiterShared>,
}

/// State shared between a limiter handle and the eviction registry.
///
/// The registry holds only a weak reference; once the handle is dropped the
/// next sweep prunes the registration.
pub(crate) struct LimiterShared {
    /// Immutable configuration for this instance
    config: LimiterConfig,
    /// Tracking entries indexed by client key
    entries: DashMap<String, TrackingEntry>,
}

impl LimiterShared {
    pub(crate) fn key_prefix(&self) -> &str {
        &self.config.key_prefix
    }

    /// Remove every entry whose window has expired.
    ///
    /// Returns the number of entries removed.
    pub(crate) fn evict_expired(&self) -> usize {
        let window = self.config.window();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(window));
        before.saturating_sub(self.entries.len())
    }
}

impl RateLimiter {
    /// Create a new limiter and register it with the eviction registry.
    ///
    /// Fails with a configuration error if the window or quota is zero, or
    /// if another live limiter is already registered under the same
    /// `key_prefix`.
    pub fn new(config: LimiterConfig, registry: &EvictionRegistry) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(LimiterShared {
            config,
            entries: DashMap::new(),
        });
        registry.register(&shared)?;

        debug!(
            limiter = %shared.config.key_prefix,
            window_ms = shared.config.window_ms,
            max_requests = shared.config.max_requests,
            "Created rate limiter"
        );

        Ok(Self { shared })
    }

    /// Check whether a request from `key` is within quota.
    ///
    /// The first request from a key, and the first request after window
    /// expiry, always passes and restarts the count. Once the quota is
    /// reached, further requests in the same window are rejected; a
    /// rejection does not touch the entry, so hammering a limiter never
    /// extends its window. The check-then-count step runs under the entry's
    /// shard lock, so concurrent calls for the same key cannot both observe
    /// a pre-increment count.
    pub fn admit(&self, key: &str) -> Decision {
        let config = &self.shared.config;

        trace!(limiter = %config.key_prefix, key = %key, "Checking rate limit");

        match self.shared.entries.entry(key.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(TrackingEntry::new());
                Decision::Admit
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();

                if entry.is_expired(config.window()) {
                    entry.reset();
                    return Decision::Admit;
                }

                if entry.count() < config.max_requests {
                    entry.increment();
                    return Decision::Admit;
                }

                debug!(
                    limiter = %config.key_prefix,
                    key = %key,
                    "Rate limit exceeded"
                );
                Decision::Reject {
                    message: config.message.clone(),
                }
            }
        }
    }

    /// The configuration this limiter was created with.
    pub fn config(&self) -> &LimiterConfig {
        &self.shared.config
    }

    /// Get the current count for a key.
    ///
    /// Returns `None` if no entry exists for the key.
    pub fn current_count(&self, key: &str) -> Option<u64> {
        self.shared.entries.get(key).map(|entry| entry.count())
    }

    /// Get the number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.shared.entries.len()
    }

    /// Clear all tracking entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.shared.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn login_config() -> LimiterConfig {
        LimiterConfig::new(
            "login",
            300_000,
            5,
            "Muitas tentativas de login. Tente novamente em 5 minutos.",
        )
    }

    #[tokio::test]
    async fn test_first_request_admitted() {
        let registry = EvictionRegistry::new();
        let limiter = RateLimiter::new(login_config(), &registry).unwrap();

        assert!(limiter.admit("1.1.1.1").is_admitted());
        assert_eq!(limiter.current_count("1.1.1.1"), Some(1));
    }

    #[tokio::test]
    async fn test_quota_enforced() {
        let registry = EvictionRegistry::new();
        let limiter = RateLimiter::new(login_config(), &registry).unwrap();

        for i in 1..=5 {
            let decision = limiter.admit("2.2.2.2");
            assert!(decision.is_admitted(), "request {} should be admitted", i);
        }

        // The 6th request in the window is rejected with the configured message
        let decision = limiter.admit("2.2.2.2");
        assert_eq!(
            decision.message(),
            Some("Muitas tentativas de login. Tente novamente em 5 minutos.")
        );
    }

    #[tokio::test]
    async fn test_rejection_does_not_inflate_count() {
        let registry = EvictionRegistry::new();
        let limiter = RateLimiter::new(login_config(), &registry).unwrap();

        for _ in 0..8 {
            limiter.admit("2.2.2.2");
        }

        assert_eq!(limiter.current_count("2.2.2.2"), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_reset_after_expiry() {
        let registry = EvictionRegistry::new();
        let limiter = RateLimiter::new(login_config(), &registry).unwrap();

        for _ in 0..6 {
            limiter.admit("2.2.2.2");
        }
        assert!(!limiter.admit("2.2.2.2").is_admitted());

        tokio::time::advance(Duration::from_millis(300_001)).await;

        assert!(limiter.admit("2.2.2.2").is_admitted());
        assert_eq!(limiter.current_count("2.2.2.2"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_does_not_extend_window() {
        let registry = EvictionRegistry::new();
        let config = LimiterConfig::new("login", 1000, 1, "slow down");
        let limiter = RateLimiter::new(config, &registry).unwrap();

        limiter.admit("3.3.3.3");

        // Rejections halfway through the window must not restart it
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!limiter.admit("3.3.3.3").is_admitted());
        assert!(!limiter.admit("3.3.3.3").is_admitted());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(limiter.admit("3.3.3.3").is_admitted());
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let registry = EvictionRegistry::new();
        let limiter = RateLimiter::new(login_config(), &registry).unwrap();

        for _ in 0..6 {
            limiter.admit("4.4.4.4");
        }
        assert!(!limiter.admit("4.4.4.4").is_admitted());

        assert!(limiter.admit("5.5.5.5").is_admitted());
    }

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let registry = EvictionRegistry::new();
        let login = RateLimiter::new(login_config(), &registry).unwrap();
        let register = RateLimiter::new(
            LimiterConfig::new("register", 3_600_000, 3, "slow down"),
            &registry,
        )
        .unwrap();

        for _ in 0..4 {
            register.admit("6.6.6.6");
        }
        assert!(!register.admit("6.6.6.6").is_admitted());

        // The same key string under the login limiter is unaffected
        assert!(login.admit("6.6.6.6").is_admitted());
        assert_eq!(login.current_count("6.6.6.6"), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let registry = EvictionRegistry::new();

        let zero_window = LimiterConfig::new("login", 0, 5, "slow down");
        assert!(RateLimiter::new(zero_window, &registry).is_err());

        let zero_quota = LimiterConfig::new("login", 300_000, 0, "slow down");
        assert!(RateLimiter::new(zero_quota, &registry).is_err());
    }

    #[tokio::test]
    async fn test_clear_entries() {
        let registry = EvictionRegistry::new();
        let limiter = RateLimiter::new(login_config(), &registry).unwrap();

        limiter.admit("7.7.7.7");
        assert_eq!(limiter.tracked_keys(), 1);

        limiter.clear();
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
