//! Process-wide eviction registry shared by all limiter instances.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::config::LimiterConfig;
use crate::error::{Result, TurnstileError};

use super::limiter::{LimiterShared, RateLimiter};

/// Registry of live limiter instances reachable by the eviction sweep.
///
/// Constructed once at process startup and handed to each limiter at
/// creation time, so the coupling between instances and the sweep is
/// explicit rather than hidden in module state. The registry holds weak
/// references only: dropping a limiter handle retires its state, and the
/// next sweep prunes the stale registration.
pub struct EvictionRegistry {
    /// Registered limiter state, indexed by key prefix
    limiters: RwLock<HashMap<String, Weak<LimiterShared>>>,
}

impl EvictionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
        }
    }

    /// Create limiters for every configuration in `configs`.
    ///
    /// Returned in the same order as the configurations. Fails on the first
    /// invalid or duplicate configuration.
    pub fn create_limiters(&self, configs: &[LimiterConfig]) -> Result<Vec<RateLimiter>> {
        configs
            .iter()
            .map(|config| RateLimiter::new(config.clone(), self))
            .collect()
    }

    /// Register a limiter's shared state under its key prefix.
    ///
    /// A prefix may be reused once its previous holder has been dropped,
    /// but two live limiters can never share one.
    pub(crate) fn register(&self, shared: &Arc<LimiterShared>) -> Result<()> {
        let mut limiters = self.limiters.write();

        if let Some(existing) = limiters.get(shared.key_prefix()) {
            if existing.strong_count() > 0 {
                return Err(TurnstileError::Config(format!(
                    "limiter \"{}\" is already registered",
                    shared.key_prefix()
                )));
            }
        }

        limiters.insert(shared.key_prefix().to_owned(), Arc::downgrade(shared));
        Ok(())
    }

    /// Run one eviction pass over every registered limiter.
    ///
    /// Each instance is handled independently: expired entries are removed
    /// using that instance's own window, and an instance whose handle has
    /// been dropped is pruned from the registry without disturbing the rest
    /// of the pass.
    ///
    /// Returns the total number of entries removed.
    pub fn sweep(&self) -> usize {
        let snapshot: Vec<(String, Weak<LimiterShared>)> = {
            let limiters = self.limiters.read();
            limiters
                .iter()
                .map(|(prefix, weak)| (prefix.clone(), weak.clone()))
                .collect()
        };

        let mut removed = 0;
        let mut dropped = Vec::new();

        for (prefix, weak) in snapshot {
            match weak.upgrade() {
                Some(shared) => {
                    let evicted = shared.evict_expired();
                    if evicted > 0 {
                        trace!(limiter = %prefix, evicted = evicted, "Evicted expired entries");
                    }
                    removed += evicted;
                }
                None => {
                    debug!(limiter = %prefix, "Limiter dropped, pruning registration");
                    dropped.push(prefix);
                }
            }
        }

        if !dropped.is_empty() {
            let mut limiters = self.limiters.write();
            for prefix in dropped {
                limiters.remove(&prefix);
            }
        }

        removed
    }

    /// Get the number of registered limiter instances.
    pub fn instance_count(&self) -> usize {
        self.limiters.read().len()
    }
}

impl Default for EvictionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
