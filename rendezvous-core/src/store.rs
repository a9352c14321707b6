//! Polling correlation store.
//!
//! Producers park executed commands under their correlation key; consumers
//! wait for "their" key with a bounded, polling retrieval. Waiting uses
//! re-checks on the tokio clock rather than wakeups because producers may
//! store from call sites that share no notification channel with the
//! consumer. The cost is latency of at most one polling interval.

use std::time::Duration;

use dashmap::DashMap;
use rendezvous_log::{debug, trace, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::correlator::CorrelationKey;

/// Default pause between two lookups of a missing key.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(500);

/// Lower bound applied to configured polling intervals.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a cancellable lookup.
#[derive(Debug)]
pub enum Lookup<C> {
    /// The entry was present and has been removed from the store
    Found(C),
    /// The timeout elapsed first
    TimedOut,
    /// The cancellation token fired first
    Cancelled,
}

impl<C> Lookup<C> {
    pub fn into_option(self) -> Option<C> {
        match self {
            Lookup::Found(command) => Some(command),
            Lookup::TimedOut | Lookup::Cancelled => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Concurrent map from correlation key to executed command.
///
/// Every retrieval removes the entry it returns, so one stored command is
/// handed to at most one consumer.
pub struct CorrelationStore<C> {
    entries: DashMap<CorrelationKey, C>,
    polling_interval: Duration,
}

impl<C> CorrelationStore<C> {
    /// Create a store with the default polling interval.
    pub fn new() -> Self {
        Self::with_polling_interval(DEFAULT_POLLING_INTERVAL)
    }

    /// Create a store that re-checks missing keys every `interval`.
    pub fn with_polling_interval(interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            polling_interval: interval.max(MIN_POLLING_INTERVAL),
        }
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Make `command` available to lookups of `key`.
    ///
    /// A still-pending entry under the same key is replaced and dropped.
    pub fn store(&self, key: CorrelationKey, command: C) {
        debug!(target: "rendezvous::store", "Saving correlation entry for key '{}'", key);

        if self.entries.insert(key.clone(), command).is_some() {
            warn!(
                target: "rendezvous::store",
                "Replaced pending correlation entry for key '{}'; the previous command was never received",
                key
            );
        }
    }

    /// Remove and return the entry for `key` without waiting.
    pub fn try_find(&self, key: &CorrelationKey) -> Option<C> {
        self.entries.remove(key).map(|(_, command)| command)
    }

    /// Wait up to `timeout` for `key`, removing the entry on success.
    pub async fn find(&self, key: &CorrelationKey, timeout: Duration) -> Option<C> {
        self.find_with_cancel(key, timeout, &CancellationToken::new())
            .await
            .into_option()
    }

    /// Wait up to `timeout` for `key`, giving up early when `cancel` fires.
    ///
    /// Suspends only the calling task. Returns no earlier than `timeout` and
    /// no later than `timeout` plus one polling interval when nothing is
    /// stored.
    pub async fn find_with_cancel(
        &self,
        key: &CorrelationKey,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Lookup<C> {
        // Timeouts beyond the clock's range wait without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut attempts: u32 = 0;

        loop {
            if let Some(command) = self.try_find(key) {
                debug!(
                    target: "rendezvous::store",
                    "Found correlation entry for key '{}' after {} retries",
                    key, attempts
                );
                return Lookup::Found(command);
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(
                            target: "rendezvous::store",
                            "No correlation entry for key '{}' within {:?}",
                            key, timeout
                        );
                        return Lookup::TimedOut;
                    }
                    self.polling_interval.min(deadline - now)
                }
                None => self.polling_interval,
            };

            attempts = attempts.saturating_add(1);
            trace!(
                target: "rendezvous::store",
                "Reply for key '{}' did not arrive yet, retry {} in {:?}",
                key, attempts, pause
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(target: "rendezvous::store", "Lookup of key '{}' cancelled", key);
                    return Lookup::Cancelled;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Evict the entry for `key`, returning it if present.
    pub fn remove(&self, key: &CorrelationKey) -> Option<C> {
        let removed = self.try_find(key);
        if removed.is_some() {
            debug!(target: "rendezvous::store", "Evicted correlation entry for key '{}'", key);
        }
        removed
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the pending keys.
    pub fn keys(&self) -> Vec<CorrelationKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop every pending entry, returning how many were evicted.
    pub fn clear(&self) -> usize {
        let evicted = self.entries.len();
        self.entries.clear();
        evicted
    }
}

impl<C> Default for CorrelationStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for CorrelationStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationStore")
            .field("pending", &self.entries.len())
            .field("polling_interval", &self.polling_interval)
            .finish()
    }
}
