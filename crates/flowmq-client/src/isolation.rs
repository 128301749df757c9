//! Endpoint isolation registry.
//!
//! When a send attempt fails at the transport level, the broker endpoint it
//! targeted is marked isolated. The partition selector reads a snapshot of
//! this set on every send and steers new attempts away from isolated
//! endpoints while alternatives exist. Isolation is advisory: when every
//! candidate is isolated the selector falls back to all of them rather
//! than refusing to send.
//!
//! Entries expire after a fixed duration, so a broker that was briefly
//! unreachable is re-admitted without an explicit probe; `unisolate`
//! removes an entry immediately.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::route::Endpoints;

/// How long an endpoint stays isolated unless explicitly re-admitted.
pub const DEFAULT_ISOLATION_DURATION: Duration = Duration::from_secs(30);

/// Set of endpoints currently considered unhealthy, scoped to one client
/// instance and shared by every producer on it.
pub struct IsolationRegistry {
    entries: RwLock<HashMap<Endpoints, Instant>>,
    duration: Duration,
}

impl IsolationRegistry {
    pub fn new(duration: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            duration,
        }
    }

    /// Marks an endpoint unhealthy, refreshing the expiry if it already is.
    pub async fn isolate(&self, endpoints: Endpoints) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, isolated_at| now.duration_since(*isolated_at) < self.duration);
        debug!(endpoints = %endpoints, "isolating endpoint");
        entries.insert(endpoints, now);
    }

    /// Re-admits an endpoint immediately.
    pub async fn unisolate(&self, endpoints: &Endpoints) {
        if self.entries.write().await.remove(endpoints).is_some() {
            debug!(endpoints = %endpoints, "endpoint re-admitted");
        }
    }

    /// Point-in-time copy of the isolated set, expired entries excluded.
    pub async fn snapshot(&self) -> HashSet<Endpoints> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, isolated_at)| now.duration_since(**isolated_at) < self.duration)
            .map(|(endpoints, _)| endpoints.clone())
            .collect()
    }
}

impl Default for IsolationRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ISOLATION_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Address;

    fn endpoints(host: &str) -> Endpoints {
        Endpoints::new(vec![Address::new(host, 8081)]).unwrap()
    }

    #[tokio::test]
    async fn isolate_and_unisolate() {
        let registry = IsolationRegistry::default();
        registry.isolate(endpoints("broker-a")).await;
        registry.isolate(endpoints("broker-b")).await;
        assert_eq!(registry.snapshot().await.len(), 2);

        registry.unisolate(&endpoints("broker-a")).await;
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&endpoints("broker-b")));
    }

    #[tokio::test]
    async fn entries_expire() {
        let registry = IsolationRegistry::new(Duration::from_millis(20));
        registry.isolate(endpoints("broker-a")).await;
        assert_eq!(registry.snapshot().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_a_copy() {
        let registry = IsolationRegistry::default();
        registry.isolate(endpoints("broker-a")).await;
        let snapshot = registry.snapshot().await;

        registry.isolate(endpoints("broker-b")).await;
        assert_eq!(snapshot.len(), 1);
    }
}
