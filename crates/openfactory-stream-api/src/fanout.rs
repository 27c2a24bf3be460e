//! The fan-out index: `AssetUuid -> ordered list of subscriber queues`.
//!
//! Mutated by subscribe/unsubscribe on the connection side; read by the
//! dispatcher on the background-worker side. The dispatcher never holds
//! the lock across an enqueue: it takes a read lock, clones the senders
//! registered for a key, drops the lock, then sends to each clone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use openfactory_core::AssetUuid;
use tokio::sync::mpsc;

pub type SubscriberId = u64;

#[derive(Clone)]
struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<String>,
}

#[derive(Clone, Default)]
pub struct FanoutIndex {
    inner: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
    next_id: Arc<AtomicU64>,
}

impl FanoutIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new bounded subscriber queue for `asset` and returns its
    /// id (for later unregistration) plus the receiving half.
    pub fn subscribe(&self, asset: &AssetUuid, capacity: usize) -> (SubscriberId, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.inner.write().expect("fan-out index lock poisoned");
        guard
            .entry(asset.as_str().to_string())
            .or_default()
            .push(Subscriber { id, sender });

        (id, receiver)
    }

    /// Removes the subscriber queue `id` registered under `asset`. If the
    /// asset's list becomes empty, the key itself is removed.
    pub fn unsubscribe(&self, asset: &AssetUuid, id: SubscriberId) {
        let mut guard = self.inner.write().expect("fan-out index lock poisoned");
        if let Some(subs) = guard.get_mut(asset.as_str()) {
            subs.retain(|sub| sub.id != id);
            if subs.is_empty() {
                guard.remove(asset.as_str());
            }
        }
    }

    /// Snapshot of the sender handles currently registered for `key`
    /// (the raw Kafka message key, not yet validated as an `AssetUuid`).
    /// Taken under the read lock and cloned out so the caller can enqueue
    /// without holding the lock.
    pub fn snapshot(&self, key: &str) -> Vec<mpsc::Sender<String>> {
        let guard = self.inner.read().expect("fan-out index lock poisoned");
        guard
            .get(key)
            .map(|subs| subs.iter().map(|s| s.sender.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of subscribers currently registered for `asset`. Exposed for
    /// tests exercising fan-out behaviour from outside this crate.
    pub fn subscriber_count(&self, asset: &AssetUuid) -> usize {
        let guard = self.inner.read().expect("fan-out index lock poisoned");
        guard.get(asset.as_str()).map(Vec::len).unwrap_or(0)
    }

    /// Whether `asset` currently has any registered subscriber.
    pub fn contains_key(&self, asset: &AssetUuid) -> bool {
        let guard = self.inner.read().expect("fan-out index lock poisoned");
        guard.contains_key(asset.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_then_unsubscribe_removes_empty_key() {
        let index = FanoutIndex::new();
        let asset = AssetUuid::parse("A").unwrap();

        let (id, _rx) = index.subscribe(&asset, 10);
        assert!(index.contains_key(&asset));
        assert_eq!(index.subscriber_count(&asset), 1);

        index.unsubscribe(&asset, id);
        assert!(!index.contains_key(&asset));
    }

    #[test]
    fn multiple_subscribers_on_same_asset_are_independent() {
        let index = FanoutIndex::new();
        let asset = AssetUuid::parse("A").unwrap();

        let (id1, _rx1) = index.subscribe(&asset, 10);
        let (_id2, _rx2) = index.subscribe(&asset, 10);
        assert_eq!(index.subscriber_count(&asset), 2);

        index.unsubscribe(&asset, id1);
        assert_eq!(index.subscriber_count(&asset), 1);
    }

    #[tokio::test]
    async fn snapshot_reaches_every_registered_subscriber() {
        let index = FanoutIndex::new();
        let asset = AssetUuid::parse("A").unwrap();
        let (_id1, mut rx1) = index.subscribe(&asset, 10);
        let (_id2, mut rx2) = index.subscribe(&asset, 10);

        for sender in index.snapshot(asset.as_str()) {
            sender.send("payload".to_string()).await.unwrap();
        }

        assert_eq!(rx1.recv().await.unwrap(), "payload");
        assert_eq!(rx2.recv().await.unwrap(), "payload");
    }

    #[test]
    fn snapshot_of_unknown_key_is_empty() {
        let index = FanoutIndex::new();
        assert!(index.snapshot("nobody-subscribed").is_empty());
    }

    proptest::proptest! {
        #[test]
        fn subscriber_count_tracks_net_subscribe_minus_unsubscribe(n_subscribe in 1usize..20, n_unsubscribe in 0usize..20) {
            let index = FanoutIndex::new();
            let asset = AssetUuid::parse("A").unwrap();

            let ids: Vec<_> = (0..n_subscribe).map(|_| index.subscribe(&asset, 4).0).collect();
            let removed = n_unsubscribe.min(n_subscribe);
            for id in ids.iter().take(removed) {
                index.unsubscribe(&asset, *id);
            }

            let expected = n_subscribe - removed;
            if expected == 0 {
                proptest::prop_assert!(!index.contains_key(&asset));
            } else {
                proptest::prop_assert_eq!(index.subscriber_count(&asset), expected);
            }
        }
    }
}
