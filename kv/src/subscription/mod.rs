//! The subscription table: per-key subscriber lists, independent from the
//! data table and always locked after it (see the lock-order summary on
//! `kv::kvs::Server`).

use std::sync::RwLock;

use crate::constants::TABLE_SIZE;
use crate::table::bucket_index;

/// A connected client's notification endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscriber {
    pub client_id: String,
    pub notif_path: String,
}

#[derive(Default)]
struct Row {
    key: String,
    subscribers: Vec<Subscriber>,
}

#[derive(Default)]
struct Bucket {
    rows: Vec<Row>,
}

/// Result of a `subscribe` call.
#[derive(Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Ok,
    KeyMissing,
}

/// Result of an `unsubscribe` call.
#[derive(Debug, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Ok,
    NotSubscribed,
}

/// Independent fixed-bucket map of `key -> subscriber set`, one `RwLock` per
/// bucket (reusing the data table's bucket count and hash for simplicity;
/// the two tables are otherwise unrelated).
pub struct SubscriptionTable {
    buckets: Vec<RwLock<Bucket>>,
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionTable {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(TABLE_SIZE);
        for _ in 0..TABLE_SIZE {
            buckets.push(RwLock::new(Bucket::default()));
        }
        SubscriptionTable { buckets }
    }

    /// Adds `subscriber` to `key`'s row, creating the row if absent.
    /// Idempotent: re-subscribing the same client is a no-op success.
    /// Callers must have already verified `key` exists in the data table.
    pub fn subscribe(&self, key: &str, subscriber: Subscriber) -> SubscribeOutcome {
        let mut bucket = self.buckets[bucket_index(key)].write().unwrap();
        match bucket.rows.iter_mut().find(|r| r.key == key) {
            Some(row) => {
                if !row.subscribers.contains(&subscriber) {
                    row.subscribers.push(subscriber);
                }
            }
            None => {
                bucket.rows.push(Row { key: key.to_string(), subscribers: vec![subscriber] });
            }
        }
        SubscribeOutcome::Ok
    }

    pub fn unsubscribe(&self, key: &str, client_id: &str) -> UnsubscribeOutcome {
        let mut bucket = self.buckets[bucket_index(key)].write().unwrap();
        if let Some(row) = bucket.rows.iter_mut().find(|r| r.key == key) {
            let before = row.subscribers.len();
            row.subscribers.retain(|s| s.client_id != client_id);
            if row.subscribers.is_empty() {
                bucket.rows.retain(|r| r.key != key);
            }
            if row.subscribers.len() < before {
                return UnsubscribeOutcome::Ok;
            }
        }
        UnsubscribeOutcome::NotSubscribed
    }

    /// Removes `client_id` from every row across every bucket, pruning rows
    /// that become empty. Invoked on disconnect.
    pub fn remove_client(&self, client_id: &str) {
        for bucket in &self.buckets {
            let mut bucket = bucket.write().unwrap();
            for row in bucket.rows.iter_mut() {
                row.subscribers.retain(|s| s.client_id != client_id);
            }
            bucket.rows.retain(|r| !r.subscribers.is_empty());
        }
    }

    /// Prunes the row for `key`, invoked when `delete_pair` succeeds.
    pub fn delete_key(&self, key: &str) {
        let mut bucket = self.buckets[bucket_index(key)].write().unwrap();
        bucket.rows.retain(|r| r.key != key);
    }

    /// Snapshots the current subscribers of `key` under the shared lock,
    /// then releases it. Callers dispatch notifications outside the lock,
    /// per the lock-order discipline in §4.3.
    pub fn snapshot_subscribers(&self, key: &str) -> Vec<Subscriber> {
        let bucket = self.buckets[bucket_index(key)].read().unwrap();
        bucket
            .rows
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.subscribers.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(id: &str) -> Subscriber {
        Subscriber { client_id: id.to_string(), notif_path: format!("/tmp/notif{}", id) }
    }

    #[test]
    fn subscribe_is_idempotent() {
        let table = SubscriptionTable::new();
        assert_eq!(table.subscribe("k", sub("c1")), SubscribeOutcome::Ok);
        assert_eq!(table.subscribe("k", sub("c1")), SubscribeOutcome::Ok);
        assert_eq!(table.snapshot_subscribers("k").len(), 1);
    }

    #[test]
    fn unsubscribe_unknown_client_fails() {
        let table = SubscriptionTable::new();
        table.subscribe("k", sub("c1"));
        assert_eq!(table.unsubscribe("k", "c2"), UnsubscribeOutcome::NotSubscribed);
    }

    #[test]
    fn remove_client_prunes_empty_rows() {
        let table = SubscriptionTable::new();
        table.subscribe("k", sub("c1"));
        table.remove_client("c1");
        assert!(table.snapshot_subscribers("k").is_empty());
    }

    #[test]
    fn delete_key_prunes_row() {
        let table = SubscriptionTable::new();
        table.subscribe("k", sub("c1"));
        table.delete_key("k");
        assert!(table.snapshot_subscribers("k").is_empty());
    }

    #[test]
    fn two_subscribers_both_appear() {
        let table = SubscriptionTable::new();
        table.subscribe("k", sub("c1"));
        table.subscribe("k", sub("c2"));
        let subs = table.snapshot_subscribers("k");
        assert_eq!(subs.len(), 2);
    }
}
