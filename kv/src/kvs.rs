//! The `Server` handle: owns the data table and subscription table for one
//! `init..terminate` lifetime, and implements the core KVS operations.
//!
//! Per the lock-order discipline: `T -> B[i] (ascending) -> subscription
//! lock -> notification channel write`. The table and subscription modules
//! enforce bucket-ascending and subscription-after-data ordering
//! internally; this module is responsible for holding `T` shared for the
//! full duration of every operation but `terminate` (which takes `T`
//! exclusive), so that no operation's bucket work or notification dispatch
//! can race a concurrent `terminate`'s exclusive clear.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::backup::BackupThrottle;
use crate::constants::MAX_WRITE_SIZE;
use crate::error::{CResult, Error};
use crate::notify::{self, Event};
use crate::subscription::{SubscribeOutcome, Subscriber, SubscriptionTable, UnsubscribeOutcome};
use crate::table::HashTable;

const UNINITIALIZED: u8 = 0;
const RUNNING: u8 = 1;
const TERMINATED: u8 = 2;

/// Outcome of a single `read` within a batch.
pub enum ReadResult {
    Found(String, String),
    Missing(String),
}

/// Outcome of a single `delete` within a batch.
pub enum DeleteResult {
    Deleted(String),
    Missing(String),
}

/// The engine handle. Cloned as `Arc<Server>` into every worker, client
/// handler, and acceptor thread (see §4.6).
pub struct Server {
    state: AtomicU8,
    table: HashTable,
    subscriptions: SubscriptionTable,
    backups: Mutex<BackupThrottle>,
}

impl Server {
    /// Constructs a fresh, `Running` server. Mirrors the original's
    /// `kvs_init`, but returns an owned handle instead of mutating globals.
    pub fn init(max_backups: usize) -> CResult<Self> {
        Ok(Server {
            state: AtomicU8::new(RUNNING),
            table: HashTable::new(),
            subscriptions: SubscriptionTable::new(),
            backups: Mutex::new(BackupThrottle::new(max_backups)),
        })
    }

    fn require_running(&self) -> CResult<()> {
        if self.state.load(Ordering::SeqCst) == RUNNING {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Upserts every `(key, value)` pair, emitting a write notification per
    /// pair that was stored. Continues past any failed pair, logging it.
    /// Rejects batches longer than `MAX_WRITE_SIZE`.
    pub fn write(&self, pairs: &[(String, String)]) -> CResult<()> {
        self.require_running()?;
        if pairs.len() > MAX_WRITE_SIZE {
            return Err(Error::BatchTooLarge(pairs.len()));
        }
        self.table.lock_shared(|| {
            self.table.write_batch(pairs);
            for (key, value) in pairs {
                notify::dispatch(&self.subscriptions, Event::Write { key: key.clone(), value: value.clone() });
            }
        });
        Ok(())
    }

    /// Reads every key, in input order. Per §4.2 the caller of a job/CLI
    /// front-end is expected to sort this output by key before emission;
    /// this method itself preserves input order so batch semantics stay
    /// independent of output formatting. Rejects batches longer than
    /// `MAX_WRITE_SIZE`.
    pub fn read(&self, keys: &[String]) -> CResult<Vec<ReadResult>> {
        self.require_running()?;
        if keys.len() > MAX_WRITE_SIZE {
            return Err(Error::BatchTooLarge(keys.len()));
        }
        let values = self.table.lock_shared(|| self.table.read_batch(keys));
        Ok(keys
            .iter()
            .zip(values)
            .map(|(k, v)| match v {
                Some(v) => ReadResult::Found(k.clone(), v),
                None => ReadResult::Missing(k.clone()),
            })
            .collect())
    }

    /// Deletes every key present. Each deleted key's subscription row is
    /// pruned and its subscribers notified (opcode 6) via `notify::dispatch`.
    /// Rejects batches longer than `MAX_WRITE_SIZE`.
    pub fn delete(&self, keys: &[String]) -> CResult<Vec<DeleteResult>> {
        self.require_running()?;
        if keys.len() > MAX_WRITE_SIZE {
            return Err(Error::BatchTooLarge(keys.len()));
        }
        let results = self.table.lock_shared(|| {
            let hits = self.table.delete_batch(keys);
            let mut results = Vec::with_capacity(keys.len());
            for (key, hit) in keys.iter().zip(hits) {
                if hit {
                    notify::dispatch(&self.subscriptions, Event::Delete { key: key.clone() });
                    results.push(DeleteResult::Deleted(key.clone()));
                } else {
                    results.push(DeleteResult::Missing(key.clone()));
                }
            }
            results
        });
        Ok(results)
    }

    /// Snapshots every pair currently in the table, no cross-bucket
    /// ordering guarantee.
    pub fn show(&self) -> CResult<Vec<(String, String)>> {
        self.require_running()?;
        Ok(self.table.lock_shared(|| self.table.snapshot()))
    }

    /// `subscribe(client, key)`: fails with `KeyMissing` unless `key`
    /// currently exists in the data table. The data-table lookup happens
    /// before the subscription table is touched, preserving lock order.
    pub fn subscribe(&self, client_id: &str, notif_path: &str, key: &str) -> CResult<()> {
        self.require_running()?;
        if !self.table.contains(key) {
            return Err(Error::KeyMissing(key.to_string()));
        }
        match self.subscriptions.subscribe(
            key,
            Subscriber { client_id: client_id.to_string(), notif_path: notif_path.to_string() },
        ) {
            SubscribeOutcome::Ok => Ok(()),
            SubscribeOutcome::KeyMissing => Err(Error::KeyMissing(key.to_string())),
        }
    }

    pub fn unsubscribe(&self, client_id: &str, key: &str) -> CResult<()> {
        self.require_running()?;
        match self.subscriptions.unsubscribe(key, client_id) {
            UnsubscribeOutcome::Ok => Ok(()),
            UnsubscribeOutcome::NotSubscribed => Err(Error::NotSubscribed),
        }
    }

    /// Removes a disconnecting (or SIGUSR1-evicted) client from every
    /// subscription row.
    pub fn remove_client(&self, client_id: &str) {
        self.subscriptions.remove_client(client_id);
    }

    /// Snapshots the table while holding `T` shared across a `fork`, per
    /// §4.2/§9. Throttled to `max_backups` outstanding children.
    pub fn backup(&self, out_path: &std::path::Path) -> CResult<()> {
        self.require_running()?;
        self.table.lock_shared(|| {
            let pairs = self.table.snapshot();
            let mut throttle = self.backups.lock().unwrap();
            throttle.spawn(out_path, pairs)
        })
    }

    /// Blocks the calling thread for `ms` milliseconds.
    pub fn wait(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    /// Drains outstanding backup children, then clears the table and every
    /// subscription, transitioning to `Terminated`. Idempotent: a second
    /// call observes `Terminated` and returns `NotInitialized`, matching the
    /// state machine in §4.2 (any non-`Running` state fails operations).
    pub fn terminate(&self) -> CResult<()> {
        let prior = self.state.swap(TERMINATED, Ordering::SeqCst);
        if prior != RUNNING {
            return Err(Error::NotInitialized);
        }
        self.backups.lock().unwrap().drain();
        self.table.lock_exclusive(|| self.table.clear());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_roundtrip() {
        let server = Server::init(4).unwrap();
        server.write(&[("a".into(), "1".into()), ("b".into(), "2".into())]).unwrap();
        let results = server.read(&["a".to_string(), "b".to_string(), "c".to_string()]).unwrap();
        assert!(matches!(&results[0], ReadResult::Found(k, v) if k == "a" && v == "1"));
        assert!(matches!(&results[1], ReadResult::Found(k, v) if k == "b" && v == "2"));
        assert!(matches!(&results[2], ReadResult::Missing(k) if k == "c"));
    }

    #[test]
    fn delete_with_miss_list() {
        let server = Server::init(4).unwrap();
        server.write(&[("a".into(), "1".into())]).unwrap();
        let results = server.delete(&["a".to_string(), "b".to_string()]).unwrap();
        assert!(matches!(&results[0], DeleteResult::Deleted(k) if k == "a"));
        assert!(matches!(&results[1], DeleteResult::Missing(k) if k == "b"));

        let read = server.read(&["a".to_string()]).unwrap();
        assert!(matches!(&read[0], ReadResult::Missing(_)));
    }

    #[test]
    fn subscribe_to_missing_key_fails() {
        let server = Server::init(4).unwrap();
        let err = server.subscribe("c1", "/tmp/notifX", "ghost").unwrap_err();
        assert!(matches!(err, Error::KeyMissing(_)));
    }

    #[test]
    fn operations_fail_after_terminate() {
        let server = Server::init(4).unwrap();
        server.write(&[("a".into(), "1".into())]).unwrap();
        server.terminate().unwrap();
        let err = server.write(&[("b".into(), "2".into())]).unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[test]
    fn write_rejects_oversized_batch() {
        let server = Server::init(4).unwrap();
        let pairs: Vec<(String, String)> = (0..MAX_WRITE_SIZE + 1).map(|n| (n.to_string(), n.to_string())).collect();
        assert!(matches!(server.write(&pairs).unwrap_err(), Error::BatchTooLarge(_)));
    }

    #[test]
    fn read_rejects_oversized_batch() {
        let server = Server::init(4).unwrap();
        let keys: Vec<String> = (0..MAX_WRITE_SIZE + 1).map(|n| n.to_string()).collect();
        assert!(matches!(server.read(&keys).unwrap_err(), Error::BatchTooLarge(_)));
    }

    #[test]
    fn double_terminate_fails() {
        let server = Server::init(4).unwrap();
        server.terminate().unwrap();
        assert!(matches!(server.terminate().unwrap_err(), Error::NotInitialized));
    }

    #[test]
    fn delete_of_subscribed_key_prevents_resubscribe() {
        let server = Server::init(4).unwrap();
        server.write(&[("k".into(), "1".into())]).unwrap();
        server.subscribe("c1", "/nonexistent/path", "k").unwrap();
        server.delete(&["k".to_string()]).unwrap();
        let err = server.subscribe("c2", "/nonexistent/path", "k").unwrap_err();
        assert!(matches!(err, Error::KeyMissing(_)));
    }
}
