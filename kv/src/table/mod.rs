//! The striped data table: `TABLE_SIZE` chained buckets, each behind its own
//! `RwLock`, plus a table-wide `RwLock` for whole-table operations.

use std::sync::RwLock;

use crate::constants::TABLE_SIZE;

/// Maps a key to its bucket index using the single-character-prefix stripe
/// kept for byte-compatible parity with the reference implementation's test
/// vectors: `key[0] - 'a' mod TABLE_SIZE`, falling back to bucket 0 for keys
/// that don't start with a lowercase ASCII letter.
pub fn bucket_index(key: &str) -> usize {
    match key.as_bytes().first() {
        Some(&b) if b.is_ascii_lowercase() => ((b - b'a') as usize) % TABLE_SIZE,
        _ => 0,
    }
}

/// One chain of pairs. Represented as a `Vec` rather than an intrusive list;
/// writes insert at the front, matching the original's head-insertion order.
#[derive(Default)]
struct Bucket {
    pairs: Vec<(String, String)>,
}

impl Bucket {
    fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Upserts `(key, value)`. Returns `true` if an existing pair was replaced.
    fn upsert(&mut self, key: &str, value: &str) -> bool {
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.to_string();
            true
        } else {
            self.pairs.insert(0, (key.to_string(), value.to_string()));
            false
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        if let Some(pos) = self.pairs.iter().position(|(k, _)| k == key) {
            self.pairs.remove(pos);
            true
        } else {
            false
        }
    }
}

/// The fixed-bucket hash table with two-level locking: a table-wide lock `T`
/// and one lock `B[i]` per bucket. `write_batch`/`read_batch`/`delete_batch`
/// acquire the distinct buckets a batch touches in ascending index order to
/// avoid deadlocking against a concurrent batch over an overlapping set.
pub struct HashTable {
    table_lock: RwLock<()>,
    buckets: Vec<RwLock<Bucket>>,
}

impl Default for HashTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HashTable {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(TABLE_SIZE);
        for _ in 0..TABLE_SIZE {
            buckets.push(RwLock::new(Bucket::default()));
        }
        HashTable { table_lock: RwLock::new(()), buckets }
    }

    /// Acquires `T` in shared mode for the duration of `body`. `terminate`
    /// and whole-table snapshots instead take `lock_exclusive`.
    pub fn lock_shared<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = self.table_lock.read().unwrap();
        body()
    }

    pub fn lock_exclusive<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = self.table_lock.write().unwrap();
        body()
    }

    /// Writes every `(key, value)` pair, upserting in place. Returns, for
    /// each input pair in order, whether it replaced an existing value.
    pub fn write_batch(&self, pairs: &[(String, String)]) -> Vec<bool> {
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        let mut indices: Vec<usize> = keys.iter().map(|k| bucket_index(k)).collect();
        indices.sort_unstable();
        indices.dedup();

        let mut guards: Vec<(usize, std::sync::RwLockWriteGuard<Bucket>)> =
            indices.iter().map(|&i| (i, self.buckets[i].write().unwrap())).collect();

        let mut replaced = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let idx = bucket_index(k);
            let (_, guard) = guards.iter_mut().find(|(i, _)| *i == idx).expect("bucket locked above");
            replaced.push(guard.upsert(k, v));
        }
        replaced
    }

    /// Reads every key, returning `Some(value)` or `None` per key, in input
    /// order (callers are responsible for any output-side sorting, per §4.2).
    pub fn read_batch(&self, keys: &[String]) -> Vec<Option<String>> {
        let mut indices: Vec<usize> = keys.iter().map(|k| bucket_index(k)).collect();
        indices.sort_unstable();
        indices.dedup();

        let guards: Vec<(usize, std::sync::RwLockReadGuard<Bucket>)> =
            indices.iter().map(|&i| (i, self.buckets[i].read().unwrap())).collect();

        keys.iter()
            .map(|k| {
                let idx = bucket_index(k);
                guards
                    .iter()
                    .find(|(i, _)| *i == idx)
                    .and_then(|(_, g)| g.get(k))
                    .map(|v| v.to_string())
            })
            .collect()
    }

    /// Deletes every key present, returning which keys were actually removed
    /// (in input order), for the caller to build the `KVSMISSING` list from.
    pub fn delete_batch(&self, keys: &[String]) -> Vec<bool> {
        let mut indices: Vec<usize> = keys.iter().map(|k| bucket_index(k)).collect();
        indices.sort_unstable();
        indices.dedup();

        let mut guards: Vec<(usize, std::sync::RwLockWriteGuard<Bucket>)> =
            indices.iter().map(|&i| (i, self.buckets[i].write().unwrap())).collect();

        keys.iter()
            .map(|k| {
                let idx = bucket_index(k);
                let (_, guard) = guards.iter_mut().find(|(i, _)| *i == idx).expect("bucket locked above");
                guard.remove(k)
            })
            .collect()
    }

    /// Returns `true` if `key` currently exists (used by `subscribe`).
    pub fn contains(&self, key: &str) -> bool {
        let idx = bucket_index(key);
        self.buckets[idx].read().unwrap().get(key).is_some()
    }

    /// Snapshots every pair in the table. No ordering guarantee across
    /// buckets, matching §4.2's `show` contract. Locks buckets one at a time
    /// in ascending order rather than holding them all at once.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for bucket in &self.buckets {
            let guard = bucket.read().unwrap();
            out.extend(guard.pairs.iter().cloned());
        }
        out
    }

    /// Clears every bucket. Called under `T` exclusive by `terminate`.
    pub fn clear(&self) {
        for bucket in &self.buckets {
            bucket.write().unwrap().pairs.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_index_matches_reference_hash() {
        assert_eq!(bucket_index("apple"), 0);
        assert_eq!(bucket_index("banana"), 1);
        assert_eq!(bucket_index("zebra"), 25);
        assert_eq!(bucket_index("Zebra"), 0);
        assert_eq!(bucket_index(""), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let table = HashTable::new();
        table.write_batch(&[("a".into(), "1".into()), ("b".into(), "2".into())]);
        let values = table.read_batch(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(values, vec![Some("1".to_string()), Some("2".to_string()), None]);
    }

    #[test]
    fn write_replaces_existing_value() {
        let table = HashTable::new();
        table.write_batch(&[("a".into(), "1".into())]);
        let replaced = table.write_batch(&[("a".into(), "2".into())]);
        assert_eq!(replaced, vec![true]);
        assert_eq!(table.read_batch(&["a".to_string()]), vec![Some("2".to_string())]);
    }

    #[test]
    fn delete_reports_hits_and_misses() {
        let table = HashTable::new();
        table.write_batch(&[("a".into(), "1".into())]);
        let hits = table.delete_batch(&["a".to_string(), "ghost".to_string()]);
        assert_eq!(hits, vec![true, false]);
        assert!(!table.contains("a"));
    }

    #[test]
    fn snapshot_contains_all_live_pairs() {
        let table = HashTable::new();
        table.write_batch(&[("a".into(), "1".into()), ("b".into(), "2".into())]);
        let mut snap = table.snapshot();
        snap.sort();
        assert_eq!(snap, vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]);
    }

    #[test]
    fn clear_empties_every_bucket() {
        let table = HashTable::new();
        table.write_batch(&[("a".into(), "1".into()), ("z".into(), "2".into())]);
        table.clear();
        assert!(table.snapshot().is_empty());
    }
}
