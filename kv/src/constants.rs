//! Tunables shared across the table, subscription, and wire-protocol modules.

/// Number of chained buckets in both the data table and the subscription table.
pub const TABLE_SIZE: usize = 26;

/// Max bytes (including the NUL terminator) of a key or value on the wire,
/// and the fixed width of the `req_path`/`resp_path`/`notif_path` fields.
pub const MAX_STRING_SIZE: usize = 40;

/// Max number of pairs accepted in a single batched `WRITE`/`READ`/`DELETE`.
pub const MAX_WRITE_SIZE: usize = 10;

/// Default size of the client-handler thread pool (`MANAGING_THREADS`).
pub const MANAGING_THREADS: usize = 4;

/// Default cap on concurrently outstanding backup children.
pub const MAX_BACKUPS: usize = 4;
