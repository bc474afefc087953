//! `kv` is a concurrent, in-memory key/value store: a striped hash table,
//! a pub/sub subscription and notification engine, a job-script executor,
//! and a client acceptor over named pipes with semaphore-gated admission
//! control and fork-based backup snapshots.
//!
//! ## Getting started
//!
//! ```rust
//! use kv::kvs::Server;
//!
//! let server = Server::init(4).unwrap();
//! server.write(&[("a".to_string(), "1".to_string())]).unwrap();
//! server.terminate().unwrap();
//! ```

pub mod backup;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod kvs;
pub mod netkv;
pub mod notify;
pub mod subscription;
pub mod sync;
pub mod table;
