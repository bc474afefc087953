//! Server tunables. The struct and its defaults live here, in the teacher's
//! "all fields optional, defaulted in code" style (matching `kv-cli`'s own
//! `ConfigLoad`); loading it from a config file and merging CLI flags over
//! it is a `kv-cli` concern (see `kv-cli/src/config.rs`).

use serde_derive::{Deserialize, Serialize};

use crate::constants::{MANAGING_THREADS, MAX_BACKUPS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub jobs_dir: Option<String>,
    pub max_threads: Option<usize>,
    pub max_backups: Option<usize>,
    pub registration_endpoint: Option<String>,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            jobs_dir: None,
            max_threads: Some(MANAGING_THREADS),
            max_backups: Some(MAX_BACKUPS),
            registration_endpoint: None,
            log_level: Some("info".to_string()),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn max_threads(&self) -> usize {
        self.max_threads.unwrap_or(MANAGING_THREADS)
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups.unwrap_or(MAX_BACKUPS)
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let cfg = ServerConfig { max_threads: None, ..Default::default() };
        assert_eq!(cfg.max_threads(), MANAGING_THREADS);
    }
}
