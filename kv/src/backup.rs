//! Fork-based snapshot backups.
//!
//! The parent holds `T` shared only long enough to snapshot the table and
//! fork; the child serializes the snapshot to disk and exits independently,
//! so a slow backup never blocks concurrent writers beyond the fork itself.
//! Outstanding children are capped at `max_backups`; once at the cap, the
//! parent reaps one before forking the next (the "reap-one-then-fork"
//! policy called for in §9(d), replacing the source's unused `wait(NULL)`).

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CResult, Error};

pub struct BackupThrottle {
    max_backups: usize,
    #[cfg(unix)]
    children: Vec<libc::pid_t>,
}

impl BackupThrottle {
    pub fn new(max_backups: usize) -> Self {
        BackupThrottle {
            max_backups: max_backups.max(1),
            #[cfg(unix)]
            children: Vec::new(),
        }
    }

    /// Forks (on Unix) a child that writes `pairs` to `out_path` as
    /// `(key, value)\n` lines, byte-exact with `show`'s output. On
    /// non-Unix targets, writes synchronously instead, per the design
    /// note's allowed fallback.
    pub fn spawn(&mut self, out_path: &Path, pairs: Vec<(String, String)>) -> CResult<()> {
        #[cfg(unix)]
        {
            self.reap_one_if_at_capacity();
            // Safety: `fork` is called with no other threads known to hold
            // locks across the call in this process's use of it — the
            // caller (`Server::backup`) holds only the already-released
            // snapshot data, not the table lock, inside this function.
            let pid = unsafe { libc::fork() };
            match pid {
                -1 => Err(Error::BackupForkFailed(std::io::Error::last_os_error().to_string())),
                0 => {
                    // Child: write the snapshot and exit without running
                    // any parent destructors (no flushing shared buffers,
                    // no double-closing inherited handles beyond this file).
                    let status = write_snapshot(out_path, &pairs);
                    let code = if status.is_ok() { 0 } else { 1 };
                    unsafe { libc::_exit(code) };
                }
                child_pid => {
                    self.children.push(child_pid);
                    Ok(())
                }
            }
        }
        #[cfg(not(unix))]
        {
            write_snapshot(out_path, &pairs).map_err(Error::Io)
        }
    }

    #[cfg(unix)]
    fn reap_one_if_at_capacity(&mut self) {
        if self.children.len() < self.max_backups {
            return;
        }
        if let Some(pid) = self.children.first().copied() {
            let mut status = 0i32;
            unsafe { libc::waitpid(pid, &mut status as *mut i32, 0) };
            self.children.remove(0);
        }
    }

    /// Blocks until every outstanding backup child has exited.
    pub fn drain(&mut self) {
        #[cfg(unix)]
        {
            for pid in self.children.drain(..) {
                let mut status = 0i32;
                unsafe { libc::waitpid(pid, &mut status as *mut i32, 0) };
            }
        }
    }
}

fn write_snapshot(out_path: &Path, pairs: &[(String, String)]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(out_path)?;
    for (k, v) in pairs {
        writeln!(file, "({}, {})", k, v)?;
    }
    Ok(())
}

/// Builds the `<dir>/<job_basename>-<n>.bck` path for the `n`th backup
/// issued by `job_basename`.
pub fn backup_path(dir: &Path, job_basename: &str, n: usize) -> PathBuf {
    dir.join(format!("{}-{}.bck", job_basename, n))
}
